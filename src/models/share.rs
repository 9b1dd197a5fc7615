use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grants read access to the owner's records until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareToken {
    pub token: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ShareToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
