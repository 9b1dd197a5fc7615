use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of an analysed lab report, e.g. `TRIGLYCERIDES` → `935 mg/dl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabFinding {
    pub test: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabReport {
    pub findings: Vec<LabFinding>,
    pub source_name: String,
    pub analyzed_at: DateTime<Utc>,
}
