//! Time-limited share links. A token grants read access to the owner's
//! records until it expires; the link is shown as a URL and a QR code.

use chrono::{DateTime, Duration, TimeDelta, Utc};
use reqwest::Url;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Identity;
use crate::config::AppConfig;
use crate::models::{Collection, ShareToken};
use crate::store::{DocumentBackend, DocumentId, RecordStore, StoreError};

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Invalid share base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("QR generation failed: {0}")]
    Qr(String),

    #[error("Share link not found")]
    NotFound,

    #[error("Share link expired at {0}")]
    Expired(DateTime<Utc>),

    #[error("Share link lifetime out of range")]
    LifetimeOutOfRange,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `{base}?token={token}`, keeping any query the base already has.
pub fn share_url(base: &str, token: &str) -> Result<String, ShareError> {
    let mut url = Url::parse(base).map_err(|e| ShareError::InvalidBaseUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.into())
}

/// Render `data` as an SVG QR code.
pub fn qr_svg(data: &str) -> Result<String, ShareError> {
    use qrcode::render::svg;
    use qrcode::QrCode;

    let code = QrCode::new(data.as_bytes()).map_err(|e| ShareError::Qr(e.to_string()))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .max_dimensions(300, 300)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .quiet_zone(true)
        .build())
}

/// A freshly issued token and its URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareLink {
    pub token: ShareToken,
    pub url: String,
}

impl ShareLink {
    pub fn qr_svg(&self) -> Result<String, ShareError> {
        qr_svg(&self.url)
    }
}

pub struct ShareLinks<B> {
    store: RecordStore<B>,
    base_url: String,
    ttl: Duration,
}

impl<B: DocumentBackend> ShareLinks<B> {
    pub fn new(store: RecordStore<B>, base_url: &str, ttl: Duration) -> Self {
        Self {
            store,
            base_url: base_url.to_string(),
            ttl,
        }
    }

    pub fn from_config(store: RecordStore<B>, config: &AppConfig) -> Result<Self, ShareError> {
        let ttl = TimeDelta::try_hours(config.share_ttl_hours)
            .filter(|ttl| *ttl > TimeDelta::zero())
            .ok_or(ShareError::LifetimeOutOfRange)?;
        Ok(Self::new(store, &config.share_base_url, ttl))
    }

    /// Issue a new token for the signed-in user and store it under its own id.
    pub async fn generate(&self, identity: &Identity) -> Result<ShareLink, ShareError> {
        let session = identity.require()?;
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(ShareError::LifetimeOutOfRange)?;
        let token = ShareToken {
            token: Uuid::new_v4().to_string(),
            owner_id: session.user_id().to_string(),
            created_at: now,
            expires_at,
        };
        let url = share_url(&self.base_url, &token.token)?;
        let id = DocumentId::new(token.token.clone())?;
        self.store
            .set(identity, Collection::ShareTokens, &id, &token)
            .await?;
        tracing::info!(expires_at = %token.expires_at, "Share link issued");
        Ok(ShareLink { token, url })
    }

    /// Owner-side lookup: check that one of the signed-in user's own tokens
    /// exists and has not expired at `now`. Tokens live under the issuer's
    /// `users/{uid}/shareTokens`, so a recipient cannot resolve a link here.
    pub async fn check(
        &self,
        identity: &Identity,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ShareToken, ShareError> {
        let id = DocumentId::new(token).map_err(|_| ShareError::NotFound)?;
        let stored: ShareToken = self
            .store
            .get(identity, Collection::ShareTokens, &id)
            .await?
            .ok_or(ShareError::NotFound)?;
        if stored.is_expired_at(now) {
            return Err(ShareError::Expired(stored.expires_at));
        }
        Ok(stored)
    }

    /// Tokens that are still valid at `now`, newest first.
    pub async fn active_tokens(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<Vec<ShareToken>, ShareError> {
        let mut tokens: Vec<ShareToken> = self
            .store
            .list_all(identity, Collection::ShareTokens)
            .await?
            .into_iter()
            .map(|r| r.value)
            .filter(|t: &ShareToken| !t.is_expired_at(now))
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    pub async fn revoke(&self, identity: &Identity, token: &str) -> Result<(), ShareError> {
        let id = DocumentId::new(token).map_err(|_| ShareError::NotFound)?;
        match self.store.delete(identity, Collection::ShareTokens, &id).await {
            Err(StoreError::NotFound { .. }) => Err(ShareError::NotFound),
            other => Ok(other?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::local_store;

    fn links() -> (ShareLinks<crate::store::LocalBackend>, Identity) {
        let (store, me) = local_store();
        (
            ShareLinks::new(store, "https://mediconn.netlify.app/", Duration::hours(24)),
            me,
        )
    }

    #[test]
    fn url_carries_token_query() {
        assert_eq!(
            share_url("https://mediconn.netlify.app/", "abc-123").unwrap(),
            "https://mediconn.netlify.app/?token=abc-123"
        );
        assert_eq!(
            share_url("https://example.com/view?lang=en", "t").unwrap(),
            "https://example.com/view?lang=en&token=t"
        );
        assert!(matches!(
            share_url("not a url", "t"),
            Err(ShareError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn qr_is_svg() {
        let svg = qr_svg("https://mediconn.netlify.app/?token=abc").unwrap();
        assert!(svg.contains("<svg"));
    }

    #[tokio::test]
    async fn generated_token_lasts_a_day() {
        let (links, me) = links();
        let link = links.generate(&me).await.unwrap();

        assert_eq!(link.token.owner_id, "user-1");
        assert_eq!(link.token.expires_at - link.token.created_at, Duration::hours(24));
        assert!(link.url.ends_with(&format!("?token={}", link.token.token)));
        assert!(Uuid::parse_str(&link.token.token).is_ok());
        assert!(link.qr_svg().unwrap().contains("<svg"));

        let now = link.token.created_at + Duration::hours(1);
        let found = links.check(&me, &link.token.token, now).await.unwrap();
        assert_eq!(found, link.token);
    }

    #[tokio::test]
    async fn expired_token_reports_expired() {
        let (links, me) = links();
        let link = links.generate(&me).await.unwrap();
        let later = link.token.created_at + Duration::hours(25);

        let err = links.check(&me, &link.token.token, later).await.unwrap_err();
        assert!(matches!(err, ShareError::Expired(at) if at == link.token.expires_at));
        assert!(links.active_tokens(&me, later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn check_only_sees_own_tokens() {
        let (links, me) = links();
        let link = links.generate(&me).await.unwrap();
        let other = Identity::signed_in_for_tests("user-2");
        let err = links
            .check(&other, &link.token.token, link.token.created_at)
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::NotFound));
    }

    #[tokio::test]
    async fn revoke_removes_token() {
        let (links, me) = links();
        let link = links.generate(&me).await.unwrap();
        let now = link.token.created_at;
        assert_eq!(links.active_tokens(&me, now).await.unwrap().len(), 1);

        links.revoke(&me, &link.token.token).await.unwrap();
        assert!(links.active_tokens(&me, now).await.unwrap().is_empty());
        assert!(matches!(
            links.revoke(&me, &link.token.token).await.unwrap_err(),
            ShareError::NotFound
        ));
    }

    #[tokio::test]
    async fn lifetime_past_calendar_end_is_an_error() {
        let (store, me) = local_store();
        let links = ShareLinks::new(store, "https://mediconn.netlify.app/", TimeDelta::MAX);
        let err = links.generate(&me).await.unwrap_err();
        assert!(matches!(err, ShareError::LifetimeOutOfRange));
        assert!(links.active_tokens(&me, Utc::now()).await.unwrap().is_empty());
    }

    #[test]
    fn from_config_rejects_unusable_lifetime() {
        for hours in [0, -1, i64::MAX] {
            let (store, _) = local_store();
            let config = AppConfig {
                share_ttl_hours: hours,
                ..AppConfig::default()
            };
            assert!(matches!(
                ShareLinks::from_config(store, &config),
                Err(ShareError::LifetimeOutOfRange)
            ));
        }
        let (store, _) = local_store();
        assert!(ShareLinks::from_config(store, &AppConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn anonymous_cannot_share() {
        let (links, _) = links();
        let err = links.generate(&Identity::Anonymous).await.unwrap_err();
        assert!(matches!(err, ShareError::Store(StoreError::Unauthenticated)));
    }
}
