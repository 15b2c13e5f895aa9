//! # Share Links
//!
//! Turns a bill into a `https://<host>/bill/<token>` link and back.
//!
//! ```text
//! create_link ─┬─ Compact ─► encode_bill(data)                 long token
//!              └─ Remote ──► store.set(random key, json, ttl)  8-char token
//!
//! resolve(token) ── len > 20 ? decode locally : store.get(token)
//!                   any failure ─► None ("bill not found")
//! ```

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rabbit_core::{classify_token, decode_bill, encode_bill, ShareToken, SharedTabData};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ShareSettings;
use crate::error::{SyncError, SyncResult};
use crate::remote::ShareStore;

/// Random bytes behind a remote token (8 base64 characters).
const REMOTE_TOKEN_BYTES: usize = 6;

/// How a bill is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    /// Whole bill inside the token; no server lookup.
    Compact,
    /// Short random key into the share store, expiring after the TTL.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub mode: ShareMode,
    pub token: String,
    pub url: String,
}

/// Creates and resolves share links.
pub struct ShareService {
    base_url: Url,
    ttl: Duration,
    prefer_compact: bool,
    store: Option<Arc<dyn ShareStore>>,
}

impl ShareService {
    pub fn new(settings: &ShareSettings, store: Option<Arc<dyn ShareStore>>) -> SyncResult<Self> {
        let base_url = Url::parse(&settings.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(settings.base_url.clone()));
        }
        Ok(ShareService {
            base_url,
            ttl: settings.ttl(),
            prefer_compact: settings.prefer_compact,
            store,
        })
    }

    /// Mode used when the caller has no preference.
    pub fn default_mode(&self) -> ShareMode {
        if self.prefer_compact || self.store.is_none() {
            ShareMode::Compact
        } else {
            ShareMode::Remote
        }
    }

    pub async fn create_link(&self, data: &SharedTabData, mode: ShareMode) -> SyncResult<ShareLink> {
        let token = match mode {
            ShareMode::Compact => encode_bill(data)?,
            ShareMode::Remote => {
                let store = self
                    .store
                    .as_ref()
                    .ok_or_else(|| SyncError::ShareStore("no share store configured".into()))?;
                let token = generate_remote_token();
                let blob = serde_json::to_string(data)?;
                store.set(&token, &blob, self.ttl).await?;
                token
            }
        };

        let url = self.link_for(&token)?;
        info!(?mode, token_len = token.len(), "Share link created");
        Ok(ShareLink { mode, token, url })
    }

    /// Looks a token up. Every failure reads as "bill not found".
    pub async fn resolve(&self, token: &str) -> Option<SharedTabData> {
        match classify_token(token) {
            ShareToken::Compact(token) => match decode_bill(token) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!(error = %e, "Compact token could not be decoded");
                    None
                }
            },
            ShareToken::Remote(key) => {
                let Some(store) = self.store.as_ref() else {
                    warn!(key, "Short token but no share store configured");
                    return None;
                };
                match store.get(key).await {
                    Ok(Some(blob)) => match serde_json::from_str(&blob) {
                        Ok(data) => Some(data),
                        Err(e) => {
                            warn!(key, error = %e, "Stored bill is not readable");
                            None
                        }
                    },
                    Ok(None) => {
                        debug!(key, "Share token not found or expired");
                        None
                    }
                    Err(e) => {
                        warn!(key, error = %e, "Share store lookup failed");
                        None
                    }
                }
            }
        }
    }

    /// `<base_url>/bill/<token>`.
    pub fn link_for(&self, token: &str) -> SyncResult<String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("bill")
            .push(token);
        Ok(url.into())
    }

    /// Extracts `<token>` from a `.../bill/<token>` link.
    pub fn token_from_url(link: &str) -> SyncResult<String> {
        let url = Url::parse(link)?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.collect())
            .unwrap_or_default();

        segments
            .iter()
            .position(|s| *s == "bill")
            .and_then(|i| segments.get(i + 1))
            .filter(|token| !token.is_empty())
            .map(|token| token.to_string())
            .ok_or_else(|| SyncError::InvalidUrl(format!("no bill token in {}", link)))
    }
}

/// Random key for the share store.
pub fn generate_remote_token() -> String {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    URL_SAFE_NO_PAD.encode(&bytes[..REMOTE_TOKEN_BYTES])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use rabbit_core::{Assignment, Item, Rabbit, RabbitColor, Tab};

    fn bill() -> SharedTabData {
        let mut tab = Tab::new("Dinner", "USD");
        tab.tax_percent = 8.0;
        let burger = Item::new(&tab.id, "Burger", 1000);
        let a = Rabbit::new(&tab.id, "A", RabbitColor::Red);
        SharedTabData {
            assignments: vec![Assignment::new(&burger.id, &a.id)],
            items: vec![burger],
            rabbits: vec![a],
            tab,
            owner_profile: None,
        }
    }

    fn service_with_store() -> (ShareService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn ShareStore> = store.clone();
        let service = ShareService::new(&ShareSettings::default(), Some(shared)).unwrap();
        (service, store)
    }

    #[test]
    fn test_remote_token_shape() {
        let token = generate_remote_token();
        assert_eq!(token.len(), 8);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(matches!(classify_token(&token), ShareToken::Remote(_)));
    }

    #[tokio::test]
    async fn test_compact_link_resolves_without_store() {
        let service = ShareService::new(&ShareSettings::default(), None).unwrap();
        assert_eq!(service.default_mode(), ShareMode::Compact);

        let link = service.create_link(&bill(), ShareMode::Compact).await.unwrap();
        assert!(link.url.starts_with("https://rabbit.tab/bill/"));
        assert!(link.token.len() > 20);

        let token = ShareService::token_from_url(&link.url).unwrap();
        let data = service.resolve(&token).await.unwrap();
        assert_eq!(data.items[0].description, "Burger");
        assert_eq!(data.items[0].id, "item-0");
        assert_eq!(data.assignments, vec![Assignment::new("item-0", "rabbit-0")]);
    }

    #[tokio::test]
    async fn test_remote_link_round_trip() {
        let (service, _store) = service_with_store();
        let original = bill();

        let link = service.create_link(&original, ShareMode::Remote).await.unwrap();
        assert_eq!(link.token.len(), 8);
        assert_eq!(service.resolve(&link.token).await, Some(original));
    }

    #[tokio::test]
    async fn test_remote_link_needs_store() {
        let service = ShareService::new(&ShareSettings::default(), None).unwrap();
        let result = service.create_link(&bill(), ShareMode::Remote).await;
        assert!(matches!(result, Err(SyncError::ShareStore(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_remote_link_is_not_found() {
        let (service, _store) = service_with_store();
        let link = service.create_link(&bill(), ShareMode::Remote).await.unwrap();

        tokio::time::advance(Duration::from_secs(91 * 24 * 60 * 60)).await;
        assert_eq!(service.resolve(&link.token).await, None);
    }

    #[tokio::test]
    async fn test_failures_read_as_not_found() {
        let (service, store) = service_with_store();
        let link = service.create_link(&bill(), ShareMode::Remote).await.unwrap();

        assert_eq!(service.resolve("not-a-valid-token").await, None);
        assert_eq!(service.resolve("unknown1").await, None);
        assert_eq!(
            service.resolve("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").await,
            None
        );

        store.set_offline(true).await;
        assert_eq!(service.resolve(&link.token).await, None);
    }

    #[test]
    fn test_token_from_url() {
        assert_eq!(
            ShareService::token_from_url("https://rabbit.tab/bill/abcDEF12").unwrap(),
            "abcDEF12"
        );
        assert_eq!(
            ShareService::token_from_url("http://localhost:3000/app/bill/xyz?ref=sms").unwrap(),
            "xyz"
        );
        assert!(ShareService::token_from_url("https://rabbit.tab/bill/").is_err());
        assert!(ShareService::token_from_url("https://rabbit.tab/tab/abc").is_err());
        assert!(ShareService::token_from_url("not a url").is_err());
    }

    #[test]
    fn test_link_for_nested_base() {
        let settings = ShareSettings {
            base_url: "https://example.com/split/".into(),
            ..Default::default()
        };
        let service = ShareService::new(&settings, None).unwrap();
        assert_eq!(
            service.link_for("abc").unwrap(),
            "https://example.com/split/bill/abc"
        );
    }
}
