use crate::model::{DataSourceKind, EngineError, ServiceName};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub mod airtable;
pub mod generic_http;
pub mod google_auth;
pub mod google_sheets;
pub mod salesforce_d2c;
pub mod shopify;

pub use airtable::AirtableKind;
pub use generic_http::GenericHttpKind;
pub use google_sheets::GoogleSheetsKind;
pub use salesforce_d2c::SalesforceD2cKind;
pub use shopify::ShopifyKind;

static REGISTRY: OnceLock<Vec<Box<dyn DataSourceKind>>> = OnceLock::new();

fn registry() -> &'static [Box<dyn DataSourceKind>] {
    REGISTRY.get_or_init(|| {
        vec![
            Box::new(GenericHttpKind),
            Box::new(GoogleSheetsKind),
            Box::new(AirtableKind),
            Box::new(ShopifyKind),
            Box::new(SalesforceD2cKind),
        ]
    })
}

/// Look up the service kind implementation for a service name.
pub fn get_kind(service: ServiceName) -> Result<&'static dyn DataSourceKind, EngineError> {
    registry()
        .iter()
        .find(|kind| kind.service_name() == service)
        .map(|kind| kind.as_ref())
        .ok_or_else(|| {
            EngineError::not_found(
                "unsupported_service",
                format!("No integration registered for service: {}", service),
            )
        })
}

/// Per-data-source OAuth token cache. Tokens are reused until shortly before
/// their nominal expiry.
#[derive(Debug)]
pub struct TokenCache {
    token: RwLock<Option<(String, Instant)>>,
    reuse_window: Duration,
}

impl TokenCache {
    pub fn new(reuse_window: Duration) -> Self {
        Self {
            token: RwLock::new(None),
            reuse_window,
        }
    }

    pub async fn get(&self) -> Option<String> {
        let token = self.token.read().await;
        match token.as_ref() {
            Some((value, fetched_at)) if fetched_at.elapsed() < self.reuse_window => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    pub async fn put(&self, value: String) {
        let mut token = self.token.write().await;
        *token = Some((value, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_cache_returns_fresh_tokens_only() {
        let cache = TokenCache::new(Duration::from_secs(60));
        assert!(cache.get().await.is_none());

        cache.put("tok".to_string()).await;
        assert_eq!(cache.get().await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_token_cache_expires_past_the_reuse_window() {
        let cache = TokenCache::new(Duration::from_millis(1));
        cache.put("tok".to_string()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get().await.is_none());
    }

    #[test]
    fn test_every_service_has_a_registered_kind() {
        for service in [
            ServiceName::GenericHttp,
            ServiceName::GoogleSheets,
            ServiceName::Airtable,
            ServiceName::Shopify,
            ServiceName::SalesforceD2c,
        ] {
            let kind = get_kind(service).unwrap();
            assert_eq!(kind.service_name(), service);
        }
    }
}
