use crate::utils::error::{EtlError, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_METADATA_ENDPOINT: &str = "http://metadata.google.internal";
const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug)]
enum Source {
    Static(String),
    Metadata {
        client: reqwest::Client,
        endpoint: String,
        cache: Mutex<Option<CachedToken>>,
    },
}

/// Bearer tokens for Google APIs: a fixed token from configuration, or the instance
/// metadata server.
#[derive(Debug)]
pub struct TokenProvider {
    source: Source,
}

impl TokenProvider {
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: Source::Static(token.into()),
        }
    }

    pub fn metadata(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            source: Source::Metadata {
                client,
                endpoint: endpoint.into().trim_end_matches('/').to_string(),
                cache: Mutex::new(None),
            },
        }
    }

    /// A configured token wins over the metadata server.
    pub fn from_settings(
        client: reqwest::Client,
        static_token: Option<&str>,
        metadata_endpoint: &str,
    ) -> Self {
        match static_token.filter(|t| !t.trim().is_empty()) {
            Some(token) => Self::fixed(token),
            None => Self::metadata(client, metadata_endpoint),
        }
    }

    pub async fn token(&self) -> Result<String> {
        match &self.source {
            Source::Static(token) => Ok(token.clone()),
            Source::Metadata {
                client,
                endpoint,
                cache,
            } => {
                let mut cached = cache.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.value.clone());
                    }
                }

                tracing::debug!("🔑 Fetching access token from metadata server");
                let response = client
                    .get(format!("{}{}", endpoint, TOKEN_PATH))
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(EtlError::ConfigError {
                        message: format!(
                            "metadata server returned {} for access token",
                            response.status()
                        ),
                    });
                }

                let token: MetadataToken = response.json().await?;
                let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
                *cached = Some(CachedToken {
                    value: token.access_token.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(token.access_token)
            }
        }
    }
}
