use crate::adapters::gcp_auth::TokenProvider;
use crate::domain::ports::Storage;
use crate::utils::error::{EtlError, Result};
use std::sync::Arc;
use url::Url;

pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// Cloud Storage JSON API media downloads.
#[derive(Debug, Clone)]
pub struct GcsStorage {
    client: reqwest::Client,
    base_url: String,
    auth: Arc<TokenProvider>,
}

impl GcsStorage {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, auth: Arc<TokenProvider>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// `{base}/storage/v1/b/{bucket}/o/{object}?alt=media`, with the object name encoded as
    /// a single path segment (slashes included).
    pub fn object_url(&self, bucket: &str, name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| EtlError::InvalidConfigValueError {
            field: "storage_endpoint".to_string(),
            value: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        url.path_segments_mut()
            .map_err(|_| EtlError::storage(format!("cannot use {} as a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket, "o", name]);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }
}

impl Storage for GcsStorage {
    async fn fetch_object(&self, bucket: &str, name: &str) -> Result<Option<Vec<u8>>> {
        let url = self.object_url(bucket, name)?;
        let token = self.auth.token().await?;

        let response = self.client.get(url).bearer_auth(token).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::storage(format!(
                "download of gs://{}/{} failed with {}: {}",
                bucket, name, status, body
            )));
        }

        let bytes = response.bytes().await?;
        tracing::info!("📥 Downloaded gs://{}/{} ({} bytes)", bucket, name, bytes.len());
        Ok(Some(bytes.to_vec()))
    }
}
