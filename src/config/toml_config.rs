use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_identifier, validate_positive_number, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").ok());

/// Optional settings file. Every key is optional; present keys override flags and env.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub warehouse: WarehouseSection,
    #[serde(default)]
    pub notifications: NotificationsSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub worker_threads: Option<usize>,
    pub dedup_window_secs: Option<u64>,
    pub memory_monitor: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseSection {
    pub project_id: Option<String>,
    pub brand_dataset: Option<String>,
    pub custom_dataset: Option<String>,
    pub bigquery_endpoint: Option<String>,
    pub storage_endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsSection {
    pub slack_webhook_url: Option<String>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }

    /// `${NAME}` is replaced by the environment variable; unset variables stay as written.
    fn substitute_env_vars(content: &str) -> String {
        let Some(re) = ENV_VAR.as_ref() else {
            return content.to_string();
        };
        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }
}

impl Validate for FileConfig {
    fn validate(&self) -> Result<()> {
        if let Some(threads) = self.server.worker_threads {
            validate_positive_number("server.worker_threads", threads, 1)?;
        }
        if let Some(dataset) = &self.warehouse.brand_dataset {
            validate_identifier("warehouse.brand_dataset", dataset)?;
        }
        if let Some(dataset) = &self.warehouse.custom_dataset {
            validate_identifier("warehouse.custom_dataset", dataset)?;
        }
        if let Some(endpoint) = &self.warehouse.bigquery_endpoint {
            validate_url("warehouse.bigquery_endpoint", endpoint)?;
        }
        if let Some(endpoint) = &self.warehouse.storage_endpoint {
            validate_url("warehouse.storage_endpoint", endpoint)?;
        }
        if let Some(url) = &self.notifications.slack_webhook_url {
            validate_url("notifications.slack_webhook_url", url)?;
        }
        Ok(())
    }
}
