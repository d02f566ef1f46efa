pub mod toml_config;

use crate::adapters::bigquery::DEFAULT_BIGQUERY_ENDPOINT;
use crate::adapters::gcp_auth::DEFAULT_METADATA_ENDPOINT;
use crate::adapters::gcs::DEFAULT_STORAGE_ENDPOINT;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_identifier, validate_non_empty_string, validate_positive_number, validate_range,
    validate_url, Validate,
};
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use toml_config::FileConfig;

pub const DEFAULT_PROJECT_ID: &str = "lemonade-brand-sruvey-tracker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "survey-etl")]
#[command(about = "Loads uploaded survey exports into the warehouse")]
pub struct ServiceConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "WORKER_THREADS", default_value_t = 8)]
    pub worker_threads: usize,

    #[arg(long, env = "PROJECT_ID", default_value = DEFAULT_PROJECT_ID)]
    pub project_id: String,

    #[arg(long, env = "BRAND_DATASET", default_value = "new_brand_survey")]
    pub brand_dataset: String,

    #[arg(long, env = "CUSTOM_DATASET", default_value = "new_custom_brand_survey")]
    pub custom_dataset: String,

    #[arg(long, env = "DEDUP_WINDOW_SECS", default_value_t = 60)]
    pub dedup_window_secs: u64,

    #[arg(long, env = "SLACK_WEBHOOK_URL")]
    pub slack_webhook_url: Option<String>,

    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    #[arg(long, env = "BIGQUERY_ENDPOINT", default_value = DEFAULT_BIGQUERY_ENDPOINT)]
    pub bigquery_endpoint: String,

    #[arg(long, env = "STORAGE_ENDPOINT", default_value = DEFAULT_STORAGE_ENDPOINT)]
    pub storage_endpoint: String,

    #[arg(long, env = "METADATA_ENDPOINT", default_value = DEFAULT_METADATA_ENDPOINT)]
    pub metadata_endpoint: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[arg(long, env = "MEMORY_MONITOR", default_value_t = true, action = ArgAction::Set)]
    pub memory_monitor: bool,

    /// TOML file whose values override flags and environment
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ServiceConfig {
    /// Parses flags and environment, then applies `--config` when given.
    pub fn load() -> Result<Self> {
        let mut config = Self::parse();
        if let Some(path) = config.config.clone() {
            let file = FileConfig::from_file(&path)?;
            file.validate()?;
            config.apply(file);
        }
        Ok(config)
    }

    pub fn apply(&mut self, file: FileConfig) {
        let FileConfig {
            server,
            warehouse,
            notifications,
        } = file;

        if let Some(host) = server.host {
            self.host = host;
        }
        if let Some(port) = server.port {
            self.port = port;
        }
        if let Some(threads) = server.worker_threads {
            self.worker_threads = threads;
        }
        if let Some(secs) = server.dedup_window_secs {
            self.dedup_window_secs = secs;
        }
        if let Some(enabled) = server.memory_monitor {
            self.memory_monitor = enabled;
        }
        if let Some(project_id) = warehouse.project_id {
            self.project_id = project_id;
        }
        if let Some(dataset) = warehouse.brand_dataset {
            self.brand_dataset = dataset;
        }
        if let Some(dataset) = warehouse.custom_dataset {
            self.custom_dataset = dataset;
        }
        if let Some(endpoint) = warehouse.bigquery_endpoint {
            self.bigquery_endpoint = endpoint;
        }
        if let Some(endpoint) = warehouse.storage_endpoint {
            self.storage_endpoint = endpoint;
        }
        if let Some(url) = notifications.slack_webhook_url {
            self.slack_webhook_url = Some(url);
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ConfigProvider for ServiceConfig {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    fn brand_dataset(&self) -> &str {
        &self.brand_dataset
    }

    fn custom_dataset(&self) -> &str {
        &self.custom_dataset
    }

    fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("host", &self.host)?;
        validate_range("port", self.port, 1, u16::MAX)?;
        validate_positive_number("worker_threads", self.worker_threads, 1)?;
        validate_non_empty_string("project_id", &self.project_id)?;
        validate_identifier("brand_dataset", &self.brand_dataset)?;
        validate_identifier("custom_dataset", &self.custom_dataset)?;
        validate_url("bigquery_endpoint", &self.bigquery_endpoint)?;
        validate_url("storage_endpoint", &self.storage_endpoint)?;
        validate_url("metadata_endpoint", &self.metadata_endpoint)?;
        if let Some(url) = &self.slack_webhook_url {
            if !url.trim().is_empty() {
                validate_url("slack_webhook_url", url)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServiceConfig {
        let mut argv = vec!["survey-etl"];
        argv.extend_from_slice(args);
        ServiceConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_explicit_flags() {
        let config = parse(&[
            "--port",
            "9000",
            "--worker-threads",
            "2",
            "--brand-dataset",
            "brand_x",
            "--memory-monitor",
            "false",
            "--log-format",
            "json",
        ]);
        assert_eq!(config.bind_address(), format!("{}:9000", config.host));
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.brand_dataset(), "brand_x");
        assert!(!config.memory_monitor);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_values_override() {
        let mut config = parse(&["--project-id", "from-flag"]);
        let file = FileConfig::from_toml_str(
            "[server]\ndedup_window_secs = 5\n[warehouse]\nproject_id = \"from-file\"\n",
        )
        .unwrap();
        config.apply(file);

        assert_eq!(config.project_id(), "from-file");
        assert_eq!(config.dedup_window(), Duration::from_secs(5));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = parse(&["--custom-dataset", "has-dash"]);
        assert!(config.validate().is_err());

        let config = parse(&["--worker-threads", "0"]);
        assert!(config.validate().is_err());

        let config = parse(&["--bigquery-endpoint", "not a url"]);
        assert!(config.validate().is_err());
    }
}
