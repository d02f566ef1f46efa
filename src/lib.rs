pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

pub use adapters::{BigQueryClient, GcsStorage, LocalStorage, LocalWarehouse, SlackNotifier, TokenProvider};
pub use config::ServiceConfig;
pub use core::{etl::EtlEngine, pipeline::SurveyPipeline};
pub use domain::model::{ProcessOutcome, SurveyType, ZipReport};
pub use utils::error::{EtlError, Result};
