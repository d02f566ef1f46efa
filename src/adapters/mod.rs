// Concrete implementations of the domain ports: Google Cloud, local files, Slack.

pub mod bigquery;
pub mod gcp_auth;
pub mod gcs;
pub mod local;
pub mod slack;

pub use bigquery::BigQueryClient;
pub use gcp_auth::TokenProvider;
pub use gcs::GcsStorage;
pub use local::{LocalStorage, LocalWarehouse};
pub use slack::SlackNotifier;
