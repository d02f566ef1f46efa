use crate::domain::model::{Record, RowFilter, SchemaField, SurveyType, TableId, ZipReport};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Object store holding the uploaded archives.
pub trait Storage: Send + Sync {
    /// `Ok(None)` when the object does not exist.
    fn fetch_object(
        &self,
        bucket: &str,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
}

/// Append-only analytical store for survey tables.
pub trait Warehouse: Send + Sync {
    /// Appends `rows` and returns how many were loaded. `schema` of `None` lets the
    /// backend infer column types.
    fn load_rows(
        &self,
        table: &TableId,
        rows: &[Record],
        schema: Option<&[SchemaField]>,
    ) -> impl std::future::Future<Output = Result<usize>> + Send;

    fn read_rows(
        &self,
        table: &TableId,
        filter: Option<&RowFilter>,
    ) -> impl std::future::Future<Output = Result<Vec<Record>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn project_id(&self) -> &str;
    fn brand_dataset(&self) -> &str;
    fn custom_dataset(&self) -> &str;
    fn dedup_window(&self) -> Duration;
}

/// Turns one downloaded archive into warehouse tables.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn process_archive(
        &self,
        archive: &[u8],
        archive_name: &str,
        survey_type: SurveyType,
    ) -> Result<ZipReport>;
}
