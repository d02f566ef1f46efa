use crate::domain::model::{Record, RowFilter, SurveyType, TableId};
use crate::domain::ports::{ConfigProvider, Warehouse};
use serde_json::Value;
use std::collections::HashMap;

/// Remembers which CSV exports have already been loaded, one tracking table per survey type.
pub struct SurveyTracker<'a, W: Warehouse> {
    warehouse: &'a W,
    brand_table: TableId,
    custom_table: TableId,
}

impl<'a, W: Warehouse> SurveyTracker<'a, W> {
    pub fn new(warehouse: &'a W, config: &impl ConfigProvider) -> Self {
        Self {
            warehouse,
            brand_table: TableId::new(
                config.project_id(),
                config.brand_dataset(),
                SurveyType::BrandTracker.tracking_table(),
            ),
            custom_table: TableId::new(
                config.project_id(),
                config.custom_dataset(),
                SurveyType::Custom.tracking_table(),
            ),
        }
    }

    pub fn table_for(&self, survey_type: SurveyType) -> &TableId {
        match survey_type {
            SurveyType::BrandTracker => &self.brand_table,
            SurveyType::Custom => &self.custom_table,
        }
    }

    /// Lookup failures count as "not processed".
    pub async fn is_processed(&self, filename: &str, survey_type: SurveyType) -> bool {
        let filter = RowFilter::eq("filename", filename);
        match self
            .warehouse
            .read_rows(self.table_for(survey_type), Some(&filter))
            .await
        {
            Ok(rows) => !rows.is_empty(),
            Err(e) => {
                tracing::error!("Error checking if file is processed: {}", e);
                false
            }
        }
    }

    pub async fn mark_processed(&self, filename: &str, survey_type: SurveyType) {
        let mut data = HashMap::new();
        data.insert("filename".to_string(), Value::from(filename));
        let row = Record { data };

        match self
            .warehouse
            .load_rows(self.table_for(survey_type), &[row], None)
            .await
        {
            Ok(_) => tracing::info!("✅ Marked {} file as processed: {}", survey_type, filename),
            Err(e) => tracing::error!("Error marking file as processed: {}", e),
        }
    }
}
