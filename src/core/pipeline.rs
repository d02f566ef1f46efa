use crate::core::aggregate::{self, ExportContext};
use crate::core::dma;
use crate::core::tracker::SurveyTracker;
use crate::domain::model::{
    CsvExport, DmaInfo, FieldType, Record, SchemaField, SurveyTable, SurveyType, TableBatch,
    TableId, TransformResult, ZipReport,
};
use crate::domain::ports::{ConfigProvider, Pipeline, Warehouse};
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::MemoryMonitor;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Columns kept when a full upload is rejected and retried with a minimal row shape.
const ESSENTIAL_COLUMNS: &[&str] = &[
    "age",
    "gender",
    "geo",
    "client_type",
    "session_weight",
    "study_number",
    "survey_date",
    "processed_date",
    "Group_type",
    "Group",
];

const DATE_COLUMNS: &[&str] = &["survey_date", "processed_date", "survey_dates"];

/// Upper bound on the buffer reserved up front for one ZIP entry.
const MAX_ENTRY_SIZE_HINT: u64 = 64 * 1024 * 1024;

/// Explicit column types for the response tables so appends never fight type inference.
pub fn response_schema(survey_type: SurveyType) -> Vec<SchemaField> {
    let mut columns: Vec<(&str, FieldType)> = vec![
        ("age", FieldType::String),
        ("gender", FieldType::String),
        ("geo", FieldType::String),
        ("client_type", FieldType::String),
        ("recorded_timestamp", FieldType::String),
        ("session_weight", FieldType::Float),
        ("survey_date", FieldType::String),
        ("processed_date", FieldType::String),
        ("q1_answer", FieldType::String),
        ("q2_answer", FieldType::String),
    ];
    match survey_type {
        SurveyType::BrandTracker => columns.push(("q3_answer", FieldType::String)),
        SurveyType::Custom => {
            columns.push(("q1_cleaned", FieldType::String));
            columns.push(("q2_cleaned", FieldType::String));
        }
    }
    columns.extend([
        ("study_number", FieldType::String),
        ("Group_type", FieldType::String),
        ("Group", FieldType::String),
    ]);

    columns
        .into_iter()
        .map(|(name, field_type)| SchemaField::new(name, field_type))
        .collect()
}

/// Pulls every CSV out of an in-memory ZIP. macOS resource-fork entries are ignored.
pub fn extract_csv_files(archive: &[u8]) -> Result<Vec<CsvExport>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut exports = Vec::new();

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        if entry.is_dir() {
            continue;
        }

        let path = entry.name().to_string();
        if !path.ends_with(".csv") || path.split('/').any(|part| part == "__MACOSX") {
            continue;
        }

        let name = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(path.as_str())
            .to_string();
        let mut bytes = Vec::with_capacity(entry_size_hint(entry.size()));
        entry.read_to_end(&mut bytes)?;
        exports.push(CsvExport { name, bytes });
    }

    if exports.is_empty() {
        return Err(EtlError::processing("No CSV files found in ZIP"));
    }
    Ok(exports)
}

/// The declared size comes from the archive itself, so it only ever sizes the first allocation.
fn entry_size_hint(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_ENTRY_SIZE_HINT)).unwrap_or(0)
}

/// Drops anything after the first whitespace in date columns ("2025-03-17 00:00:00" -> "2025-03-17").
fn normalize_dates(record: &Record) -> Record {
    let mut record = record.clone();
    for column in DATE_COLUMNS {
        if let Some(serde_json::Value::String(value)) = record.data.get_mut(*column) {
            if let Some(idx) = value.find(char::is_whitespace) {
                value.truncate(idx);
            }
        }
    }
    record
}

pub struct SurveyPipeline<W: Warehouse, C: ConfigProvider> {
    warehouse: W,
    config: C,
    monitor: MemoryMonitor,
}

impl<W: Warehouse, C: ConfigProvider> SurveyPipeline<W, C> {
    pub fn new(warehouse: W, config: C) -> Self {
        Self::new_with_monitoring(warehouse, config, false)
    }

    pub fn new_with_monitoring(warehouse: W, config: C, monitor_enabled: bool) -> Self {
        tracing::info!("🚀 Survey processor initialized");
        Self {
            warehouse,
            config,
            monitor: MemoryMonitor::new(monitor_enabled),
        }
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    fn dataset(&self, survey_type: SurveyType) -> &str {
        match survey_type {
            SurveyType::BrandTracker => self.config.brand_dataset(),
            SurveyType::Custom => self.config.custom_dataset(),
        }
    }

    /// Builds the response table and its question tables for one CSV export.
    pub fn transform(
        &self,
        table: &SurveyTable,
        survey_type: SurveyType,
        ctx: &ExportContext<'_>,
    ) -> Result<TransformResult> {
        let dataset = self.dataset(survey_type).to_string();
        let mut batches = Vec::new();

        let (responses, question_tables) = match survey_type {
            SurveyType::BrandTracker => {
                let responses = aggregate::brand_responses(table, ctx);
                let tables = aggregate::brand_question_tables(&responses);
                let rows = responses
                    .iter()
                    .map(Record::from_serialize)
                    .collect::<Result<Vec<_>>>()?;
                (rows, tables)
            }
            SurveyType::Custom => {
                let responses = aggregate::custom_responses(table, ctx);
                let tables = aggregate::custom_question_tables(&responses);
                let rows = responses
                    .iter()
                    .map(Record::from_serialize)
                    .collect::<Result<Vec<_>>>()?;
                (rows, tables)
            }
        };

        if responses.is_empty() {
            return Ok(TransformResult { batches });
        }

        batches.push(TableBatch {
            dataset: dataset.clone(),
            table: survey_type.responses_table(),
            rows: responses,
            schema: Some(response_schema(survey_type)),
        });

        for (table_name, counts) in question_tables {
            batches.push(TableBatch {
                dataset: dataset.clone(),
                table: table_name,
                rows: counts.iter().map(|c| c.to_record()).collect(),
                schema: None,
            });
        }

        Ok(TransformResult { batches })
    }

    /// Appends one batch; on rejection retries once with the essential columns only.
    pub async fn upload(&self, batch: &TableBatch) -> Result<usize> {
        if batch.rows.is_empty() {
            tracing::warn!("Empty batch for table {}", batch.table);
            return Ok(0);
        }

        let table_id = TableId::new(self.config.project_id(), &batch.dataset, batch.table);
        let rows: Vec<Record> = batch.rows.iter().map(normalize_dates).collect();

        tracing::info!("🔍 Uploading {} rows to {}", rows.len(), batch.table);
        let error = match self
            .warehouse
            .load_rows(&table_id, &rows, batch.schema.as_deref())
            .await
        {
            Ok(count) => {
                tracing::info!("✅ Successfully uploaded {} rows to {}", count, batch.table);
                return Ok(count);
            }
            Err(e) => e,
        };

        tracing::error!("❌ Failed to upload to {}: {}", batch.table, error);
        tracing::warn!(
            "🔄 Trying fallback upload with essential columns for {}",
            batch.table
        );

        let minimal: Vec<Record> = rows.iter().map(|r| r.project(ESSENTIAL_COLUMNS)).collect();
        if minimal.iter().any(|r| !r.data.is_empty()) {
            match self.warehouse.load_rows(&table_id, &minimal, None).await {
                Ok(count) => {
                    tracing::info!(
                        "✅ Fallback upload successful: {} rows to {}",
                        count,
                        batch.table
                    );
                    return Ok(count);
                }
                Err(fallback_error) => tracing::error!(
                    "❌ Fallback upload also failed for {}: {}",
                    batch.table,
                    fallback_error
                ),
            }
        }

        Err(error)
    }

    async fn process_csv(
        &self,
        export: &CsvExport,
        survey_type: SurveyType,
        dma: &str,
        dma_info: &DmaInfo,
        processed_date: &str,
        report: &mut ZipReport,
    ) -> Result<()> {
        let study_id = dma::extract_study_id(&export.name);
        let survey_date =
            dma::extract_survey_date(&export.name).unwrap_or_else(|| "Unknown".to_string());

        let table = SurveyTable::from_reader(export.bytes.as_slice())?;
        tracing::info!(
            "📊 Loaded CSV with {} rows, {:.1} MB",
            table.len(),
            export.bytes.len() as f64 / 1024.0 / 1024.0
        );

        let ctx = ExportContext {
            dma,
            dma_info,
            study_id: &study_id,
            survey_date: &survey_date,
            processed_date,
        };
        let result = self.transform(&table, survey_type, &ctx)?;

        let mut uploaded = Vec::with_capacity(result.batches.len());
        for batch in &result.batches {
            let count = self.upload(batch).await?;
            uploaded.push((batch.table, count));
        }

        for (table_name, count) in uploaded {
            report.record_upload(table_name, count);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<W: Warehouse, C: ConfigProvider> Pipeline for SurveyPipeline<W, C> {
    async fn process_archive(
        &self,
        archive: &[u8],
        archive_name: &str,
        survey_type: SurveyType,
    ) -> Result<ZipReport> {
        let start_memory = self.monitor.log_usage("Starting memory usage");
        tracing::info!(
            "🔄 Processing {} ZIP with individual CSV tracking: {}",
            survey_type,
            archive_name
        );

        let (dma, dma_info) = dma::resolve_dma(archive_name);
        let exports = extract_csv_files(archive)?;
        tracing::info!("📄 Found {} CSV files in ZIP", exports.len());

        let tracker = SurveyTracker::new(&self.warehouse, &self.config);
        let processed_date = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
        let mut report = ZipReport::default();

        for export in &exports {
            tracing::info!("🔍 Checking CSV: {}", export.name);

            if tracker.is_processed(&export.name, survey_type).await {
                tracing::info!("⏭️  Already processed: {}", export.name);
                report.csv_files_skipped.push(export.name.clone());
                continue;
            }

            tracing::info!("🔄 Processing CSV: {}", export.name);
            // Records are only counted once every table for the CSV is in.
            let mut csv_report = ZipReport::default();
            match self
                .process_csv(
                    export,
                    survey_type,
                    &dma,
                    &dma_info,
                    &processed_date,
                    &mut csv_report,
                )
                .await
            {
                Ok(()) => {
                    tracker.mark_processed(&export.name, survey_type).await;
                    for table in &csv_report.tables_updated {
                        report.record_upload(table, csv_report.records_added[table]);
                    }
                    report.csv_files_processed.push(export.name.clone());
                    tracing::info!("✅ Successfully processed CSV: {}", export.name);
                    self.monitor.log_usage("Memory after CSV");
                }
                Err(e) => {
                    tracing::error!("❌ Error processing CSV {}: {}", export.name, e);
                }
            }
        }

        self.monitor.log_change(start_memory);
        Ok(report)
    }
}
