use crate::adapters::slack::SlackNotifier;
use crate::domain::model::{ProcessOutcome, SurveyType};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::EtlError;
use std::time::Instant;

/// Handles one uploaded object end to end: filter, download, pipeline, notify.
pub struct EtlEngine<S: Storage, P: Pipeline> {
    storage: S,
    pipeline: P,
    notifier: SlackNotifier,
}

impl<S: Storage, P: Pipeline> EtlEngine<S, P> {
    pub fn new(storage: S, pipeline: P) -> Self {
        Self::with_notifier(storage, pipeline, SlackNotifier::disabled())
    }

    pub fn with_notifier(storage: S, pipeline: P, notifier: SlackNotifier) -> Self {
        Self {
            storage,
            pipeline,
            notifier,
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn process_uploaded_file(&self, bucket: &str, name: &str) -> ProcessOutcome {
        tracing::info!("🔥 Processing upload: {}/{}", bucket, name);
        let started = Instant::now();

        if !name.ends_with(".zip") {
            tracing::info!("⏭️  Skipping non-ZIP file: {}", name);
            let outcome = ProcessOutcome::skipped("not_zip_file");
            self.notifier.send_skipped(name, "not_zip_file", None).await;
            return outcome;
        }

        let survey_type = SurveyType::from_archive_name(name);
        tracing::info!("🏷️  Detected survey type: {} for file: {}", survey_type, name);

        let outcome = self.run(bucket, name, survey_type).await;
        let elapsed = Some(started.elapsed().as_secs_f64());

        match &outcome {
            ProcessOutcome::Success { report, .. } => {
                tracing::info!("✅ Successfully processed: {}", name);
                tracing::info!("📊 CSV files processed: {:?}", report.csv_files_processed);
                tracing::info!("📊 CSV files skipped: {:?}", report.csv_files_skipped);
                tracing::info!("📊 Tables updated: {}", report.tables_updated.join(", "));
                self.notifier
                    .send_success(name, survey_type, report, elapsed)
                    .await;
            }
            ProcessOutcome::Skipped { reason } => {
                self.notifier
                    .send_skipped(name, reason, Some(survey_type))
                    .await;
            }
            ProcessOutcome::Error { reason } => {
                self.notifier
                    .send_failure(name, reason, Some(survey_type), elapsed)
                    .await;
            }
        }

        outcome
    }

    async fn run(&self, bucket: &str, name: &str, survey_type: SurveyType) -> ProcessOutcome {
        tracing::info!("📥 Downloading {}...", name);
        let archive = match self.storage.fetch_object(bucket, name).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::error!("❌ File not found: {}/{}", bucket, name);
                return ProcessOutcome::error("file_not_found");
            }
            Err(e) => {
                tracing::error!("❌ Unexpected error processing {}: {}", name, e);
                return ProcessOutcome::error(format!("unexpected_error: {}", e));
            }
        };

        tracing::info!("🔄 Processing survey data...");
        match self
            .pipeline
            .process_archive(&archive, name, survey_type)
            .await
        {
            Ok(report) => ProcessOutcome::Success {
                survey_type,
                report,
            },
            Err(e) => {
                let reason = match e {
                    EtlError::ProcessingError { message } => message,
                    other => other.to_string(),
                };
                tracing::error!("❌ Processing failed: {}", reason);
                ProcessOutcome::error(reason)
            }
        }
    }
}
