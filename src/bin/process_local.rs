use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use survey_etl::core::ConfigProvider;
use survey_etl::utils::{logger, validation::{validate_identifier, Validate}};
use survey_etl::{EtlEngine, LocalStorage, LocalWarehouse, ProcessOutcome, SurveyPipeline};

#[derive(Debug, Clone, Parser)]
#[command(name = "process-local")]
#[command(about = "Runs a survey export ZIP through the pipeline into local CSV tables")]
struct Args {
    /// ZIP archive to process
    zip: PathBuf,

    /// Directory receiving one CSV per warehouse table
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,

    #[arg(long, default_value = "local")]
    project_id: String,

    #[arg(long, default_value = "new_brand_survey")]
    brand_dataset: String,

    #[arg(long, default_value = "new_custom_brand_survey")]
    custom_dataset: String,

    /// Log resident memory around each CSV
    #[arg(long)]
    monitor: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl ConfigProvider for Args {
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
        Duration::ZERO
    }
}

impl Validate for Args {
    fn validate(&self) -> survey_etl::Result<()> {
        validate_identifier("brand_dataset", &self.brand_dataset)?;
        validate_identifier("custom_dataset", &self.custom_dataset)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if let Err(e) = args.validate() {
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let name = args
        .zip
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("not a file path: {}", args.zip.display()))?
        .to_string();
    let parent = args
        .zip
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    tracing::info!("🚀 Processing {} into {}", args.zip.display(), args.output.display());

    let storage = LocalStorage::new(parent);
    let warehouse = LocalWarehouse::new(args.output.clone());
    let monitor = args.monitor;
    let pipeline = SurveyPipeline::new_with_monitoring(warehouse, args, monitor);
    let engine = EtlEngine::new(storage, pipeline);

    let outcome = engine.process_uploaded_file(".", &name).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if let ProcessOutcome::Error { reason } = outcome {
        eprintln!("❌ {}", reason);
        std::process::exit(1);
    }
    Ok(())
}
