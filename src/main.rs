use std::sync::Arc;
use survey_etl::config::LogFormat;
use survey_etl::core::ConfigProvider;
use survey_etl::server::{self, AppState};
use survey_etl::utils::{logger, validation::Validate};
use survey_etl::{
    BigQueryClient, EtlEngine, EtlError, GcsStorage, ServiceConfig, SlackNotifier, SurveyPipeline,
    TokenProvider,
};

fn main() {
    let config = match ServiceConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code().max(1));
        }
    };

    match config.log_format {
        LogFormat::Json => logger::init_service_logger(config.verbose),
        LogFormat::Compact => logger::init_cli_logger(config.verbose),
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("❌ Failed to start async runtime: {}", e);
            std::process::exit(3);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        tracing::error!(
            "❌ Service stopped: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code().max(1));
    }
}

async fn run(config: ServiceConfig) -> Result<(), EtlError> {
    tracing::info!("Starting survey-etl on {}", config.bind_address());

    let http = reqwest::Client::new();
    let auth = Arc::new(TokenProvider::from_settings(
        http.clone(),
        config.access_token.as_deref(),
        &config.metadata_endpoint,
    ));

    let storage = GcsStorage::new(http.clone(), config.storage_endpoint.clone(), Arc::clone(&auth));
    let warehouse = BigQueryClient::new(
        http,
        config.bigquery_endpoint.clone(),
        config.project_id.clone(),
        auth,
    );

    if config.memory_monitor {
        tracing::info!("🔍 Memory monitoring enabled");
    }

    let dedup_window = config.dedup_window();
    let notifier = SlackNotifier::new(config.slack_webhook_url.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    let monitor_enabled = config.memory_monitor;
    let pipeline = SurveyPipeline::new_with_monitoring(warehouse, config, monitor_enabled);
    let engine = EtlEngine::with_notifier(storage, pipeline, notifier);

    let app = server::router(AppState::new(engine, dedup_window));

    tracing::info!("🚀 Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}
