use clap::Parser;
use survey_etl::utils::logger;
use survey_etl::SlackNotifier;

#[derive(Parser)]
#[command(name = "notify-test")]
#[command(about = "Sends a test message to the configured Slack webhook")]
struct Args {
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    webhook_url: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let notifier = SlackNotifier::new(args.webhook_url);
    if notifier.test_notification().await {
        println!("✅ Slack test notification sent");
    } else {
        eprintln!("❌ Slack test notification failed (is SLACK_WEBHOOK_URL set?)");
        std::process::exit(1);
    }
}
