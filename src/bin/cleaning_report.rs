use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use survey_etl::core::cleaner;
use survey_etl::domain::model::SurveyTable;
use survey_etl::utils::logger;

#[derive(Parser)]
#[command(name = "cleaning-report")]
#[command(about = "Shows how open-ended brand answers in a custom survey CSV are cleaned")]
struct Args {
    /// Custom survey CSV export
    csv: PathBuf,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let file = File::open(&args.csv)?;
    let table = SurveyTable::from_reader(file)?;
    tracing::info!("📊 Loaded {} rows from {}", table.len(), args.csv.display());

    if cleaner::find_open_ended_columns(&table).is_none() {
        eprintln!("❌ No open-ended brand questions found in {}", args.csv.display());
        std::process::exit(2);
    }

    println!("{}", cleaner::cleaning_report(&table));
    Ok(())
}
