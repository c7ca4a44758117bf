use anyhow::Result;
use clap::Parser;
use tenderbrief::analysis;
use tenderbrief::{config, logging};

#[derive(Parser)]
#[command(
    name = "tenderbrief",
    about = "Extract and summarize procurement tender documentation"
)]
struct Cli {
    /// Documents to analyze as one tender submission.
    #[arg(required = true, value_name = "FILE")]
    files: Vec<String>,
    /// Print the aggregate result as JSON.
    #[arg(long)]
    json: bool,
    /// Print pipeline counters to stderr after the run.
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let analyzer = analysis::analyzer_for_backend().await?;
    let result = analyzer.analyze(&cli.files).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        match &result.summary {
            Some(summary) => println!("{summary}"),
            None => println!("No summary could be produced."),
        }
        if !result.file_errors.is_empty() {
            eprintln!("Failed files:");
            for path in &result.file_errors {
                eprintln!("  - {path}");
            }
        }
    }

    if cli.metrics {
        let snapshot = analyzer.metrics_snapshot();
        eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    Ok(())
}
