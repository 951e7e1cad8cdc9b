use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use diridon::config::AppConfig;
use diridon::report;

/// Parcel and zoning equity analysis for downtown San Jose.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration (input paths, grouping key, outputs).
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_from_file(&cli.config)?;

    let pipeline_report = diridon::run_pipeline(&config)?;
    print!("{}", report::render_table(&pipeline_report));

    let written = report::write_reports(&pipeline_report, &config)?;
    for path in written {
        println!("wrote {}", path.display());
    }

    Ok(())
}
