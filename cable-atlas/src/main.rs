//! Point d'entrée CLI pour cable-atlas

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Construire des couches harmonisées de câbles sous-marins et de ZEE
#[derive(Parser)]
#[command(name = "cable-atlas")]
#[command(author, version)]
#[command(about = "Build harmonized submarine cable and EEZ layers from national GeoJSON and WFS sources")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run {
            config,
            output,
            jobs,
            report,
        } => {
            info!(config = %config, output = ?output, jobs = ?jobs, "Run");
            cli::cmd_run(&config, output, jobs, report.as_deref()).await?;
        }
        Commands::Layers { url } => {
            info!(url = %url, "List WFS layers");
            cli::cmd_layers(&url).await?;
        }
        Commands::Presets => cli::cmd_presets()?,
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
