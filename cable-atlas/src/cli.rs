//! Définition et implémentation des commandes CLI
//!
//! - `run`: récupération des sources, harmonisation et export GeoJSON
//! - `layers`: liste des couches d'un service WFS
//! - `presets`: liste des configurations embarquées

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use reqwest::Client;
use tracing::info;

use cable_atlas::config::{Config, PRESETS};
use cable_atlas::sources::{RetryPolicy, WfsClient};
use cable_atlas::{RunOptions, RunStatus};

#[derive(Subcommand)]
pub enum Commands {
    /// Build the harmonized layers described by a configuration
    Run {
        /// Config preset name (north-sea-cables/north-sea-eez) or path to a JSON config
        #[arg(short, long, default_value = "north-sea-cables")]
        config: String,

        /// Output directory (overrides `output.dir`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum number of sources fetched concurrently
        #[arg(long, alias = "threads")]
        jobs: Option<usize>,

        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List the feature types advertised by a WFS endpoint
    Layers {
        /// WFS base URL
        #[arg(short, long)]
        url: String,
    },

    /// List the embedded configuration presets
    Presets,
}

/// Exécute la commande run
pub async fn cmd_run(
    config_spec: &str,
    output: Option<PathBuf>,
    jobs: Option<usize>,
    report_path: Option<&Path>,
) -> Result<()> {
    let config = Config::resolve(config_spec)?;

    println!("=== Run {} ===", config.name);
    println!("Config: {}", config_spec);
    println!("Pipeline: {}", config.pipeline_name());
    println!("Working CRS: {}", config.working_crs);
    let exports: Vec<String> = config.export_crs.iter().map(|c| c.to_string()).collect();
    println!("Export CRS: {}", exports.join(", "));
    if let Some(dir) = &output {
        println!("Output: {}", dir.display());
    }

    let options = RunOptions {
        jobs,
        output_dir: output,
    };
    let report = cable_atlas::run(&config, &options).await?;

    report.display();

    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .context(format!("Failed to write report: {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    println!("{}", report.summary());

    if report.status == RunStatus::Failed {
        anyhow::bail!("Run failed: no source could be harmonized");
    }

    Ok(())
}

/// Exécute la commande layers
pub async fn cmd_layers(url: &str) -> Result<()> {
    let retry = RetryPolicy::from(&cable_atlas::config::RetryConfig::default());
    let client = Client::builder()
        .timeout(retry.timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let wfs = WfsClient::new(client, url, retry);
    let layers = wfs.list_layers().await?;

    println!("{} layer(s) at {}", layers.len(), wfs.base_url());
    for layer in &layers {
        println!("  {}", layer);
    }

    Ok(())
}

/// Exécute la commande presets
pub fn cmd_presets() -> Result<()> {
    for name in PRESETS {
        let config = Config::from_preset(name)?;
        let exports: Vec<String> = config.export_crs.iter().map(|c| c.to_string()).collect();
        println!(
            "  {:<20} {:<11} -> {}",
            name,
            config.pipeline_name(),
            exports.join(", ")
        );
    }
    Ok(())
}
