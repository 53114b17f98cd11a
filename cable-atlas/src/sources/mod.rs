//! Adaptateurs de sources (fichiers GeoJSON, services WFS)

pub mod file;
pub mod wfs;

pub use file::{FileContent, FileSource};
pub use wfs::{parse_layer_names, RetryPolicy, WfsClient};

use harmonize::{HarmonizeError, SourceDataset};
use reqwest::Client;

use crate::config::{InputConfig, SourceConfig};

/// Source récupérée, avec sa provenance
#[derive(Debug, Clone)]
pub struct Fetched {
    pub dataset: SourceDataset,

    /// Checksum blake3 (fichiers locaux uniquement)
    pub checksum: Option<String>,

    /// Chemin ou URL d'origine
    pub origin: String,
}

/// Récupère une source selon sa configuration
///
/// La lecture de fichier est déportée sur le pool bloquant de tokio.
pub async fn fetch(
    source: &SourceConfig,
    client: &Client,
    retry: RetryPolicy,
) -> Result<Fetched, HarmonizeError> {
    match &source.input {
        InputConfig::File { path } => {
            let file = FileSource::new(path);
            let name = source.name.clone();
            let origin = path.display().to_string();

            let content = tokio::task::spawn_blocking(move || file.read(&name))
                .await
                .map_err(|e| HarmonizeError::unavailable(&source.name, format!("read task failed: {}", e)))??;

            Ok(Fetched {
                dataset: content.dataset,
                checksum: Some(content.checksum),
                origin,
            })
        }
        InputConfig::Wfs { url, layer, filter } => {
            let wfs = WfsClient::new(client.clone(), url, retry);
            let dataset = wfs.fetch_layer(&source.name, layer, filter.as_deref()).await?;
            Ok(Fetched {
                dataset,
                checksum: None,
                origin: format!("{}#{}", url, layer),
            })
        }
    }
}
