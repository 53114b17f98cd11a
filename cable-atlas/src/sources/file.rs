//! Lecture de sources GeoJSON locales

use std::path::PathBuf;

use harmonize::{HarmonizeError, SourceDataset};
use tracing::debug;

/// Fichier GeoJSON local
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
}

/// Contenu d'une source locale, avec son empreinte
#[derive(Debug, Clone)]
pub struct FileContent {
    pub dataset: SourceDataset,

    /// Checksum blake3 du fichier (hex)
    pub checksum: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Lit et parse le fichier
    ///
    /// Un fichier absent ou illisible est une source indisponible.
    pub fn read(&self, name: &str) -> Result<FileContent, HarmonizeError> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            HarmonizeError::unavailable(name, format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let checksum = blake3::hash(&bytes).to_hex().to_string();

        let content = std::str::from_utf8(&bytes).map_err(|e| {
            HarmonizeError::unavailable(name, format!("{} is not valid UTF-8: {}", self.path.display(), e))
        })?;
        let dataset = SourceDataset::parse_geojson(name, content)?;

        debug!(
            source = name,
            path = %self.path.display(),
            records = dataset.len(),
            checksum = %&checksum[..12],
            "File source read"
        );

        Ok(FileContent { dataset, checksum })
    }
}
