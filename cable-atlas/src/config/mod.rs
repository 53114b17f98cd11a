//! Configuration d'un run
//!
//! Un run est décrit par un document JSON: CRS de travail et de publication,
//! sortie, politique de retry, service de limites, puis soit la liste des
//! sources de câbles, soit la liste des régions de limites.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use harmonize::{ColumnMapping, Crs, LengthUnit, RecodeRule, Status, UnknownStatusPolicy};
use serde::{Deserialize, Serialize};

/// Presets embarqués
pub const PRESETS: &[&str] = &["north-sea-cables", "north-sea-eez"];

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Nom du run (rapport, logs)
    pub name: String,

    /// CRS dans lequel toutes les sources sont conditionnées et fusionnées
    #[serde(default = "default_working_crs")]
    pub working_crs: Crs,

    /// CRS de publication (le premier est le CRS principal)
    pub export_crs: Vec<Crs>,

    pub output: OutputConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Service de recherche des polygones de limite
    #[serde(default)]
    pub boundary_service: Option<BoundaryServiceConfig>,

    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

/// Sortie des fichiers GeoJSON: `<dir>/<basename>_<epsg>.geojson`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub basename: String,
}

/// Politique de retry des requêtes distantes
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Nombre total de tentatives (1 = pas de retry)
    pub attempts: u32,

    /// Délai initial entre deux tentatives, doublé à chaque échec
    pub backoff_ms: u64,

    /// Timeout par requête
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 500,
            timeout_secs: 60,
        }
    }
}

impl RetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Service de limites (gazetteer)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BoundaryServiceConfig {
    /// Fichier GeoJSON local, une feature par région
    File {
        path: PathBuf,
        #[serde(default = "default_id_field")]
        id_property: String,
        #[serde(default = "default_name_field")]
        name_property: String,
    },
    /// Couche WFS filtrée par identifiant
    Wfs {
        url: String,
        layer: String,
        #[serde(default = "default_id_field")]
        id_field: String,
        #[serde(default = "default_name_field")]
        name_field: String,
    },
}

/// Type de pipeline et paramètres associés
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "pipeline", rename_all = "lowercase")]
pub enum PipelineConfig {
    Cables(CablesConfig),
    Boundaries(BoundariesConfig),
}

/// Pipeline câbles
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CablesConfig {
    /// Sources, dans l'ordre de fusion
    pub sources: Vec<SourceConfig>,

    /// Statuts retirés de la couche finale
    #[serde(default = "default_excluded")]
    pub excluded_statuses: Vec<Status>,

    #[serde(default)]
    pub length_unit: LengthUnit,

    #[serde(default)]
    pub unknown_status: UnknownStatusPolicy,

    /// Synonymes de statut communs à toutes les sources (valeur -> statut)
    #[serde(default)]
    pub status_synonyms: BTreeMap<String, String>,
}

/// Pipeline limites (ZEE, pays)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoundariesConfig {
    pub regions: Vec<RegionConfig>,
}

/// Région à récupérer dans le gazetteer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegionConfig {
    pub mrgid: u32,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub border_flag: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Description déclarative d'une source de câbles
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Nom unique de la source
    pub name: String,

    pub input: InputConfig,

    /// CRS à assigner si la source n'en déclare aucun
    #[serde(default)]
    pub assume_crs: Option<Crs>,

    /// Champ canonique -> colonne source
    #[serde(default)]
    pub columns: BTreeMap<String, String>,

    /// Champ canonique -> valeur fixe
    #[serde(default)]
    pub constants: BTreeMap<String, String>,

    /// Champ canonique -> {valeur source -> valeur canonique}
    #[serde(default)]
    pub recode: BTreeMap<String, BTreeMap<String, String>>,

    /// Région (MRGID) dont l'intérieur est retiré des géométries
    #[serde(default)]
    pub clip_region: Option<u32>,
}

impl SourceConfig {
    pub fn mapping(&self) -> ColumnMapping {
        ColumnMapping {
            columns: self.columns.clone(),
            constants: self.constants.clone(),
        }
    }

    pub fn recode_rules(&self) -> Vec<RecodeRule> {
        RecodeRule::from_table(&self.recode)
    }
}

/// Origine des données d'une source
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputConfig {
    File {
        path: PathBuf,
    },
    Wfs {
        url: String,
        layer: String,
        /// Filtre CQL optionnel
        #[serde(default)]
        filter: Option<String>,
    },
}

fn default_working_crs() -> Crs {
    Crs::WGS84
}

fn default_id_field() -> String {
    "mrgid".to_string()
}

fn default_name_field() -> String {
    "geoname".to_string()
}

fn default_excluded() -> Vec<Status> {
    Status::DEFAULT_EXCLUDED.to_vec()
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .context(format!("Failed to parse config JSON: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "north-sea-cables" => Self::load_embedded(include_str!("presets/north-sea-cables.json")),
            "north-sea-eez" => Self::load_embedded(include_str!("presets/north-sea-eez.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: {}", preset, PRESETS.join(", ")),
        }
    }

    /// Nom de preset ou chemin vers un fichier JSON
    pub fn resolve(spec: &str) -> Result<Self> {
        if PRESETS.contains(&spec) {
            Self::from_preset(spec)
        } else {
            Self::load(Path::new(spec))
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse embedded config")?;
        config.validate()?;
        Ok(config)
    }

    /// Vérifie la cohérence de la configuration
    pub fn validate(&self) -> Result<()> {
        if self.export_crs.is_empty() {
            anyhow::bail!("Config '{}': at least one export CRS is required", self.name);
        }
        if self.retry.attempts == 0 {
            anyhow::bail!("Config '{}': retry.attempts must be at least 1", self.name);
        }
        if self.output.basename.trim().is_empty() {
            anyhow::bail!("Config '{}': output.basename is empty", self.name);
        }

        match &self.pipeline {
            PipelineConfig::Cables(cables) => {
                // Les longueurs sont mesurées en WGS84
                if self.working_crs != Crs::WGS84 && !harmonize::reproject::is_available() {
                    anyhow::bail!(
                        "Config '{}': working CRS {} requires the 'reproject' feature to measure lengths",
                        self.name,
                        self.working_crs
                    );
                }
                if cables.sources.is_empty() {
                    anyhow::bail!("Config '{}': no sources configured", self.name);
                }

                let mut names = BTreeSet::new();
                for source in &cables.sources {
                    if !names.insert(source.name.as_str()) {
                        anyhow::bail!("Config '{}': duplicate source name '{}'", self.name, source.name);
                    }
                    if source.clip_region.is_some() && self.boundary_service.is_none() {
                        anyhow::bail!(
                            "Config '{}': source '{}' has a clip_region but no boundary_service is configured",
                            self.name,
                            source.name
                        );
                    }
                }

                for (value, status) in &cables.status_synonyms {
                    if status.parse::<Status>().is_err() {
                        anyhow::bail!(
                            "Config '{}': status synonym '{}' maps to unknown status '{}'",
                            self.name,
                            value,
                            status
                        );
                    }
                }
            }
            PipelineConfig::Boundaries(boundaries) => {
                if boundaries.regions.is_empty() {
                    anyhow::bail!("Config '{}': no regions configured", self.name);
                }
                if self.boundary_service.is_none() {
                    anyhow::bail!("Config '{}': boundaries pipeline requires a boundary_service", self.name);
                }
            }
        }

        Ok(())
    }

    /// CRS de publication principal
    pub fn primary_crs(&self) -> Crs {
        self.export_crs.first().copied().unwrap_or(self.working_crs)
    }

    pub fn pipeline_name(&self) -> &'static str {
        match self.pipeline {
            PipelineConfig::Cables(_) => "cables",
            PipelineConfig::Boundaries(_) => "boundaries",
        }
    }
}

impl CablesConfig {
    /// Synonymes sous forme de règles de recodage sur le champ statut
    pub fn synonym_rules(&self, status_field: &str) -> Vec<RecodeRule> {
        self.status_synonyms
            .iter()
            .map(|(from, to)| RecodeRule::new(status_field, from, to))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_load() {
        for preset in PRESETS {
            let config = Config::from_preset(preset).unwrap();
            assert!(!config.export_crs.is_empty(), "{preset}");
        }
    }

    #[test]
    fn test_cables_preset() {
        let config = Config::from_preset("north-sea-cables").unwrap();
        assert_eq!(config.pipeline_name(), "cables");
        assert_eq!(config.primary_crs(), Crs::WGS84);

        let PipelineConfig::Cables(cables) = &config.pipeline else {
            panic!("Expected cables pipeline");
        };
        let nl = cables.sources.iter().find(|s| s.name == "nl").unwrap();
        assert_eq!(nl.columns.get("status").map(String::as_str), Some("version"));
        assert!(nl
            .recode_rules()
            .contains(&RecodeRule::new("status", "Toekomstig", "Planned")));
        assert_eq!(
            cables.excluded_statuses,
            vec![Status::OutOfUse, Status::Unknown, Status::UnderConstruction]
        );
    }

    #[test]
    fn test_unknown_preset() {
        assert!(Config::from_preset("baltic").is_err());
    }

    fn minimal(extra: &str) -> String {
        format!(
            r#"{{
                "name": "test",
                "export_crs": ["EPSG:4326"],
                "output": {{"dir": "out", "basename": "cables"}},
                "pipeline": "cables",
                "sources": [
                    {{"name": "a", "input": {{"type": "file", "path": "a.geojson"}}}}
                    {extra}
                ]
            }}"#
        )
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str(&minimal("")).unwrap();
        config.validate().unwrap();

        assert_eq!(config.working_crs, Crs::WGS84);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.backoff_ms, 500);
        let PipelineConfig::Cables(cables) = &config.pipeline else {
            panic!("Expected cables pipeline");
        };
        assert_eq!(cables.length_unit, LengthUnit::Kilometers);
        assert_eq!(cables.unknown_status, UnknownStatusPolicy::Passthrough);
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let json = minimal(r#", {"name": "a", "input": {"type": "file", "path": "b.geojson"}}"#);
        let config: Config = serde_json::from_str(&json).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate source name 'a'"));
    }

    #[test]
    fn test_wfs_input() {
        let json = minimal(
            r#", {"name": "b", "input": {"type": "wfs", "url": "http://localhost/wfs", "layer": "cables", "filter": "status='InUse'"}}"#,
        );
        let config: Config = serde_json::from_str(&json).unwrap();
        let PipelineConfig::Cables(cables) = &config.pipeline else {
            panic!("Expected cables pipeline");
        };
        match &cables.sources[1].input {
            InputConfig::Wfs { layer, filter, .. } => {
                assert_eq!(layer, "cables");
                assert_eq!(filter.as_deref(), Some("status='InUse'"));
            }
            other => panic!("Unexpected input {other:?}"),
        }
    }

    #[test]
    fn test_clip_region_requires_boundary_service() {
        let json = minimal(
            r#", {"name": "fr", "input": {"type": "file", "path": "fr.geojson"}, "clip_region": 17}"#,
        );
        let config: Config = serde_json::from_str(&json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_status_label_rejected() {
        let json = minimal("").replace(
            r#""pipeline": "cables","#,
            r#""pipeline": "cables", "excluded_statuses": ["Retired"],"#,
        );
        assert!(serde_json::from_str::<Config>(&json).is_err());
    }
}
