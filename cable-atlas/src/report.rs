//! Rapport de run avec dégradation gracieuse
//!
//! Une source indisponible ou invalide est signalée et écartée; le run
//! continue avec les autres sources.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use harmonize::types::ConditionStats;
use harmonize::{CanonicalDataset, Crs, FinalizeOutcome, HarmonizeError, MergedCollection};
use serde::Serialize;

/// Statut global du run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Toutes les sources traitées
    Success,
    /// Au moins une source écartée
    PartialSuccess,
    /// Aucune source exploitable
    Failed,
}

/// Résultat du traitement d'une source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceOutcome {
    Ok,
    /// Source inaccessible (réseau, fichier absent, région introuvable)
    Unavailable,
    /// Source rejetée (schéma, CRS, géométrie, reprojection)
    Failed,
}

/// Rapport d'une source
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub outcome: SourceOutcome,

    /// Chemin ou URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Checksum blake3 du fichier source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Enregistrements lus
    pub records_read: usize,

    /// Enregistrements conservés après conditionnement
    pub records_kept: usize,

    pub stats: ConditionStats,

    /// Catégorie d'erreur (`schema`, `crs`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Fichier produit
#[derive(Debug, Clone, Serialize)]
pub struct OutputReport {
    pub crs: Crs,
    pub path: PathBuf,
    pub records: usize,
}

/// Rapport complet du run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Nom de la configuration
    pub name: String,
    /// Type de pipeline (`cables`, `boundaries`)
    pub pipeline: String,
    pub duration_secs: f64,
    pub status: RunStatus,

    pub sources: Vec<SourceReport>,

    /// Enregistrements finaux par pays
    pub by_country: BTreeMap<String, usize>,
    /// Enregistrements exclus par statut
    pub excluded: BTreeMap<String, usize>,
    /// Valeurs de statut hors vocabulaire
    pub unrecognized_statuses: BTreeMap<String, usize>,
    /// Enregistrements rejetés pour statut inconnu
    pub rejected: usize,
    /// Enregistrements dans la couche finale
    pub total_records: usize,

    pub outputs: Vec<OutputReport>,
}

impl RunReport {
    pub fn new(name: &str, pipeline: &str) -> Self {
        Self {
            name: name.to_string(),
            pipeline: pipeline.to_string(),
            duration_secs: 0.0,
            status: RunStatus::Success,
            sources: Vec::new(),
            by_country: BTreeMap::new(),
            excluded: BTreeMap::new(),
            unrecognized_statuses: BTreeMap::new(),
            rejected: 0,
            total_records: 0,
            outputs: Vec::new(),
        }
    }

    /// Enregistre une source conditionnée avec succès
    pub fn record_source_ok(
        &mut self,
        records_read: usize,
        origin: Option<String>,
        checksum: Option<String>,
        dataset: &CanonicalDataset,
    ) {
        self.sources.push(SourceReport {
            name: dataset.source.clone(),
            outcome: SourceOutcome::Ok,
            origin,
            checksum,
            records_read,
            records_kept: dataset.records.len(),
            stats: dataset.stats,
            error_kind: None,
            message: None,
        });
    }

    /// Enregistre une source écartée
    pub fn record_source_error(&mut self, name: &str, origin: Option<String>, error: &HarmonizeError) {
        let outcome = if error.is_unavailable() {
            SourceOutcome::Unavailable
        } else {
            SourceOutcome::Failed
        };
        self.sources.push(SourceReport {
            name: name.to_string(),
            outcome,
            origin,
            checksum: None,
            records_read: 0,
            records_kept: 0,
            stats: ConditionStats::default(),
            error_kind: Some(error.kind().to_string()),
            message: Some(error.to_string()),
        });
    }

    /// Enregistre les comptages de l'étape de finalisation
    pub fn record_finalize(&mut self, outcome: &FinalizeOutcome, country_field: &str) {
        self.excluded = outcome
            .excluded
            .iter()
            .map(|(status, count)| (status.to_string(), *count))
            .collect();
        self.unrecognized_statuses = outcome.unrecognized.clone();
        self.rejected = outcome.rejected;
        self.record_collection(&outcome.collection, country_field);
    }

    /// Enregistre la composition de la couche finale
    pub fn record_collection(&mut self, collection: &MergedCollection, country_field: &str) {
        self.total_records = collection.len();
        self.by_country = collection.count_by(country_field);
    }

    pub fn record_output(&mut self, crs: Crs, path: &Path, records: usize) {
        self.outputs.push(OutputReport {
            crs,
            path: path.to_path_buf(),
            records,
        });
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Nombre de sources traitées avec succès
    pub fn sources_ok(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.outcome == SourceOutcome::Ok)
            .count()
    }

    /// Nombre de sources écartées
    pub fn sources_failed(&self) -> usize {
        self.sources.len() - self.sources_ok()
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        let ok = self.sources_ok();
        let failed = self.sources_failed();

        self.status = if ok == 0 {
            RunStatus::Failed
        } else if failed > 0 {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("RUN REPORT - {} ({})", self.name, self.pipeline);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SOURCES ---");
        for s in &self.sources {
            match s.outcome {
                SourceOutcome::Ok => println!(
                    "  {}: {} read, {} kept ({} flattened, {} clipped, {} dropped)",
                    s.name,
                    s.records_read,
                    s.records_kept,
                    s.stats.flattened,
                    s.stats.clipped,
                    s.stats.dropped_empty + s.stats.dropped_null
                ),
                outcome => println!(
                    "  {}: {:?} [{}] {}",
                    s.name,
                    outcome,
                    s.error_kind.as_deref().unwrap_or("-"),
                    s.message.as_deref().unwrap_or_default()
                ),
            }
        }

        println!("\n--- RESULT ---");
        println!("Records: {}", self.total_records);
        if !self.by_country.is_empty() {
            let countries: Vec<String> = self
                .by_country
                .iter()
                .map(|(country, count)| format!("{}={}", country, count))
                .collect();
            println!("By country: {}", countries.join(", "));
        }
        if !self.excluded.is_empty() {
            let excluded: Vec<String> = self
                .excluded
                .iter()
                .map(|(status, count)| format!("{}={}", status, count))
                .collect();
            println!("Excluded: {}", excluded.join(", "));
        }

        if !self.unrecognized_statuses.is_empty() {
            println!(
                "\n--- UNRECOGNIZED STATUSES ({}) ---",
                self.unrecognized_statuses.len()
            );
            for (value, count) in self.unrecognized_statuses.iter().take(10) {
                println!("  '{}': {}", value, count);
            }
            if self.unrecognized_statuses.len() > 10 {
                println!("  ... and {} more", self.unrecognized_statuses.len() - 10);
            }
            if self.rejected > 0 {
                println!("  {} record(s) rejected", self.rejected);
            }
        }

        if !self.outputs.is_empty() {
            println!("\n--- OUTPUTS ---");
            for o in &self.outputs {
                println!("  {} -> {} ({} records)", o.crs, o.path.display(), o.records);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} records from {}/{} sources, {} outputs",
            self.name,
            self.total_records,
            self.sources_ok(),
            self.sources.len(),
            self.outputs.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(name: &str, records: usize) -> CanonicalDataset {
        let schema = harmonize::Schema::cables();
        CanonicalDataset {
            source: name.to_string(),
            columns: schema.fields.clone(),
            crs: Crs::WGS84,
            records: (0..records)
                .map(|_| harmonize::CanonicalRecord {
                    source: name.to_string(),
                    attributes: schema.empty_attributes(),
                    geometry: geo::Geometry::Point(geo::Point::new(0.0, 0.0)),
                    length: None,
                })
                .collect(),
            stats: ConditionStats {
                flattened: records,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_run_report_default() {
        let report = RunReport::new("north-sea", "cables");
        assert_eq!(report.status, RunStatus::Success);
        assert!(report.sources.is_empty());
        assert_eq!(report.total_records, 0);
    }

    #[test]
    fn test_finalize_success() {
        let mut report = RunReport::new("north-sea", "cables");
        report.record_source_ok(3, None, None, &dataset("nl", 3));
        report.finalize();
        assert_eq!(report.status, RunStatus::Success);
    }

    #[test]
    fn test_finalize_partial_success() {
        let mut report = RunReport::new("north-sea", "cables");
        report.record_source_ok(3, None, None, &dataset("nl", 2));
        report.record_source_error("uk", None, &HarmonizeError::unavailable("uk", "timeout"));
        report.record_source_error(
            "fr",
            Some("fr.geojson".to_string()),
            &HarmonizeError::schema("fr", "column 'etat' not found"),
        );
        report.finalize();

        assert_eq!(report.status, RunStatus::PartialSuccess);
        assert_eq!(report.sources[1].outcome, SourceOutcome::Unavailable);
        assert_eq!(report.sources[2].outcome, SourceOutcome::Failed);
        assert_eq!(report.sources[2].error_kind.as_deref(), Some("schema"));
        assert_eq!(report.sources_failed(), 2);
    }

    #[test]
    fn test_finalize_failed() {
        let mut report = RunReport::new("north-sea", "cables");
        report.record_source_error("uk", None, &HarmonizeError::unavailable("uk", "timeout"));
        report.finalize();
        assert_eq!(report.status, RunStatus::Failed);
    }

    #[test]
    fn test_summary() {
        let mut report = RunReport::new("north-sea", "cables");
        report.record_source_ok(5, None, None, &dataset("nl", 5));
        report.total_records = 5;

        let summary = report.summary();
        assert!(summary.contains("north-sea"));
        assert!(summary.contains("5 records from 1/1 sources"));
    }

    #[test]
    fn test_report_serializes() {
        let mut report = RunReport::new("north-sea", "cables");
        report.record_output(Crs(3035), Path::new("out/cables_3035.geojson"), 12);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outputs"][0]["crs"], "EPSG:3035");
        assert_eq!(json["status"], "Success");
    }
}
