//! Orchestration d'un run: récupération, harmonisation, fusion, export
//!
//! - Récupération concurrente des sources (`buffered`, ordre conservé)
//! - Normalisation et conditionnement en parallèle par source (rayon)
//! - Fusion, finalisation et export séquentiels

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use harmonize::types::NormalizedRecord;
use harmonize::{
    condition, export_all, finalize, merge, normalize, BoundaryPolygon, CanonicalDataset, Crs,
    FinalizeRules, HarmonizeError, MergedCollection, NormalizedDataset, Schema,
};
use rayon::prelude::*;
use reqwest::Client;
use tracing::{info, warn};

use crate::boundary::{BoundaryLookup, BoundaryService};
use crate::config::{BoundariesConfig, CablesConfig, Config, PipelineConfig, SourceConfig};
use crate::export::{export_collection, output_path, Layout};
use crate::report::RunReport;
use crate::sources::{self, Fetched, RetryPolicy};

/// Options d'exécution (surcharges CLI)
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Nombre maximal de sources récupérées en parallèle
    pub jobs: Option<usize>,

    /// Répertoire de sortie (remplace `output.dir`)
    pub output_dir: Option<PathBuf>,
}

impl RunOptions {
    fn jobs(&self) -> usize {
        self.jobs.filter(|&j| j > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

/// Résultat du traitement d'une source
struct Processed {
    name: String,
    origin: Option<String>,
    outcome: Result<(usize, Option<String>, CanonicalDataset), HarmonizeError>,
}

/// Exécute un run complet
///
/// Une source en échec est écartée et signalée dans le rapport. Seules les
/// erreurs d'écriture (et les incohérences de fusion) interrompent le run;
/// un rapport `Failed` signale qu'aucune source n'a pu être traitée.
pub async fn run(config: &Config, options: &RunOptions) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new(&config.name, config.pipeline_name());

    let retry = RetryPolicy::from(&config.retry);
    let client = Client::builder()
        .timeout(retry.timeout)
        .build()
        .context("Failed to create HTTP client")?;

    // Un service de limites indisponible n'affecte que les régions demandées
    let boundaries = match &config.boundary_service {
        Some(service) => {
            let opened = BoundaryService::from_config(service, &client, retry).await;
            if let Err(e) = &opened {
                warn!(kind = e.kind(), "Boundary service unavailable: {}", e);
            }
            Some(opened)
        }
        None => None,
    };

    info!(
        name = %config.name,
        pipeline = config.pipeline_name(),
        working_crs = %config.working_crs,
        exports = config.export_crs.len(),
        "Starting run"
    );

    let result = match &config.pipeline {
        PipelineConfig::Cables(cables) => {
            let boundaries = boundaries.as_ref();
            run_cables(config, cables, boundaries, &client, retry, options, &mut report).await
        }
        PipelineConfig::Boundaries(regions) => {
            let Some(service) = boundaries.as_ref() else {
                anyhow::bail!("Boundaries pipeline requires a boundary_service");
            };
            run_boundaries(config, regions, service, options, &mut report).await
        }
    };

    report.set_duration(start.elapsed());
    result?;
    report.finalize();

    info!(
        status = ?report.status,
        records = report.total_records,
        duration_secs = report.duration_secs,
        "Run complete"
    );
    Ok(report)
}

async fn run_cables(
    config: &Config,
    cables: &CablesConfig,
    boundaries: Option<&Result<BoundaryService, HarmonizeError>>,
    client: &Client,
    retry: RetryPolicy,
    options: &RunOptions,
    report: &mut RunReport,
) -> Result<()> {
    let schema = Arc::new(Schema::cables());
    let jobs = options.jobs();

    // Masques de découpage: une recherche par région, partagée entre sources
    let masks = load_masks(&cables.sources, boundaries).await;

    // 1. Récupération (concurrente, ordre de configuration conservé)
    let fetched: Vec<(SourceConfig, Result<Fetched, HarmonizeError>)> =
        stream::iter(cables.sources.iter().cloned())
            .map(|source| async move {
                let result = sources::fetch(&source, client, retry).await;
                (source, result)
            })
            .buffered(jobs)
            .collect()
            .await;

    // 2. Normalisation + conditionnement (parallèle par source)
    let working_crs = config.working_crs;
    let processed = tokio::task::spawn_blocking({
        let schema = Arc::clone(&schema);
        move || {
            fetched
                .into_par_iter()
                .map(|(source, result)| process_source(&schema, source, result, &masks, working_crs))
                .collect::<Vec<_>>()
        }
    })
    .await
    .context("Source processing task failed")?;

    let mut datasets = Vec::with_capacity(processed.len());
    for processed in processed {
        match processed.outcome {
            Ok((records_read, checksum, dataset)) => {
                info!(
                    source = %processed.name,
                    read = records_read,
                    kept = dataset.records.len(),
                    "Source harmonized"
                );
                report.record_source_ok(records_read, processed.origin, checksum, &dataset);
                datasets.push(dataset);
            }
            Err(e) => {
                warn!(source = %processed.name, kind = e.kind(), "Source skipped: {}", e);
                report.record_source_error(&processed.name, processed.origin, &e);
            }
        }
    }

    if datasets.is_empty() {
        warn!("No source could be harmonized, nothing to export");
        return Ok(());
    }

    // 3. Fusion, finalisation
    let merged = merge(&schema, working_crs, datasets).context("Merge failed")?;

    let status_field = schema.status_field.clone();
    let rules = FinalizeRules {
        synonyms: status_field
            .as_deref()
            .map(|field| cables.synonym_rules(field))
            .unwrap_or_default(),
        status_field,
        excluded: cables.excluded_statuses.iter().copied().collect(),
        unit: cables.length_unit,
        unknown_status: cables.unknown_status,
    };
    let outcome = finalize(merged, &rules).context("Length measurement failed")?;
    report.record_finalize(&outcome, "country");

    // 4. Export
    let length_column = cables.length_unit.column_name();
    let layout = Layout {
        length_column: Some(&length_column),
        numeric_columns: &[],
    };
    write_outputs(config, &outcome.collection, &layout, options, report)
}

async fn run_boundaries(
    config: &Config,
    boundaries: &BoundariesConfig,
    service: &Result<BoundaryService, HarmonizeError>,
    options: &RunOptions,
    report: &mut RunReport,
) -> Result<()> {
    let schema = Schema::boundaries();
    let ids: Vec<u32> = boundaries.regions.iter().map(|r| r.mrgid).collect();
    let results = lookup_all(service, &ids).await;

    let mut datasets = Vec::with_capacity(results.len());
    for (region, (id, result)) in boundaries.regions.iter().zip(results) {
        let name = format!("mrgid:{}", id);
        let conditioned = result.and_then(|polygon| {
            let mut attributes = schema.empty_attributes();
            // Sans pays configuré, le nom du gazetteer sert d'étiquette
            let label = region
                .country
                .clone()
                .or_else(|| Some(polygon.name.clone()).filter(|name| !name.is_empty()));
            attributes.insert("country".to_string(), label);
            attributes.insert("mrgid".to_string(), Some(id.to_string()));
            attributes.insert("borderFlag".to_string(), region.border_flag.clone());
            attributes.insert("comment".to_string(), region.comment.clone());
            condition(
                region_dataset(&name, &schema, attributes, &polygon),
                None,
                config.working_crs,
                None,
            )
        });

        match conditioned {
            Ok(dataset) => {
                report.record_source_ok(1, None, None, &dataset);
                datasets.push(dataset);
            }
            Err(e) => {
                warn!(region = id, kind = e.kind(), "Region skipped: {}", e);
                report.record_source_error(&name, None, &e);
            }
        }
    }

    if datasets.is_empty() {
        warn!("No region could be retrieved, nothing to export");
        return Ok(());
    }

    let merged = merge(&schema, config.working_crs, datasets).context("Merge failed")?;
    report.record_collection(&merged, "country");
    let layout = Layout {
        length_column: None,
        numeric_columns: &["mrgid"],
    };
    write_outputs(config, &merged, &layout, options, report)
}

/// Normalise et conditionne une source récupérée
fn process_source(
    schema: &Schema,
    source: SourceConfig,
    fetched: Result<Fetched, HarmonizeError>,
    masks: &BTreeMap<u32, Result<Arc<BoundaryPolygon>, String>>,
    working_crs: Crs,
) -> Processed {
    let origin = fetched.as_ref().ok().map(|f| f.origin.clone());

    let outcome = fetched.and_then(|fetched| {
        let mask = match source.clip_region {
            Some(id) => match masks.get(&id) {
                Some(Ok(mask)) => Some(Arc::clone(mask)),
                Some(Err(reason)) => {
                    return Err(HarmonizeError::Lookup {
                        id,
                        reason: reason.clone(),
                    })
                }
                None => {
                    return Err(HarmonizeError::Lookup {
                        id,
                        reason: "no boundary service configured".to_string(),
                    })
                }
            },
            None => None,
        };

        let records_read = fetched.dataset.len();
        let normalized = normalize(fetched.dataset, schema, &source.mapping(), &source.recode_rules())?;
        let conditioned = condition(normalized, source.assume_crs, working_crs, mask.as_deref())?;
        Ok((records_read, fetched.checksum, conditioned))
    });

    Processed {
        name: source.name,
        origin,
        outcome,
    }
}

/// Recherche les masques de découpage référencés par les sources
async fn load_masks(
    sources: &[SourceConfig],
    boundaries: Option<&Result<BoundaryService, HarmonizeError>>,
) -> BTreeMap<u32, Result<Arc<BoundaryPolygon>, String>> {
    let ids: Vec<u32> = sources
        .iter()
        .filter_map(|s| s.clip_region)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let Some(service) = boundaries.filter(|_| !ids.is_empty()) else {
        return BTreeMap::new();
    };

    lookup_all(service, &ids)
        .await
        .into_iter()
        .map(|(id, result)| {
            let result = result.map(Arc::new).map_err(|e| {
                warn!(region = id, "Clip mask lookup failed: {}", e);
                e.to_string()
            });
            (id, result)
        })
        .collect()
}

/// Recherche groupée; un service non ouvert fait échouer chaque région
async fn lookup_all(
    service: &Result<BoundaryService, HarmonizeError>,
    ids: &[u32],
) -> Vec<(u32, Result<BoundaryPolygon, HarmonizeError>)> {
    match service {
        Ok(service) => service.lookup_many(ids).await,
        Err(e) => ids
            .iter()
            .map(|&id| {
                let error = HarmonizeError::Lookup {
                    id,
                    reason: e.to_string(),
                };
                (id, Err(error))
            })
            .collect(),
    }
}

/// Jeu normalisé à un enregistrement pour une région
fn region_dataset(
    name: &str,
    schema: &Schema,
    attributes: harmonize::Attributes,
    polygon: &BoundaryPolygon,
) -> NormalizedDataset {
    NormalizedDataset {
        source: name.to_string(),
        columns: schema.fields.clone(),
        declared_crs: Some(polygon.crs),
        records: vec![NormalizedRecord {
            attributes,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&polygon.geometry))),
            crs: None,
        }],
    }
}

/// Reprojette et écrit un fichier par CRS de publication
fn write_outputs(
    config: &Config,
    collection: &MergedCollection,
    layout: &Layout<'_>,
    options: &RunOptions,
    report: &mut RunReport,
) -> Result<()> {
    let dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output.dir.clone());

    // Sans PROJ, seul le CRS de travail peut être publié
    let targets: Vec<Crs> = if harmonize::reproject::is_available() {
        config.export_crs.clone()
    } else {
        let (kept, skipped): (Vec<Crs>, Vec<Crs>) = config
            .export_crs
            .iter()
            .partition(|&&crs| crs == collection.crs);
        for crs in skipped {
            warn!(crs = %crs, "Reprojection not available (build without 'reproject'), output skipped");
        }
        kept
    };

    let outputs = export_all(collection, &targets).context("Reprojection for export failed")?;

    // Ordre de la configuration (CRS principal en premier)
    let mut written = BTreeSet::new();
    for crs in &targets {
        if !written.insert(*crs) {
            continue;
        }
        let Some(output) = outputs.get(crs) else {
            continue;
        };
        let path = output_path(&dir, &config.output.basename, *crs);
        export_collection(output, layout, &path)?;
        info!(crs = %crs, path = %path.display(), records = output.len(), "Output written");
        report.record_output(*crs, &path, output.len());
    }

    Ok(())
}
