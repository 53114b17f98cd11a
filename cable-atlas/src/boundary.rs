//! Recherche de polygones de limite (ZEE, pays) par identifiant MRGID
//!
//! Deux implémentations: un gazetteer GeoJSON local chargé en mémoire, et une
//! couche WFS interrogée région par région. Les recherches sont idempotentes
//! et peuvent être relancées sans effet de bord.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;

use geo::{Geometry, MultiPolygon};
use harmonize::condition::flatten;
use harmonize::{BoundaryPolygon, Crs, HarmonizeError, RawRecord, SourceDataset};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::BoundaryServiceConfig;
use crate::sources::{FileSource, RetryPolicy, WfsClient};

/// Service de recherche de limites
pub trait BoundaryLookup {
    /// Polygone d'une région
    fn lookup(&self, id: u32) -> impl Future<Output = Result<BoundaryPolygon, HarmonizeError>> + Send;

    /// Recherche groupée, un résultat par identifiant (dans l'ordre demandé)
    fn lookup_many(
        &self,
        ids: &[u32],
    ) -> impl Future<Output = Vec<(u32, Result<BoundaryPolygon, HarmonizeError>)>> + Send
    where
        Self: Sync,
    {
        async move {
            let mut results = Vec::with_capacity(ids.len());
            for &id in ids {
                results.push((id, self.lookup(id).await));
            }
            results
        }
    }
}

/// Gazetteer GeoJSON local (une feature par région)
#[derive(Debug, Clone)]
pub struct GeoJsonBoundaryLookup {
    regions: BTreeMap<u32, BoundaryPolygon>,
}

impl GeoJsonBoundaryLookup {
    /// Charge le gazetteer depuis un fichier
    pub fn open(path: &Path, id_property: &str, name_property: &str) -> Result<Self, HarmonizeError> {
        let name = path.display().to_string();
        let content = FileSource::new(path).read(&name)?;
        Ok(Self::from_dataset(content.dataset, id_property, name_property))
    }

    /// Indexe un jeu de données par identifiant
    ///
    /// Sans CRS déclaré, le gazetteer est en WGS84 (GeoJSON RFC 7946). Une
    /// feature non polygonale est ignorée: sa région reste introuvable.
    pub fn from_dataset(dataset: SourceDataset, id_property: &str, name_property: &str) -> Self {
        let mut regions = BTreeMap::new();
        let mut skipped = 0;

        for record in &dataset.records {
            let Some(id) = record.properties.get(id_property).and_then(region_id) else {
                continue;
            };
            let crs = record.crs.or(dataset.crs).unwrap_or(Crs::WGS84);
            match boundary_from_record(id, record, name_property, crs) {
                Ok(polygon) => {
                    regions.insert(id, polygon);
                }
                Err(e) => {
                    warn!(source = %dataset.name, region = id, "Gazetteer feature skipped: {}", e);
                    skipped += 1;
                }
            }
        }

        debug!(
            source = %dataset.name,
            regions = regions.len(),
            skipped = skipped,
            "Boundary gazetteer loaded"
        );
        Self { regions }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl BoundaryLookup for GeoJsonBoundaryLookup {
    async fn lookup(&self, id: u32) -> Result<BoundaryPolygon, HarmonizeError> {
        self.regions.get(&id).cloned().ok_or_else(|| HarmonizeError::Lookup {
            id,
            reason: "region not found in gazetteer".to_string(),
        })
    }
}

/// Couche WFS filtrée par identifiant (`CQL_FILTER=<id_field>=<id>`)
#[derive(Debug, Clone)]
pub struct WfsBoundaryLookup {
    client: WfsClient,
    layer: String,
    id_field: String,
    name_field: String,
}

impl WfsBoundaryLookup {
    pub fn new(client: WfsClient, layer: &str, id_field: &str, name_field: &str) -> Self {
        Self {
            client,
            layer: layer.to_string(),
            id_field: id_field.to_string(),
            name_field: name_field.to_string(),
        }
    }
}

impl BoundaryLookup for WfsBoundaryLookup {
    async fn lookup(&self, id: u32) -> Result<BoundaryPolygon, HarmonizeError> {
        let filter = format!("{}={}", self.id_field, id);
        let name = format!("{}#{}", self.layer, id);

        let dataset = self
            .client
            .fetch_layer(&name, &self.layer, Some(&filter))
            .await
            .map_err(|e| HarmonizeError::Lookup {
                id,
                reason: e.to_string(),
            })?;

        let record = dataset
            .records
            .iter()
            .find(|r| r.geometry.is_some())
            .ok_or_else(|| HarmonizeError::Lookup {
                id,
                reason: format!("no feature with {} in layer {}", filter, self.layer),
            })?;
        let crs = record.crs.or(dataset.crs).unwrap_or(Crs::WGS84);
        boundary_from_record(id, record, &self.name_field, crs)
    }
}

/// Service configuré (fichier ou WFS)
#[derive(Debug, Clone)]
pub enum BoundaryService {
    File(GeoJsonBoundaryLookup),
    Wfs(WfsBoundaryLookup),
}

impl BoundaryService {
    /// Construit le service décrit par la configuration
    ///
    /// Le gazetteer local est chargé immédiatement; le WFS est interrogé à la demande.
    pub async fn from_config(
        config: &BoundaryServiceConfig,
        client: &Client,
        retry: RetryPolicy,
    ) -> Result<Self, HarmonizeError> {
        match config {
            BoundaryServiceConfig::File {
                path,
                id_property,
                name_property,
            } => {
                let path = path.clone();
                let id_property = id_property.clone();
                let name_property = name_property.clone();
                let lookup = tokio::task::spawn_blocking(move || {
                    GeoJsonBoundaryLookup::open(&path, &id_property, &name_property)
                })
                .await
                .map_err(|e| HarmonizeError::unavailable("boundary_service", e.to_string()))??;
                Ok(Self::File(lookup))
            }
            BoundaryServiceConfig::Wfs {
                url,
                layer,
                id_field,
                name_field,
            } => Ok(Self::Wfs(WfsBoundaryLookup::new(
                WfsClient::new(client.clone(), url, retry),
                layer,
                id_field,
                name_field,
            ))),
        }
    }
}

impl BoundaryLookup for BoundaryService {
    async fn lookup(&self, id: u32) -> Result<BoundaryPolygon, HarmonizeError> {
        match self {
            Self::File(lookup) => lookup.lookup(id).await,
            Self::Wfs(lookup) => lookup.lookup(id).await,
        }
    }
}

/// Identifiant numérique (nombre ou chaîne)
fn region_id(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn boundary_from_record(
    id: u32,
    record: &RawRecord,
    name_property: &str,
    crs: Crs,
) -> Result<BoundaryPolygon, HarmonizeError> {
    let lookup_error = |reason: String| HarmonizeError::Lookup { id, reason };

    let raw = record
        .geometry
        .as_ref()
        .ok_or_else(|| lookup_error("region has no geometry".to_string()))?;
    let geometry = match flatten(raw).map_err(lookup_error)?.geometry {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
        Geometry::MultiPolygon(mp) => mp,
        other => {
            return Err(lookup_error(format!(
                "expected a polygonal geometry, got {}",
                geometry_type(&other)
            )))
        }
    };

    let name = record
        .properties
        .get(name_property)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(BoundaryPolygon {
        id,
        name,
        crs,
        geometry,
    })
}

fn geometry_type(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAZETTEER: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "properties": {"mrgid": 5668, "geoname": "Dutch Exclusive Economic Zone"},
         "geometry": {"type": "Polygon", "coordinates": [[[3,51],[7,51],[7,55],[3,55],[3,51]]]}},
        {"type": "Feature", "properties": {"mrgid": "17", "geoname": "France"},
         "geometry": {"type": "MultiPolygon", "coordinates": [[[[0,45],[2,45],[2,50],[0,50],[0,45]]]]}},
        {"type": "Feature", "properties": {"mrgid": 99, "geoname": "Point"},
         "geometry": {"type": "Point", "coordinates": [0, 0]}},
        {"type": "Feature", "properties": {"geoname": "No id"},
         "geometry": {"type": "Point", "coordinates": [0, 0]}}
      ]
    }"#;

    fn gazetteer() -> GeoJsonBoundaryLookup {
        let dataset = SourceDataset::parse_geojson("gazetteer", GAZETTEER).unwrap();
        GeoJsonBoundaryLookup::from_dataset(dataset, "mrgid", "geoname")
    }

    #[tokio::test]
    async fn test_geojson_lookup() {
        let lookup = gazetteer();
        assert_eq!(lookup.len(), 2);

        let nl = lookup.lookup(5668).await.unwrap();
        assert_eq!(nl.name, "Dutch Exclusive Economic Zone");
        assert_eq!(nl.crs, Crs::WGS84);
        assert_eq!(nl.geometry.0.len(), 1);

        let fr = lookup.lookup(17).await.unwrap();
        assert_eq!(fr.name, "France");
    }

    #[tokio::test]
    async fn test_lookup_many_keeps_order_and_failures() {
        let lookup = gazetteer();
        let results = lookup.lookup_many(&[17, 1, 5668]).await;

        let ids: Vec<u32> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![17, 1, 5668]);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(HarmonizeError::Lookup { id: 1, .. })));
        assert!(results[2].1.is_ok());
    }

    #[tokio::test]
    async fn test_non_polygonal_region_skipped() {
        let lookup = gazetteer();
        assert_eq!(lookup.len(), 2);

        let err = lookup.lookup(99).await.unwrap_err();
        assert!(matches!(err, HarmonizeError::Lookup { id: 99, .. }));
    }

    #[test]
    fn test_missing_gazetteer_is_unavailable() {
        let path = std::env::temp_dir().join("cable_atlas_no_such_gazetteer.geojson");
        let err = GeoJsonBoundaryLookup::open(&path, "mrgid", "geoname").unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_region_id() {
        assert_eq!(region_id(&serde_json::json!(5668)), Some(5668));
        assert_eq!(region_id(&serde_json::json!(" 17 ")), Some(17));
        assert_eq!(region_id(&serde_json::json!(-1)), None);
        assert_eq!(region_id(&serde_json::json!(null)), None);
    }
}
