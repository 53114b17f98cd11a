//! Client WFS (GetCapabilities, GetFeature en GeoJSON)

use std::sync::LazyLock;
use std::time::Duration;

use harmonize::{HarmonizeError, SourceDataset};
use regex::Regex;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::RetryConfig;

/// Nom des couches dans un document GetCapabilities (WFS 1.x et 2.0)
static FEATURE_TYPE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:\w+:)?FeatureType\b.*?<(?:\w+:)?Name>\s*([^<]+?)\s*</(?:\w+:)?Name>")
        .expect("valid FeatureType regex")
});

/// Politique de retry: tentatives bornées, backoff exponentiel
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            backoff: config.backoff(),
            timeout: config.timeout(),
        }
    }
}

impl RetryPolicy {
    /// Délai avant la tentative `attempt` (1 = première relance)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Échec d'une tentative
enum Attempt {
    /// Erreur transitoire: nouvelle tentative possible
    Transient(String),
    /// Erreur définitive (4xx, réponse invalide)
    Fatal(String),
}

/// Client WFS pour un endpoint
#[derive(Debug, Clone)]
pub struct WfsClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl WfsClient {
    pub fn new(client: Client, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Liste les couches publiées par le service
    pub async fn list_layers(&self) -> Result<Vec<String>, HarmonizeError> {
        let params = vec![
            ("service", "WFS".to_string()),
            ("request", "GetCapabilities".to_string()),
        ];
        let xml = self.get_text(&self.base_url, &params).await?;
        Ok(parse_layer_names(&xml))
    }

    /// Récupère une couche en GeoJSON, avec un filtre CQL optionnel
    ///
    /// Le CRS n'est renseigné que si la réponse le déclare.
    pub async fn fetch_layer(
        &self,
        name: &str,
        layer: &str,
        filter: Option<&str>,
    ) -> Result<SourceDataset, HarmonizeError> {
        let params = feature_params(layer, filter);
        let body = self.get_text(name, &params).await?;
        let dataset = SourceDataset::parse_geojson(name, &body)?;

        debug!(
            source = name,
            layer = layer,
            records = dataset.len(),
            crs = ?dataset.crs,
            "WFS layer fetched"
        );
        Ok(dataset)
    }

    /// GET avec retry sur les erreurs transitoires (connexion, timeout, 5xx)
    async fn get_text(&self, name: &str, params: &[(&str, String)]) -> Result<String, HarmonizeError> {
        let mut attempt = 1;
        loop {
            match self.try_get(params).await {
                Ok(body) => return Ok(body),
                Err(Attempt::Transient(reason)) if attempt < self.retry.attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        source = name,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "WFS request failed ({}), retrying",
                        reason
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(Attempt::Transient(reason)) | Err(Attempt::Fatal(reason)) => {
                    return Err(HarmonizeError::unavailable(
                        name,
                        format!("{} ({} attempt(s)): {}", self.base_url, attempt, reason),
                    ));
                }
            }
        }
    }

    async fn try_get(&self, params: &[(&str, String)]) -> Result<String, Attempt> {
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .timeout(self.retry.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    Attempt::Transient(e.to_string())
                } else {
                    Attempt::Fatal(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {}", status);
            return Err(if is_transient_status(status) {
                Attempt::Transient(reason)
            } else {
                Attempt::Fatal(reason)
            });
        }

        response.text().await.map_err(|e| Attempt::Transient(e.to_string()))
    }
}

/// Paramètres d'une requête GetFeature
pub fn feature_params(layer: &str, filter: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("service", "WFS".to_string()),
        ("version", "2.0.0".to_string()),
        ("request", "GetFeature".to_string()),
        ("typeNames", layer.to_string()),
        ("outputFormat", "application/json".to_string()),
    ];
    if let Some(filter) = filter {
        params.push(("CQL_FILTER", filter.to_string()));
    }
    params
}

/// Extrait les noms de couches d'un document GetCapabilities
pub fn parse_layer_names(xml: &str) -> Vec<String> {
    FEATURE_TYPE_NAME
        .captures_iter(xml)
        .map(|c| c[1].to_string())
        .collect()
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:WFS_Capabilities version="2.0.0" xmlns:wfs="http://www.opengis.net/wfs/2.0">
  <FeatureTypeList>
    <FeatureType xmlns:emodnet="emodnet">
      <Name>emodnet:pcablesrijks</Name>
      <Title>Power cables (NL)</Title>
      <DefaultCRS>urn:ogc:def:crs:EPSG::4326</DefaultCRS>
    </FeatureType>
    <wfs:FeatureType>
      <wfs:Name> emodnet:pcablesbshcontis </wfs:Name>
      <wfs:Title>Power cables (DE)</wfs:Title>
    </wfs:FeatureType>
  </FeatureTypeList>
</wfs:WFS_Capabilities>"#;

    #[test]
    fn test_parse_layer_names() {
        assert_eq!(
            parse_layer_names(CAPABILITIES),
            vec!["emodnet:pcablesrijks", "emodnet:pcablesbshcontis"]
        );
        assert!(parse_layer_names("<FeatureTypeList></FeatureTypeList>").is_empty());
    }

    #[test]
    fn test_feature_params() {
        let params = feature_params("eez", Some("mrgid=5668"));
        assert!(params.contains(&("typeNames", "eez".to_string())));
        assert!(params.contains(&("outputFormat", "application/json".to_string())));
        assert!(params.contains(&("CQL_FILTER", "mrgid=5668".to_string())));
        assert!(!feature_params("eez", None).iter().any(|(k, _)| *k == "CQL_FILTER"));
    }

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_millis(1000));
        assert_eq!(policy.delay(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let policy = RetryPolicy {
            attempts: 2,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(2),
        };
        // Port 9 (discard) sur localhost: connexion refusée
        let client = WfsClient::new(Client::new(), "http://127.0.0.1:9/wfs", policy);
        let err = client.fetch_layer("nl", "cables", None).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("2 attempt(s)"));
    }
}
