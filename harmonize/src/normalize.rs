//! Normalisation des sources vers le schéma canonique
//!
//! Chaque source est décrite par une table déclarative (renommage de colonnes,
//! constantes, règles de recodage) interprétée par une seule fonction
//! [`normalize`]. L'ordre des opérations est fixe: renommage, recodage,
//! sélection des colonnes canoniques, colonnes manquantes à null.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::source::SourceDataset;
use crate::types::{Attributes, NormalizedDataset, NormalizedRecord};
use crate::{HarmonizeError, Schema};

/// Correspondance colonne canonique -> colonne source pour une source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Champ canonique -> colonne source (les champs absents sont pris à
    /// l'identique si la source a une colonne du même nom)
    #[serde(default)]
    pub columns: BTreeMap<String, String>,

    /// Champ canonique -> valeur fixe (ex: `country = "FR"`), utilisée
    /// quand le champ n'a pas de colonne source
    #[serde(default)]
    pub constants: BTreeMap<String, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute un renommage `source` -> `field`
    pub fn rename(mut self, field: &str, source: &str) -> Self {
        self.columns.insert(field.to_string(), source.to_string());
        self
    }

    /// Ajoute une valeur constante
    pub fn constant(mut self, field: &str, value: &str) -> Self {
        self.constants.insert(field.to_string(), value.to_string());
        self
    }
}

/// Règle de recodage `(champ, valeur source) -> valeur canonique`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecodeRule {
    pub field: String,
    pub from: String,
    pub to: String,
}

impl RecodeRule {
    pub fn new(field: &str, from: &str, to: &str) -> Self {
        Self {
            field: field.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Aplatie une table `{champ: {valeur source: valeur canonique}}`
    pub fn from_table(table: &BTreeMap<String, BTreeMap<String, String>>) -> Vec<RecodeRule> {
        table
            .iter()
            .flat_map(|(field, values)| {
                values
                    .iter()
                    .map(move |(from, to)| RecodeRule::new(field, from, to))
            })
            .collect()
    }
}

/// Applique les règles de recodage, valeur par valeur
///
/// La première règle correspondante l'emporte, sans enchaînement.
/// Retourne le nombre de valeurs recodées.
pub fn apply_recode(attributes: &mut Attributes, rules: &[RecodeRule]) -> usize {
    let mut recoded = 0;
    for (field, value) in attributes.iter_mut() {
        let Some(current) = value.as_deref() else {
            continue;
        };
        if let Some(rule) = rules
            .iter()
            .find(|r| r.field == *field && r.from == current)
        {
            *value = Some(rule.to.clone());
            recoded += 1;
        }
    }
    recoded
}

/// Projette un jeu de données brut dans le schéma canonique
///
/// # Errors
///
/// `HarmonizeError::Schema` si le mapping référence une colonne absente de la
/// source, cible un champ non canonique, ou si un champ obligatoire reste nul.
///
/// Une source vide n'a pas de colonnes observables: seules les cibles du
/// mapping sont vérifiées, les colonnes sources mappées ne le sont pas.
pub fn normalize(
    raw: SourceDataset,
    schema: &Schema,
    mapping: &ColumnMapping,
    rules: &[RecodeRule],
) -> Result<NormalizedDataset, HarmonizeError> {
    validate_targets(&raw.name, schema, mapping, rules)?;

    if raw.is_empty() {
        let unchecked: Vec<&str> = mapping.columns.values().map(String::as_str).collect();
        debug!(
            source = %raw.name,
            unchecked = ?unchecked,
            "Empty source, mapped columns cannot be checked"
        );
        return Ok(NormalizedDataset {
            source: raw.name,
            columns: schema.fields.clone(),
            declared_crs: raw.crs,
            records: Vec::new(),
        });
    }

    // Les colonnes mappées doivent exister: pas de colonne de substitution
    for (field, column) in &mapping.columns {
        if !raw.has_column(column) {
            return Err(HarmonizeError::schema(
                &raw.name,
                format!(
                    "column '{}' (mapped to '{}') not found; available: {}",
                    column,
                    field,
                    raw.columns.join(", ")
                ),
            ));
        }
    }

    // Résolution champ canonique -> colonne source (explicite ou identité)
    let resolved: Vec<(&str, Option<&str>)> = schema
        .fields
        .iter()
        .map(|field| {
            let column = mapping
                .columns
                .get(field)
                .map(String::as_str)
                .or_else(|| raw.has_column(field).then_some(field.as_str()));
            (field.as_str(), column)
        })
        .collect();

    let mut recoded = 0;
    let mut records = Vec::with_capacity(raw.records.len());

    for (index, record) in raw.records.into_iter().enumerate() {
        // 1. Renommage (et constantes)
        let mut attributes: Attributes = resolved
            .iter()
            .map(|&(field, column)| {
                let value = match column {
                    Some(column) => record.properties.get(column).and_then(json_to_text),
                    None => mapping.constants.get(field).cloned(),
                };
                (field.to_string(), value)
            })
            .collect();

        // 2. Recodage sur les noms canoniques
        recoded += apply_recode(&mut attributes, rules);

        // 3. Les champs obligatoires doivent être renseignés
        if let Some(field) = schema
            .required
            .iter()
            .find(|f| attributes.get(*f).map_or(true, Option::is_none))
        {
            return Err(HarmonizeError::schema(
                &raw.name,
                format!("required field '{}' is null on record {}", field, index),
            ));
        }

        records.push(NormalizedRecord {
            attributes,
            geometry: record.geometry,
            crs: record.crs,
        });
    }

    debug!(
        source = %raw.name,
        records = records.len(),
        recoded = recoded,
        "Source normalized"
    );

    Ok(NormalizedDataset {
        source: raw.name,
        columns: schema.fields.clone(),
        declared_crs: raw.crs,
        records,
    })
}

/// Vérifie que le mapping et les règles ne ciblent que des champs canoniques
fn validate_targets(
    source: &str,
    schema: &Schema,
    mapping: &ColumnMapping,
    rules: &[RecodeRule],
) -> Result<(), HarmonizeError> {
    let targets = mapping
        .columns
        .keys()
        .chain(mapping.constants.keys())
        .chain(rules.iter().map(|r| &r.field));

    for field in targets {
        if !schema.contains(field) {
            return Err(HarmonizeError::schema(
                source,
                format!(
                    "'{}' is not a canonical field of schema '{}'",
                    field, schema.name
                ),
            ));
        }
    }
    Ok(())
}

/// Convertit une valeur JSON en texte (chaînes vides -> null)
fn json_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
