//! Export vers GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use harmonize::{CanonicalRecord, Crs, MergedCollection};

/// Chemin de sortie: `<dir>/<basename>_<epsg>.geojson`
pub fn output_path(dir: &Path, basename: &str, crs: Crs) -> PathBuf {
    dir.join(format!("{}_{}.geojson", basename, crs.epsg()))
}

/// Mise en forme des propriétés exportées
#[derive(Debug, Clone, Copy, Default)]
pub struct Layout<'a> {
    /// Colonne de longueur ajoutée après les colonnes du schéma
    pub length_column: Option<&'a str>,

    /// Colonnes écrites en nombre JSON (identifiants numériques)
    pub numeric_columns: &'a [&'a str],
}

/// Écrit une collection en FeatureCollection GeoJSON
///
/// Les propriétés suivent l'ordre des colonnes du schéma, puis la colonne de
/// longueur (numérique) si demandée.
pub fn export_collection(collection: &MergedCollection, layout: &Layout<'_>, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create directory: {}", parent.display()))?;
    }

    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    // Header FeatureCollection avec CRS
    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"{}"}}}},"features":["#,
        collection.crs.urn()
    )?;

    for (i, record) in collection.records.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(&mut writer, record, &collection.columns, layout)?;
    }

    write!(writer, "]}}")?;
    writer.flush()?;

    Ok(())
}

/// Écrit une feature en GeoJSON
fn write_feature<W: Write>(
    writer: &mut W,
    record: &CanonicalRecord,
    columns: &[String],
    layout: &Layout<'_>,
) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","properties":{{"#)?;

    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        let numeric = layout.numeric_columns.contains(&column.as_str());
        match record.attr(column) {
            Some(value) if numeric && is_json_number(value) => {
                write!(writer, r#""{}":{}"#, escape_json(column), value.trim())?
            }
            Some(value) => write!(writer, r#""{}":"{}""#, escape_json(column), escape_json(value))?,
            None => write!(writer, r#""{}":null"#, escape_json(column))?,
        }
    }

    if let Some(length_column) = layout.length_column {
        if !columns.is_empty() {
            write!(writer, ",")?;
        }
        match record.length.map(|l| l.value).filter(|v| v.is_finite()) {
            Some(value) => write!(writer, r#""{}":{}"#, escape_json(length_column), value)?,
            None => write!(writer, r#""{}":null"#, escape_json(length_column))?,
        }
    }

    // Geometry via geozero
    write!(writer, r#"}},"geometry":"#)?;
    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    record.geometry.process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;
    write!(writer, "}}")?;

    Ok(())
}

/// Entier décimal sans zéro de tête (un identifiant hors de cette forme reste une chaîne)
fn is_json_number(value: &str) -> bool {
    let digits = value.trim().strip_prefix('-').unwrap_or(value.trim());
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'))
}

/// Échappe une chaîne pour JSON
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}
