//! Réduction des géométries brutes (XYZ, XYM, XYZM) en 2-D

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use geojson::{PolygonType, Position, Value};

/// Géométrie 2-D issue d'une géométrie brute
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    pub geometry: Geometry<f64>,

    /// Vrai si au moins une position portait des ordonnées supplémentaires
    pub reduced: bool,
}

/// Convertit une géométrie GeoJSON en géométrie `geo` 2-D
///
/// Seules les deux premières ordonnées (x, y) sont conservées, sans aucune
/// modification de leur valeur.
pub fn flatten(geometry: &geojson::Geometry) -> Result<Flattened, String> {
    let mut reduced = false;
    let geometry = convert(&geometry.value, &mut reduced)?;
    Ok(Flattened { geometry, reduced })
}

fn convert(value: &Value, reduced: &mut bool) -> Result<Geometry<f64>, String> {
    let geometry = match value {
        Value::Point(pos) => Geometry::Point(Point::from(coord(pos, reduced)?)),
        Value::MultiPoint(positions) => Geometry::MultiPoint(MultiPoint::new(
            positions
                .iter()
                .map(|p| coord(p, reduced).map(Point::from))
                .collect::<Result<_, _>>()?,
        )),
        Value::LineString(positions) => Geometry::LineString(line(positions, reduced)?),
        Value::MultiLineString(lines) => Geometry::MultiLineString(MultiLineString::new(
            lines
                .iter()
                .map(|l| line(l, reduced))
                .collect::<Result<_, _>>()?,
        )),
        Value::Polygon(rings) => Geometry::Polygon(polygon(rings, reduced)?),
        Value::MultiPolygon(polygons) => Geometry::MultiPolygon(MultiPolygon::new(
            polygons
                .iter()
                .map(|p| polygon(p, reduced))
                .collect::<Result<_, _>>()?,
        )),
        Value::GeometryCollection(members) => {
            Geometry::GeometryCollection(GeometryCollection::new_from(
                members
                    .iter()
                    .map(|g| convert(&g.value, reduced))
                    .collect::<Result<_, _>>()?,
            ))
        }
    };
    Ok(geometry)
}

fn coord(position: &Position, reduced: &mut bool) -> Result<Coord<f64>, String> {
    match position.as_slice() {
        [x, y, rest @ ..] => {
            if !x.is_finite() || !y.is_finite() {
                return Err(format!("non-finite coordinate ({}, {})", x, y));
            }
            if !rest.is_empty() {
                *reduced = true;
            }
            Ok(Coord { x: *x, y: *y })
        }
        _ => Err(format!(
            "position with {} ordinate(s), at least 2 required",
            position.len()
        )),
    }
}

fn line(positions: &[Position], reduced: &mut bool) -> Result<LineString<f64>, String> {
    positions
        .iter()
        .map(|p| coord(p, reduced))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn polygon(rings: &PolygonType, reduced: &mut bool) -> Result<Polygon<f64>, String> {
    let mut rings = rings.iter().map(|r| line(r, reduced));
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString::new(Vec::new()),
    };
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(json: &str) -> geojson::Geometry {
        match json.parse::<geojson::GeoJson>().unwrap() {
            geojson::GeoJson::Geometry(g) => g,
            other => panic!("Expected Geometry, got {other:?}"),
        }
    }

    #[test]
    fn test_flatten_3d_linestring() {
        let raw = geometry(r#"{"type": "LineString", "coordinates": [[1.5, 51.0, -30.0], [2.0, 51.5, -42.5]]}"#);
        let flat = flatten(&raw).unwrap();

        assert!(flat.reduced);
        assert_eq!(
            flat.geometry,
            Geometry::LineString(LineString::from(vec![(1.5, 51.0), (2.0, 51.5)]))
        );
    }

    #[test]
    fn test_flatten_xyzm_multilinestring() {
        let raw = geometry(
            r#"{"type": "MultiLineString", "coordinates": [[[0, 0, 1, 10], [1, 1, 2, 20]], [[5, 5, 0, 0], [6, 6, 0, 5]]]}"#,
        );
        let flat = flatten(&raw).unwrap();

        assert!(flat.reduced);
        let Geometry::MultiLineString(mls) = flat.geometry else {
            panic!("Expected MultiLineString");
        };
        assert_eq!(mls.0.len(), 2);
        assert_eq!(mls.0[1].0[1], Coord { x: 6.0, y: 6.0 });
    }

    #[test]
    fn test_flatten_2d_is_not_reduced() {
        let raw = geometry(r#"{"type": "Point", "coordinates": [4.5, 52.1]}"#);
        let flat = flatten(&raw).unwrap();
        assert!(!flat.reduced);
        assert_eq!(flat.geometry, Geometry::Point(Point::new(4.5, 52.1)));
    }

    #[test]
    fn test_flatten_polygon_with_hole() {
        let raw = geometry(
            r#"{"type": "Polygon", "coordinates": [
                [[0, 0, 0], [10, 0, 0], [10, 10, 0], [0, 10, 0], [0, 0, 0]],
                [[2, 2, 0], [3, 2, 0], [3, 3, 0], [2, 2, 0]]
            ]}"#,
        );
        let flat = flatten(&raw).unwrap();
        let Geometry::Polygon(p) = flat.geometry else {
            panic!("Expected Polygon");
        };
        assert_eq!(p.exterior().0.len(), 5);
        assert_eq!(p.interiors().len(), 1);
    }

    #[test]
    fn test_position_too_short() {
        let raw = geojson::Geometry::new(Value::Point(vec![1.0]));
        assert!(flatten(&raw).is_err());
    }
}
