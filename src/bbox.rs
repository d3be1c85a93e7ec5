//! Bounding box resolution, either from literal coordinates or from the polygons of a
//! GeoJSON document.
use crate::error::M2mError;
use anyhow::{Context, Result};
use geo::{BooleanOps, BoundingRect, MultiPolygon, Polygon, Rect, RemoveRepeatedPoints};
use geojson::{GeoJson, Geometry};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::fs;
use std::path::Path;

/// A closed ring needs at least three distinct vertices plus the closing one.
const MIN_RING_LEN: usize = 4;

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        let invalid = |reason| M2mError::InvalidBoundingBox {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
            reason,
        };
        if ![min_lon, min_lat, max_lon, max_lat]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(invalid("coordinates must be finite").into());
        }
        if min_lon > max_lon {
            return Err(invalid("min longitude is greater than max longitude").into());
        }
        if min_lat > max_lat {
            return Err(invalid("min latitude is greater than max latitude").into());
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    /// Builds a bounding box from the `--bbox` flag values, in
    /// `min_lon min_lat max_lon max_lat` order.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        match values {
            [min_lon, min_lat, max_lon, max_lat] => {
                Self::new(*min_lon, *min_lat, *max_lon, *max_lat)
            }
            _ => anyhow::bail!(
                "Expected 4 bounding box values, got {}",
                values.len()
            ),
        }
    }

    pub fn from_geojson_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Unable to read GeoJSON file {}", path.display()))?;
        Self::from_geojson_str(&content)
            .with_context(|| format!("Unable to derive bounding box from {}", path.display()))
    }

    /// Bounds of the union of every Polygon and MultiPolygon in the document.
    pub fn from_geojson_str(content: &str) -> Result<Self> {
        let geo_json: GeoJson = content.parse()?;
        let polygons = collect_polygons(&geo_json)?;
        let rect = union_bounds(&polygons).ok_or(M2mError::NoPolygonGeometry)?;
        Self::from_rect(rect)
    }

    fn from_rect(rect: Rect) -> Result<Self> {
        let (min, max) = (rect.min(), rect.max());
        Self::new(min.x, min.y, max.x, max.y)
    }

    /// The M2M minimum bounding rectangle filter for this box.
    pub fn to_spatial_filter(&self) -> Value {
        json!({
            "filterType": "mbr",
            "lowerLeft": {
                "longitude": self.min_lon,
                "latitude": self.min_lat,
            },
            "upperRight": {
                "longitude": self.max_lon,
                "latitude": self.max_lat,
            },
        })
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

fn collect_polygons(geo_json: &GeoJson) -> Result<Vec<MultiPolygon>> {
    let mut geometries: Vec<&Geometry> = vec![];

    match geo_json {
        GeoJson::FeatureCollection(v) => {
            for feature in &v.features {
                if let Some(v) = &feature.geometry {
                    geometries.push(v);
                }
            }
        }
        GeoJson::Feature(v) => {
            if let Some(v) = &v.geometry {
                geometries.push(v);
            }
        }
        GeoJson::Geometry(v) => geometries.push(v),
    };

    let mut polygons = vec![];
    for geometry in geometries {
        let multi_poly: MultiPolygon = match &geometry.value {
            geojson::Value::Polygon(_) => {
                let poly: Polygon = (&geometry.value).try_into()?;
                poly.into()
            }
            geojson::Value::MultiPolygon(_) => (&geometry.value).try_into()?,
            _ => return Err(M2mError::NoPolygonGeometry.into()),
        };
        polygons.push(repair(multi_poly));
    }
    Ok(polygons)
}

/// Drops repeated vertices and any ring left too short to enclose an area.
fn repair(multi_poly: MultiPolygon) -> MultiPolygon {
    let polygons = multi_poly
        .remove_repeated_points()
        .into_iter()
        .filter(|poly| poly.exterior().0.len() >= MIN_RING_LEN)
        .map(|poly| {
            let (exterior, interiors) = poly.into_inner();
            let interiors = interiors
                .into_iter()
                .filter(|ring| ring.0.len() >= MIN_RING_LEN)
                .collect();
            Polygon::new(exterior, interiors)
        })
        .collect::<Vec<_>>();
    MultiPolygon::new(polygons)
}

fn union_bounds(polygons: &[MultiPolygon]) -> Option<Rect> {
    let (first, rest) = polygons.split_first()?;
    let union = rest
        .iter()
        .fold(first.clone(), |acc, poly| acc.union(poly));

    // A degenerate union has no area; fall back to the repaired inputs.
    union.bounding_rect().or_else(|| {
        let all = MultiPolygon::new(polygons.iter().flat_map(|p| p.0.clone()).collect());
        all.bounding_rect()
    })
}
