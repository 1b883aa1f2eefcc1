//! The GeoJSON subset Natural Earth layer files use.
//!
//! Only the shapes needed to pull polylines out of coastline and boundary
//! files are modelled; feature properties and unknown geometry types are
//! ignored.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub type_: String,
    pub features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
pub struct Feature {
    /// Null geometries are legal GeoJSON and do appear in upstream files.
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    LineString {
        coordinates: Vec<[f64; 2]>,
    },
    MultiLineString {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
    #[serde(other)]
    Other,
}

impl FeatureCollection {
    /// Flatten every feature into (lon, lat) polylines. Polygon rings
    /// become closed polylines; degenerate one-point lines are dropped.
    pub fn into_polylines(self) -> Vec<Vec<(f64, f64)>> {
        let mut lines = Vec::new();
        for feature in self.features {
            let Some(geometry) = feature.geometry else {
                continue;
            };
            match geometry {
                Geometry::LineString { coordinates } => push_line(&mut lines, coordinates),
                Geometry::MultiLineString { coordinates } => {
                    for line in coordinates {
                        push_line(&mut lines, line);
                    }
                }
                Geometry::Polygon { coordinates } => {
                    for ring in coordinates {
                        push_line(&mut lines, ring);
                    }
                }
                Geometry::MultiPolygon { coordinates } => {
                    for polygon in coordinates {
                        for ring in polygon {
                            push_line(&mut lines, ring);
                        }
                    }
                }
                Geometry::Other => {}
            }
        }
        lines
    }
}

fn push_line(lines: &mut Vec<Vec<(f64, f64)>>, coordinates: Vec<[f64; 2]>) {
    if coordinates.len() < 2 {
        return;
    }
    lines.push(coordinates.into_iter().map(|[lon, lat]| (lon, lat)).collect());
}
