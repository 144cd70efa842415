//! Circuit sector map and per-fix classification
//!
//! Sectors are loaded once from a GeoJSON feature collection and
//! transformed into local meters up front. Every required sector is a
//! named field after load; a missing name is a fatal configuration
//! error raised before any fix is processed.

use super::transform::{GeoTransformer, LocalPoint};
use crate::core::protocol::nmea::PositionFix;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a sector map.
///
/// All of these are fatal at startup; nothing here is recoverable at
/// runtime.
#[derive(Error, Debug)]
pub enum SectorMapError {
    /// Sector file could not be read
    #[error("failed to read sector file: {0}")]
    Io(#[from] std::io::Error),

    /// Sector file is not a valid GeoJSON feature collection
    #[error("failed to parse sector file: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required named feature is absent
    #[error("required {kind} `{name}` missing from sector file")]
    MissingFeature {
        /// Feature kind, `polygon` or `line`
        kind: &'static str,
        /// Required feature name
        name: &'static str,
    },

    /// The finish line is not a 2-point segment
    #[error("Finish_Line must have exactly 2 points, found {0}")]
    FinishLineShape(usize),

    /// No coordinates at all, so no origin can be fixed
    #[error("sector file contains no coordinates")]
    EmptyGeometry,
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    properties: Properties,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Properties {
    name: String,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon {
        /// Rings of (lon, lat[, elevation]) positions; only the
        /// exterior ring is used and elevation is ignored
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    LineString {
        coordinates: Vec<Vec<f64>>,
    },
    #[serde(other)]
    Other,
}

/// Closed polygon in the local planar frame
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<LocalPoint>,
}

impl Polygon {
    /// Build from pre-transformed points
    pub fn new(points: Vec<LocalPoint>) -> Self {
        Self { points }
    }

    /// Vertices in order
    pub fn points(&self) -> &[LocalPoint] {
        &self.points
    }

    /// Even-odd ray-casting containment test.
    ///
    /// Points exactly on an edge count as outside; the policy is the
    /// same for every polygon in a map.
    pub fn contains(&self, p: LocalPoint) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = self.points.len() - 1;
        for i in 0..self.points.len() {
            let (a, b) = (self.points[i], self.points[j]);
            if (a.y > p.y) != (b.y > p.y)
                && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// The finish line as a directed 2-point segment.
///
/// Convention: the second loaded point is the anchor and the first is
/// the direction point, so `d` runs from anchor to direction point.
/// With that orientation a fix approaching the line through the
/// pre-finish sector sits on the negative side and leaves through the
/// post-finish sector on the positive side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinishLine {
    anchor: LocalPoint,
    direction: LocalPoint,
}

impl FinishLine {
    /// Build from (direction point, anchor) in load order
    pub fn new(direction: LocalPoint, anchor: LocalPoint) -> Self {
        Self { anchor, direction }
    }

    /// Signed perpendicular distance from `p` to the line, in meters.
    ///
    /// The sign encodes which side of the line `p` lies on; it is only
    /// meaningful relative to the orientation fixed at load.
    pub fn signed_distance(&self, p: LocalPoint) -> f64 {
        let dx = self.direction.x - self.anchor.x;
        let dy = self.direction.y - self.anchor.y;
        let vx = p.x - self.anchor.x;
        let vy = p.y - self.anchor.y;
        let cross = dx * vy - dy * vx;
        cross / (dx * dx + dy * dy).sqrt()
    }
}

/// The fully validated circuit geometry, immutable after load
#[derive(Debug, Clone)]
pub struct SectorMap {
    /// Whole track surface
    pub track: Polygon,
    /// Sector immediately before the finish line
    pub pre_finish: Polygon,
    /// Sector immediately after the finish line
    pub post_finish: Polygon,
    /// Pit lane surface
    pub pitlane: Polygon,
    /// Pit lane speed-limit gates
    pub pitlane_gates: Polygon,
    /// Pit entry region
    pub pitlane_entry: Polygon,
    /// Pit exit region
    pub pitlane_exit: Polygon,
    /// Paddock area
    pub paddock: Polygon,
    /// Marker sector opposite the finish line
    pub opposite_marker: Polygon,
    /// The finish line segment
    pub finish_line: FinishLine,
    transformer: GeoTransformer,
}

impl SectorMap {
    /// Load and validate a sector map from a GeoJSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SectorMapError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Load and validate a sector map from GeoJSON text
    pub fn from_json(json: &str) -> Result<Self, SectorMapError> {
        let collection: FeatureCollection = serde_json::from_str(json)?;

        let mut polygons: HashMap<String, Vec<(f64, f64)>> = HashMap::new();
        let mut lines: HashMap<String, Vec<(f64, f64)>> = HashMap::new();
        for feature in collection.features {
            let name = feature.properties.name;
            match feature.geometry {
                Geometry::Polygon { coordinates } => {
                    let ring = coordinates.into_iter().next().unwrap_or_default();
                    tracing::debug!(name, points = ring.len(), "loaded polygon");
                    polygons.insert(name, lon_lat_pairs(ring));
                }
                Geometry::LineString { coordinates } => {
                    tracing::debug!(name, points = coordinates.len(), "loaded line");
                    lines.insert(name, lon_lat_pairs(coordinates));
                }
                Geometry::Other => {
                    tracing::debug!(name, "skipping unsupported geometry type");
                }
            }
        }

        let transformer = GeoTransformer::from_geometry(
            polygons
                .values()
                .chain(lines.values())
                .flatten()
                .copied(),
        )
        .ok_or(SectorMapError::EmptyGeometry)?;

        let mut take = |name: &'static str| -> Result<Polygon, SectorMapError> {
            let raw = polygons
                .remove(name)
                .ok_or(SectorMapError::MissingFeature {
                    kind: "polygon",
                    name,
                })?;
            Ok(Polygon::new(
                raw.into_iter()
                    .map(|(lon, lat)| transformer.to_local(lon, lat))
                    .collect(),
            ))
        };

        let track = take("Track")?;
        let pre_finish = take("PreFinish_Sector")?;
        let post_finish = take("PostFinish_Sector")?;
        let pitlane = take("Pitlane")?;
        let pitlane_gates = take("Pitlane_Gates")?;
        let pitlane_entry = take("Pitlane_entry")?;
        let pitlane_exit = take("Pitlane_Exit")?;
        let paddock = take("Paddock")?;
        let opposite_marker = take("Opposite_Marker")?;

        let finish_raw = lines
            .remove("Finish_Line")
            .ok_or(SectorMapError::MissingFeature {
                kind: "line",
                name: "Finish_Line",
            })?;
        if finish_raw.len() != 2 {
            return Err(SectorMapError::FinishLineShape(finish_raw.len()));
        }
        let direction = transformer.to_local(finish_raw[0].0, finish_raw[0].1);
        let anchor = transformer.to_local(finish_raw[1].0, finish_raw[1].1);

        Ok(Self {
            track,
            pre_finish,
            post_finish,
            pitlane,
            pitlane_gates,
            pitlane_entry,
            pitlane_exit,
            paddock,
            opposite_marker,
            finish_line: FinishLine::new(direction, anchor),
            transformer,
        })
    }

    /// The transform shared by the geometry and every live fix
    pub fn transformer(&self) -> &GeoTransformer {
        &self.transformer
    }
}

fn lon_lat_pairs(positions: Vec<Vec<f64>>) -> Vec<(f64, f64)> {
    positions
        .into_iter()
        .filter_map(|pos| match pos.as_slice() {
            [lon, lat, ..] => Some((*lon, *lat)),
            _ => None,
        })
        .collect()
}

/// Which finish-adjacent sector a fix was classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishSide {
    /// Fix inside `PreFinish_Sector`
    PreFinish,
    /// Fix inside `PostFinish_Sector`
    PostFinish,
}

impl FinishSide {
    /// The sector feature name this side corresponds to
    pub fn sector_name(self) -> &'static str {
        match self {
            FinishSide::PreFinish => "PreFinish_Sector",
            FinishSide::PostFinish => "PostFinish_Sector",
        }
    }
}

/// A fix observed inside a finish-adjacent sector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossingEvent {
    /// Which sector the fix fell in
    pub side: FinishSide,
    /// Fix time, seconds since UTC midnight
    pub seconds_utc: f64,
    /// Signed perpendicular distance to the finish line, meters
    pub signed_distance_m: f64,
}

/// Classifies fixes against the finish-adjacent sectors of one map
pub struct CrossingDetector<'a> {
    map: &'a SectorMap,
}

impl<'a> CrossingDetector<'a> {
    /// Borrow the map; the detector itself is stateless
    pub fn new(map: &'a SectorMap) -> Self {
        Self { map }
    }

    /// Classify one fix, yielding at most one event per sector.
    ///
    /// Fixes outside both finish-adjacent sectors produce nothing and
    /// cost no distance computation.
    pub fn classify(&self, fix: &PositionFix) -> Vec<CrossingEvent> {
        let p = self
            .map
            .transformer()
            .to_local(fix.longitude, fix.latitude);

        let pre = self.map.pre_finish.contains(p);
        let post = self.map.post_finish.contains(p);
        if !pre && !post {
            return Vec::new();
        }

        let signed_distance_m = self.map.finish_line.signed_distance(p);
        let mut events = Vec::with_capacity(2);
        if pre {
            events.push(CrossingEvent {
                side: FinishSide::PreFinish,
                seconds_utc: fix.seconds_utc,
                signed_distance_m,
            });
        }
        if post {
            events.push(CrossingEvent {
                side: FinishSide::PostFinish,
                seconds_utc: fix.seconds_utc,
                signed_distance_m,
            });
        }
        events
    }
}
