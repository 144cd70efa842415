//! Geodetic to local planar transform
//!
//! An equirectangular approximation around an origin fixed at sector
//! load time. Accurate over the extent of a single circuit; not a
//! general-purpose projection.

/// Meters per degree of longitude at the equator
const METERS_PER_DEG_LON: f64 = 111_320.0;
/// Meters per degree of latitude
const METERS_PER_DEG_LAT: f64 = 111_319.0;

/// A point in the local planar frame, in meters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalPoint {
    /// Easting in meters from the origin
    pub x: f64,
    /// Northing in meters from the origin
    pub y: f64,
}

impl LocalPoint {
    /// Construct from components
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Maps geodetic coordinates into the local planar frame.
///
/// The origin is the component-wise minimum (longitude, latitude) over
/// the loaded sector geometry and never moves afterwards; every sector
/// vertex and every live fix goes through the same instance, so
/// containment and distance tests share one consistent frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransformer {
    origin_lon: f64,
    origin_lat: f64,
}

impl GeoTransformer {
    /// Fix the origin at the minimum longitude/latitude of `coords`.
    ///
    /// Returns `None` for an empty coordinate set.
    pub fn from_geometry(coords: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut origin: Option<(f64, f64)> = None;
        for (lon, lat) in coords {
            let (min_lon, min_lat) = origin.get_or_insert((lon, lat));
            if lon < *min_lon {
                *min_lon = lon;
            }
            if lat < *min_lat {
                *min_lat = lat;
            }
        }
        origin.map(|(origin_lon, origin_lat)| Self {
            origin_lon,
            origin_lat,
        })
    }

    /// Transform (longitude, latitude) degrees into local meters.
    ///
    /// Returns a new value; the input coordinates are never mutated.
    pub fn to_local(&self, lon: f64, lat: f64) -> LocalPoint {
        LocalPoint {
            x: (lon - self.origin_lon) * METERS_PER_DEG_LON * lat.to_radians().cos(),
            y: (lat - self.origin_lat) * METERS_PER_DEG_LAT,
        }
    }
}
