//! Circuit geometry and lap timing
//!
//! Everything downstream of a decoded position fix: the planar
//! transform, the sector map with its finish line, and the two-stage
//! crossing/lap state machines.

pub mod lap;
pub mod sectors;
pub mod transform;

pub use lap::{format_lap_time, interpolate, CrossingPairer, LapRecord, LapTimer};
pub use sectors::{CrossingDetector, CrossingEvent, FinishLine, FinishSide, Polygon, SectorMap, SectorMapError};
pub use transform::{GeoTransformer, LocalPoint};
