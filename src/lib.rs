//! # Laptrace Core Library
//!
//! A GNSS telemetry toolkit for trackday lap timing:
//! - Capture raw u-blox receiver output from a serial port
//! - Demultiplex mixed UBX/NMEA byte streams, junk included
//! - Split streams into 5-minute buckets keyed by GPS time
//! - Classify fixes against a GeoJSON circuit map
//! - Interpolate finish-line crossings into lap times
//!
//! ## Example
//!
//! ```rust,no_run
//! use laptrace_core::{Demultiplexer, SectorMap, TimingEngine};
//!
//! fn main() -> anyhow::Result<()> {
//!     let map = SectorMap::from_path("track.json")?;
//!     let mut engine = TimingEngine::new(&map, std::io::stdout());
//!
//!     let stream = std::fs::File::open("gps-log-1-0-2021-01-31T14.35.txt")?;
//!     let mut demux = Demultiplexer::new(stream);
//!     demux.run(&mut [&mut engine])?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod core;

// Re-exports for convenience
pub use crate::core::capture::{CaptureConfig, CaptureError, RotatingLogWriter};
pub use crate::core::demux::{BucketedSink, DemuxStats, Demultiplexer, FrameSink, PassthroughSink};
pub use crate::core::protocol::nmea::PositionFix;
pub use crate::core::protocol::{Frame, FrameError};
pub use crate::core::replay::{ordered_log_files, replay_directory, ReplayError};
pub use crate::core::stream::ByteCursor;
pub use crate::core::timing::TimingEngine;
pub use crate::core::track::{
    CrossingDetector, CrossingEvent, FinishLine, FinishSide, GeoTransformer, LapRecord, LapTimer,
    LocalPoint, SectorMap, SectorMapError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
