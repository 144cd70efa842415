//! Core module containing the main functionality of Laptrace
//!
//! This module provides:
//! - Buffered lookahead cursor over any byte source
//! - UBX and NMEA 0183 frame extraction with checksum validation
//! - Stream demultiplexing with one-byte resynchronization
//! - Time-bucketed and passthrough output sinks
//! - Serial capture with rotating log files
//! - Ordered replay of captured log directories
//! - Circuit sector maps loaded from GeoJSON
//! - Finish-line crossing detection and lap timing

pub mod capture;
pub mod demux;
pub mod protocol;
pub mod replay;
pub mod stream;
pub mod timing;
pub mod track;
