//! Offline replay of captured logs
//!
//! Restores capture order from file names alone and chains the files
//! into one continuous byte stream, so a whole session replays exactly
//! as it arrived on the wire.

use crate::core::demux::{DemuxError, DemuxStats, Demultiplexer, FrameSink};
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while replaying a log directory
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Log directory could not be enumerated or a file opened
    #[error("replay I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The demultiplexer aborted mid-stream
    #[error(transparent)]
    Demux(#[from] DemuxError),
}

/// Capture files in `dir`, sorted by (run, sequence).
///
/// Only names matching `gps-log-<run>-<seq>-<tag>` qualify; anything
/// else in the directory, the run counter included, is ignored.
pub fn ordered_log_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    // the pattern is fixed, so compilation cannot fail
    let pattern = Regex::new(r"^gps-log-(\d+)-(\d+)-").map_err(|err| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
    })?;

    let mut keyed: Vec<((u64, u64), PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(caps) = pattern.captures(name) else {
            tracing::debug!(name, "skipping non-capture file");
            continue;
        };
        // both groups are all-digit and bounded by the name length
        let run: u64 = caps[1].parse().unwrap_or(u64::MAX);
        let seq: u64 = caps[2].parse().unwrap_or(u64::MAX);
        keyed.push(((run, seq), entry.path()));
    }

    keyed.sort_by_key(|(key, _)| *key);
    Ok(keyed.into_iter().map(|(_, path)| path).collect())
}

/// Replay every capture file in `dir` through one demultiplexer run.
///
/// The files are concatenated in capture order into a single stream;
/// parser state carries across file boundaries, so a frame split by a
/// mid-frame rotation still decodes.
pub fn replay_directory(
    dir: &Path,
    sinks: &mut [&mut dyn FrameSink],
) -> Result<DemuxStats, ReplayError> {
    let files = ordered_log_files(dir)?;
    tracing::info!(count = files.len(), dir = %dir.display(), "replaying capture files");

    let mut readers: Vec<BufReader<File>> = Vec::with_capacity(files.len());
    for path in &files {
        readers.push(BufReader::new(File::open(path)?));
    }

    let chain = readers
        .into_iter()
        .fold(Box::new(std::io::empty()) as Box<dyn std::io::Read>, |acc, r| {
            Box::new(acc.chain(r))
        });

    let mut demux = Demultiplexer::new(chain);
    Ok(demux.run(sinks)?)
}
