//! Stream demultiplexer
//!
//! Drives extraction attempts against the cursor and dispatches each
//! validated frame to the configured sinks. A failed attempt advances
//! exactly one byte and retries, so every iteration makes forward
//! progress and any finite input terminates, at the cost of discarding
//! one misaligned byte per resync step.

use crate::core::protocol::{nmea, ubx, Frame};
use crate::core::stream::ByteCursor;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Error raised while running the demultiplexer.
///
/// Parse failures are not errors at this level; only sink I/O aborts
/// the run.
#[derive(Error, Debug)]
pub enum DemuxError {
    /// A sink failed to accept a frame
    #[error("sink write failed: {0}")]
    Sink(#[from] std::io::Error),
}

/// Counters for one demultiplexer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    /// Validated UBX frames dispatched
    pub ubx_frames: u64,
    /// Validated NMEA sentences dispatched
    pub nmea_sentences: u64,
    /// One-byte resync steps taken
    pub resyncs: u64,
}

/// Receiver for validated frames.
///
/// `raw` is the exact wire representation; `label` is the current
/// time-bucket label, absent until the first decodable RMC sentence.
pub trait FrameSink {
    /// Accept one dispatched frame
    fn accept(&mut self, frame: &Frame, raw: &[u8], label: Option<&str>) -> std::io::Result<()>;
}

/// Byte-oriented demultiplexer over one stream.
///
/// Owns the cursor and the retained bucket label; sinks are passed per
/// run so the caller keeps ownership of its outputs.
pub struct Demultiplexer<R: Read> {
    cursor: ByteCursor<R>,
    bucket_label: Option<String>,
    stats: DemuxStats,
}

impl<R: Read> Demultiplexer<R> {
    /// Create a demultiplexer over a fresh byte source
    pub fn new(source: R) -> Self {
        Self {
            cursor: ByteCursor::new(source),
            bucket_label: None,
            stats: DemuxStats::default(),
        }
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> DemuxStats {
        self.stats
    }

    /// Process the stream to exhaustion, dispatching to `sinks`.
    ///
    /// One frame decision per iteration: a leading `$` selects the NMEA
    /// extractor, anything else the UBX extractor. Either the attempt
    /// succeeds and commits a whole frame, or the stream slides one
    /// byte forward.
    pub fn run(&mut self, sinks: &mut [&mut dyn FrameSink]) -> Result<DemuxStats, DemuxError> {
        while !self.cursor.eof() {
            let attempt = if self.cursor.lookup(1) == b"$" {
                nmea::extract(&mut self.cursor)
            } else {
                ubx::extract(&mut self.cursor)
            };

            match attempt {
                Ok(frame) => self.dispatch(&frame, sinks)?,
                Err(reason) => {
                    tracing::debug!(
                        offset = self.cursor.offset(),
                        %reason,
                        "sliding one byte forward for next try"
                    );
                    self.stats.resyncs += 1;
                    self.cursor.commit(1);
                }
            }
        }

        tracing::info!(
            ubx = self.stats.ubx_frames,
            nmea = self.stats.nmea_sentences,
            resyncs = self.stats.resyncs,
            "stream exhausted"
        );
        Ok(self.stats)
    }

    fn dispatch(
        &mut self,
        frame: &Frame,
        sinks: &mut [&mut dyn FrameSink],
    ) -> Result<(), DemuxError> {
        tracing::trace!(protocol = frame.protocol(), "dispatching frame");
        match frame {
            Frame::Ubx { .. } => self.stats.ubx_frames += 1,
            Frame::Nmea { body, .. } => {
                self.stats.nmea_sentences += 1;
                // Only RMC sentences carry the date; the label sticks
                // across every other frame until the next RMC.
                if let Some(fix) = nmea::parse_rmc(body) {
                    self.bucket_label = Some(nmea::bucket_label(&fix));
                }
            }
        }

        let raw = frame.wire_bytes();
        for sink in sinks.iter_mut() {
            sink.accept(frame, &raw, self.bucket_label.as_deref())?;
        }
        Ok(())
    }
}

/// Writes every frame verbatim to one combined output
pub struct PassthroughSink<W: Write> {
    writer: W,
}

impl<W: Write> PassthroughSink<W> {
    /// Wrap a writer as a combined passthrough output
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Flush and hand the writer back
    pub fn into_inner(mut self) -> std::io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> FrameSink for PassthroughSink<W> {
    fn accept(&mut self, _frame: &Frame, raw: &[u8], _label: Option<&str>) -> std::io::Result<()> {
        self.writer.write_all(raw)
    }
}

/// Bucket used before the first RMC sentence fixes a label
const UNKEYED_BUCKET: &str = "unkeyed";

/// Routes frames into one file per time-bucket label.
///
/// Files are named `gps-log-<label>.bin` inside the target directory
/// and switched whenever the label changes.
pub struct BucketedSink {
    dir: PathBuf,
    current: Option<(String, BufWriter<File>)>,
}

impl BucketedSink {
    /// Create a sink routing into `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: None,
        }
    }

    fn switch(&mut self, label: &str) -> std::io::Result<()> {
        if matches!(&self.current, Some((tag, _)) if tag == label) {
            return Ok(());
        }
        if let Some((_, mut writer)) = self.current.take() {
            writer.flush()?;
        }
        let path = self.dir.join(format!("gps-log-{label}.bin"));
        tracing::info!(path = %path.display(), "switched bucket file");
        let file = File::options().create(true).append(true).open(&path)?;
        self.current = Some((label.to_string(), BufWriter::new(file)));
        Ok(())
    }

    /// Flush the open bucket, if any
    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some((_, writer)) = &mut self.current {
            writer.flush()?;
        }
        Ok(())
    }
}

impl FrameSink for BucketedSink {
    fn accept(&mut self, _frame: &Frame, raw: &[u8], label: Option<&str>) -> std::io::Result<()> {
        self.switch(label.unwrap_or(UNKEYED_BUCKET))?;
        match &mut self.current {
            Some((_, writer)) => writer.write_all(raw),
            None => unreachable!("switch always leaves an open bucket"),
        }
    }
}

impl Drop for BucketedSink {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
