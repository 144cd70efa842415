//! Lap-timing engine
//!
//! Connects the per-fix classifier to the crossing and lap state
//! machines and renders results as one line per finish crossing. The
//! engine is a [`FrameSink`], so a demultiplexer run over a recorded
//! stream produces lap times directly.

use crate::core::demux::FrameSink;
use crate::core::protocol::nmea::{self, PositionFix};
use crate::core::protocol::Frame;
use crate::core::track::{CrossingDetector, CrossingPairer, LapRecord, LapTimer, SectorMap};
use std::io::Write;

/// Line printed for a crossing that completes no lap
const NO_LAP_LINE: &str = "----------";

/// Turns classified fixes into lap lines on a writer.
///
/// Output format per finish crossing: `hh:mm:ss m:ss.hh` for a
/// completed lap, or a dashed placeholder when the crossing only seeds
/// or restarts the reference.
pub struct TimingEngine<'a, W: Write> {
    detector: CrossingDetector<'a>,
    pairer: CrossingPairer,
    timer: LapTimer,
    out: W,
    clock_offset_hours: i32,
    laps: Vec<LapRecord>,
}

impl<'a, W: Write> TimingEngine<'a, W> {
    /// Engine over a sector map, writing lap lines to `out`
    pub fn new(map: &'a SectorMap, out: W) -> Self {
        Self {
            detector: CrossingDetector::new(map),
            pairer: CrossingPairer::new(),
            timer: LapTimer::new(),
            out,
            clock_offset_hours: 0,
            laps: Vec::new(),
        }
    }

    /// Shift the printed wall clock by whole hours from UTC
    #[must_use]
    pub fn clock_offset_hours(mut self, hours: i32) -> Self {
        self.clock_offset_hours = hours;
        self
    }

    /// Replace the lap timer, e.g. to change the staleness limit
    #[must_use]
    pub fn lap_timer(mut self, timer: LapTimer) -> Self {
        self.timer = timer;
        self
    }

    /// Laps completed so far, in order
    pub fn laps(&self) -> &[LapRecord] {
        &self.laps
    }

    /// Feed one decoded fix through the full chain
    pub fn process_fix(&mut self, fix: &PositionFix) -> std::io::Result<()> {
        for event in self.detector.classify(fix) {
            let Some(t) = self.pairer.observe(&event) else {
                continue;
            };
            match self.timer.cross(t) {
                Some(lap) => {
                    tracing::info!(
                        start = lap.start_seconds,
                        duration = lap.duration_seconds,
                        "lap completed"
                    );
                    writeln!(
                        self.out,
                        "{} {}",
                        self.wall_clock(t),
                        lap.format_duration()
                    )?;
                    self.laps.push(lap);
                }
                None => writeln!(self.out, "{NO_LAP_LINE}")?,
            }
        }
        Ok(())
    }

    /// Feed one NMEA sentence; non-RMC and void sentences are skipped
    pub fn process_sentence(&mut self, sentence: &str) -> std::io::Result<()> {
        match nmea::parse_rmc(sentence) {
            Some(fix) => self.process_fix(&fix),
            None => Ok(()),
        }
    }

    /// Flush and hand the writer back
    pub fn into_inner(mut self) -> std::io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn wall_clock(&self, seconds_utc: f64) -> String {
        let shifted = seconds_utc + f64::from(self.clock_offset_hours) * 3600.0;
        let total = shifted.rem_euclid(86_400.0) as u64;
        format!(
            "{:02}:{:02}:{:02}",
            total / 3600,
            total / 60 % 60,
            total % 60
        )
    }
}

impl<W: Write> FrameSink for TimingEngine<'_, W> {
    fn accept(&mut self, frame: &Frame, _raw: &[u8], _label: Option<&str>) -> std::io::Result<()> {
        match frame {
            Frame::Nmea { body, .. } => self.process_sentence(body),
            Frame::Ubx { .. } => Ok(()),
        }
    }
}
