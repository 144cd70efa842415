//! Serial capture and log rotation
//!
//! Reads raw receiver output from a serial port and appends it verbatim
//! to rotating files, one per wall-clock 5-minute tag. No parsing
//! happens here; capture must keep up with the port and never lose
//! bytes to a decode stall. A persistent run counter in the log
//! directory keeps file names unique across restarts.

use crate::core::protocol::ubx;
use chrono::Local;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Receiver setup commands, sync and header included, checksum appended
/// at send time.
///
/// UART1 to UBX in/out at 115200 baud.
const INIT_UART: &str = "B5620600140001000000D008000000C201000700030000000000";

/// Raw-measurement setup: TRK-SFRBX, TRK-MEAS, NAV-CLOCK, NAV-SVINFO,
/// then the 200 ms (5 Hz) measurement rate.
const INIT_RAW: [&str; 5] = [
    "B56206010300030F01",
    "B56206010300031001",
    "B56206010300012201",
    "B56206010300013001",
    "B56206080600FA0001000100",
];

/// Name of the persistent run counter inside the log directory
const RUN_ID_FILE: &str = ".runid";

/// Errors raised during capture
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Serial port could not be opened or configured
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Log directory or file I/O failed
    #[error("capture I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A built-in setup command is not valid hex
    #[error("malformed setup command: {0}")]
    BadCommand(#[from] hex::FromHexError),
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Serial device path, e.g. `/dev/ttyS2`
    pub device: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Directory receiving log files and the run counter
    pub log_dir: PathBuf,
    /// Send the raw-measurement setup commands after opening
    pub enable_raw: bool,
}

impl CaptureConfig {
    /// Config for a device at the receiver's 115200 baud
    pub fn new(device: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            baud_rate: 115_200,
            log_dir: log_dir.into(),
            enable_raw: true,
        }
    }
}

/// Read, increment and persist the run counter.
///
/// A missing or unreadable counter restarts numbering at 1; losing the
/// counter must never block a capture session.
pub fn next_run_id(log_dir: &Path) -> std::io::Result<u32> {
    let path = log_dir.join(RUN_ID_FILE);
    let previous = match std::fs::read_to_string(&path) {
        Ok(text) => text.trim().parse().unwrap_or(0),
        Err(err) => {
            tracing::warn!(%err, path = %path.display(), "run counter unreadable, restarting at 0");
            0
        }
    };
    let run_id = previous + 1;
    std::fs::write(&path, run_id.to_string())?;
    Ok(run_id)
}

/// Appends captured bytes to one file per wall-clock tag.
///
/// Files are named `gps-log-<run>-<seq>-<tag>.txt`; the sequence number
/// increments on every switch so replay can restore capture order by
/// name alone.
pub struct RotatingLogWriter {
    dir: PathBuf,
    run_id: u32,
    file_seq: u32,
    current: Option<(String, File)>,
}

impl RotatingLogWriter {
    /// Writer for one capture run
    pub fn new(dir: impl Into<PathBuf>, run_id: u32) -> Self {
        Self {
            dir: dir.into(),
            run_id,
            file_seq: 0,
            current: None,
        }
    }

    /// Switch the target file when `tag` changes; a no-op otherwise
    pub fn switch(&mut self, tag: &str) -> std::io::Result<()> {
        if matches!(&self.current, Some((open, _)) if open == tag) {
            return Ok(());
        }
        let path = self
            .dir
            .join(format!("gps-log-{}-{}-{}.txt", self.run_id, self.file_seq, tag));
        tracing::info!(path = %path.display(), "switched capture file");
        let file = File::create(&path)?;
        self.current = Some((tag.to_string(), file));
        self.file_seq += 1;
        Ok(())
    }

    /// Append and flush immediately; a power cut loses at most the
    /// bytes of the current write.
    pub fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        match &mut self.current {
            Some((_, file)) => {
                file.write_all(data)?;
                file.flush()
            }
            None => Err(std::io::Error::new(
                ErrorKind::NotFound,
                "no capture file open",
            )),
        }
    }
}

/// Decode a built-in setup command and append its checksum
fn setup_frame(cmd: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let mut frame = hex::decode(cmd)?;
    let ck = ubx::checksum(&frame[2..]);
    frame.extend_from_slice(&ck);
    Ok(frame)
}

fn send_setup<W: Write + ?Sized>(port: &mut W, enable_raw: bool) -> Result<(), CaptureError> {
    let mut commands = vec![INIT_UART];
    if enable_raw {
        commands.extend(INIT_RAW);
    }
    for cmd in commands {
        let frame = setup_frame(cmd)?;
        tracing::debug!(frame = %hex::encode(&frame), "sending setup command");
        port.write_all(&frame)?;
    }
    Ok(())
}

/// Install a Ctrl-C handler and return the shared stop flag
pub fn stop_flag() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let flag = Arc::new(AtomicBool::new(false));
    let handle = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        tracing::info!("stop requested");
        handle.store(true, Ordering::SeqCst);
    })?;
    Ok(flag)
}

/// Capture until the stop flag is raised.
///
/// The port is reopened from scratch whenever the receiver stops
/// producing bytes; a capture session should survive a receiver
/// power-cycle unattended.
pub fn run(config: &CaptureConfig, stop: &AtomicBool) -> Result<(), CaptureError> {
    let run_id = next_run_id(&config.log_dir)?;
    tracing::info!(run_id, device = %config.device, "capture started");

    let mut writer = RotatingLogWriter::new(&config.log_dir, run_id);
    let mut buffer = vec![0u8; 4096];

    while !stop.load(Ordering::SeqCst) {
        let mut port = serialport::new(&config.device, config.baud_rate)
            .timeout(Duration::from_secs(1))
            .open()?;
        send_setup(&mut *port, config.enable_raw)?;

        while !stop.load(Ordering::SeqCst) {
            let tag = Local::now().format("%Y-%m-%dT%H.%M").to_string();
            writer.switch(&tag)?;

            match port.read(&mut buffer) {
                Ok(0) => {
                    tracing::error!("no data received, reopening port");
                    break;
                }
                Ok(n) => writer.write(&buffer[..n])?,
                Err(err) if err.kind() == ErrorKind::TimedOut => {
                    tracing::error!("read timed out, reopening port");
                    break;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::error!(%err, "read failed, reopening port");
                    break;
                }
            }
        }
    }

    tracing::info!(run_id, "capture stopped");
    Ok(())
}
