//! NMEA 0183 sentence extraction and RMC decoding
//!
//! Extraction validates the XOR checksum declared after the `*` and
//! returns the sentence verbatim, CRLF included. Decoding only knows
//! about RMC (Recommended Minimum Navigation Information), which is the
//! one sentence the lap-timing engine needs: UTC time and date,
//! position, speed and course over ground.

use super::{Frame, FrameError};
use crate::core::stream::ByteCursor;
use chrono::NaiveDate;
use std::io::Read;

/// Fixed lookahead window for the CRLF terminator
pub const LOOKAHEAD_WINDOW: usize = 128;

/// One knot in meters per second
const KNOTS_TO_MPS: f64 = 1852.0 / 3600.0;

/// XOR checksum over the sentence body (bytes strictly between `$` and `*`)
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Attempt to extract one NMEA sentence at the cursor position.
///
/// Looks ahead a fixed 128-byte window for the CRLF terminator; the
/// checksum field is the `*` plus two hex digits sitting 3 bytes before
/// the terminator. On success the sentence is committed through the
/// CRLF; on any failure nothing is committed.
pub fn extract<R: Read>(cursor: &mut ByteCursor<R>) -> Result<Frame, FrameError> {
    let window = cursor.lookup(LOOKAHEAD_WINDOW);
    if window.first() != Some(&b'$') {
        return Err(FrameError::BadSync);
    }

    let end = window
        .windows(2)
        .position(|pair| pair == b"\r\n")
        .ok_or(FrameError::MissingTerminator(LOOKAHEAD_WINDOW))?
        + 2;

    let line = &window[..end];
    if end < 6 || line[end - 5] != b'*' {
        return Err(FrameError::MalformedChecksum);
    }

    let declared = std::str::from_utf8(&line[end - 4..end - 2])
        .ok()
        .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        .ok_or(FrameError::MalformedChecksum)?;

    let computed = checksum(&line[1..end - 5]);
    if computed != declared {
        return Err(FrameError::NmeaChecksum { declared, computed });
    }

    let body = std::str::from_utf8(line)
        .map_err(|_| FrameError::NotUtf8)?
        .to_string();
    cursor.commit(end);
    Ok(Frame::Nmea {
        body,
        checksum: declared,
    })
}

/// A validated position fix decoded from an RMC sentence
#[derive(Debug, Clone, PartialEq)]
pub struct PositionFix {
    /// UTC date of the fix
    pub date: NaiveDate,
    /// Seconds since UTC midnight, with fractional part
    pub seconds_utc: f64,
    /// Signed decimal degrees, south negative
    pub latitude: f64,
    /// Signed decimal degrees, west negative
    pub longitude: f64,
    /// Speed over ground in meters per second
    pub speed_mps: f64,
    /// Course over ground in degrees, when reported
    pub heading: Option<f64>,
}

/// Decode an RMC sentence into a [`PositionFix`].
///
/// Returns `None` for any non-RMC sentence, for a void (`V`) fix, and
/// for any sentence whose mandatory fields fail to parse. Parse
/// failures here are expected stream content, not errors.
pub fn parse_rmc(sentence: &str) -> Option<PositionFix> {
    let line = sentence.trim_end();
    let star = line.rfind('*')?;
    let data = line.get(1..star)?;
    let fields: Vec<&str> = data.split(',').collect();

    let tag = fields.first()?;
    if tag.len() != 5 || !tag.ends_with("RMC") {
        return None;
    }
    if fields.get(2).copied() != Some("A") {
        return None;
    }

    let seconds_utc = parse_time(fields.get(1)?)?;
    let latitude = parse_coordinate(fields.get(3)?, fields.get(4)?)?;
    let longitude = parse_coordinate(fields.get(5)?, fields.get(6)?)?;
    let speed_mps = fields.get(7)?.parse::<f64>().ok()? * KNOTS_TO_MPS;
    let heading = fields
        .get(8)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok());
    let date = parse_date(fields.get(9)?)?;

    Some(PositionFix {
        date,
        seconds_utc,
        latitude,
        longitude,
        speed_mps,
        heading,
    })
}

/// Routing label for a fix: reformatted date, hour, minute floored to 5.
///
/// `2021-01-31T14.35` covers every fix between 14:35:00 and 14:39:59 UTC
/// on that date.
pub fn bucket_label(fix: &PositionFix) -> String {
    let hours = (fix.seconds_utc / 3600.0) as u32;
    let minutes = ((fix.seconds_utc / 60.0) as u32) % 60;
    format!(
        "{}T{:02}.{:02}",
        fix.date.format("%Y-%m-%d"),
        hours,
        minutes / 5 * 5
    )
}

/// Parse `hhmmss.ss` into seconds since midnight
fn parse_time(s: &str) -> Option<f64> {
    if s.len() < 6 || !s.is_ascii() {
        return None;
    }
    let hours: u32 = s.get(0..2)?.parse().ok()?;
    let minutes: u32 = s.get(2..4)?.parse().ok()?;
    let seconds: f64 = s.get(4..)?.parse().ok()?;
    Some(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + seconds)
}

/// Parse `ddmm.mmmm`/`dddmm.mmmm` plus hemisphere into signed degrees
fn parse_coordinate(value: &str, hemisphere: &str) -> Option<f64> {
    if value.is_empty() {
        return None;
    }
    let raw: f64 = value.parse().ok()?;
    let degrees = (raw / 100.0).floor();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;

    match hemisphere {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}

/// Parse `ddmmyy`, assuming 2000s for two-digit years up to 80
fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 6 || !s.is_ascii() {
        return None;
    }
    let day: u32 = s.get(0..2)?.parse().ok()?;
    let month: u32 = s.get(2..4)?.parse().ok()?;
    let year: i32 = s.get(4..6)?.parse().ok()?;
    let full_year = if year > 80 { 1900 + year } else { 2000 + year };
    NaiveDate::from_ymd_opt(full_year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const RMC: &str = "$GPRMC,123519.00,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*77\r\n";

    fn cursor_over(data: &[u8]) -> ByteCursor<Cursor<Vec<u8>>> {
        ByteCursor::new(Cursor::new(data.to_vec()))
    }

    /// Build a sentence with a correct checksum from its body
    fn sentence(body: &str) -> String {
        format!("${}*{:02X}\r\n", body, checksum(body.as_bytes()))
    }

    #[test]
    fn test_checksum_reference_vector() {
        let body = b"GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,47.0,M,,";
        assert_eq!(checksum(body), 0x47);
    }

    #[test]
    fn test_extract_valid_sentence() {
        let text = sentence("GPRMC,094509.00,A,5231.201,N,01323.313,E,12.5,81.2,310121,,");
        let mut cur = cursor_over(text.as_bytes());

        let frame = extract(&mut cur).expect("valid sentence");
        match &frame {
            Frame::Nmea { body, .. } => assert_eq!(body, &text),
            other => panic!("expected NMEA frame, got {other:?}"),
        }
        assert_eq!(cur.offset() as usize, text.len());
        assert_eq!(frame.wire_bytes(), text.as_bytes());
    }

    #[test]
    fn test_missing_crlf_commits_nothing() {
        let mut data = vec![b'$'];
        data.extend(std::iter::repeat(b'A').take(LOOKAHEAD_WINDOW));
        let mut cur = cursor_over(&data);

        assert_eq!(
            extract(&mut cur),
            Err(FrameError::MissingTerminator(LOOKAHEAD_WINDOW))
        );
        assert_eq!(cur.offset(), 0);
    }

    #[test]
    fn test_corrupted_body_byte_changes_checksum() {
        let good = sentence("GPRMC,094509.00,A,5231.201,N,01323.313,E,12.5,81.2,310121,,");
        let mut corrupted = good.clone().into_bytes();
        corrupted[10] ^= 0x01;
        let mut cur = cursor_over(&corrupted);

        assert!(matches!(
            extract(&mut cur),
            Err(FrameError::NmeaChecksum { .. })
        ));
        assert_eq!(cur.offset(), 0);
    }

    #[test]
    fn test_malformed_checksum_hex() {
        let mut cur = cursor_over(b"$GPRMC,1,A*ZZ\r\n");
        assert_eq!(extract(&mut cur), Err(FrameError::MalformedChecksum));
        assert_eq!(cur.offset(), 0);
    }

    #[test]
    fn test_parse_rmc_full_sentence() {
        let fix = parse_rmc(RMC).expect("valid RMC");
        assert_eq!(fix.date, NaiveDate::from_ymd_opt(1994, 3, 23).unwrap());
        assert!((fix.seconds_utc - (12.0 * 3600.0 + 35.0 * 60.0 + 19.0)).abs() < 1e-9);
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((fix.longitude - 11.5166).abs() < 1e-4);
        assert!((fix.speed_mps - 22.4 * KNOTS_TO_MPS).abs() < 1e-9);
        assert_eq!(fix.heading, Some(84.4));
    }

    #[test]
    fn test_parse_rmc_void_fix_rejected() {
        let void = RMC.replace(",A,", ",V,");
        assert!(parse_rmc(&void).is_none());
    }

    #[test]
    fn test_parse_rmc_ignores_other_sentences() {
        assert!(parse_rmc("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,47.0,M,,*47\r\n")
            .is_none());
    }

    #[test]
    fn test_southern_western_hemispheres_negative() {
        let body = "GNRMC,010203.00,A,3352.530,S,15112.360,W,0.0,,150621,,";
        let fix = parse_rmc(&sentence(body)).expect("valid RMC");
        assert!(fix.latitude < 0.0);
        assert!(fix.longitude < 0.0);
    }

    #[test]
    fn test_bucket_label_floors_to_five_minutes() {
        let fix = PositionFix {
            date: NaiveDate::from_ymd_opt(2021, 1, 31).unwrap(),
            seconds_utc: 14.0 * 3600.0 + 39.0 * 60.0 + 58.5,
            latitude: 0.0,
            longitude: 0.0,
            speed_mps: 0.0,
            heading: None,
        };
        assert_eq!(bucket_label(&fix), "2021-01-31T14.35");
    }
}
