//! UBX binary frame extraction
//!
//! Wire format: `B5 62 | class | id | length:u16 LE | payload | CK_A CK_B`.
//! The Fletcher checksum accumulates from the class byte through the end
//! of the payload; the sync bytes are excluded.

use super::{Frame, FrameError};
use crate::core::stream::ByteCursor;
use std::io::Read;

/// First sync byte
pub const SYNC_1: u8 = 0xB5;
/// Second sync byte
pub const SYNC_2: u8 = 0x62;

/// Sync + class + id + length
const HEADER_LEN: usize = 6;
/// Header plus the two trailing checksum bytes
const FRAME_OVERHEAD: usize = 8;

/// Fletcher checksum over `class..end-of-payload`, byte by byte
pub fn checksum(data: &[u8]) -> [u8; 2] {
    let mut ck_a: u8 = 0;
    let mut ck_b: u8 = 0;
    for &byte in data {
        ck_a = ck_a.wrapping_add(byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    [ck_a, ck_b]
}

/// Build a complete frame from class, id and payload
pub fn encode(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    out.extend_from_slice(&[SYNC_1, SYNC_2, class, id]);
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    let ck = checksum(&out[2..]);
    out.extend_from_slice(&ck);
    out
}

/// Attempt to extract one UBX frame at the cursor position.
///
/// On success the whole frame is committed. On any failure nothing is
/// committed, leaving the resync decision to the caller.
pub fn extract<R: Read>(cursor: &mut ByteCursor<R>) -> Result<Frame, FrameError> {
    let header = cursor.lookup(HEADER_LEN);
    if header.len() < 2 || header[0] != SYNC_1 || header[1] != SYNC_2 {
        return Err(FrameError::BadSync);
    }
    if header.len() < HEADER_LEN {
        return Err(FrameError::Truncated {
            needed: HEADER_LEN,
            have: header.len(),
        });
    }

    let payload_len = u16::from_le_bytes([header[4], header[5]]) as usize;
    let frame_len = payload_len + FRAME_OVERHEAD;

    let frame = cursor.lookup(frame_len);
    if frame.len() < frame_len {
        return Err(FrameError::Truncated {
            needed: frame_len,
            have: frame.len(),
        });
    }

    let computed = checksum(&frame[2..frame_len - 2]);
    let stored = [frame[frame_len - 2], frame[frame_len - 1]];
    if computed != stored {
        return Err(FrameError::UbxChecksum { stored, computed });
    }

    let extracted = Frame::Ubx {
        class: frame[2],
        id: frame[3],
        payload: frame[6..frame_len - 2].to_vec(),
        checksum: stored,
    };
    cursor.commit(frame_len);
    Ok(extracted)
}
