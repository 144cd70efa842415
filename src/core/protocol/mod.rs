//! Frame extraction for the two receiver protocols
//!
//! A u-blox receiver interleaves its proprietary UBX binary protocol
//! with standard NMEA 0183 sentences on the same link. Each extractor
//! makes a stateless attempt against a [`ByteCursor`](crate::core::stream::ByteCursor):
//! on success the frame's bytes are committed and a validated [`Frame`]
//! is returned; on any failure nothing is committed and a typed
//! [`FrameError`] explains why.

pub mod nmea;
pub mod ubx;

use thiserror::Error;

/// A validated frame of either protocol.
///
/// Only ever constructed after its checksum has been verified, so a
/// `Frame` in hand is well-formed by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UBX binary frame
    Ubx {
        /// Message class
        class: u8,
        /// Message id within the class
        id: u8,
        /// Payload bytes (checksum already verified)
        payload: Vec<u8>,
        /// The two trailing checksum bytes as read from the wire
        checksum: [u8; 2],
    },
    /// NMEA sentence, full text from `$` through the CRLF terminator
    Nmea {
        /// Sentence text, terminator included
        body: String,
        /// Declared checksum (verified against the body)
        checksum: u8,
    },
}

impl Frame {
    /// Short protocol tag for logging
    pub fn protocol(&self) -> &'static str {
        match self {
            Frame::Ubx { .. } => "ubx",
            Frame::Nmea { .. } => "nmea",
        }
    }

    /// Reconstruct the exact wire representation of this frame.
    ///
    /// Safe to use for verbatim passthrough: the frame validated on the
    /// way in, so re-serialization is byte-identical to the input.
    pub fn wire_bytes(&self) -> Vec<u8> {
        match self {
            Frame::Ubx {
                class,
                id,
                payload,
                checksum,
            } => {
                let mut out = Vec::with_capacity(payload.len() + 8);
                out.extend_from_slice(&[ubx::SYNC_1, ubx::SYNC_2, *class, *id]);
                out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
                out.extend_from_slice(payload);
                out.extend_from_slice(checksum);
                out
            }
            Frame::Nmea { body, .. } => body.as_bytes().to_vec(),
        }
    }
}

/// Why an extraction attempt failed.
///
/// All variants are recoverable: the demultiplexer answers each with a
/// one-byte resync, never by aborting the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The bytes at the cursor do not start a frame of this protocol
    #[error("invalid sync byte")]
    BadSync,

    /// The source ended before the full frame was available
    #[error("stream ended mid-frame (needed {needed} bytes, have {have})")]
    Truncated {
        /// Bytes the frame required
        needed: usize,
        /// Bytes actually available
        have: usize,
    },

    /// UBX Fletcher checksum did not match the trailing bytes
    #[error("UBX checksum mismatch (stored {stored:02x?}, computed {computed:02x?})")]
    UbxChecksum {
        /// Checksum bytes stored in the frame
        stored: [u8; 2],
        /// Checksum recomputed over class..payload
        computed: [u8; 2],
    },

    /// No CRLF terminator within the lookahead window
    #[error("no CRLF terminator within {0} bytes")]
    MissingTerminator(usize),

    /// The `*hh` checksum field is absent or not two hex digits
    #[error("malformed NMEA checksum field")]
    MalformedChecksum,

    /// Declared NMEA checksum does not match the XOR of the body
    #[error("NMEA checksum mismatch (declared {declared:02x}, computed {computed:02x})")]
    NmeaChecksum {
        /// Checksum declared after the `*`
        declared: u8,
        /// XOR recomputed over the sentence body
        computed: u8,
    },

    /// Sentence bytes are not valid UTF-8
    #[error("sentence is not valid UTF-8")]
    NotUtf8,
}
