use super::fourcc::FourCC;
use std::io;
use thiserror::Error;

/// Errors returned by methods in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An `io::Error` occurred
    #[error("I/O error: {0}")]
    IOError(#[from] io::Error),

    /// An error occured reading a format GUID
    #[error("bad format GUID: {0}")]
    UuidError(#[from] uuid::Error),

    /// The file does not begin with a tag this reader recognizes
    #[error("unrecognized magic {found:?}")]
    InvalidMagic { found: FourCC },

    /// The byte-order mark is neither `FE FF` nor `FF FE`
    #[error("invalid byte-order mark 0x{0:04X}")]
    InvalidByteOrderMark(u16),

    /// A read ran past the end of the buffer
    #[error("truncated data: wanted {wanted} bytes at 0x{at:X}, {available} available")]
    TruncatedData { at: u64, wanted: u64, available: u64 },

    /// The audio encoding cannot be handled by the requested operation
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// A reference carries the wrong identifier or points outside
    /// the buffer
    #[error("malformed reference 0x{identifier:04X} at offset 0x{offset:X}: {reason}")]
    MalformedReference {
        identifier: u16,
        offset: u64,
        reason: &'static str,
    },

    /// The model cannot be laid out as a valid file
    #[error("inconsistent layout: {0}")]
    InconsistentLayout(String),

    /// The external ADPCM tool failed
    #[error("external codec failed: {0}")]
    Codec(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Track,
    Channel,
}

/// A record inside a larger container that failed to parse and was left
/// out of the decoded model.
#[derive(Debug)]
pub struct SkippedRecord {
    pub kind: RecordKind,
    pub index: usize,
    pub error: Error,
}
