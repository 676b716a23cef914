//! Definitions of error related things.

use thiserror::Error;

/// Errors of this crate
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PointZipError {
    /// The point format id is not supported
    #[error("Point format {0} is not supported")]
    UnsupportedPointFormat(u8),
    /// A chunk ended before all the records it announces could be decoded,
    /// because bytes were cut off the stream
    #[error("Chunk {chunk} is truncated")]
    TruncatedInput { chunk: usize },
    /// The chunk table (or the trailer / header slot pointing to it)
    /// is not consistent with the stream
    #[error("Chunk table is corrupt: {0}")]
    ChunkTableCorrupt(String),
    /// A field value does not fit the number of bits the point format gives it
    #[error("Value {value} of field '{field}' is out of range (max {max})")]
    FieldValueOutOfRange {
        field: &'static str,
        value: i64,
        max: i64,
    },
    /// The record does not carry the fields the point format requires
    #[error("Record is not compatible with point format {point_format}: {reason}")]
    IncompatibleRecord {
        point_format: u8,
        reason: &'static str,
    },
    /// The record layout has no item, records would be empty
    #[error("Record layout has no items")]
    EmptyRecordLayout,
    /// A fixed chunk size must hold at least one record
    #[error("Invalid chunk size {0}")]
    InvalidChunkSize(u32),
    #[error("Chunk index {index} is out of bounds (chunk count: {count})")]
    ChunkIndexOutOfBounds { index: usize, count: usize },
    /// All records of the stream have been read
    #[error("No more records in the stream")]
    EndOfStream,
    #[error("The len of the buffer ({buffer_len}) is not a multiple of the record size {record_size}")]
    BufferLenNotMultipleOfRecordSize {
        buffer_len: usize,
        record_size: usize,
    },
    /// The byte size of a chunk does not fit in a chunk table entry
    #[error("Chunk of {0} bytes is too large")]
    ChunkTooLarge(usize),
    /// The stream descriptor was written by an unknown version
    #[error("Stream descriptor version {0} is not supported")]
    UnsupportedDescriptorVersion(u16),
    /// The record item type code is not known
    #[error("Item with type code: {0} is unknown")]
    UnknownItemType(u16),
    /// Wrapper around and io error from the std lib
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type of this crate
pub type Result<T> = std::result::Result<T, PointZipError>;
