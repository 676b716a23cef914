//! Chunked streaming compression of LIDAR point records.
//!
//! Records are compressed with adaptive arithmetic coding: every field is
//! predicted from the fields of the previous records and only the
//! corrections are coded. Records are grouped in chunks that can each be
//! decoded on their own, a chunk table written at the end of the stream
//! allows to go to any chunk directly.
//!
//! The point formats 0 to 10 of the LAS specification are supported,
//! as well as custom layouts of integer fields.
//!
//! # Record at a time
//!
//! ```
//! use pointzip::{open_for_reading, open_for_writing, PointRecord, PointZipError};
//!
//! # fn main() -> Result<(), PointZipError> {
//! let mut writer = open_for_writing(1, 5_000)?;
//! let record = PointRecord {
//!     x: 1,
//!     y: 2,
//!     z: 3,
//!     gps_time: Some(42.0),
//!     ..Default::default()
//! };
//! writer.write_record(&record)?;
//! let compressed = writer.close_and_finalize()?;
//!
//! let mut reader = open_for_reading(&compressed, 1)?;
//! assert_eq!(reader.read_record()?, Some(record));
//! # Ok(())
//! # }
//! ```
//!
//! # Buffer at a time
//!
//! The [`ChunkedWriter`] and [`ChunkedReader`] work on records in their packed form,
//! their [`StreamConfig`] holds the layout of the records and the way the stream is cut in chunks.
//!
//! ```
//! use pointzip::{
//!     ChunkedReader, ChunkedWriter, IntegerWidth, PointZipError, Predictor,
//!     RecordLayoutBuilder, StreamConfig,
//! };
//!
//! # fn main() -> Result<(), PointZipError> {
//! let layout = RecordLayoutBuilder::new()
//!     .add_integer(IntegerWidth::I32, Predictor::Linear)
//!     .add_integer(IntegerWidth::U16, Predictor::Previous)
//!     .build();
//! let config = StreamConfig::builder(layout)
//!     .with_fixed_chunk_size(100)
//!     .with_context_carry(true)
//!     .build()?;
//!
//! let records = vec![7u8; 6 * 250];
//! let mut writer = ChunkedWriter::new(std::io::Cursor::new(Vec::new()), config.clone())?;
//! writer.compress_many(&records)?;
//! writer.done()?;
//! let compressed = writer.into_inner().into_inner();
//!
//! let mut reader = ChunkedReader::new(&compressed, config)?;
//! assert_eq!(reader.num_chunks(), 3);
//! assert_eq!(reader.read_chunk(2)?, vec![7u8; 6 * 50]);
//! # Ok(())
//! # }
//! ```
//!
//! # Parallelism
//!
//! This crates has an optional feature 'parallel'.
//! When using this feature, additional `par_` functions are exposed.
//!
//! - [`par_compress_buffer`]
//! - [`par_decompress_buffer`]
//!
//! [`par_compress_buffer`]: chunked/parallel/fn.par_compress_buffer.html
//! [`par_decompress_buffer`]: chunked/parallel/fn.par_decompress_buffer.html

pub(crate) mod compressors;
pub(crate) mod decoders;
pub(crate) mod decompressors;
pub(crate) mod encoders;
pub(crate) mod models;

pub mod chunked;
pub mod engine;
pub mod errors;
pub mod las;
pub mod packers;
pub mod predictors;
pub mod record;

pub use chunked::{
    compress_buffer, decompress_buffer, ChunkSize, ChunkTable, ChunkTableEntry, ChunkedReader,
    ChunkedWriter, StreamConfig, StreamConfigBuilder, TableLocation,
};
#[cfg(feature = "parallel")]
pub use chunked::{par_compress_buffer, par_decompress_buffer};
pub use engine::{
    compress_records, decompress_records, open_for_reading, open_for_writing, Reader, Writer,
};
pub use errors::{PointZipError, Result};
pub use las::{
    IntegerWidth, PointFormat, PointRecord, RecordItem, RecordLayout, RecordLayoutBuilder, Rgb,
    WavePacket,
};
pub use predictors::Predictor;
