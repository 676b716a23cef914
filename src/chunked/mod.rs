//! Chunked streams of compressed records.
//!
//! Records are compressed in chunks that can each be decoded on their own,
//! a table at the end of the stream gives the size and record count of every chunk.

pub mod chunk_table;
pub mod compression;
pub mod config;
pub mod decompression;
#[cfg(feature = "parallel")]
pub mod parallel;

pub use chunk_table::{ChunkTable, ChunkTableEntry};
pub use compression::{compress_buffer, ChunkedWriter};
pub use config::{ChunkSize, StreamConfig, StreamConfigBuilder, TableLocation, DEFAULT_CHUNK_SIZE};
pub use decompression::{decompress_buffer, ChunkedReader};
#[cfg(feature = "parallel")]
pub use parallel::{par_compress_buffer, par_decompress_buffer};
