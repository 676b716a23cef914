//! Record at a time compression and decompression of point records.
//!
//! ```
//! use pointzip::{open_for_reading, open_for_writing, PointRecord};
//!
//! # fn main() -> pointzip::Result<()> {
//! let mut writer = open_for_writing(0, 2)?;
//! for i in 0..3 {
//!     let record = PointRecord {
//!         x: i,
//!         intensity: 10 * i as u16,
//!         ..Default::default()
//!     };
//!     writer.write_record(&record)?;
//! }
//! let bytes = writer.close_and_finalize()?;
//!
//! let mut reader = open_for_reading(&bytes, 0)?;
//! assert_eq!(reader.chunk_count(), 2);
//! reader.seek_chunk(1)?;
//! let record = reader.read_record()?.unwrap();
//! assert_eq!(record.x, 2);
//! assert!(reader.read_record()?.is_none());
//! # Ok(())
//! # }
//! ```

use std::io::Cursor;

use crate::chunked::{ChunkSize, ChunkedReader, ChunkedWriter, StreamConfig};
use crate::errors::{PointZipError, Result};
use crate::las::point_format::PointFormat;
use crate::las::PointRecord;

/// Format id reported for layouts that are not a point format
const CUSTOM_LAYOUT_ID: u8 = u8::MAX;

/// Creates a writer of records of the point format,
/// cut in chunks of `chunk_size` records.
pub fn open_for_writing(point_format_id: u8, chunk_size: u32) -> Result<Writer> {
    let config = StreamConfig::builder(PointFormat::new(point_format_id)?)
        .with_fixed_chunk_size(chunk_size)
        .build()?;
    Writer::with_config(config)
}

/// Creates a reader of the stream in `data`, whose records are of the point format
pub fn open_for_reading(data: &[u8], point_format_id: u8) -> Result<Reader<'_>> {
    // the chunk sizes are taken from the table
    let config = StreamConfig::builder(PointFormat::new(point_format_id)?)
        .with_chunk_size(ChunkSize::Variable)
        .build()?;
    Reader::with_config(data, config)
}

/// Compresses the packed `records` into a complete stream
pub fn compress_records(records: &[u8], config: StreamConfig) -> Result<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());
    crate::chunked::compress_buffer(&mut output, records, config)?;
    Ok(output.into_inner())
}

/// Decompresses all the records of the stream, in their packed form
pub fn decompress_records(data: &[u8], config: StreamConfig) -> Result<Vec<u8>> {
    ChunkedReader::new(data, config)?.read_to_end()
}

fn incompatible(reason: &'static str) -> PointZipError {
    PointZipError::IncompatibleRecord {
        point_format: CUSTOM_LAYOUT_ID,
        reason,
    }
}

/// Compresses records into an in memory stream
pub struct Writer {
    inner: ChunkedWriter<Cursor<Vec<u8>>>,
    point_format: Option<PointFormat>,
    record: Vec<u8>,
}

impl Writer {
    pub fn with_config(config: StreamConfig) -> Result<Self> {
        let point_format = config.layout().point_format();
        let record = vec![0u8; config.record_size()];
        let inner = ChunkedWriter::new(Cursor::new(Vec::new()), config)?;
        Ok(Self {
            inner,
            point_format,
            record,
        })
    }

    /// Checks the record against the point format then compresses it.
    ///
    /// Nothing is written if the record does not fit the point format.
    pub fn write_record(&mut self, record: &PointRecord) -> Result<()> {
        let point_format = self
            .point_format
            .ok_or_else(|| incompatible("custom layouts only take raw records"))?;
        record.pack_into(&point_format, &mut self.record)?;
        self.inner.compress_one(&self.record)
    }

    /// Compresses a record given in its packed form
    pub fn write_raw(&mut self, record: &[u8]) -> Result<()> {
        self.inner.compress_one(record)
    }

    pub fn config(&self) -> &StreamConfig {
        self.inner.config()
    }

    /// Ends the last chunk, even if it is not full, writes
    /// the chunk table and returns the bytes of the stream.
    pub fn close_and_finalize(mut self) -> Result<Vec<u8>> {
        self.inner.done()?;
        Ok(self.inner.into_inner().into_inner())
    }
}

/// Reads records from an in memory stream
pub struct Reader<'a> {
    inner: ChunkedReader<'a>,
    point_format: Option<PointFormat>,
    record: Vec<u8>,
}

impl<'a> Reader<'a> {
    pub fn with_config(data: &'a [u8], config: StreamConfig) -> Result<Self> {
        let point_format = config.layout().point_format();
        let record = vec![0u8; config.record_size()];
        let inner = ChunkedReader::new(data, config)?;
        Ok(Self {
            inner,
            point_format,
            record,
        })
    }

    /// Reads the next record, `None` once all records were read
    pub fn read_record(&mut self) -> Result<Option<PointRecord>> {
        let point_format = self
            .point_format
            .ok_or_else(|| incompatible("custom layouts only give raw records"))?;
        if !self.read_next()? {
            return Ok(None);
        }
        Ok(Some(PointRecord::unpack_from(&point_format, &self.record)))
    }

    /// Reads the next record in its packed form, `None` once all records were read
    pub fn read_raw(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.read_next()? {
            return Ok(None);
        }
        Ok(Some(self.record.clone()))
    }

    fn read_next(&mut self) -> Result<bool> {
        if self.inner.records_left() == 0 {
            return Ok(false);
        }
        self.inner.decompress_one(&mut self.record)?;
        Ok(true)
    }

    /// The next record read will be the first one of the chunk
    pub fn seek_chunk(&mut self, index: usize) -> Result<()> {
        self.inner.seek_chunk(index)
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.num_chunks()
    }

    pub fn record_count(&self) -> u64 {
        self.inner.num_records()
    }

    pub fn config(&self) -> &StreamConfig {
        self.inner.config()
    }
}
