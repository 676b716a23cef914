use std::io::ErrorKind;

use tracing::{debug, trace};

use crate::chunked::chunk_table::{ChunkTable, StreamIndex};
use crate::chunked::config::StreamConfig;
use crate::errors::{PointZipError, Result};
use crate::record::SequentialPointRecordDecompressor;

/// Turns a failure to decode a chunk into the error of the stream
pub(crate) fn chunk_error(
    index: &StreamIndex,
    chunk: usize,
    error: std::io::Error,
) -> PointZipError {
    if error.kind() != ErrorKind::UnexpectedEof {
        PointZipError::Io(error)
    } else if index.is_truncated(chunk) {
        PointZipError::TruncatedInput { chunk }
    } else {
        PointZipError::ChunkTableCorrupt(format!(
            "chunk {} ended before its {} records",
            chunk,
            index.table()[chunk].record_count
        ))
    }
}

/// Decompresses the records of a complete stream held in memory.
///
/// Records are read in order, across chunk boundaries, and
/// [`seek_chunk`](Self::seek_chunk) moves to the first record of any chunk.
pub struct ChunkedReader<'a> {
    data: &'a [u8],
    config: StreamConfig,
    index: StreamIndex,
    record_decompressor: SequentialPointRecordDecompressor<&'a [u8]>,
    /// Chunk of the next record
    current_chunk: usize,
    /// Records already read from the current chunk
    chunk_records_read: u32,
    records_left: u64,
}

impl<'a> ChunkedReader<'a> {
    /// Reads the chunk table of the stream in `data`.
    ///
    /// With a fixed chunk size in the `config`, the record counts
    /// of the table are checked against it.
    pub fn new(data: &'a [u8], config: StreamConfig) -> Result<Self> {
        if config.record_size() == 0 {
            return Err(PointZipError::EmptyRecordLayout);
        }
        let index = StreamIndex::read(data, config.table_location(), config.chunk_size())?;
        index.check_chunk_lengths(config.record_size(), config.context_carry())?;
        let records_left = index.table().num_records();
        debug!(
            "Opened stream of {} bytes: {} chunks, {} records",
            data.len(),
            index.len(),
            records_left
        );
        let mut record_decompressor = SequentialPointRecordDecompressor::new(&data[..0]);
        record_decompressor.set_fields_from(config.layout());
        Ok(Self {
            data,
            config,
            index,
            record_decompressor,
            current_chunk: 0,
            chunk_records_read: 0,
            records_left,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn chunk_table(&self) -> &ChunkTable {
        self.index.table()
    }

    pub fn num_chunks(&self) -> usize {
        self.index.len()
    }

    pub fn num_records(&self) -> u64 {
        self.index.table().num_records()
    }

    /// Number of records that can still be read
    pub fn records_left(&self) -> u64 {
        self.records_left
    }

    pub fn record_size(&self) -> usize {
        self.record_decompressor.record_size()
    }

    /// Moves to the next chunk once the current one was read entirely
    fn skip_finished_chunk(&mut self) {
        if self.current_chunk < self.index.len()
            && self.chunk_records_read == self.index.table()[self.current_chunk].record_count
        {
            self.current_chunk += 1;
            self.chunk_records_read = 0;
        }
    }

    fn start_chunk(&mut self, index: usize) {
        let chunk = self.index.chunk_bytes(self.data, index);
        if self.config.context_carry() && index > 0 {
            *self.record_decompressor.get_mut() = chunk;
            self.record_decompressor.reset_coder();
        } else {
            self.record_decompressor.reset();
            self.record_decompressor.set_fields_from(self.config.layout());
            *self.record_decompressor.get_mut() = chunk;
        }
    }

    /// Decompresses the next record into `out`, in its packed form
    pub fn decompress_one(&mut self, out: &mut [u8]) -> Result<()> {
        let record_size = self.record_size();
        if out.len() < record_size {
            return Err(PointZipError::BufferLenNotMultipleOfRecordSize {
                buffer_len: out.len(),
                record_size,
            });
        }
        self.skip_finished_chunk();
        if self.current_chunk >= self.index.len() {
            return Err(PointZipError::EndOfStream);
        }
        if self.chunk_records_read == 0 {
            self.start_chunk(self.current_chunk);
        }

        let chunk = self.current_chunk;
        self.record_decompressor
            .decompress_next(&mut out[..record_size])
            .map_err(|error| chunk_error(&self.index, chunk, error))?;
        self.chunk_records_read += 1;
        self.records_left -= 1;
        Ok(())
    }

    /// Decompresses as many records as `out` can hold
    pub fn decompress_many(&mut self, out: &mut [u8]) -> Result<()> {
        let record_size = self.record_size();
        if record_size == 0 || out.len() % record_size != 0 {
            return Err(PointZipError::BufferLenNotMultipleOfRecordSize {
                buffer_len: out.len(),
                record_size,
            });
        }
        for record in out.chunks_exact_mut(record_size) {
            self.decompress_one(record)?;
        }
        Ok(())
    }

    /// Moves to the first record of the chunk.
    ///
    /// When the context is carried from chunk to chunk, the records
    /// preceding the chunk have to be decoded again.
    pub fn seek_chunk(&mut self, index: usize) -> Result<()> {
        let count = self.index.len();
        if index >= count {
            return Err(PointZipError::ChunkIndexOutOfBounds { index, count });
        }
        trace!("Seeking to chunk {}", index);

        if !self.config.context_carry() {
            self.current_chunk = index;
            self.chunk_records_read = 0;
        } else {
            self.skip_finished_chunk();
            if index < self.current_chunk
                || (index == self.current_chunk && self.chunk_records_read > 0)
            {
                self.current_chunk = 0;
                self.chunk_records_read = 0;
                self.records_left = self.num_records();
            }
            let mut record = vec![0u8; self.record_size()];
            loop {
                self.skip_finished_chunk();
                if self.current_chunk >= index {
                    break;
                }
                self.decompress_one(&mut record)?;
            }
        }

        let records_before: u64 = self.index.table()[..index]
            .iter()
            .map(|e| u64::from(e.record_count))
            .sum();
        self.records_left = self.num_records() - records_before;
        Ok(())
    }

    /// Decompresses all the records of a chunk, in their packed form.
    ///
    /// The output grows as records are decoded, a record count larger
    /// than what the chunk holds ends with an error, not a huge allocation.
    pub fn read_chunk(&mut self, index: usize) -> Result<Vec<u8>> {
        self.seek_chunk(index)?;
        let mut records = Vec::with_capacity(self.index.chunk_bytes(self.data, index).len());
        let mut record = vec![0u8; self.record_size()];
        for _ in 0..self.index.table()[index].record_count {
            self.decompress_one(&mut record)?;
            records.extend_from_slice(&record);
        }
        Ok(records)
    }

    /// Decompresses all the records left, in their packed form
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut records = Vec::with_capacity(self.data.len());
        let mut record = vec![0u8; self.record_size()];
        while self.records_left > 0 {
            self.decompress_one(&mut record)?;
            records.extend_from_slice(&record);
        }
        Ok(records)
    }
}

/// Decompresses all the records of the stream in `data` into `out`,
/// which must be exactly as large as the decompressed records
pub fn decompress_buffer(data: &[u8], out: &mut [u8], config: StreamConfig) -> Result<()> {
    let mut reader = ChunkedReader::new(data, config)?;
    let expected = reader.num_records().checked_mul(reader.record_size() as u64);
    if expected != Some(out.len() as u64) {
        return Err(PointZipError::BufferLenNotMultipleOfRecordSize {
            buffer_len: out.len(),
            record_size: reader.record_size(),
        });
    }
    reader.decompress_many(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chunked::compression::compress_buffer;
    use crate::chunked::config::ChunkSize;
    use crate::las::point_format::{IntegerWidth, RecordLayoutBuilder};
    use crate::predictors::Predictor;
    use std::io::Cursor;

    fn config(context_carry: bool) -> StreamConfig {
        let layout = RecordLayoutBuilder::new()
            .add_integer(IntegerWidth::I32, Predictor::Linear)
            .add_integer(IntegerWidth::U8, Predictor::Previous)
            .build();
        StreamConfig::builder(layout)
            .with_chunk_size(ChunkSize::Fixed(10))
            .with_context_carry(context_carry)
            .build()
            .unwrap()
    }

    fn records() -> Vec<u8> {
        (0..35i32)
            .flat_map(|i| {
                let mut record = (i * 1000 - 7).to_le_bytes().to_vec();
                record.push((i % 3) as u8);
                record
            })
            .collect()
    }

    fn compress(config: StreamConfig) -> Vec<u8> {
        let mut dst = Cursor::new(Vec::new());
        compress_buffer(&mut dst, &records(), config).unwrap();
        dst.into_inner()
    }

    #[test]
    fn reads_across_chunks() {
        for &carry in &[false, true] {
            let data = compress(config(carry));
            let mut reader = ChunkedReader::new(&data, config(carry)).unwrap();
            assert_eq!(reader.num_chunks(), 4);
            assert_eq!(reader.num_records(), 35);
            let mut out = vec![0u8; records().len()];
            reader.decompress_many(&mut out).unwrap();
            assert_eq!(out, records());
            assert_eq!(reader.records_left(), 0);
            assert!(matches!(
                reader.decompress_one(&mut [0u8; 5]),
                Err(PointZipError::EndOfStream)
            ));
        }
    }

    #[test]
    fn seeks_in_any_order() {
        let expected = records();
        for &carry in &[false, true] {
            let data = compress(config(carry));
            let mut reader = ChunkedReader::new(&data, config(carry)).unwrap();
            for &index in &[2usize, 0, 3, 3, 1] {
                let chunk = reader.read_chunk(index).unwrap();
                let start = index * 10 * 5;
                assert_eq!(chunk.as_slice(), &expected[start..start + chunk.len()]);
            }
            reader.seek_chunk(1).unwrap();
            assert_eq!(reader.records_left(), 25);
            assert!(matches!(
                reader.seek_chunk(4),
                Err(PointZipError::ChunkIndexOutOfBounds { index: 4, count: 4 })
            ));
        }
    }

    #[test]
    fn missing_bytes_are_reported_on_the_cut_chunk() {
        let mut data = compress(config(false));
        let table_start = data.len() - 12 - 4 * 8;
        data.remove(table_start - 1);

        let mut reader = ChunkedReader::new(&data, config(false)).unwrap();
        let mut record = [0u8; 5];
        for _ in 0..30 {
            reader.decompress_one(&mut record).unwrap();
        }
        let mut result = Ok(());
        for _ in 30..35 {
            result = reader.decompress_one(&mut record);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(PointZipError::TruncatedInput { chunk: 3 })));
    }
}
