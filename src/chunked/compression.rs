use std::io::{Seek, SeekFrom, Write};

use tracing::debug;

use crate::chunked::chunk_table::{
    reserve_header_slot, write_table_and_trailer, ChunkTable, ChunkTableEntry,
};
use crate::chunked::config::{ChunkSize, StreamConfig, TableLocation};
use crate::errors::{PointZipError, Result};
use crate::record::SequentialPointRecordCompressor;

/// Compresses records into chunks written to the given destination
pub struct ChunkedWriter<W: Write + Seek> {
    config: StreamConfig,
    record_compressor: SequentialPointRecordCompressor<W>,
    chunk_table: ChunkTable,
    /// Records in the current chunk
    chunk_record_count: u32,
    /// Position where the current chunk started
    chunk_start_pos: u64,
    /// Position where the stream started
    start_pos: u64,
    finished: bool,
}

impl<W: Write + Seek> ChunkedWriter<W> {
    /// Creates a writer, the stream starts at the current position of `output`
    pub fn new(output: W, config: StreamConfig) -> Result<Self> {
        if config.record_size() == 0 {
            return Err(PointZipError::EmptyRecordLayout);
        }
        let mut record_compressor = SequentialPointRecordCompressor::new(output);
        record_compressor.set_fields_from(config.layout());

        let stream = record_compressor.get_mut();
        let start_pos = stream.seek(SeekFrom::Current(0))?;
        if config.table_location() == TableLocation::HeaderSlot {
            reserve_header_slot(stream)?;
        }
        let chunk_start_pos = stream.seek(SeekFrom::Current(0))?;

        Ok(Self {
            config,
            record_compressor,
            chunk_table: ChunkTable::new(),
            chunk_record_count: 0,
            chunk_start_pos,
            start_pos,
            finished: false,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Entries of the chunks written so far
    pub fn chunk_table(&self) -> &ChunkTable {
        &self.chunk_table
    }

    /// Compresses one record given in its packed form.
    ///
    /// With a fixed chunk size the current chunk is ended first if it is full.
    pub fn compress_one(&mut self, record: &[u8]) -> Result<()> {
        let record_size = self.record_compressor.record_size();
        if record.len() != record_size {
            return Err(PointZipError::BufferLenNotMultipleOfRecordSize {
                buffer_len: record.len(),
                record_size,
            });
        }
        if let ChunkSize::Fixed(chunk_size) = self.config.chunk_size() {
            if self.chunk_record_count == chunk_size {
                self.finish_current_chunk()?;
            }
        }
        self.record_compressor.compress_next(record)?;
        self.chunk_record_count += 1;
        Ok(())
    }

    /// Compresses all the records contained in `records`
    pub fn compress_many(&mut self, records: &[u8]) -> Result<()> {
        let record_size = self.record_compressor.record_size();
        if record_size == 0 || records.len() % record_size != 0 {
            return Err(PointZipError::BufferLenNotMultipleOfRecordSize {
                buffer_len: records.len(),
                record_size,
            });
        }
        for record in records.chunks_exact(record_size) {
            self.compress_one(record)?;
        }
        Ok(())
    }

    /// Compresses each buffer of records as its own chunk
    pub fn compress_chunks<Chunks, Chunk>(&mut self, chunks: Chunks) -> Result<()>
    where
        Chunks: IntoIterator<Item = Chunk>,
        Chunk: AsRef<[u8]>,
    {
        self.finish_current_chunk()?;
        for chunk in chunks {
            self.compress_many(chunk.as_ref())?;
            self.finish_current_chunk()?;
        }
        Ok(())
    }

    /// Ends the current chunk, does nothing if it has no records
    pub fn finish_current_chunk(&mut self) -> Result<()> {
        if self.chunk_record_count == 0 {
            return Ok(());
        }
        self.record_compressor.done()?;
        let current_pos = self
            .record_compressor
            .get_mut()
            .seek(SeekFrom::Current(0))?;
        let byte_length = (current_pos - self.chunk_start_pos) as usize;
        if byte_length > u32::MAX as usize {
            return Err(PointZipError::ChunkTooLarge(byte_length));
        }
        self.chunk_table.push(ChunkTableEntry {
            byte_length: byte_length as u32,
            record_count: self.chunk_record_count,
        });
        debug!(
            "Chunk {} done: {} records in {} bytes",
            self.chunk_table.len() - 1,
            self.chunk_record_count,
            byte_length
        );

        if self.config.context_carry() {
            self.record_compressor.reset_coder();
        } else {
            self.record_compressor.reset();
            self.record_compressor.set_fields_from(self.config.layout());
        }
        self.chunk_start_pos = current_pos;
        self.chunk_record_count = 0;
        Ok(())
    }

    /// Ends the last chunk and writes the chunk table.
    ///
    /// Must be called once all the records were compressed,
    /// calling it again does nothing.
    pub fn done(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finish_current_chunk()?;
        let table_offset = write_table_and_trailer(
            self.record_compressor.get_mut(),
            self.start_pos,
            &self.chunk_table,
            self.config.table_location(),
        )?;
        self.finished = true;
        debug!(
            "Stream done: {} chunks, {} records, table at offset {}",
            self.chunk_table.len(),
            self.chunk_table.num_records(),
            table_offset
        );
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.record_compressor.get_mut()
    }

    pub fn into_inner(self) -> W {
        self.record_compressor.into_inner()
    }
}

/// Compresses all the records of `records` into `dst` as a complete stream
pub fn compress_buffer<W: Write + Seek>(
    dst: &mut W,
    records: &[u8],
    config: StreamConfig,
) -> Result<()> {
    let mut writer = ChunkedWriter::new(dst, config)?;
    writer.compress_many(records)?;
    writer.done()
}
