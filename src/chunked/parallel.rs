//! Compression and decompression of the chunks of a stream on multiple threads.
//!
//! Chunks are independent from one another unless the context is carried,
//! in which case these functions fall back to the sequential versions.

use std::io::{Seek, SeekFrom, Write};

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::debug;

use crate::chunked::chunk_table::{
    reserve_header_slot, write_table_and_trailer, ChunkTable, ChunkTableEntry, StreamIndex,
};
use crate::chunked::compression::compress_buffer;
use crate::chunked::config::{ChunkSize, StreamConfig, TableLocation};
use crate::chunked::decompression::{chunk_error, decompress_buffer};
use crate::errors::{PointZipError, Result};
use crate::record::{SequentialPointRecordCompressor, SequentialPointRecordDecompressor};

/// Compresses all the records of `records` into `dst`, one chunk per thread.
///
/// The output is the same as the one of [`compress_buffer`].
pub fn par_compress_buffer<W: Write + Seek>(
    dst: &mut W,
    records: &[u8],
    config: StreamConfig,
) -> Result<()> {
    let record_size = config.record_size();
    if record_size == 0 || records.len() % record_size != 0 {
        return Err(PointZipError::BufferLenNotMultipleOfRecordSize {
            buffer_len: records.len(),
            record_size,
        });
    }
    let chunk_size = match config.chunk_size() {
        ChunkSize::Fixed(n) if !config.context_carry() => n as usize,
        _ => {
            debug!("Chunks depend on each other, compressing sequentially");
            return compress_buffer(dst, records, config);
        }
    };

    let compressed_chunks = records
        .chunks(chunk_size * record_size)
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|chunk| -> Result<(Vec<u8>, u32)> {
            let mut compressor = SequentialPointRecordCompressor::new(Vec::<u8>::new());
            compressor.set_fields_from(config.layout());
            for record in chunk.chunks_exact(record_size) {
                compressor.compress_next(record)?;
            }
            compressor.done()?;
            Ok((compressor.into_inner(), (chunk.len() / record_size) as u32))
        })
        .collect::<Result<Vec<(Vec<u8>, u32)>>>()?;

    let start_pos = dst.seek(SeekFrom::Current(0))?;
    if config.table_location() == TableLocation::HeaderSlot {
        reserve_header_slot(dst)?;
    }
    let mut chunk_table = ChunkTable::new();
    for (bytes, record_count) in compressed_chunks {
        if bytes.len() > u32::MAX as usize {
            return Err(PointZipError::ChunkTooLarge(bytes.len()));
        }
        dst.write_all(&bytes)?;
        chunk_table.push(ChunkTableEntry {
            byte_length: bytes.len() as u32,
            record_count,
        });
    }
    let table_offset =
        write_table_and_trailer(dst, start_pos, &chunk_table, config.table_location())?;
    debug!(
        "Stream done: {} chunks compressed in parallel, table at offset {}",
        chunk_table.len(),
        table_offset
    );
    Ok(())
}

/// Decompresses all the records of the stream in `data` into `out`, one chunk per thread.
///
/// `out` must be exactly as large as the decompressed records.
pub fn par_decompress_buffer(data: &[u8], out: &mut [u8], config: StreamConfig) -> Result<()> {
    if config.context_carry() {
        debug!("Chunks depend on each other, decompressing sequentially");
        return decompress_buffer(data, out, config);
    }
    let record_size = config.record_size();
    if record_size == 0 {
        return Err(PointZipError::EmptyRecordLayout);
    }
    let index = StreamIndex::read(data, config.table_location(), config.chunk_size())?;
    index.check_chunk_lengths(record_size, false)?;
    let expected = index.table().num_records().checked_mul(record_size as u64);
    if expected != Some(out.len() as u64) {
        return Err(PointZipError::BufferLenNotMultipleOfRecordSize {
            buffer_len: out.len(),
            record_size,
        });
    }

    let mut jobs = Vec::with_capacity(index.len());
    let mut rest = out;
    for (i, entry) in index.table().iter().enumerate() {
        let (output, tail) =
            std::mem::take(&mut rest).split_at_mut(entry.record_count as usize * record_size);
        jobs.push((i, index.chunk_bytes(data, i), output));
        rest = tail;
    }

    jobs.into_par_iter().try_for_each(|(i, input, output)| -> Result<()> {
        let mut decompressor = SequentialPointRecordDecompressor::new(input);
        decompressor.set_fields_from(config.layout());
        for record in output.chunks_exact_mut(record_size) {
            decompressor
                .decompress_next(record)
                .map_err(|error| chunk_error(&index, i, error))?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::las::point_format::PointFormat;
    use std::io::Cursor;

    #[test]
    fn same_output_as_sequential() {
        let format = PointFormat::new(1).unwrap();
        let records: Vec<u8> = (0..format.record_size() * 1000)
            .map(|i| (i * 7 % 256) as u8)
            .collect();
        for &location in &[TableLocation::Trailer, TableLocation::HeaderSlot] {
            let config = StreamConfig::builder(format)
                .with_fixed_chunk_size(128)
                .with_table_location(location)
                .build()
                .unwrap();

            let mut sequential = Cursor::new(Vec::new());
            compress_buffer(&mut sequential, &records, config.clone()).unwrap();
            let mut parallel = Cursor::new(Vec::new());
            par_compress_buffer(&mut parallel, &records, config.clone()).unwrap();
            assert_eq!(parallel.get_ref(), sequential.get_ref());

            let mut out = vec![0u8; records.len()];
            par_decompress_buffer(parallel.get_ref(), &mut out, config).unwrap();
            assert_eq!(out, records);
        }
    }
}
