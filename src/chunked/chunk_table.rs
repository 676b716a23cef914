//! Chunk table, trailer and header slot of a chunked stream.
//!
//! A stream is organized like this (integers are little endian):
//!
//! 1) the header slot, an u64 offset to the chunk table (only with [`TableLocation::HeaderSlot`])
//! 2) the chunks
//! 3) the chunk table, one `(u32 byte_length, u32 record_count)` per chunk
//! 4) the trailer: u32 number of chunks, u64 offset to the chunk table
//!
//! Offsets are relative to the start of the stream.

use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Index;
use std::slice::SliceIndex;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::warn;

use crate::chunked::config::{ChunkSize, TableLocation};
use crate::errors::{PointZipError, Result};

pub(crate) const HEADER_SLOT_SIZE: usize = 8;
pub(crate) const TRAILER_SIZE: usize = 12;
const ENTRY_SIZE: usize = 8;
// written by the range coder when a chunk is closed
const CLOSING_BYTES: usize = 4;
// written in the header slot until the table offset is known
const UNPATCHED_SLOT: u64 = u64::MAX;

/// Describes one chunk
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkTableEntry {
    pub byte_length: u32,
    pub record_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkTable(Vec<ChunkTableEntry>);

impl ChunkTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, entry: ChunkTableEntry) {
        self.0.push(entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChunkTableEntry> {
        self.0.iter()
    }

    pub fn num_records(&self) -> u64 {
        self.0.iter().map(|e| u64::from(e.record_count)).sum()
    }

    /// Sum of the byte length of the chunks
    pub fn byte_len(&self) -> u64 {
        self.0.iter().map(|e| u64::from(e.byte_length)).sum()
    }

    /// Offsets of the chunks for chunk data starting at `data_start`
    pub fn offsets(&self, data_start: u64) -> Vec<u64> {
        self.0
            .iter()
            .scan(data_start, |offset, entry| {
                let start = *offset;
                *offset += u64::from(entry.byte_length);
                Some(start)
            })
            .collect()
    }

    pub fn read_from<R: Read>(src: &mut R, number_of_chunks: usize) -> std::io::Result<Self> {
        let mut table = Self::with_capacity(number_of_chunks);
        for _ in 0..number_of_chunks {
            table.push(ChunkTableEntry {
                byte_length: src.read_u32::<LittleEndian>()?,
                record_count: src.read_u32::<LittleEndian>()?,
            });
        }
        Ok(table)
    }

    pub fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        for entry in &self.0 {
            dst.write_u32::<LittleEndian>(entry.byte_length)?;
            dst.write_u32::<LittleEndian>(entry.record_count)?;
        }
        Ok(())
    }
}

impl AsRef<[ChunkTableEntry]> for ChunkTable {
    fn as_ref(&self) -> &[ChunkTableEntry] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a ChunkTable {
    type Item = &'a ChunkTableEntry;
    type IntoIter = std::slice::Iter<'a, ChunkTableEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<I> Index<I> for ChunkTable
where
    I: SliceIndex<[ChunkTableEntry]>,
{
    type Output = <I as SliceIndex<[ChunkTableEntry]>>::Output;

    fn index(&self, index: I) -> &Self::Output {
        &self.0[index]
    }
}

/// Reserves the header slot, the position of `dst` must be the start of the stream
pub(crate) fn reserve_header_slot<W: Write>(dst: &mut W) -> std::io::Result<()> {
    dst.write_u64::<LittleEndian>(UNPATCHED_SLOT)
}

/// Writes the table and the trailer at the current position of `dst`
/// and patches the header slot if there is one.
///
/// Returns the offset of the table, the position of `dst` is the end of the stream afterwards.
pub(crate) fn write_table_and_trailer<W: Write + Seek>(
    dst: &mut W,
    stream_start: u64,
    table: &ChunkTable,
    table_location: TableLocation,
) -> std::io::Result<u64> {
    let table_pos = dst.seek(SeekFrom::Current(0))?;
    let table_offset = table_pos - stream_start;
    table.write_to(dst)?;
    dst.write_u32::<LittleEndian>(table.len() as u32)?;
    dst.write_u64::<LittleEndian>(table_offset)?;

    if table_location == TableLocation::HeaderSlot {
        let end_pos = dst.seek(SeekFrom::Current(0))?;
        dst.seek(SeekFrom::Start(stream_start))?;
        dst.write_u64::<LittleEndian>(table_offset)?;
        dst.seek(SeekFrom::Start(end_pos))?;
    }
    Ok(table_offset)
}

fn corrupt<T>(msg: String) -> Result<T> {
    Err(PointZipError::ChunkTableCorrupt(msg))
}

/// Where each chunk of a complete stream buffer is
#[derive(Debug, Clone)]
pub(crate) struct StreamIndex {
    table: ChunkTable,
    offsets: Vec<u64>,
    /// End of the chunk data actually present in the buffer
    data_end: u64,
}

impl StreamIndex {
    /// Locates and checks the chunk table of the stream stored in `data`.
    ///
    /// When the chunk data region is shorter than what the table
    /// describes, the stream was cut: the chunks are clamped to the region
    /// and the ones that lost bytes are reported by [`is_truncated`](Self::is_truncated).
    pub(crate) fn read(
        data: &[u8],
        table_location: TableLocation,
        chunk_size: ChunkSize,
    ) -> Result<Self> {
        let data_start = match table_location {
            TableLocation::Trailer => 0,
            TableLocation::HeaderSlot => HEADER_SLOT_SIZE,
        };
        if data.len() < data_start + TRAILER_SIZE {
            return corrupt(format!(
                "stream of {} bytes is too small to hold a trailer",
                data.len()
            ));
        }

        let mut trailer = &data[data.len() - TRAILER_SIZE..];
        let number_of_chunks = trailer.read_u32::<LittleEndian>()? as usize;
        let stored_table_offset = trailer.read_u64::<LittleEndian>()?;

        let table_len = number_of_chunks
            .checked_mul(ENTRY_SIZE)
            .and_then(|len| len.checked_add(TRAILER_SIZE + data_start))
            .filter(|len| *len <= data.len());
        let table_start = match table_len {
            Some(len) => (data.len() - len + data_start) as u64,
            None => {
                return corrupt(format!(
                    "{} chunks do not fit in a stream of {} bytes",
                    number_of_chunks,
                    data.len()
                ))
            }
        };

        if table_location == TableLocation::HeaderSlot {
            let mut slot = &data[..HEADER_SLOT_SIZE];
            let slot_offset = slot.read_u64::<LittleEndian>()?;
            if slot_offset != stored_table_offset {
                return corrupt(format!(
                    "header slot offset {} differs from the trailer offset {}",
                    slot_offset, stored_table_offset
                ));
            }
        }

        let data_start = data_start as u64;
        if stored_table_offset < table_start {
            return corrupt(format!(
                "table offset {} is before the table position {}",
                stored_table_offset, table_start
            ));
        }

        let mut src = &data[table_start as usize..];
        let table = ChunkTable::read_from(&mut src, number_of_chunks)?;
        if table.byte_len() != stored_table_offset - data_start {
            return corrupt(format!(
                "chunks hold {} bytes, but the table is at offset {}",
                table.byte_len(),
                stored_table_offset
            ));
        }
        if let Some(i) = table.iter().position(|e| e.record_count == 0) {
            return corrupt(format!("chunk {} is empty", i));
        }
        if let ChunkSize::Fixed(chunk_size) = chunk_size {
            let counts_match = match table.as_ref().split_last() {
                Some((last, rest)) => {
                    rest.iter().all(|e| e.record_count == chunk_size)
                        && last.record_count <= chunk_size
                }
                None => true,
            };
            if !counts_match {
                return corrupt(format!(
                    "record counts do not match the chunk size {}",
                    chunk_size
                ));
            }
        }

        if stored_table_offset > table_start {
            warn!(
                "Chunk data is {} bytes shorter than the chunk table says",
                stored_table_offset - table_start
            );
        }

        let offsets = table.offsets(data_start);
        Ok(Self {
            table,
            offsets,
            data_end: table_start,
        })
    }

    /// Checks that every chunk is long enough to hold what it starts with:
    /// the raw first record (unless the context is carried from the previous chunk)
    /// and the closing bytes of the coder.
    pub(crate) fn check_chunk_lengths(
        &self,
        record_size: usize,
        context_carry: bool,
    ) -> Result<()> {
        for (i, entry) in self.table.iter().enumerate() {
            let raw_len = if i == 0 || !context_carry { record_size } else { 0 };
            let min_len = (raw_len + CLOSING_BYTES) as u64;
            if u64::from(entry.byte_length) < min_len {
                return corrupt(format!(
                    "chunk {} of {} bytes cannot hold its records (at least {} bytes)",
                    i, entry.byte_length, min_len
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn table(&self) -> &ChunkTable {
        &self.table
    }

    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    fn chunk_end(&self, index: usize) -> u64 {
        self.offsets[index] + u64::from(self.table[index].byte_length)
    }

    pub(crate) fn is_truncated(&self, index: usize) -> bool {
        self.chunk_end(index) > self.data_end
    }

    /// The bytes of the chunk that are present in `data`
    pub(crate) fn chunk_bytes<'a>(&self, data: &'a [u8], index: usize) -> &'a [u8] {
        let start = self.offsets[index].min(self.data_end) as usize;
        let end = self.chunk_end(index).min(self.data_end) as usize;
        &data[start..end]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn stream(table_location: TableLocation) -> Vec<u8> {
        let mut dst = Cursor::new(Vec::new());
        if table_location == TableLocation::HeaderSlot {
            reserve_header_slot(&mut dst).unwrap();
        }
        dst.write_all(&[7u8; 10]).unwrap();
        let mut table = ChunkTable::new();
        table.push(ChunkTableEntry {
            byte_length: 6,
            record_count: 2,
        });
        table.push(ChunkTableEntry {
            byte_length: 4,
            record_count: 1,
        });
        write_table_and_trailer(&mut dst, 0, &table, table_location).unwrap();
        dst.into_inner()
    }

    #[test]
    fn layout_with_trailer() {
        let data = stream(TableLocation::Trailer);
        assert_eq!(data.len(), 10 + 16 + 12);
        assert_eq!(&data[26..30], &2u32.to_le_bytes());
        assert_eq!(&data[30..], &10u64.to_le_bytes());

        let index = StreamIndex::read(&data, TableLocation::Trailer, ChunkSize::Fixed(2)).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.table().num_records(), 3);
        assert_eq!(index.chunk_bytes(&data, 1), &[7u8; 4]);
        assert!(!index.is_truncated(1));
    }

    #[test]
    fn header_slot_is_patched() {
        let data = stream(TableLocation::HeaderSlot);
        assert_eq!(&data[..8], &18u64.to_le_bytes());
        let index =
            StreamIndex::read(&data, TableLocation::HeaderSlot, ChunkSize::Variable).unwrap();
        assert_eq!(index.table().offsets(8), vec![8, 14]);

        let mut bad_slot = data.clone();
        bad_slot[0] = 0;
        assert!(matches!(
            StreamIndex::read(&bad_slot, TableLocation::HeaderSlot, ChunkSize::Variable),
            Err(PointZipError::ChunkTableCorrupt(_))
        ));
    }

    #[test]
    fn cut_chunk_data_is_clamped() {
        let mut data = stream(TableLocation::Trailer);
        data.remove(9);
        let index = StreamIndex::read(&data, TableLocation::Trailer, ChunkSize::Fixed(2)).unwrap();
        assert!(!index.is_truncated(0));
        assert!(index.is_truncated(1));
        assert_eq!(index.chunk_bytes(&data, 1).len(), 3);
    }

    #[test]
    fn inconsistent_tables_are_rejected() {
        let data = stream(TableLocation::Trailer);
        let read = |data: &[u8]| StreamIndex::read(data, TableLocation::Trailer, ChunkSize::Fixed(2));

        assert!(read(&data[data.len() - 5..]).is_err());

        let mut extra = data.clone();
        extra.insert(0, 1);
        assert!(read(&extra).is_err());

        let mut too_many_chunks = data.clone();
        too_many_chunks[26] = 200;
        assert!(read(&too_many_chunks).is_err());

        let mut wrong_length = data.clone();
        wrong_length[10] = 5;
        assert!(read(&wrong_length).is_err());

        let mut empty_chunk = data.clone();
        empty_chunk[22] = 0;
        assert!(read(&empty_chunk).is_err());

        assert!(StreamIndex::read(&data, TableLocation::Trailer, ChunkSize::Fixed(3)).is_err());
    }

    #[test]
    fn chunks_too_short_for_their_records() {
        let data = stream(TableLocation::Trailer);
        let index = StreamIndex::read(&data, TableLocation::Trailer, ChunkSize::Variable).unwrap();
        // 6 and 4 bytes: the second chunk has no room for a raw record
        assert!(index.check_chunk_lengths(0, false).is_ok());
        assert!(matches!(
            index.check_chunk_lengths(2, false),
            Err(PointZipError::ChunkTableCorrupt(_))
        ));
        // only the first chunk starts with a raw record
        assert!(index.check_chunk_lengths(2, true).is_ok());
        assert!(index.check_chunk_lengths(3, true).is_err());
    }

    #[test]
    fn empty_stream() {
        let mut dst = Cursor::new(Vec::new());
        write_table_and_trailer(&mut dst, 0, &ChunkTable::new(), TableLocation::Trailer).unwrap();
        let data = dst.into_inner();
        assert_eq!(data.len(), TRAILER_SIZE);
        let index = StreamIndex::read(&data, TableLocation::Trailer, ChunkSize::Fixed(2)).unwrap();
        assert_eq!(index.len(), 0);
    }
}
