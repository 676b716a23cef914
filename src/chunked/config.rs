//! Configuration of a chunked stream and its binary descriptor.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::{PointZipError, Result};
use crate::las::point_format::{PointFormat, RecordItem, RecordLayout, RecordLayoutBuilder};

pub const DEFAULT_CHUNK_SIZE: u32 = 50_000;

const DESCRIPTOR_VERSION: u16 = 1;
// stored in place of a point format id for custom layouts
const CUSTOM_LAYOUT_ID: u8 = u8::MAX;
const VARIABLE_CHUNK_SIZE: u32 = u32::MAX;
const FLAG_CONTEXT_CARRY: u8 = 1;
const FLAG_HEADER_SLOT: u8 = 1 << 1;

/// How records are grouped into chunks
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChunkSize {
    /// A new chunk is started every `n` records
    Fixed(u32),
    /// Chunks are ended by the caller
    Variable,
}

impl Default for ChunkSize {
    fn default() -> Self {
        ChunkSize::Fixed(DEFAULT_CHUNK_SIZE)
    }
}

/// Where the offset to the chunk table can be found, besides the trailer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TableLocation {
    /// Only in the trailer at the end of the stream
    Trailer,
    /// Also in an 8 byte slot reserved at the start of the stream,
    /// patched once the table is written
    HeaderSlot,
}

impl Default for TableLocation {
    fn default() -> Self {
        TableLocation::Trailer
    }
}

/// Everything needed to write, and later read back, a chunked stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    layout: RecordLayout,
    chunk_size: ChunkSize,
    context_carry: bool,
    table_location: TableLocation,
}

impl StreamConfig {
    /// Config with the default chunk size, no context carry, table in the trailer
    pub fn new<L: Into<RecordLayout>>(layout: L) -> Self {
        Self {
            layout: layout.into(),
            chunk_size: ChunkSize::default(),
            context_carry: false,
            table_location: TableLocation::default(),
        }
    }

    pub fn for_point_format(point_format_id: u8) -> Result<Self> {
        Ok(Self::new(PointFormat::new(point_format_id)?))
    }

    pub fn builder<L: Into<RecordLayout>>(layout: L) -> StreamConfigBuilder {
        StreamConfigBuilder::new(layout)
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn record_size(&self) -> usize {
        self.layout.record_size()
    }

    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    /// Whether the field state is kept from one chunk to the next.
    ///
    /// When it is, chunks can only be decoded in order.
    pub fn context_carry(&self) -> bool {
        self.context_carry
    }

    pub fn table_location(&self) -> TableLocation {
        self.table_location
    }

    pub fn from_buffer(descriptor: &[u8]) -> Result<Self> {
        let mut src = descriptor;
        Self::read_from(&mut src)
    }

    /// Reads a descriptor written by [`write_to`](Self::write_to)
    pub fn read_from<R: Read>(src: &mut R) -> Result<Self> {
        let version = src.read_u16::<LittleEndian>()?;
        if version != DESCRIPTOR_VERSION {
            return Err(PointZipError::UnsupportedDescriptorVersion(version));
        }
        let point_format_id = src.read_u8()?;
        let num_extra_bytes = src.read_u16::<LittleEndian>()?;
        let chunk_size = match src.read_u32::<LittleEndian>()? {
            VARIABLE_CHUNK_SIZE => ChunkSize::Variable,
            n => ChunkSize::Fixed(n),
        };
        let flags = src.read_u8()?;
        let num_items = src.read_u16::<LittleEndian>()?;
        let mut builder = RecordLayoutBuilder::new();
        for _ in 0..num_items {
            let type_code = src.read_u16::<LittleEndian>()?;
            let parameter = src.read_u16::<LittleEndian>()?;
            builder = builder.add_item(RecordItem::from_parts(type_code, parameter)?);
        }

        let layout = if point_format_id == CUSTOM_LAYOUT_ID {
            builder.build()
        } else {
            let layout = RecordLayout::from_point_format(PointFormat::with_extra_bytes(
                point_format_id,
                num_extra_bytes,
            )?);
            if layout.items() != builder.build().items() {
                return Err(PointZipError::IncompatibleRecord {
                    point_format: point_format_id,
                    reason: "descriptor items do not match the point format",
                });
            }
            layout
        };

        let table_location = if flags & FLAG_HEADER_SLOT != 0 {
            TableLocation::HeaderSlot
        } else {
            TableLocation::Trailer
        };
        StreamConfigBuilder::new(layout)
            .with_chunk_size(chunk_size)
            .with_context_carry(flags & FLAG_CONTEXT_CARRY != 0)
            .with_table_location(table_location)
            .build()
    }

    pub fn write_to<W: Write>(&self, dst: &mut W) -> Result<()> {
        let point_format = self.layout.point_format();
        dst.write_u16::<LittleEndian>(DESCRIPTOR_VERSION)?;
        dst.write_u8(point_format.map_or(CUSTOM_LAYOUT_ID, |f| f.id()))?;
        dst.write_u16::<LittleEndian>(point_format.map_or(0, |f| f.num_extra_bytes()))?;
        dst.write_u32::<LittleEndian>(match self.chunk_size {
            ChunkSize::Fixed(n) => n,
            ChunkSize::Variable => VARIABLE_CHUNK_SIZE,
        })?;
        let mut flags = 0u8;
        if self.context_carry {
            flags |= FLAG_CONTEXT_CARRY;
        }
        if self.table_location == TableLocation::HeaderSlot {
            flags |= FLAG_HEADER_SLOT;
        }
        dst.write_u8(flags)?;
        dst.write_u16::<LittleEndian>(self.layout.items().len() as u16)?;
        for item in self.layout.items() {
            dst.write_u16::<LittleEndian>(item.type_code())?;
            dst.write_u16::<LittleEndian>(item.parameter())?;
        }
        Ok(())
    }
}

/// Builds a [`StreamConfig`], checking it in [`build`](Self::build)
#[derive(Debug, Clone)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    pub fn new<L: Into<RecordLayout>>(layout: L) -> Self {
        Self {
            config: StreamConfig::new(layout),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: ChunkSize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    pub fn with_fixed_chunk_size(self, chunk_size: u32) -> Self {
        self.with_chunk_size(ChunkSize::Fixed(chunk_size))
    }

    pub fn with_variable_chunk_size(self) -> Self {
        self.with_chunk_size(ChunkSize::Variable)
    }

    pub fn with_context_carry(mut self, context_carry: bool) -> Self {
        self.config.context_carry = context_carry;
        self
    }

    pub fn with_table_location(mut self, table_location: TableLocation) -> Self {
        self.config.table_location = table_location;
        self
    }

    pub fn build(self) -> Result<StreamConfig> {
        if self.config.layout.record_size() == 0 {
            return Err(PointZipError::EmptyRecordLayout);
        }
        match self.config.chunk_size {
            ChunkSize::Fixed(0) => Err(PointZipError::InvalidChunkSize(0)),
            // reserved for variable chunks in the descriptor
            ChunkSize::Fixed(VARIABLE_CHUNK_SIZE) => {
                Err(PointZipError::InvalidChunkSize(VARIABLE_CHUNK_SIZE))
            }
            _ => Ok(self.config),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::las::point_format::IntegerWidth;
    use crate::predictors::Predictor;

    #[test]
    fn defaults() {
        let config = StreamConfig::for_point_format(3).unwrap();
        assert_eq!(config.chunk_size(), ChunkSize::Fixed(50_000));
        assert!(!config.context_carry());
        assert_eq!(config.table_location(), TableLocation::Trailer);
        assert_eq!(config.record_size(), 34);
        assert!(matches!(
            StreamConfig::for_point_format(12),
            Err(PointZipError::UnsupportedPointFormat(12))
        ));
    }

    #[test]
    fn empty_layouts_are_rejected() {
        assert!(matches!(
            StreamConfig::builder(RecordLayoutBuilder::new().build()).build(),
            Err(PointZipError::EmptyRecordLayout)
        ));
        let only_empty_items = RecordLayoutBuilder::new()
            .add_item(RecordItem::ExtraBytes(0))
            .build();
        assert!(StreamConfig::builder(only_empty_items).build().is_err());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let result = StreamConfigBuilder::new(PointFormat::new(0).unwrap())
            .with_fixed_chunk_size(0)
            .build();
        assert!(matches!(result, Err(PointZipError::InvalidChunkSize(0))));
    }

    #[test]
    fn descriptor_is_read_back() {
        let configs = vec![
            StreamConfigBuilder::new(PointFormat::with_extra_bytes(8, 3).unwrap())
                .with_fixed_chunk_size(1000)
                .with_context_carry(true)
                .build()
                .unwrap(),
            StreamConfigBuilder::new(
                RecordLayoutBuilder::new()
                    .add_integer(IntegerWidth::I32, Predictor::Quadratic)
                    .add_item(RecordItem::Rgb)
                    .build(),
            )
            .with_variable_chunk_size()
            .with_table_location(TableLocation::HeaderSlot)
            .build()
            .unwrap(),
        ];
        for config in configs {
            let mut descriptor = Vec::new();
            config.write_to(&mut descriptor).unwrap();
            assert_eq!(StreamConfig::from_buffer(&descriptor).unwrap(), config);
        }
    }

    #[test]
    fn unknown_descriptor_version() {
        let mut descriptor = Vec::new();
        StreamConfig::for_point_format(0)
            .unwrap()
            .write_to(&mut descriptor)
            .unwrap();
        descriptor[0] = 9;
        assert!(matches!(
            StreamConfig::from_buffer(&descriptor),
            Err(PointZipError::UnsupportedDescriptorVersion(9))
        ));
    }
}
