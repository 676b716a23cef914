//! Point formats and the record layouts the codecs are bound to.

use crate::errors::{PointZipError, Result};
use crate::predictors::Predictor;

const MAX_POINT_FORMAT_ID: u8 = 10;

/// Width and signedness of a generic integer field
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IntegerWidth {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
}

impl IntegerWidth {
    pub fn size(self) -> usize {
        match self {
            IntegerWidth::U8 | IntegerWidth::I8 => 1,
            IntegerWidth::U16 | IntegerWidth::I16 => 2,
            IntegerWidth::U32 | IntegerWidth::I32 => 4,
        }
    }

    fn code(self) -> u16 {
        match self {
            IntegerWidth::U8 => 0,
            IntegerWidth::I8 => 1,
            IntegerWidth::U16 => 2,
            IntegerWidth::I16 => 3,
            IntegerWidth::U32 => 4,
            IntegerWidth::I32 => 5,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(IntegerWidth::U8),
            1 => Some(IntegerWidth::I8),
            2 => Some(IntegerWidth::U16),
            3 => Some(IntegerWidth::I16),
            4 => Some(IntegerWidth::U32),
            5 => Some(IntegerWidth::I32),
            _ => None,
        }
    }
}

/// The group of fields a codec is responsible for.
///
/// Items are laid out back to back in a record, in the order of the layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RecordItem {
    /// Legacy point core (point formats 0 to 5)
    Point10,
    /// Extended point core, gps time included (point formats 6 to 10)
    Point14,
    GpsTime,
    Rgb,
    Nir,
    WavePacket,
    ExtraBytes(u16),
    /// A single integer field coded with the given predictor
    Integer {
        width: IntegerWidth,
        predictor: Predictor,
    },
}

impl RecordItem {
    /// Size in bytes of the item in a record
    pub fn size(&self) -> usize {
        match self {
            RecordItem::Point10 => 20,
            RecordItem::Point14 => 30,
            RecordItem::GpsTime => 8,
            RecordItem::Rgb => 6,
            RecordItem::Nir => 2,
            RecordItem::WavePacket => 29,
            RecordItem::ExtraBytes(count) => usize::from(*count),
            RecordItem::Integer { width, .. } => width.size(),
        }
    }

    pub(crate) fn type_code(&self) -> u16 {
        match self {
            RecordItem::ExtraBytes(_) => 0,
            RecordItem::Point10 => 6,
            RecordItem::GpsTime => 7,
            RecordItem::Rgb => 8,
            RecordItem::WavePacket => 9,
            RecordItem::Point14 => 10,
            RecordItem::Nir => 12,
            RecordItem::Integer { .. } => 20,
        }
    }

    pub(crate) fn parameter(&self) -> u16 {
        match self {
            RecordItem::ExtraBytes(count) => *count,
            RecordItem::Integer { width, predictor } => width.code() << 8 | predictor.code(),
            _ => 0,
        }
    }

    pub(crate) fn from_parts(type_code: u16, parameter: u16) -> Result<Self> {
        let item = match type_code {
            0 => RecordItem::ExtraBytes(parameter),
            6 => RecordItem::Point10,
            7 => RecordItem::GpsTime,
            8 => RecordItem::Rgb,
            9 => RecordItem::WavePacket,
            10 => RecordItem::Point14,
            12 => RecordItem::Nir,
            20 => {
                let width = IntegerWidth::from_code(parameter >> 8);
                let predictor = Predictor::from_code(parameter & 0xFF);
                match (width, predictor) {
                    (Some(width), Some(predictor)) => RecordItem::Integer { width, predictor },
                    _ => return Err(PointZipError::UnknownItemType(type_code)),
                }
            }
            _ => return Err(PointZipError::UnknownItemType(type_code)),
        };
        Ok(item)
    }
}

/// A point format of the LAS specification: an id in `0..=10`
/// and the number of extra bytes appended to each record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PointFormat {
    id: u8,
    num_extra_bytes: u16,
}

impl PointFormat {
    pub fn new(id: u8) -> Result<Self> {
        Self::with_extra_bytes(id, 0)
    }

    pub fn with_extra_bytes(id: u8, num_extra_bytes: u16) -> Result<Self> {
        if id > MAX_POINT_FORMAT_ID {
            return Err(PointZipError::UnsupportedPointFormat(id));
        }
        Ok(Self {
            id,
            num_extra_bytes,
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn num_extra_bytes(&self) -> u16 {
        self.num_extra_bytes
    }

    /// Formats 6 to 10 use the extended point core
    pub fn is_extended(&self) -> bool {
        self.id >= 6
    }

    pub fn has_gps_time(&self) -> bool {
        self.id != 0 && self.id != 2
    }

    pub fn has_color(&self) -> bool {
        matches!(self.id, 2 | 3 | 5 | 7 | 8 | 10)
    }

    pub fn has_nir(&self) -> bool {
        matches!(self.id, 8 | 10)
    }

    pub fn has_wave_packet(&self) -> bool {
        matches!(self.id, 4 | 5 | 9 | 10)
    }

    /// Items of the format, in record order
    pub fn items(&self) -> Vec<RecordItem> {
        let mut items = Vec::with_capacity(5);
        if self.is_extended() {
            items.push(RecordItem::Point14);
        } else {
            items.push(RecordItem::Point10);
            if self.has_gps_time() {
                items.push(RecordItem::GpsTime);
            }
        }
        if self.has_color() {
            items.push(RecordItem::Rgb);
        }
        if self.has_nir() {
            items.push(RecordItem::Nir);
        }
        if self.has_wave_packet() {
            items.push(RecordItem::WavePacket);
        }
        if self.num_extra_bytes > 0 {
            items.push(RecordItem::ExtraBytes(self.num_extra_bytes));
        }
        items
    }

    pub fn record_size(&self) -> usize {
        self.items().iter().map(RecordItem::size).sum()
    }
}

/// Ordered list of the items making up a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    items: Vec<RecordItem>,
    point_format: Option<PointFormat>,
}

impl RecordLayout {
    pub fn from_point_format(point_format: PointFormat) -> Self {
        Self {
            items: point_format.items(),
            point_format: Some(point_format),
        }
    }

    pub fn items(&self) -> &[RecordItem] {
        &self.items
    }

    /// The point format this layout was created from,
    /// `None` for layouts composed with the [`RecordLayoutBuilder`]
    pub fn point_format(&self) -> Option<PointFormat> {
        self.point_format
    }

    pub fn record_size(&self) -> usize {
        self.items.iter().map(RecordItem::size).sum()
    }
}

impl From<PointFormat> for RecordLayout {
    fn from(point_format: PointFormat) -> Self {
        Self::from_point_format(point_format)
    }
}

/// Composes a custom record layout.
///
/// ```
/// use pointzip::{IntegerWidth, Predictor, RecordLayoutBuilder};
///
/// let layout = RecordLayoutBuilder::new()
///     .add_integer(IntegerWidth::I32, Predictor::Linear)
///     .add_integer(IntegerWidth::I32, Predictor::Linear)
///     .add_integer(IntegerWidth::I32, Predictor::Previous)
///     .add_integer(IntegerWidth::U16, Predictor::Previous)
///     .build();
/// assert_eq!(layout.record_size(), 14);
/// ```
#[derive(Debug, Default)]
pub struct RecordLayoutBuilder {
    items: Vec<RecordItem>,
}

impl RecordLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(mut self, item: RecordItem) -> Self {
        // zero sized items have nothing to code
        if item.size() > 0 {
            self.items.push(item);
        }
        self
    }

    pub fn add_integer(self, width: IntegerWidth, predictor: Predictor) -> Self {
        self.add_item(RecordItem::Integer { width, predictor })
    }

    pub fn build(self) -> RecordLayout {
        RecordLayout {
            items: self.items,
            point_format: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_sizes_of_all_formats() {
        let expected = [20, 28, 26, 34, 57, 63, 30, 36, 38, 59, 67];
        for (id, size) in expected.iter().enumerate() {
            let format = PointFormat::new(id as u8).unwrap();
            assert_eq!(format.record_size(), *size, "point format {}", id);
        }
        let format = PointFormat::with_extra_bytes(3, 5).unwrap();
        assert_eq!(format.record_size(), 39);
        assert_eq!(*format.items().last().unwrap(), RecordItem::ExtraBytes(5));
    }

    #[test]
    fn unknown_formats_are_rejected() {
        assert!(matches!(
            PointFormat::new(11),
            Err(PointZipError::UnsupportedPointFormat(11))
        ));
    }

    #[test]
    fn item_codes_are_reversible() {
        let items = [
            RecordItem::Point10,
            RecordItem::Point14,
            RecordItem::GpsTime,
            RecordItem::Rgb,
            RecordItem::Nir,
            RecordItem::WavePacket,
            RecordItem::ExtraBytes(3),
            RecordItem::Integer {
                width: IntegerWidth::I16,
                predictor: Predictor::Quadratic,
            },
        ];
        for item in &items {
            let back = RecordItem::from_parts(item.type_code(), item.parameter()).unwrap();
            assert_eq!(back, *item);
        }
        assert!(RecordItem::from_parts(99, 0).is_err());
    }
}
