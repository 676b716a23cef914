//! Point formats of the LAS specification and the codecs of their items.

pub mod extra_bytes;
pub mod gps;
pub mod nir;
pub mod point;
pub mod point10;
pub mod point14;
pub mod point_format;
pub mod rgb;
pub mod wavepacket;

pub(crate) mod utils;

pub use point::PointRecord;
pub use point10::Point10;
pub use point14::Point14;
pub use point_format::{IntegerWidth, PointFormat, RecordItem, RecordLayout, RecordLayoutBuilder};
pub use rgb::Rgb;
pub use wavepacket::WavePacket;
