//! Typed point records and their packed form.

use crate::errors::{PointZipError, Result};
use crate::las::point10::Point10;
use crate::las::point14::Point14;
use crate::las::point_format::{PointFormat, RecordItem};
use crate::las::rgb::Rgb;
use crate::las::wavepacket::WavePacket;
use crate::packers::Packable;

/// A point record of any point format.
///
/// Fields a point format does not have are `None` (or empty for the
/// extra bytes). Values must fit in the number of bits the point format
/// gives them: legacy formats (0 to 5) only have 3 bits for the returns and flags,
/// 5 bits for the classification, a one byte scan angle and no scanner channel.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PointRecord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u16,
    pub return_number: u8,
    pub number_of_returns: u8,
    pub scan_direction_flag: bool,
    pub edge_of_flight_line: bool,
    pub classification: u8,
    pub classification_flags: u8,
    pub scanner_channel: u8,
    pub scan_angle: i16,
    pub user_data: u8,
    pub point_source_id: u16,
    pub gps_time: Option<f64>,
    pub color: Option<Rgb>,
    pub nir: Option<u16>,
    pub wave_packet: Option<WavePacket>,
    pub extra_bytes: Vec<u8>,
}

fn check_range(field: &'static str, value: i64, max: i64) -> Result<()> {
    if value < 0 || value > max {
        Err(PointZipError::FieldValueOutOfRange { field, value, max })
    } else {
        Ok(())
    }
}

fn check_presence(
    point_format: &PointFormat,
    expected: bool,
    present: bool,
    reason: &'static str,
) -> Result<()> {
    if expected == present {
        Ok(())
    } else {
        Err(PointZipError::IncompatibleRecord {
            point_format: point_format.id(),
            reason,
        })
    }
}

impl PointRecord {
    /// Checks that the record can be written with the given point format
    pub fn validate(&self, point_format: &PointFormat) -> Result<()> {
        if point_format.is_extended() {
            check_range("return_number", i64::from(self.return_number), 15)?;
            check_range("number_of_returns", i64::from(self.number_of_returns), 15)?;
            check_range("classification_flags", i64::from(self.classification_flags), 15)?;
            check_range("scanner_channel", i64::from(self.scanner_channel), 3)?;
        } else {
            check_range("return_number", i64::from(self.return_number), 7)?;
            check_range("number_of_returns", i64::from(self.number_of_returns), 7)?;
            check_range("classification", i64::from(self.classification), 31)?;
            check_range("classification_flags", i64::from(self.classification_flags), 7)?;
            check_range("scanner_channel", i64::from(self.scanner_channel), 0)?;
            // the legacy scan angle rank is a signed byte
            check_range(
                "scan_angle",
                i64::from(self.scan_angle) + 128,
                i64::from(u8::MAX),
            )?;
        }

        let has_gps_time = point_format.is_extended() || point_format.has_gps_time();
        check_presence(
            point_format,
            has_gps_time,
            self.gps_time.is_some(),
            "gps time presence does not match",
        )?;
        check_presence(
            point_format,
            point_format.has_color(),
            self.color.is_some(),
            "color presence does not match",
        )?;
        check_presence(
            point_format,
            point_format.has_nir(),
            self.nir.is_some(),
            "nir presence does not match",
        )?;
        check_presence(
            point_format,
            point_format.has_wave_packet(),
            self.wave_packet.is_some(),
            "wave packet presence does not match",
        )?;
        check_presence(
            point_format,
            true,
            self.extra_bytes.len() == usize::from(point_format.num_extra_bytes()),
            "number of extra bytes does not match",
        )
    }

    fn to_point10(&self) -> Point10 {
        Point10 {
            x: self.x,
            y: self.y,
            z: self.z,
            intensity: self.intensity,
            return_number: self.return_number,
            number_of_returns: self.number_of_returns,
            scan_direction_flag: self.scan_direction_flag,
            edge_of_flight_line: self.edge_of_flight_line,
            classification: self.classification_flags << 5 | self.classification,
            scan_angle_rank: self.scan_angle as i8,
            user_data: self.user_data,
            point_source_id: self.point_source_id,
        }
    }

    fn to_point14(&self) -> Point14 {
        Point14 {
            x: self.x,
            y: self.y,
            z: self.z,
            intensity: self.intensity,
            return_number: self.return_number,
            number_of_returns: self.number_of_returns,
            classification_flags: self.classification_flags,
            scanner_channel: self.scanner_channel,
            scan_direction_flag: self.scan_direction_flag,
            edge_of_flight_line: self.edge_of_flight_line,
            classification: self.classification,
            user_data: self.user_data,
            scan_angle: self.scan_angle,
            point_source_id: self.point_source_id,
            gps_time: self.gps_time.unwrap_or_default(),
        }
    }

    fn set_point10(&mut self, point: Point10) {
        self.x = point.x;
        self.y = point.y;
        self.z = point.z;
        self.intensity = point.intensity;
        self.return_number = point.return_number;
        self.number_of_returns = point.number_of_returns;
        self.scan_direction_flag = point.scan_direction_flag;
        self.edge_of_flight_line = point.edge_of_flight_line;
        self.classification = point.classification & 0x1F;
        self.classification_flags = point.classification >> 5;
        self.scanner_channel = 0;
        self.scan_angle = i16::from(point.scan_angle_rank);
        self.user_data = point.user_data;
        self.point_source_id = point.point_source_id;
    }

    fn set_point14(&mut self, point: Point14) {
        self.x = point.x;
        self.y = point.y;
        self.z = point.z;
        self.intensity = point.intensity;
        self.return_number = point.return_number;
        self.number_of_returns = point.number_of_returns;
        self.scan_direction_flag = point.scan_direction_flag;
        self.edge_of_flight_line = point.edge_of_flight_line;
        self.classification = point.classification;
        self.classification_flags = point.classification_flags;
        self.scanner_channel = point.scanner_channel;
        self.scan_angle = point.scan_angle;
        self.user_data = point.user_data;
        self.point_source_id = point.point_source_id;
        self.gps_time = Some(point.gps_time);
    }

    /// Writes the record in the packed layout of the point format.
    ///
    /// `output` must be at least `point_format.record_size()` bytes.
    pub fn pack_into(&self, point_format: &PointFormat, output: &mut [u8]) -> Result<()> {
        self.validate(point_format)?;
        let mut start = 0;
        for item in point_format.items() {
            let end = start + item.size();
            let dst = &mut output[start..end];
            match item {
                RecordItem::Point10 => self.to_point10().pack_into(dst),
                RecordItem::Point14 => self.to_point14().pack_into(dst),
                RecordItem::GpsTime => self.gps_time.unwrap_or_default().pack_into(dst),
                RecordItem::Rgb => self.color.unwrap_or_default().pack_into(dst),
                RecordItem::Nir => self.nir.unwrap_or_default().pack_into(dst),
                RecordItem::WavePacket => self.wave_packet.unwrap_or_default().pack_into(dst),
                RecordItem::ExtraBytes(_) => dst.copy_from_slice(&self.extra_bytes),
                RecordItem::Integer { .. } => {
                    return Err(PointZipError::IncompatibleRecord {
                        point_format: point_format.id(),
                        reason: "generic integer items have no typed record",
                    })
                }
            }
            start = end;
        }
        Ok(())
    }

    /// Reads a record from the packed layout of the point format
    pub fn unpack_from(point_format: &PointFormat, input: &[u8]) -> Self {
        let mut record = PointRecord::default();
        let mut start = 0;
        for item in point_format.items() {
            let end = start + item.size();
            let src = &input[start..end];
            match item {
                RecordItem::Point10 => record.set_point10(Point10::unpack_from(src)),
                RecordItem::Point14 => record.set_point14(Point14::unpack_from(src)),
                RecordItem::GpsTime => record.gps_time = Some(f64::unpack_from(src)),
                RecordItem::Rgb => record.color = Some(Rgb::unpack_from(src)),
                RecordItem::Nir => record.nir = Some(u16::unpack_from(src)),
                RecordItem::WavePacket => record.wave_packet = Some(WavePacket::unpack_from(src)),
                RecordItem::ExtraBytes(_) => record.extra_bytes = src.to_vec(),
                RecordItem::Integer { .. } => {}
            }
            start = end;
        }
        record
    }
}
