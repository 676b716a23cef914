/*
===============================================================================

  PROGRAMMERS:

    martin.isenburg@rapidlasso.com  -  http://rapidlasso.com
    uday.karan@gmail.com - Hobu, Inc.

  COPYRIGHT:

    (c) 2007-2014, martin isenburg, rapidlasso - tools to catch reality
    (c) 2014, Uday Verma, Hobu, Inc.
    (c) 2019, Thomas Montaigu

    This is free software; you can redistribute and/or modify it under the
    terms of the GNU Lesser General Licence as published by the Free Software
    Foundation. See the COPYING file for more information.

    This software is distributed WITHOUT ANY WARRANTY and without even the
    implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.

  CHANGE HISTORY:
    6 June 2019: Translated to Rust

===============================================================================
*/

//! Extended point core of point formats 6 to 10, gps time included.

use std::io::{Read, Write};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::encoders::ArithmeticEncoder;
use crate::las::gps::{GpsTimeCompressor, GpsTimeDecompressor};
use crate::las::point10::{y_context, z_context};
use crate::las::utils;
use crate::models::{model_per_context, ArithmeticModel};
use crate::packers::Packable;
use crate::record::{FieldCompressor, FieldDecompressor};

pub const POINT14_SIZE: usize = 30;

#[derive(Default, Copy, Clone, PartialEq, Debug)]
pub struct Point14 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u16,
    // 4 bits
    pub return_number: u8,
    // 4 bits
    pub number_of_returns: u8,
    // 4 bits: synthetic, key point, withheld, overlap
    pub classification_flags: u8,
    // 2 bits
    pub scanner_channel: u8,
    pub scan_direction_flag: bool,
    pub edge_of_flight_line: bool,
    pub classification: u8,
    pub user_data: u8,
    pub scan_angle: i16,
    pub point_source_id: u16,
    pub gps_time: f64,
}

impl Point14 {
    pub fn returns_byte(&self) -> u8 {
        (self.number_of_returns & 0xF) << 4 | (self.return_number & 0xF)
    }

    pub fn populate_returns_from(&mut self, byte: u8) {
        self.return_number = byte & 0xF;
        self.number_of_returns = byte >> 4;
    }

    pub fn flags_byte(&self) -> u8 {
        (self.edge_of_flight_line as u8) << 7
            | (self.scan_direction_flag as u8) << 6
            | (self.scanner_channel & 0x3) << 4
            | (self.classification_flags & 0xF)
    }

    pub fn populate_flags_from(&mut self, byte: u8) {
        self.classification_flags = byte & 0xF;
        self.scanner_channel = (byte >> 4) & 0x3;
        self.scan_direction_flag = (byte >> 6) & 0x1 != 0;
        self.edge_of_flight_line = (byte >> 7) & 0x1 != 0;
    }

    #[inline]
    fn gps_time_bits(&self) -> i64 {
        self.gps_time.to_bits() as i64
    }

    fn changed_values(&self, last: &Self, last_intensity: u16) -> u32 {
        ((last.returns_byte() != self.returns_byte()) as u32) << 6
            | ((last.flags_byte() != self.flags_byte()) as u32) << 5
            | ((last_intensity != self.intensity) as u32) << 4
            | ((last.classification != self.classification) as u32) << 3
            | ((last.scan_angle != self.scan_angle) as u32) << 2
            | ((last.user_data != self.user_data) as u32) << 1
            | (last.point_source_id != self.point_source_id) as u32
    }
}

impl Packable for Point14 {
    type Type = Point14;

    fn unpack_from(input: &[u8]) -> Self::Type {
        let mut point = Point14 {
            x: i32::unpack_from(&input[0..4]),
            y: i32::unpack_from(&input[4..8]),
            z: i32::unpack_from(&input[8..12]),
            intensity: u16::unpack_from(&input[12..14]),
            classification: input[16],
            user_data: input[17],
            scan_angle: i16::unpack_from(&input[18..20]),
            point_source_id: u16::unpack_from(&input[20..22]),
            gps_time: f64::unpack_from(&input[22..30]),
            ..Default::default()
        };
        point.populate_returns_from(input[14]);
        point.populate_flags_from(input[15]);
        point
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.x.pack_into(&mut output[0..4]);
        self.y.pack_into(&mut output[4..8]);
        self.z.pack_into(&mut output[8..12]);
        self.intensity.pack_into(&mut output[12..14]);
        output[14] = self.returns_byte();
        output[15] = self.flags_byte();
        output[16] = self.classification;
        output[17] = self.user_data;
        self.scan_angle.pack_into(&mut output[18..20]);
        self.point_source_id.pack_into(&mut output[20..22]);
        self.gps_time.pack_into(&mut output[22..30]);
    }
}

const CHANGED_RETURNS: u32 = 1 << 6;
const CHANGED_FLAGS: u32 = 1 << 5;
const CHANGED_INTENSITY: u32 = 1 << 4;
const CHANGED_CLASSIFICATION: u32 = 1 << 3;
const CHANGED_SCAN_ANGLE: u32 = 1 << 2;
const CHANGED_USER_DATA: u32 = 1 << 1;
const CHANGED_POINT_SOURCE: u32 = 1;

#[derive(Clone)]
struct Common {
    last_point: Point14,
    last_gps_changed: bool,
    // indexed by the 6 return map contexts
    last_intensity: [u16; 6],
    last_x_diff_median: [utils::StreamingMedian<i32>; 6],
    last_y_diff_median: [utils::StreamingMedian<i32>; 6],
    // indexed by the return level
    last_height: [i32; 8],

    changed_values: Vec<ArithmeticModel>,
    returns: Vec<ArithmeticModel>,
    flags: Vec<ArithmeticModel>,
    classification: Vec<ArithmeticModel>,
    user_data: Vec<ArithmeticModel>,
}

impl Common {
    fn new() -> Self {
        Self {
            last_point: Point14::default(),
            last_gps_changed: false,
            last_intensity: [0u16; 6],
            last_x_diff_median: [utils::StreamingMedian::new(); 6],
            last_y_diff_median: [utils::StreamingMedian::new(); 6],
            last_height: [0i32; 8],
            changed_values: model_per_context(8, 128),
            returns: model_per_context(256, 256),
            flags: model_per_context(256, 256),
            classification: model_per_context(256, 256),
            user_data: model_per_context(64, 256),
        }
    }

    fn set_first(&mut self, point: Point14) {
        self.last_point = point;
        self.last_intensity = [point.intensity; 6];
        self.last_height = [point.z; 8];
    }

    /// Context of the changed values symbol, from the previous point
    fn changed_values_context(&self) -> usize {
        let last = &self.last_point;
        (last.return_number == 1) as usize
            | ((last.return_number >= last.number_of_returns) as usize) << 1
            | (self.last_gps_changed as usize) << 2
    }
}

#[inline]
fn return_contexts(point: &Point14) -> (usize, usize) {
    let n = point.number_of_returns as usize;
    let r = point.return_number as usize;
    (
        usize::from(utils::NUMBER_RETURN_MAP_6CTX[n][r]),
        usize::from(utils::NUMBER_RETURN_LEVEL_8CT[n][r]),
    )
}

pub struct LasPoint14Compressor {
    ic_intensity: IntegerCompressor,
    ic_scan_angle: IntegerCompressor,
    ic_point_source_id: IntegerCompressor,
    ic_dx: IntegerCompressor,
    ic_dy: IntegerCompressor,
    ic_z: IntegerCompressor,
    gps_time: GpsTimeCompressor,
    common: Common,
}

impl Default for LasPoint14Compressor {
    fn default() -> Self {
        Self {
            ic_intensity: IntegerCompressorBuilder::new().bits(16).contexts(6).build(),
            ic_scan_angle: IntegerCompressorBuilder::new().bits(16).contexts(2).build(),
            ic_point_source_id: IntegerCompressorBuilder::new().bits(16).build(),
            ic_dx: IntegerCompressorBuilder::new().bits(32).contexts(2).build(),
            ic_dy: IntegerCompressorBuilder::new().bits(32).contexts(22).build(),
            ic_z: IntegerCompressorBuilder::new().bits(32).contexts(20).build(),
            gps_time: GpsTimeCompressor::default(),
            common: Common::new(),
        }
    }
}

impl<W: Write> FieldCompressor<W> for LasPoint14Compressor {
    fn size_of_field(&self) -> usize {
        POINT14_SIZE
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        let point = Point14::unpack_from(buf);
        self.common.set_first(point);
        self.gps_time.set_first(point.gps_time_bits());
        dst.write_all(&buf[..POINT14_SIZE])
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        let current = Point14::unpack_from(buf);
        let common = &mut self.common;
        let last = common.last_point;
        let (m, l) = return_contexts(&current);

        let changed_values = current.changed_values(&last, common.last_intensity[m]);
        let context = common.changed_values_context();
        encoder.encode_symbol(&mut common.changed_values[context], changed_values)?;

        if changed_values & CHANGED_RETURNS != 0 {
            encoder.encode_symbol(
                &mut common.returns[usize::from(last.returns_byte())],
                u32::from(current.returns_byte()),
            )?;
        }

        if changed_values & CHANGED_FLAGS != 0 {
            encoder.encode_symbol(
                &mut common.flags[usize::from(last.flags_byte())],
                u32::from(current.flags_byte()),
            )?;
        }

        if changed_values & CHANGED_INTENSITY != 0 {
            self.ic_intensity.compress(
                encoder,
                i32::from(common.last_intensity[m]),
                i32::from(current.intensity),
                m as u32,
            )?;
            common.last_intensity[m] = current.intensity;
        }

        if changed_values & CHANGED_CLASSIFICATION != 0 {
            encoder.encode_symbol(
                &mut common.classification[usize::from(last.classification)],
                u32::from(current.classification),
            )?;
        }

        if changed_values & CHANGED_SCAN_ANGLE != 0 {
            self.ic_scan_angle.compress(
                encoder,
                i32::from(last.scan_angle as u16),
                i32::from(current.scan_angle as u16),
                current.scan_direction_flag as u32,
            )?;
        }

        if changed_values & CHANGED_USER_DATA != 0 {
            encoder.encode_symbol(
                &mut common.user_data[usize::from(last.user_data / 4)],
                u32::from(current.user_data),
            )?;
        }

        if changed_values & CHANGED_POINT_SOURCE != 0 {
            self.ic_point_source_id.compress(
                encoder,
                i32::from(last.point_source_id),
                i32::from(current.point_source_id),
                0,
            )?;
        }

        let n = current.number_of_returns;
        let median = common.last_x_diff_median[m].get();
        let diff = current.x.wrapping_sub(last.x);
        self.ic_dx.compress(encoder, median, diff, (n == 1) as u32)?;
        common.last_x_diff_median[m].add(diff);

        let median = common.last_y_diff_median[m].get();
        let diff = current.y.wrapping_sub(last.y);
        self.ic_dy
            .compress(encoder, median, diff, y_context(n, self.ic_dx.k()))?;
        common.last_y_diff_median[m].add(diff);

        let context = z_context(n, self.ic_dx.k(), self.ic_dy.k());
        self.ic_z
            .compress(encoder, common.last_height[l], current.z, context)?;
        common.last_height[l] = current.z;

        let gps_time = current.gps_time_bits();
        self.gps_time.compress_gps_time(encoder, gps_time)?;
        common.last_gps_changed = gps_time != last.gps_time_bits();

        common.last_point = current;
        Ok(())
    }
}

pub struct LasPoint14Decompressor {
    ic_intensity: IntegerDecompressor,
    ic_scan_angle: IntegerDecompressor,
    ic_point_source_id: IntegerDecompressor,
    ic_dx: IntegerDecompressor,
    ic_dy: IntegerDecompressor,
    ic_z: IntegerDecompressor,
    gps_time: GpsTimeDecompressor,
    common: Common,
}

impl Default for LasPoint14Decompressor {
    fn default() -> Self {
        Self {
            ic_intensity: IntegerDecompressorBuilder::new().bits(16).contexts(6).build(),
            ic_scan_angle: IntegerDecompressorBuilder::new().bits(16).contexts(2).build(),
            ic_point_source_id: IntegerDecompressorBuilder::new().bits(16).build(),
            ic_dx: IntegerDecompressorBuilder::new().bits(32).contexts(2).build(),
            ic_dy: IntegerDecompressorBuilder::new().bits(32).contexts(22).build(),
            ic_z: IntegerDecompressorBuilder::new().bits(32).contexts(20).build(),
            gps_time: GpsTimeDecompressor::default(),
            common: Common::new(),
        }
    }
}

impl<R: Read> FieldDecompressor<R> for LasPoint14Decompressor {
    fn size_of_field(&self) -> usize {
        POINT14_SIZE
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        src.read_exact(&mut first_point[..POINT14_SIZE])?;
        let point = Point14::unpack_from(first_point);
        self.common.set_first(point);
        self.gps_time.set_first(point.gps_time_bits());
        Ok(())
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        let common = &mut self.common;
        let last = common.last_point;
        let mut point = last;

        let context = common.changed_values_context();
        let changed_values = decoder.decode_symbol(&mut common.changed_values[context])?;

        if changed_values & CHANGED_RETURNS != 0 {
            let byte = decoder.decode_symbol(&mut common.returns[usize::from(last.returns_byte())])?;
            point.populate_returns_from(byte as u8);
        }
        let (m, l) = return_contexts(&point);

        if changed_values & CHANGED_FLAGS != 0 {
            let byte = decoder.decode_symbol(&mut common.flags[usize::from(last.flags_byte())])?;
            point.populate_flags_from(byte as u8);
        }

        if changed_values & CHANGED_INTENSITY != 0 {
            point.intensity = self.ic_intensity.decompress(
                decoder,
                i32::from(common.last_intensity[m]),
                m as u32,
            )? as u16;
            common.last_intensity[m] = point.intensity;
        } else {
            point.intensity = common.last_intensity[m];
        }

        if changed_values & CHANGED_CLASSIFICATION != 0 {
            point.classification = decoder
                .decode_symbol(&mut common.classification[usize::from(last.classification)])?
                as u8;
        }

        if changed_values & CHANGED_SCAN_ANGLE != 0 {
            point.scan_angle = self.ic_scan_angle.decompress(
                decoder,
                i32::from(last.scan_angle as u16),
                point.scan_direction_flag as u32,
            )? as u16 as i16;
        }

        if changed_values & CHANGED_USER_DATA != 0 {
            point.user_data = decoder
                .decode_symbol(&mut common.user_data[usize::from(last.user_data / 4)])?
                as u8;
        }

        if changed_values & CHANGED_POINT_SOURCE != 0 {
            point.point_source_id = self.ic_point_source_id.decompress(
                decoder,
                i32::from(last.point_source_id),
                0,
            )? as u16;
        }

        let n = point.number_of_returns;
        let median = common.last_x_diff_median[m].get();
        let diff = self.ic_dx.decompress(decoder, median, (n == 1) as u32)?;
        point.x = last.x.wrapping_add(diff);
        common.last_x_diff_median[m].add(diff);

        let median = common.last_y_diff_median[m].get();
        let diff = self
            .ic_dy
            .decompress(decoder, median, y_context(n, self.ic_dx.k()))?;
        point.y = last.y.wrapping_add(diff);
        common.last_y_diff_median[m].add(diff);

        let context = z_context(n, self.ic_dx.k(), self.ic_dy.k());
        point.z = self
            .ic_z
            .decompress(decoder, common.last_height[l], context)?;
        common.last_height[l] = point.z;

        let gps_time = self.gps_time.decompress_gps_time(decoder)?;
        point.gps_time = f64::from_bits(gps_time as u64);
        common.last_gps_changed = gps_time != last.gps_time_bits();

        point.pack_into(buf);
        common.last_point = point;
        Ok(())
    }
}
