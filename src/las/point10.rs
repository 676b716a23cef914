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

//! Legacy point core shared by point formats 0 to 5.

use std::io::{Read, Write};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::encoders::ArithmeticEncoder;
use crate::las::utils;
use crate::models::{model_per_context, ArithmeticModel, ArithmeticModelBuilder};
use crate::packers::Packable;
use crate::record::{FieldCompressor, FieldDecompressor};

pub const POINT10_SIZE: usize = 20;

#[derive(Default, Copy, Clone, PartialEq, Debug)]
pub struct Point10 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u16,
    // 3 bits
    pub return_number: u8,
    // 3 bits
    pub number_of_returns: u8,
    pub scan_direction_flag: bool,
    pub edge_of_flight_line: bool,
    // 5 bits for the class, 3 bits of flags
    pub classification: u8,
    pub scan_angle_rank: i8,
    pub user_data: u8,
    pub point_source_id: u16,
}

impl Point10 {
    pub fn populate_bit_fields_from(&mut self, byte: u8) {
        self.return_number = byte & 0x7;
        self.number_of_returns = (byte >> 3) & 0x7;
        self.scan_direction_flag = ((byte >> 6) & 0x1) != 0;
        self.edge_of_flight_line = ((byte >> 7) & 0x1) != 0;
    }

    pub fn bit_fields_to_byte(&self) -> u8 {
        (self.edge_of_flight_line as u8) << 7
            | (self.scan_direction_flag as u8) << 6
            | (self.number_of_returns & 0x7) << 3
            | (self.return_number & 0x7)
    }

    /// Bit map of the fields, other than x, y, z, that differ from `last`
    fn changed_values(&self, last: &Self, last_intensity: u16) -> u32 {
        ((last.bit_fields_to_byte() != self.bit_fields_to_byte()) as u32) << 5
            | ((last_intensity != self.intensity) as u32) << 4
            | ((last.classification != self.classification) as u32) << 3
            | ((last.scan_angle_rank != self.scan_angle_rank) as u32) << 2
            | ((last.user_data != self.user_data) as u32) << 1
            | (last.point_source_id != self.point_source_id) as u32
    }
}

impl Packable for Point10 {
    type Type = Point10;

    fn unpack_from(input: &[u8]) -> Self::Type {
        let mut point = Point10 {
            x: i32::unpack_from(&input[0..4]),
            y: i32::unpack_from(&input[4..8]),
            z: i32::unpack_from(&input[8..12]),
            intensity: u16::unpack_from(&input[12..14]),
            classification: input[15],
            scan_angle_rank: i8::unpack_from(&input[16..17]),
            user_data: input[17],
            point_source_id: u16::unpack_from(&input[18..20]),
            ..Default::default()
        };
        point.populate_bit_fields_from(input[14]);
        point
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.x.pack_into(&mut output[0..4]);
        self.y.pack_into(&mut output[4..8]);
        self.z.pack_into(&mut output[8..12]);
        self.intensity.pack_into(&mut output[12..14]);
        output[14] = self.bit_fields_to_byte();
        output[15] = self.classification;
        self.scan_angle_rank.pack_into(&mut output[16..17]);
        output[17] = self.user_data;
        self.point_source_id.pack_into(&mut output[18..20]);
    }
}

const CHANGED_BIT_FIELDS: u32 = 1 << 5;
const CHANGED_INTENSITY: u32 = 1 << 4;
const CHANGED_CLASSIFICATION: u32 = 1 << 3;
const CHANGED_SCAN_ANGLE: u32 = 1 << 2;
const CHANGED_USER_DATA: u32 = 1 << 1;
const CHANGED_POINT_SOURCE: u32 = 1;

/// State both directions keep in sync
#[derive(Clone)]
struct Common {
    last_point: Point10,
    // indexed by the return map context
    last_intensity: [u16; 16],
    last_x_diff_median: [utils::StreamingMedian<i32>; 16],
    last_y_diff_median: [utils::StreamingMedian<i32>; 16],
    // indexed by the return level
    last_height: [i32; 8],

    changed_values: ArithmeticModel,
    scan_angle_rank: Vec<ArithmeticModel>,
    bit_byte: Vec<ArithmeticModel>,
    classification: Vec<ArithmeticModel>,
    user_data: Vec<ArithmeticModel>,
}

impl Common {
    fn new() -> Self {
        Self {
            last_point: Point10::default(),
            last_intensity: [0u16; 16],
            last_x_diff_median: [utils::StreamingMedian::new(); 16],
            last_y_diff_median: [utils::StreamingMedian::new(); 16],
            last_height: [0i32; 8],
            changed_values: ArithmeticModelBuilder::new(64).build(),
            scan_angle_rank: model_per_context(2, 256),
            bit_byte: model_per_context(256, 256),
            classification: model_per_context(256, 256),
            user_data: model_per_context(256, 256),
        }
    }
}

/// Contexts of the y and z correctors
#[inline]
pub(super) fn y_context(n: u8, k_x: u32) -> u32 {
    (n == 1) as u32 + utils::k_context(k_x, 20)
}

#[inline]
pub(super) fn z_context(n: u8, k_x: u32, k_y: u32) -> u32 {
    (n == 1) as u32 + utils::k_context((k_x + k_y) / 2, 18)
}

pub struct LasPoint10Compressor {
    ic_intensity: IntegerCompressor,
    ic_point_source_id: IntegerCompressor,
    ic_dx: IntegerCompressor,
    ic_dy: IntegerCompressor,
    ic_z: IntegerCompressor,
    common: Common,
}

impl Default for LasPoint10Compressor {
    fn default() -> Self {
        Self {
            ic_intensity: IntegerCompressorBuilder::new().bits(16).contexts(4).build(),
            ic_point_source_id: IntegerCompressorBuilder::new().bits(16).build(),
            ic_dx: IntegerCompressorBuilder::new().bits(32).contexts(2).build(),
            ic_dy: IntegerCompressorBuilder::new().bits(32).contexts(22).build(),
            ic_z: IntegerCompressorBuilder::new().bits(32).contexts(20).build(),
            common: Common::new(),
        }
    }
}

impl<W: Write> FieldCompressor<W> for LasPoint10Compressor {
    fn size_of_field(&self) -> usize {
        POINT10_SIZE
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        self.common.last_point = Point10::unpack_from(buf);
        dst.write_all(&buf[..POINT10_SIZE])
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        let current = Point10::unpack_from(buf);
        let common = &mut self.common;
        let last = common.last_point;

        let n = current.number_of_returns as usize;
        let r = current.return_number as usize;
        let m = usize::from(utils::NUMBER_RETURN_MAP[n][r]);
        let l = usize::from(utils::NUMBER_RETURN_LEVEL[n][r]);

        let changed_values = current.changed_values(&last, common.last_intensity[m]);
        encoder.encode_symbol(&mut common.changed_values, changed_values)?;

        if changed_values & CHANGED_BIT_FIELDS != 0 {
            encoder.encode_symbol(
                &mut common.bit_byte[usize::from(last.bit_fields_to_byte())],
                u32::from(current.bit_fields_to_byte()),
            )?;
        }

        if changed_values & CHANGED_INTENSITY != 0 {
            self.ic_intensity.compress(
                encoder,
                i32::from(common.last_intensity[m]),
                i32::from(current.intensity),
                m.min(3) as u32,
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
            let diff = current.scan_angle_rank.wrapping_sub(last.scan_angle_rank) as u8;
            encoder.encode_symbol(
                &mut common.scan_angle_rank[current.scan_direction_flag as usize],
                u32::from(diff),
            )?;
        }

        if changed_values & CHANGED_USER_DATA != 0 {
            encoder.encode_symbol(
                &mut common.user_data[usize::from(last.user_data)],
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

        let median = common.last_x_diff_median[m].get();
        let diff = current.x.wrapping_sub(last.x);
        self.ic_dx.compress(encoder, median, diff, (n == 1) as u32)?;
        common.last_x_diff_median[m].add(diff);

        let median = common.last_y_diff_median[m].get();
        let diff = current.y.wrapping_sub(last.y);
        let context = y_context(current.number_of_returns, self.ic_dx.k());
        self.ic_dy.compress(encoder, median, diff, context)?;
        common.last_y_diff_median[m].add(diff);

        let context = z_context(current.number_of_returns, self.ic_dx.k(), self.ic_dy.k());
        self.ic_z
            .compress(encoder, common.last_height[l], current.z, context)?;
        common.last_height[l] = current.z;

        common.last_point = current;
        Ok(())
    }
}

pub struct LasPoint10Decompressor {
    ic_intensity: IntegerDecompressor,
    ic_point_source_id: IntegerDecompressor,
    ic_dx: IntegerDecompressor,
    ic_dy: IntegerDecompressor,
    ic_z: IntegerDecompressor,
    common: Common,
}

impl Default for LasPoint10Decompressor {
    fn default() -> Self {
        Self {
            ic_intensity: IntegerDecompressorBuilder::new().bits(16).contexts(4).build(),
            ic_point_source_id: IntegerDecompressorBuilder::new().bits(16).build(),
            ic_dx: IntegerDecompressorBuilder::new().bits(32).contexts(2).build(),
            ic_dy: IntegerDecompressorBuilder::new().bits(32).contexts(22).build(),
            ic_z: IntegerDecompressorBuilder::new().bits(32).contexts(20).build(),
            common: Common::new(),
        }
    }
}

impl<R: Read> FieldDecompressor<R> for LasPoint10Decompressor {
    fn size_of_field(&self) -> usize {
        POINT10_SIZE
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        src.read_exact(&mut first_point[..POINT10_SIZE])?;
        self.common.last_point = Point10::unpack_from(first_point);
        Ok(())
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        let common = &mut self.common;
        let mut point = common.last_point;

        let changed_values = decoder.decode_symbol(&mut common.changed_values)?;

        if changed_values & CHANGED_BIT_FIELDS != 0 {
            let last_byte = usize::from(point.bit_fields_to_byte());
            let byte = decoder.decode_symbol(&mut common.bit_byte[last_byte])? as u8;
            point.populate_bit_fields_from(byte);
        }

        let n = point.number_of_returns as usize;
        let r = point.return_number as usize;
        let m = usize::from(utils::NUMBER_RETURN_MAP[n][r]);
        let l = usize::from(utils::NUMBER_RETURN_LEVEL[n][r]);

        if changed_values & CHANGED_INTENSITY != 0 {
            point.intensity = self.ic_intensity.decompress(
                decoder,
                i32::from(common.last_intensity[m]),
                m.min(3) as u32,
            )? as u16;
            common.last_intensity[m] = point.intensity;
        } else {
            point.intensity = common.last_intensity[m];
        }

        if changed_values & CHANGED_CLASSIFICATION != 0 {
            point.classification = decoder
                .decode_symbol(&mut common.classification[usize::from(point.classification)])?
                as u8;
        }

        if changed_values & CHANGED_SCAN_ANGLE != 0 {
            let diff = decoder
                .decode_symbol(&mut common.scan_angle_rank[point.scan_direction_flag as usize])?
                as u8;
            point.scan_angle_rank = point.scan_angle_rank.wrapping_add(diff as i8);
        }

        if changed_values & CHANGED_USER_DATA != 0 {
            point.user_data =
                decoder.decode_symbol(&mut common.user_data[usize::from(point.user_data)])? as u8;
        }

        if changed_values & CHANGED_POINT_SOURCE != 0 {
            point.point_source_id = self.ic_point_source_id.decompress(
                decoder,
                i32::from(point.point_source_id),
                0,
            )? as u16;
        }

        let median = common.last_x_diff_median[m].get();
        let diff = self.ic_dx.decompress(decoder, median, (n == 1) as u32)?;
        point.x = point.x.wrapping_add(diff);
        common.last_x_diff_median[m].add(diff);

        let median = common.last_y_diff_median[m].get();
        let context = y_context(point.number_of_returns, self.ic_dx.k());
        let diff = self.ic_dy.decompress(decoder, median, context)?;
        point.y = point.y.wrapping_add(diff);
        common.last_y_diff_median[m].add(diff);

        let context = z_context(point.number_of_returns, self.ic_dx.k(), self.ic_dy.k());
        point.z = self
            .ic_z
            .decompress(decoder, common.last_height[l], context)?;
        common.last_height[l] = point.z;

        point.pack_into(buf);
        common.last_point = point;
        Ok(())
    }
}
