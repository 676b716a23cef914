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

//! GPS time codec.
//!
//! The f64 is handled through its bit pattern as an i64. Up to four
//! interleaved time sequences are tracked, each value is coded as
//! a multiple of the last difference of its sequence when possible.

use std::io::{Read, Write};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::encoders::ArithmeticEncoder;
use crate::las::utils::i32_quantize;
use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
use crate::packers::Packable;
use crate::record::{FieldCompressor, FieldDecompressor};

pub const GPS_TIME_SIZE: usize = 8;

const GPS_TIME_MULTI: i32 = 500;
const GPS_TIME_MULTI_MINUS: i32 = -10;
const GPS_TIME_MULTI_UNCHANGED: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 1;
const GPS_TIME_MULTI_CODE_FULL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 2;
const GPS_TIME_MULTI_TOTAL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 6;

/// Returns the difference if it can be represented with 32 bits
#[inline]
fn diff_32(value: i64, reference: i64) -> Option<i32> {
    let diff_64 = value.wrapping_sub(reference);
    let diff_32 = diff_64 as i32;
    if diff_64 == i64::from(diff_32) {
        Some(diff_32)
    } else {
        None
    }
}

#[derive(Clone)]
struct Common {
    gps_time_multi: ArithmeticModel,
    gps_time_0_diff: ArithmeticModel,
    last: usize,
    next: usize,
    last_gps_times: [i64; 4],
    last_gps_time_diffs: [i32; 4],
    multi_extreme_counters: [i32; 4],
}

impl Common {
    fn new() -> Self {
        Self {
            gps_time_multi: ArithmeticModelBuilder::new(GPS_TIME_MULTI_TOTAL as u32).build(),
            gps_time_0_diff: ArithmeticModelBuilder::new(6).build(),
            last: 0,
            next: 0,
            last_gps_times: [0i64; 4],
            last_gps_time_diffs: [0i32; 4],
            multi_extreme_counters: [0i32; 4],
        }
    }

    /// Offset (1 to 3) of another sequence `value` is close enough to
    fn other_sequence(&self, value: i64) -> Option<usize> {
        (1..4).find(|i| diff_32(value, self.last_gps_times[(self.last + i) & 3]).is_some())
    }

    /// After too many extreme multipliers the difference becomes the new reference
    fn count_extreme(&mut self, diff: i32) {
        let counter = &mut self.multi_extreme_counters[self.last];
        *counter += 1;
        if *counter > 3 {
            self.last_gps_time_diffs[self.last] = diff;
            *counter = 0;
        }
    }

    fn switch_to_next_sequence(&mut self) {
        self.next = (self.next + 1) & 3;
        self.last = self.next;
        self.last_gps_time_diffs[self.last] = 0;
        self.multi_extreme_counters[self.last] = 0;
    }
}

pub struct GpsTimeCompressor {
    ic_gps_time: IntegerCompressor,
    common: Common,
}

impl Default for GpsTimeCompressor {
    fn default() -> Self {
        Self {
            ic_gps_time: IntegerCompressorBuilder::new().bits(32).contexts(9).build(),
            common: Common::new(),
        }
    }
}

impl GpsTimeCompressor {
    /// Seeds the state with the gps time of the raw first record
    pub(crate) fn set_first(&mut self, gps_time: i64) {
        self.common.last_gps_times[0] = gps_time;
    }

    pub(crate) fn compress_gps_time<W: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        gps_time: i64,
    ) -> std::io::Result<()> {
        loop {
            let last = self.common.last;
            let last_gps_time = self.common.last_gps_times[last];
            let last_diff = self.common.last_gps_time_diffs[last];

            if last_diff == 0 {
                if gps_time == last_gps_time {
                    return encoder.encode_symbol(&mut self.common.gps_time_0_diff, 0);
                }
                if let Some(diff) = diff_32(gps_time, last_gps_time) {
                    encoder.encode_symbol(&mut self.common.gps_time_0_diff, 1)?;
                    self.ic_gps_time.compress(encoder, 0, diff, 0)?;
                    self.common.last_gps_time_diffs[last] = diff;
                    self.common.multi_extreme_counters[last] = 0;
                } else if let Some(i) = self.common.other_sequence(gps_time) {
                    encoder.encode_symbol(&mut self.common.gps_time_0_diff, (i + 2) as u32)?;
                    self.common.last = (last + i) & 3;
                    continue;
                } else {
                    encoder.encode_symbol(&mut self.common.gps_time_0_diff, 2)?;
                    self.start_new_sequence(encoder, gps_time)?;
                }
            } else {
                if gps_time == last_gps_time {
                    return encoder.encode_symbol(
                        &mut self.common.gps_time_multi,
                        GPS_TIME_MULTI_UNCHANGED as u32,
                    );
                }
                if let Some(diff) = diff_32(gps_time, last_gps_time) {
                    self.compress_multiplied_diff(encoder, diff, last_diff)?;
                } else if let Some(i) = self.common.other_sequence(gps_time) {
                    encoder.encode_symbol(
                        &mut self.common.gps_time_multi,
                        (GPS_TIME_MULTI_CODE_FULL + i as i32) as u32,
                    )?;
                    self.common.last = (last + i) & 3;
                    continue;
                } else {
                    encoder.encode_symbol(
                        &mut self.common.gps_time_multi,
                        GPS_TIME_MULTI_CODE_FULL as u32,
                    )?;
                    self.start_new_sequence(encoder, gps_time)?;
                }
            }
            self.common.last_gps_times[self.common.last] = gps_time;
            return Ok(());
        }
    }

    fn compress_multiplied_diff<W: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        diff: i32,
        last_diff: i32,
    ) -> std::io::Result<()> {
        let multi = i32_quantize(diff as f32 / last_diff as f32);
        let model = &mut self.common.gps_time_multi;

        if multi == 1 {
            // regularly spaced pulses
            encoder.encode_symbol(model, 1)?;
            self.ic_gps_time.compress(encoder, last_diff, diff, 1)?;
            self.common.multi_extreme_counters[self.common.last] = 0;
        } else if multi > 0 && multi < GPS_TIME_MULTI {
            encoder.encode_symbol(model, multi as u32)?;
            let context = if multi < 10 { 2 } else { 3 };
            self.ic_gps_time
                .compress(encoder, multi.wrapping_mul(last_diff), diff, context)?;
        } else if multi >= GPS_TIME_MULTI {
            encoder.encode_symbol(model, GPS_TIME_MULTI as u32)?;
            self.ic_gps_time
                .compress(encoder, GPS_TIME_MULTI.wrapping_mul(last_diff), diff, 4)?;
            self.common.count_extreme(diff);
        } else if multi < 0 && multi > GPS_TIME_MULTI_MINUS {
            encoder.encode_symbol(model, (GPS_TIME_MULTI - multi) as u32)?;
            self.ic_gps_time
                .compress(encoder, multi.wrapping_mul(last_diff), diff, 5)?;
        } else if multi < 0 {
            encoder.encode_symbol(model, (GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS) as u32)?;
            self.ic_gps_time.compress(
                encoder,
                GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
                diff,
                6,
            )?;
            self.common.count_extreme(diff);
        } else {
            encoder.encode_symbol(model, 0)?;
            self.ic_gps_time.compress(encoder, 0, diff, 7)?;
            self.common.count_extreme(diff);
        }
        Ok(())
    }

    fn start_new_sequence<W: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        gps_time: i64,
    ) -> std::io::Result<()> {
        let last_gps_time = self.common.last_gps_times[self.common.last];
        self.ic_gps_time.compress(
            encoder,
            (last_gps_time >> 32) as i32,
            (gps_time >> 32) as i32,
            8,
        )?;
        encoder.write_int(gps_time as u32)?;
        self.common.switch_to_next_sequence();
        Ok(())
    }
}

impl<W: Write> FieldCompressor<W> for GpsTimeCompressor {
    fn size_of_field(&self) -> usize {
        GPS_TIME_SIZE
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        self.set_first(i64::unpack_from(buf));
        dst.write_all(&buf[..GPS_TIME_SIZE])
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        self.compress_gps_time(encoder, i64::unpack_from(buf))
    }
}

pub struct GpsTimeDecompressor {
    ic_gps_time: IntegerDecompressor,
    common: Common,
}

impl Default for GpsTimeDecompressor {
    fn default() -> Self {
        Self {
            ic_gps_time: IntegerDecompressorBuilder::new().bits(32).contexts(9).build(),
            common: Common::new(),
        }
    }
}

impl GpsTimeDecompressor {
    pub(crate) fn set_first(&mut self, gps_time: i64) {
        self.common.last_gps_times[0] = gps_time;
    }

    pub(crate) fn decompress_gps_time<R: Read>(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
    ) -> std::io::Result<i64> {
        loop {
            let last = self.common.last;
            let last_diff = self.common.last_gps_time_diffs[last];

            if last_diff == 0 {
                let multi = decoder.decode_symbol(&mut self.common.gps_time_0_diff)? as usize;
                match multi {
                    0 => {}
                    1 => {
                        let diff = self.ic_gps_time.decompress(decoder, 0, 0)?;
                        self.common.last_gps_time_diffs[last] = diff;
                        self.add_diff(diff);
                        self.common.multi_extreme_counters[last] = 0;
                    }
                    2 => self.read_new_sequence(decoder)?,
                    _ => {
                        self.common.last = (last + multi - 2) & 3;
                        continue;
                    }
                }
            } else {
                let multi = decoder.decode_symbol(&mut self.common.gps_time_multi)? as i32;
                if multi == 1 {
                    let diff = self.ic_gps_time.decompress(decoder, last_diff, 1)?;
                    self.add_diff(diff);
                    self.common.multi_extreme_counters[last] = 0;
                } else if multi < GPS_TIME_MULTI_UNCHANGED {
                    let diff = self.decompress_multiplied_diff(decoder, multi, last_diff)?;
                    self.add_diff(diff);
                } else if multi == GPS_TIME_MULTI_CODE_FULL {
                    self.read_new_sequence(decoder)?;
                } else if multi > GPS_TIME_MULTI_CODE_FULL {
                    self.common.last = (last + (multi - GPS_TIME_MULTI_CODE_FULL) as usize) & 3;
                    continue;
                }
            }
            return Ok(self.common.last_gps_times[self.common.last]);
        }
    }

    fn decompress_multiplied_diff<R: Read>(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        multi: i32,
        last_diff: i32,
    ) -> std::io::Result<i32> {
        if multi == 0 {
            let diff = self.ic_gps_time.decompress(decoder, 0, 7)?;
            self.common.count_extreme(diff);
            Ok(diff)
        } else if multi < GPS_TIME_MULTI {
            let context = if multi < 10 { 2 } else { 3 };
            self.ic_gps_time
                .decompress(decoder, multi.wrapping_mul(last_diff), context)
        } else if multi == GPS_TIME_MULTI {
            let diff =
                self.ic_gps_time
                    .decompress(decoder, GPS_TIME_MULTI.wrapping_mul(last_diff), 4)?;
            self.common.count_extreme(diff);
            Ok(diff)
        } else {
            let multi = GPS_TIME_MULTI - multi;
            if multi > GPS_TIME_MULTI_MINUS {
                self.ic_gps_time
                    .decompress(decoder, multi.wrapping_mul(last_diff), 5)
            } else {
                let diff = self.ic_gps_time.decompress(
                    decoder,
                    GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
                    6,
                )?;
                self.common.count_extreme(diff);
                Ok(diff)
            }
        }
    }

    fn add_diff(&mut self, diff: i32) {
        let gps_time = &mut self.common.last_gps_times[self.common.last];
        *gps_time = gps_time.wrapping_add(i64::from(diff));
    }

    fn read_new_sequence<R: Read>(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
    ) -> std::io::Result<()> {
        let last_gps_time = self.common.last_gps_times[self.common.last];
        let high = self
            .ic_gps_time
            .decompress(decoder, (last_gps_time >> 32) as i32, 8)?;
        let low = decoder.read_int()?;
        self.common.switch_to_next_sequence();
        self.common.last_gps_times[self.common.last] = i64::from(high) << 32 | i64::from(low);
        Ok(())
    }
}

impl<R: Read> FieldDecompressor<R> for GpsTimeDecompressor {
    fn size_of_field(&self) -> usize {
        GPS_TIME_SIZE
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        src.read_exact(&mut first_point[..GPS_TIME_SIZE])?;
        self.set_first(i64::unpack_from(first_point));
        Ok(())
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        let gps_time = self.decompress_gps_time(decoder)?;
        gps_time.pack_into(buf);
        Ok(())
    }
}
