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

//! Color channels, coded byte per byte.
//!
//! The red channel is coded as a difference to the previous color,
//! green and blue are predicted from the change of red (and green).

use std::io::{Read, Write};

use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;
use crate::las::utils::{lower_byte, lower_byte_changed, u8_clamp, upper_byte, upper_byte_changed};
use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
use crate::packers::Packable;
use crate::record::{FieldCompressor, FieldDecompressor};

pub const RGB_SIZE: usize = 6;

#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub struct Rgb {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl Rgb {
    fn is_gray(&self) -> bool {
        self.red == self.green && self.red == self.blue
    }
}

impl Packable for Rgb {
    type Type = Rgb;

    fn unpack_from(input: &[u8]) -> Self::Type {
        Self {
            red: u16::unpack_from(&input[0..2]),
            green: u16::unpack_from(&input[2..4]),
            blue: u16::unpack_from(&input[4..6]),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.red.pack_into(&mut output[0..2]);
        self.green.pack_into(&mut output[2..4]);
        self.blue.pack_into(&mut output[4..6]);
    }
}

/// Which bytes changed, bit 6 tells whether green and blue differ from red
#[derive(Copy, Clone)]
struct ColorDiff(u32);

impl ColorDiff {
    fn between(current: &Rgb, last: &Rgb) -> Self {
        Self(
            lower_byte_changed(last.red, current.red) as u32
                | (upper_byte_changed(last.red, current.red) as u32) << 1
                | (lower_byte_changed(last.green, current.green) as u32) << 2
                | (upper_byte_changed(last.green, current.green) as u32) << 3
                | (lower_byte_changed(last.blue, current.blue) as u32) << 4
                | (upper_byte_changed(last.blue, current.blue) as u32) << 5
                | (!current.is_gray() as u32) << 6,
        )
    }

    #[inline]
    fn bit(self, n: u32) -> bool {
        self.0 & (1 << n) != 0
    }
}

#[derive(Clone)]
struct RgbModels {
    byte_used: ArithmeticModel,
    // lower red, upper red, lower green, upper green, lower blue, upper blue
    bytes: Vec<ArithmeticModel>,
}

impl Default for RgbModels {
    fn default() -> Self {
        Self {
            byte_used: ArithmeticModelBuilder::new(128).build(),
            bytes: (0..6).map(|_| ArithmeticModelBuilder::new(256).build()).collect(),
        }
    }
}

const LOWER_RED: usize = 0;
const UPPER_RED: usize = 1;
const LOWER_GREEN: usize = 2;
const UPPER_GREEN: usize = 3;
const LOWER_BLUE: usize = 4;
const UPPER_BLUE: usize = 5;

#[derive(Default)]
pub struct LasRGBCompressor {
    last: Rgb,
    models: RgbModels,
}

impl LasRGBCompressor {
    fn encode_byte<W: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        which: usize,
        corr: i32,
    ) -> std::io::Result<()> {
        encoder.encode_symbol(&mut self.models.bytes[which], u32::from(corr as u8))
    }
}

impl<W: Write> FieldCompressor<W> for LasRGBCompressor {
    fn size_of_field(&self) -> usize {
        RGB_SIZE
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        self.last = Rgb::unpack_from(buf);
        dst.write_all(&buf[..RGB_SIZE])
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        let current = Rgb::unpack_from(buf);
        let last = self.last;
        let color_diff = ColorDiff::between(&current, &last);
        encoder.encode_symbol(&mut self.models.byte_used, color_diff.0)?;

        let mut diff_l = 0i32;
        let mut diff_h = 0i32;
        if color_diff.bit(0) {
            diff_l = i32::from(lower_byte(current.red)) - i32::from(lower_byte(last.red));
            self.encode_byte(encoder, LOWER_RED, diff_l)?;
        }
        if color_diff.bit(1) {
            diff_h = i32::from(upper_byte(current.red)) - i32::from(upper_byte(last.red));
            self.encode_byte(encoder, UPPER_RED, diff_h)?;
        }

        if color_diff.bit(6) {
            if color_diff.bit(2) {
                let corr = i32::from(lower_byte(current.green))
                    - i32::from(u8_clamp(diff_l + i32::from(lower_byte(last.green))));
                self.encode_byte(encoder, LOWER_GREEN, corr)?;
            }
            if color_diff.bit(4) {
                diff_l = (diff_l + i32::from(lower_byte(current.green))
                    - i32::from(lower_byte(last.green)))
                    / 2;
                let corr = i32::from(lower_byte(current.blue))
                    - i32::from(u8_clamp(diff_l + i32::from(lower_byte(last.blue))));
                self.encode_byte(encoder, LOWER_BLUE, corr)?;
            }
            if color_diff.bit(3) {
                let corr = i32::from(upper_byte(current.green))
                    - i32::from(u8_clamp(diff_h + i32::from(upper_byte(last.green))));
                self.encode_byte(encoder, UPPER_GREEN, corr)?;
            }
            if color_diff.bit(5) {
                diff_h = (diff_h + i32::from(upper_byte(current.green))
                    - i32::from(upper_byte(last.green)))
                    / 2;
                let corr = i32::from(upper_byte(current.blue))
                    - i32::from(u8_clamp(diff_h + i32::from(upper_byte(last.blue))));
                self.encode_byte(encoder, UPPER_BLUE, corr)?;
            }
        }
        self.last = current;
        Ok(())
    }
}

#[derive(Default)]
pub struct LasRGBDecompressor {
    last: Rgb,
    models: RgbModels,
}

impl LasRGBDecompressor {
    fn decode_byte<R: Read>(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        which: usize,
    ) -> std::io::Result<u8> {
        Ok(decoder.decode_symbol(&mut self.models.bytes[which])? as u8)
    }
}

impl<R: Read> FieldDecompressor<R> for LasRGBDecompressor {
    fn size_of_field(&self) -> usize {
        RGB_SIZE
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        src.read_exact(&mut first_point[..RGB_SIZE])?;
        self.last = Rgb::unpack_from(first_point);
        Ok(())
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        let last = self.last;
        let color_diff = ColorDiff(decoder.decode_symbol(&mut self.models.byte_used)?);
        let mut current = Rgb::default();

        current.red = if color_diff.bit(0) {
            u16::from(self.decode_byte(decoder, LOWER_RED)?.wrapping_add(lower_byte(last.red)))
        } else {
            last.red & 0x00FF
        };
        current.red |= if color_diff.bit(1) {
            u16::from(self.decode_byte(decoder, UPPER_RED)?.wrapping_add(upper_byte(last.red))) << 8
        } else {
            last.red & 0xFF00
        };

        if color_diff.bit(6) {
            let mut diff = i32::from(lower_byte(current.red)) - i32::from(lower_byte(last.red));
            current.green = if color_diff.bit(2) {
                let corr = self.decode_byte(decoder, LOWER_GREEN)?;
                u16::from(corr.wrapping_add(u8_clamp(diff + i32::from(lower_byte(last.green)))))
            } else {
                last.green & 0x00FF
            };
            current.blue = if color_diff.bit(4) {
                let corr = self.decode_byte(decoder, LOWER_BLUE)?;
                diff = (diff + i32::from(lower_byte(current.green))
                    - i32::from(lower_byte(last.green)))
                    / 2;
                u16::from(corr.wrapping_add(u8_clamp(diff + i32::from(lower_byte(last.blue)))))
            } else {
                last.blue & 0x00FF
            };

            let mut diff = i32::from(upper_byte(current.red)) - i32::from(upper_byte(last.red));
            current.green |= if color_diff.bit(3) {
                let corr = self.decode_byte(decoder, UPPER_GREEN)?;
                u16::from(corr.wrapping_add(u8_clamp(diff + i32::from(upper_byte(last.green))))) << 8
            } else {
                last.green & 0xFF00
            };
            current.blue |= if color_diff.bit(5) {
                let corr = self.decode_byte(decoder, UPPER_BLUE)?;
                diff = (diff + i32::from(upper_byte(current.green))
                    - i32::from(upper_byte(last.green)))
                    / 2;
                u16::from(corr.wrapping_add(u8_clamp(diff + i32::from(upper_byte(last.blue))))) << 8
            } else {
                last.blue & 0xFF00
            };
        } else {
            current.green = current.red;
            current.blue = current.red;
        }

        current.pack_into(buf);
        self.last = current;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn colors_round_trip() {
        let colors: Vec<Rgb> = (0..400u32)
            .map(|i| {
                if i % 7 == 0 {
                    let gray = (i * 97) as u16;
                    Rgb { red: gray, green: gray, blue: gray }
                } else {
                    Rgb {
                        red: (i * 131) as u16,
                        green: (i * 131 + 40) as u16,
                        blue: (65535 - i * 3) as u16,
                    }
                }
            })
            .collect();

        let mut compressor = LasRGBCompressor::default();
        let mut raw = [0u8; RGB_SIZE];
        colors[0].pack_into(&mut raw);
        let mut out = Vec::new();
        compressor.compress_first(&mut out, &raw).unwrap();
        let mut encoder = ArithmeticEncoder::new(out);
        for color in &colors[1..] {
            color.pack_into(&mut raw);
            compressor.compress_with(&mut encoder, &raw).unwrap();
        }
        encoder.done().unwrap();
        let compressed = encoder.into_stream();

        let mut decompressor = LasRGBDecompressor::default();
        let mut src = compressed.as_slice();
        decompressor.decompress_first(&mut src, &mut raw).unwrap();
        assert_eq!(Rgb::unpack_from(&raw), colors[0]);
        let mut decoder = ArithmeticDecoder::new(src);
        decoder.read_init_bytes().unwrap();
        for color in &colors[1..] {
            decompressor.decompress_with(&mut decoder, &mut raw).unwrap();
            assert_eq!(Rgb::unpack_from(&raw), *color);
        }
    }
}
