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

//! Wave packet descriptors of point formats 4, 5, 9 and 10.

use std::io::{Read, Write};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::encoders::ArithmeticEncoder;
use crate::models::{model_per_context, ArithmeticModel, ArithmeticModelBuilder};
use crate::packers::Packable;
use crate::record::{FieldCompressor, FieldDecompressor};

pub const WAVE_PACKET_SIZE: usize = 29;

const DX_CONTEXT: u32 = 0;
const DY_CONTEXT: u32 = 1;
const DZ_CONTEXT: u32 = 2;

// How the offset of the packet relates to the previous one
const OFFSET_UNCHANGED: u32 = 0;
const OFFSET_FOLLOWS: u32 = 1;
const OFFSET_DIFF: u32 = 2;
const OFFSET_FULL: u32 = 3;

#[derive(Default, Copy, Clone, PartialEq, Debug)]
pub struct WavePacket {
    pub descriptor_index: u8,
    pub offset: u64,
    pub size: u32,
    pub return_point: f32,
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
}

impl Packable for WavePacket {
    type Type = WavePacket;

    fn unpack_from(input: &[u8]) -> Self::Type {
        Self {
            descriptor_index: input[0],
            offset: u64::unpack_from(&input[1..9]),
            size: u32::unpack_from(&input[9..13]),
            return_point: f32::unpack_from(&input[13..17]),
            dx: f32::unpack_from(&input[17..21]),
            dy: f32::unpack_from(&input[21..25]),
            dz: f32::unpack_from(&input[25..29]),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        output[0] = self.descriptor_index;
        self.offset.pack_into(&mut output[1..9]);
        self.size.pack_into(&mut output[9..13]);
        self.return_point.pack_into(&mut output[13..17]);
        self.dx.pack_into(&mut output[17..21]);
        self.dy.pack_into(&mut output[21..25]);
        self.dz.pack_into(&mut output[25..29]);
    }
}

/// The f32 fields are coded through their bit pattern
#[inline]
fn f32_bits(value: f32) -> i32 {
    value.to_bits() as i32
}

#[inline]
fn f32_from_bits(bits: i32) -> f32 {
    f32::from_bits(bits as u32)
}

#[derive(Clone)]
struct Common {
    last: WavePacket,
    last_offset_diff: i32,
    last_sym_offset_diff: u32,
    packet_index: ArithmeticModel,
    offset_diff: Vec<ArithmeticModel>,
}

impl Common {
    fn new() -> Self {
        Self {
            last: WavePacket::default(),
            last_offset_diff: 0,
            last_sym_offset_diff: OFFSET_UNCHANGED,
            packet_index: ArithmeticModelBuilder::new(256).build(),
            offset_diff: model_per_context(4, 4),
        }
    }
}

pub struct LasWavepacketCompressor {
    ic_offset_diff: IntegerCompressor,
    ic_packet_size: IntegerCompressor,
    ic_return_point: IntegerCompressor,
    ic_xyz: IntegerCompressor,
    common: Common,
}

impl Default for LasWavepacketCompressor {
    fn default() -> Self {
        Self {
            ic_offset_diff: IntegerCompressorBuilder::new().bits(32).build(),
            ic_packet_size: IntegerCompressorBuilder::new().bits(32).build(),
            ic_return_point: IntegerCompressorBuilder::new().bits(32).build(),
            ic_xyz: IntegerCompressorBuilder::new().bits(32).contexts(3).build(),
            common: Common::new(),
        }
    }
}

impl<W: Write> FieldCompressor<W> for LasWavepacketCompressor {
    fn size_of_field(&self) -> usize {
        WAVE_PACKET_SIZE
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        self.common.last = WavePacket::unpack_from(buf);
        dst.write_all(&buf[..WAVE_PACKET_SIZE])
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        let current = WavePacket::unpack_from(buf);
        let common = &mut self.common;
        let last = common.last;

        encoder.encode_symbol(&mut common.packet_index, u32::from(current.descriptor_index))?;

        let offset_diff_64 = current.offset.wrapping_sub(last.offset) as i64;
        let offset_diff_32 = offset_diff_64 as i32;
        let offset_model = &mut common.offset_diff[common.last_sym_offset_diff as usize];
        if offset_diff_64 == i64::from(offset_diff_32) {
            let sym = if offset_diff_32 == 0 {
                OFFSET_UNCHANGED
            } else if offset_diff_64 == i64::from(last.size) {
                OFFSET_FOLLOWS
            } else {
                OFFSET_DIFF
            };
            encoder.encode_symbol(offset_model, sym)?;
            if sym == OFFSET_DIFF {
                self.ic_offset_diff
                    .compress(encoder, common.last_offset_diff, offset_diff_32, 0)?;
                common.last_offset_diff = offset_diff_32;
            }
            common.last_sym_offset_diff = sym;
        } else {
            encoder.encode_symbol(offset_model, OFFSET_FULL)?;
            encoder.write_int64(current.offset)?;
            common.last_sym_offset_diff = OFFSET_FULL;
        }

        self.ic_packet_size
            .compress(encoder, last.size as i32, current.size as i32, 0)?;
        self.ic_return_point.compress(
            encoder,
            f32_bits(last.return_point),
            f32_bits(current.return_point),
            0,
        )?;
        self.ic_xyz
            .compress(encoder, f32_bits(last.dx), f32_bits(current.dx), DX_CONTEXT)?;
        self.ic_xyz
            .compress(encoder, f32_bits(last.dy), f32_bits(current.dy), DY_CONTEXT)?;
        self.ic_xyz
            .compress(encoder, f32_bits(last.dz), f32_bits(current.dz), DZ_CONTEXT)?;

        common.last = current;
        Ok(())
    }
}

pub struct LasWavepacketDecompressor {
    ic_offset_diff: IntegerDecompressor,
    ic_packet_size: IntegerDecompressor,
    ic_return_point: IntegerDecompressor,
    ic_xyz: IntegerDecompressor,
    common: Common,
}

impl Default for LasWavepacketDecompressor {
    fn default() -> Self {
        Self {
            ic_offset_diff: IntegerDecompressorBuilder::new().bits(32).build(),
            ic_packet_size: IntegerDecompressorBuilder::new().bits(32).build(),
            ic_return_point: IntegerDecompressorBuilder::new().bits(32).build(),
            ic_xyz: IntegerDecompressorBuilder::new().bits(32).contexts(3).build(),
            common: Common::new(),
        }
    }
}

impl<R: Read> FieldDecompressor<R> for LasWavepacketDecompressor {
    fn size_of_field(&self) -> usize {
        WAVE_PACKET_SIZE
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        src.read_exact(&mut first_point[..WAVE_PACKET_SIZE])?;
        self.common.last = WavePacket::unpack_from(first_point);
        Ok(())
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        let common = &mut self.common;
        let last = common.last;
        let mut current = WavePacket::default();

        current.descriptor_index = decoder.decode_symbol(&mut common.packet_index)? as u8;

        let sym =
            decoder.decode_symbol(&mut common.offset_diff[common.last_sym_offset_diff as usize])?;
        current.offset = match sym {
            OFFSET_UNCHANGED => last.offset,
            OFFSET_FOLLOWS => last.offset.wrapping_add(u64::from(last.size)),
            OFFSET_DIFF => {
                common.last_offset_diff =
                    self.ic_offset_diff
                        .decompress(decoder, common.last_offset_diff, 0)?;
                last.offset.wrapping_add(common.last_offset_diff as u64)
            }
            _ => decoder.read_int_64()?,
        };
        common.last_sym_offset_diff = sym;

        current.size = self
            .ic_packet_size
            .decompress(decoder, last.size as i32, 0)? as u32;
        current.return_point = f32_from_bits(self.ic_return_point.decompress(
            decoder,
            f32_bits(last.return_point),
            0,
        )?);
        current.dx = f32_from_bits(self.ic_xyz.decompress(decoder, f32_bits(last.dx), DX_CONTEXT)?);
        current.dy = f32_from_bits(self.ic_xyz.decompress(decoder, f32_bits(last.dy), DY_CONTEXT)?);
        current.dz = f32_from_bits(self.ic_xyz.decompress(decoder, f32_bits(last.dz), DZ_CONTEXT)?);

        current.pack_into(buf);
        common.last = current;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wave_packets_round_trip() {
        let mut packets = vec![];
        let mut offset = 1000u64;
        for i in 0..200u32 {
            let size = 64 + (i % 3) * 16;
            packets.push(WavePacket {
                descriptor_index: (i % 4) as u8,
                offset,
                size,
                return_point: i as f32 * 0.25,
                dx: 0.001,
                dy: -0.002 * i as f32,
                dz: 1.5,
            });
            offset = match i % 5 {
                0 => offset,
                1 => offset + u64::from(size),
                2 => offset.wrapping_sub(300),
                3 => offset + (1 << 40),
                _ => offset + 17,
            };
        }
        packets.push(WavePacket {
            size: u32::MAX,
            ..packets[0]
        });
        packets.push(WavePacket {
            offset: packets[0].offset.wrapping_add(u64::from(u32::MAX)),
            ..packets[0]
        });

        let mut raw = [0u8; WAVE_PACKET_SIZE];
        let mut compressor = LasWavepacketCompressor::default();
        let mut out = Vec::new();
        packets[0].pack_into(&mut raw);
        compressor.compress_first(&mut out, &raw).unwrap();
        let mut encoder = ArithmeticEncoder::new(out);
        for packet in &packets[1..] {
            packet.pack_into(&mut raw);
            compressor.compress_with(&mut encoder, &raw).unwrap();
        }
        encoder.done().unwrap();
        let compressed = encoder.into_stream();

        let mut decompressor = LasWavepacketDecompressor::default();
        let mut src = compressed.as_slice();
        decompressor.decompress_first(&mut src, &mut raw).unwrap();
        let mut decoder = ArithmeticDecoder::new(src);
        decoder.read_init_bytes().unwrap();
        for packet in &packets[1..] {
            decompressor.decompress_with(&mut decoder, &mut raw).unwrap();
            assert_eq!(WavePacket::unpack_from(&raw), *packet);
        }
    }
}
