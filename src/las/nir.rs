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

//! Near infrared channel.

use std::io::{Read, Write};

use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;
use crate::las::utils::{lower_byte, lower_byte_changed, upper_byte, upper_byte_changed};
use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
use crate::packers::Packable;
use crate::record::{FieldCompressor, FieldDecompressor};

pub const NIR_SIZE: usize = 2;

#[derive(Clone)]
struct NirModels {
    bytes_used: ArithmeticModel,
    diff_0: ArithmeticModel,
    diff_1: ArithmeticModel,
}

impl Default for NirModels {
    fn default() -> Self {
        Self {
            bytes_used: ArithmeticModelBuilder::new(4).build(),
            diff_0: ArithmeticModelBuilder::new(256).build(),
            diff_1: ArithmeticModelBuilder::new(256).build(),
        }
    }
}

#[derive(Default)]
pub struct LasNIRCompressor {
    last_nir: u16,
    models: NirModels,
}

impl<W: Write> FieldCompressor<W> for LasNIRCompressor {
    fn size_of_field(&self) -> usize {
        NIR_SIZE
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        self.last_nir = u16::unpack_from(buf);
        dst.write_all(&buf[..NIR_SIZE])
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        let nir = u16::unpack_from(buf);
        let last = self.last_nir;
        let sym = lower_byte_changed(nir, last) as u32 | (upper_byte_changed(nir, last) as u32) << 1;
        encoder.encode_symbol(&mut self.models.bytes_used, sym)?;
        if sym & 1 != 0 {
            let corr = lower_byte(nir).wrapping_sub(lower_byte(last));
            encoder.encode_symbol(&mut self.models.diff_0, u32::from(corr))?;
        }
        if sym & 2 != 0 {
            let corr = upper_byte(nir).wrapping_sub(upper_byte(last));
            encoder.encode_symbol(&mut self.models.diff_1, u32::from(corr))?;
        }
        self.last_nir = nir;
        Ok(())
    }
}

#[derive(Default)]
pub struct LasNIRDecompressor {
    last_nir: u16,
    models: NirModels,
}

impl<R: Read> FieldDecompressor<R> for LasNIRDecompressor {
    fn size_of_field(&self) -> usize {
        NIR_SIZE
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        src.read_exact(&mut first_point[..NIR_SIZE])?;
        self.last_nir = u16::unpack_from(first_point);
        Ok(())
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        let last = self.last_nir;
        let sym = decoder.decode_symbol(&mut self.models.bytes_used)?;

        let mut nir = if sym & 1 != 0 {
            let corr = decoder.decode_symbol(&mut self.models.diff_0)? as u8;
            u16::from(corr.wrapping_add(lower_byte(last)))
        } else {
            last & 0x00FF
        };
        nir |= if sym & 2 != 0 {
            let corr = decoder.decode_symbol(&mut self.models.diff_1)? as u8;
            u16::from(corr.wrapping_add(upper_byte(last))) << 8
        } else {
            last & 0xFF00
        };

        nir.pack_into(buf);
        self.last_nir = nir;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nir_round_trip() {
        let values: Vec<u16> = vec![0, 0, 255, 256, 65535, 1, 1, 40000, 39999, 12];
        let mut compressor = LasNIRCompressor::default();
        let mut out = Vec::new();
        compressor
            .compress_first(&mut out, &values[0].to_le_bytes())
            .unwrap();
        let mut encoder = ArithmeticEncoder::new(out);
        for v in &values[1..] {
            compressor.compress_with(&mut encoder, &v.to_le_bytes()).unwrap();
        }
        encoder.done().unwrap();
        let compressed = encoder.into_stream();

        let mut decompressor = LasNIRDecompressor::default();
        let mut src = compressed.as_slice();
        let mut buf = [0u8; NIR_SIZE];
        decompressor.decompress_first(&mut src, &mut buf).unwrap();
        let mut decoder = ArithmeticDecoder::new(src);
        decoder.read_init_bytes().unwrap();
        for v in &values[1..] {
            decompressor.decompress_with(&mut decoder, &mut buf).unwrap();
            assert_eq!(u16::from_le_bytes(buf), *v);
        }
    }
}
