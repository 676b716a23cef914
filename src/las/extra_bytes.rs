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

//! Extra bytes appended to the records: each byte is coded as
//! the difference to the same byte of the previous record.

use std::io::{Read, Write};

use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;
use crate::models::{model_per_context, ArithmeticModel};
use crate::record::{FieldCompressor, FieldDecompressor};

pub struct LasExtraByteCompressor {
    last_bytes: Vec<u8>,
    models: Vec<ArithmeticModel>,
}

impl LasExtraByteCompressor {
    pub fn new(count: usize) -> Self {
        Self {
            last_bytes: vec![0u8; count],
            models: model_per_context(count, 256),
        }
    }
}

impl<W: Write> FieldCompressor<W> for LasExtraByteCompressor {
    fn size_of_field(&self) -> usize {
        self.last_bytes.len()
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        let count = self.last_bytes.len();
        self.last_bytes.copy_from_slice(&buf[..count]);
        dst.write_all(&buf[..count])
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        for ((last, current), model) in self
            .last_bytes
            .iter_mut()
            .zip(buf.iter())
            .zip(self.models.iter_mut())
        {
            encoder.encode_symbol(model, u32::from(current.wrapping_sub(*last)))?;
            *last = *current;
        }
        Ok(())
    }
}

pub struct LasExtraByteDecompressor {
    last_bytes: Vec<u8>,
    models: Vec<ArithmeticModel>,
}

impl LasExtraByteDecompressor {
    pub fn new(count: usize) -> Self {
        Self {
            last_bytes: vec![0u8; count],
            models: model_per_context(count, 256),
        }
    }
}

impl<R: Read> FieldDecompressor<R> for LasExtraByteDecompressor {
    fn size_of_field(&self) -> usize {
        self.last_bytes.len()
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        let count = self.last_bytes.len();
        src.read_exact(&mut first_point[..count])?;
        self.last_bytes.copy_from_slice(&first_point[..count]);
        Ok(())
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        for ((last, current), model) in self
            .last_bytes
            .iter_mut()
            .zip(buf.iter_mut())
            .zip(self.models.iter_mut())
        {
            let diff = decoder.decode_symbol(model)? as u8;
            *last = last.wrapping_add(diff);
            *current = *last;
        }
        Ok(())
    }
}
