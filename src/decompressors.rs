/*
===============================================================================

  CONTENTS:
    Integer decompressor

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

use std::io::Read;

use crate::compressors::{CorrectorRange, DEFAULT_BITS, DEFAULT_BITS_HIGH, DEFAULT_CONTEXTS};
use crate::decoders;
use crate::models;

/// Counterpart of the [`IntegerCompressor`](crate::compressors::IntegerCompressor)
#[derive(Debug, Clone)]
pub struct IntegerDecompressor {
    k: u32,
    bits_high: u32,
    corr: CorrectorRange,

    m_bits: Vec<models::ArithmeticModel>,
    m_corrector0: models::ArithmeticBitModel,
    m_corrector: Vec<models::ArithmeticModel>,
}

impl IntegerDecompressor {
    pub fn new(bits: u32, contexts: u32, bits_high: u32) -> Self {
        let corr = CorrectorRange::for_bits(bits);
        Self {
            k: 0,
            bits_high,
            corr,
            m_bits: corr.k_models(contexts, false),
            m_corrector0: models::ArithmeticBitModel::new(),
            m_corrector: corr.corrector_models(bits_high, false),
        }
    }

    /// Number of significant bits of the last decompressed corrector
    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn decompress<T: Read>(
        &mut self,
        dec: &mut decoders::ArithmeticDecoder<T>,
        pred: i32,
        context: u32,
    ) -> std::io::Result<i32> {
        let corr = self.read_corrector(dec, context)?;
        let mut real = pred.wrapping_add(corr);
        let range = self.corr.range as i32;
        if real < 0 {
            real = real.wrapping_add(range);
        } else if range != 0 && real >= range {
            real -= range;
        }
        Ok(real)
    }

    fn read_corrector<T: Read>(
        &mut self,
        dec: &mut decoders::ArithmeticDecoder<T>,
        context: u32,
    ) -> std::io::Result<i32> {
        self.k = dec.decode_symbol(&mut self.m_bits[context as usize])?;
        if self.k == 0 {
            return Ok(dec.decode_bit(&mut self.m_corrector0)? as i32);
        }
        if self.k >= 32 {
            return Ok(self.corr.min);
        }

        let corrector_model = &mut self.m_corrector[(self.k - 1) as usize];
        let mut c = if self.k <= self.bits_high {
            dec.decode_symbol(corrector_model)? as i32
        } else {
            let k1 = self.k - self.bits_high;
            let high = dec.decode_symbol(corrector_model)? as i32;
            let low = dec.read_bits(k1)?;
            (high << k1) | low as i32
        };

        // translate c back into its interval
        if c >= (1u32 << (self.k - 1)) as i32 {
            // [ 2^(k-1) + 1  ...  2^k ]
            c += 1;
        } else {
            // [ - (2^k - 1)  ...  - (2^(k-1)) ]
            c -= ((1u32 << self.k) - 1) as i32;
        }
        Ok(c)
    }
}

pub struct IntegerDecompressorBuilder {
    bits: u32,
    contexts: u32,
    bits_high: u32,
}

impl IntegerDecompressorBuilder {
    pub fn new() -> Self {
        Self {
            bits: DEFAULT_BITS,
            contexts: DEFAULT_CONTEXTS,
            bits_high: DEFAULT_BITS_HIGH,
        }
    }

    pub fn bits(&mut self, bits: u32) -> &mut Self {
        self.bits = bits;
        self
    }

    pub fn contexts(&mut self, contexts: u32) -> &mut Self {
        self.contexts = contexts;
        self
    }

    pub fn build(&self) -> IntegerDecompressor {
        IntegerDecompressor::new(self.bits, self.contexts, self.bits_high)
    }
}

impl Default for IntegerDecompressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
