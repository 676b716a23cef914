/*
===============================================================================

  CONTENTS:
    Integer compressor

  PROGRAMMERS:

    martin.isenburg@rapidlasso.com  -  http://rapidlasso.com
    uday.karan@gmail.com - Hobu, Inc.

  COPYRIGHT:

    (c) 2007-2014, martin isenburg, rapidlasso - tools to catch reality
    (c) 2014, Uday Verma, Hobu, Inc.
    (c) 2019, Thomas Montaigu

    This is free software; you can redistribute and/or modify it under the
    terms of the Apache Public License 2.0 published by the Apache Software
    Foundation. See the COPYING file for more information.

    This software is distributed WITHOUT ANY WARRANTY and without even the
    implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.

  CHANGE HISTORY:
    6 June 2019: Translated to Rust

===============================================================================
*/

use std::io::Write;

use crate::encoders;
use crate::models;

pub const DEFAULT_BITS: u32 = 16;
pub const DEFAULT_CONTEXTS: u32 = 1;
pub const DEFAULT_BITS_HIGH: u32 = 8;

/// Corrector interval shared by the integer compressor and decompressor.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct CorrectorRange {
    pub(crate) bits: u32,
    pub(crate) range: u32,
    pub(crate) min: i32,
    pub(crate) max: i32,
}

impl CorrectorRange {
    pub(crate) fn for_bits(bits: u32) -> Self {
        if bits >= 1 && bits < 32 {
            let range = 1u32 << bits;
            let min = -((range / 2) as i32);
            Self {
                bits,
                range,
                min,
                max: min + (range - 1) as i32,
            }
        } else {
            Self {
                bits: 32,
                range: 0,
                min: i32::MIN,
                max: i32::MAX,
            }
        }
    }

    /// One model per context coding `k`, the number of bits of the corrector.
    pub(crate) fn k_models(&self, contexts: u32, compress: bool) -> Vec<models::ArithmeticModel> {
        (0..contexts)
            .map(|_| model(self.bits + 1, compress))
            .collect()
    }

    /// For each `k`, the model coding the (high bits of) the corrector.
    pub(crate) fn corrector_models(
        &self,
        bits_high: u32,
        compress: bool,
    ) -> Vec<models::ArithmeticModel> {
        (1..=self.bits)
            .map(|i| model(1 << i.min(bits_high), compress))
            .collect()
    }
}

fn model(symbols: u32, compress: bool) -> models::ArithmeticModel {
    let builder = models::ArithmeticModelBuilder::new(symbols);
    if compress {
        builder.for_compression().build()
    } else {
        builder.build()
    }
}

/// Codes an integer as a correction of a prediction.
///
/// The corrector `real - pred` is folded into the `bits` wide interval, then coded
/// as the number `k` of significant bits followed by its position in the `k` bit interval.
#[derive(Debug, Clone)]
pub struct IntegerCompressor {
    k: u32,
    bits_high: u32,
    corr: CorrectorRange,

    m_bits: Vec<models::ArithmeticModel>,
    m_corrector_0: models::ArithmeticBitModel,
    m_corrector: Vec<models::ArithmeticModel>,
}

impl IntegerCompressor {
    pub fn new(bits: u32, contexts: u32, bits_high: u32) -> Self {
        let corr = CorrectorRange::for_bits(bits);
        Self {
            k: 0,
            bits_high,
            corr,
            m_bits: corr.k_models(contexts, true),
            m_corrector_0: models::ArithmeticBitModel::new(),
            m_corrector: corr.corrector_models(bits_high, true),
        }
    }

    /// Number of significant bits of the last compressed corrector
    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn compress<T: Write>(
        &mut self,
        encoder: &mut encoders::ArithmeticEncoder<T>,
        pred: i32,
        real: i32,
        context: u32,
    ) -> std::io::Result<()> {
        // within [ - (corr_range - 1)  ...  + (corr_range - 1) ]
        let mut c = real.wrapping_sub(pred);
        // fold into [ corr_min  ...  corr_max ]
        if c < self.corr.min {
            c = c.wrapping_add(self.corr.range as i32);
        } else if c > self.corr.max {
            c = c.wrapping_sub(self.corr.range as i32);
        }

        // tightest interval [ - (2^k - 1)  ...  + (2^k) ] that contains c
        let magnitude = if c <= 0 {
            c.wrapping_neg() as u32
        } else {
            (c - 1) as u32
        };
        self.k = 32 - magnitude.leading_zeros();

        encoder.encode_symbol(&mut self.m_bits[context as usize], self.k)?;

        if self.k == 0 {
            // c is 0 or 1
            debug_assert!(c == 0 || c == 1);
            return encoder.encode_bit(&mut self.m_corrector_0, c as u32);
        }
        if self.k == 32 {
            // only corr_min needs 32 bits, k says it all
            return Ok(());
        }

        // translate c into the k-bit interval [ 0 ... 2^k - 1 ]
        if c >= 0 {
            c -= 1;
        } else {
            c += ((1u32 << self.k) - 1) as i32;
        }

        let corrector_model = &mut self.m_corrector[(self.k - 1) as usize];
        if self.k <= self.bits_high {
            encoder.encode_symbol(corrector_model, c as u32)
        } else {
            // high bits with the model, the k1 low bits raw
            let k1 = self.k - self.bits_high;
            let low = (c as u32) & ((1u32 << k1) - 1);
            encoder.encode_symbol(corrector_model, (c >> k1) as u32)?;
            encoder.write_bits(k1, low)
        }
    }
}

pub struct IntegerCompressorBuilder {
    bits: u32,
    contexts: u32,
    bits_high: u32,
}

impl IntegerCompressorBuilder {
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

    pub fn build(&self) -> IntegerCompressor {
        IntegerCompressor::new(self.bits, self.contexts, self.bits_high)
    }
}

impl Default for IntegerCompressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
