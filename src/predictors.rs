//! Generic integer fields and the predictors driving them.
//!
//! Each value is coded as the correction of a prediction made from the
//! values that were already coded for the same field.

use std::io::{Read, Write};

use num_traits::{AsPrimitive, PrimInt};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::encoders::ArithmeticEncoder;
use crate::packers::Packable;
use crate::record::{FieldCompressor, FieldDecompressor};

const NUM_K_CONTEXTS: u32 = 4;

/// How the next value of a field is predicted
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Predictor {
    /// The previous value
    Previous,
    /// Linear extrapolation of the last two values
    Linear,
    /// Quadratic extrapolation of the last three values
    Quadratic,
}

impl Predictor {
    pub(crate) fn code(self) -> u16 {
        match self {
            Predictor::Previous => 0,
            Predictor::Linear => 1,
            Predictor::Quadratic => 2,
        }
    }

    pub(crate) fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Predictor::Previous),
            1 => Some(Predictor::Linear),
            2 => Some(Predictor::Quadratic),
            _ => None,
        }
    }
}

impl Default for Predictor {
    fn default() -> Self {
        Predictor::Previous
    }
}

/// The last (up to) three values of a field, most recent first.
#[derive(Debug, Copy, Clone)]
pub struct History<T> {
    values: [T; 3],
    len: usize,
}

impl<T> History<T>
where
    T: PrimInt + AsPrimitive<i64>,
    i64: AsPrimitive<T>,
{
    pub fn new(first: T) -> Self {
        Self {
            values: [first, T::zero(), T::zero()],
            len: 1,
        }
    }

    pub fn push(&mut self, value: T) {
        self.values[2] = self.values[1];
        self.values[1] = self.values[0];
        self.values[0] = value;
        self.len = (self.len + 1).min(3);
    }

    /// Predicts the next value, falling back to a lower order
    /// while the history is not long enough.
    ///
    /// The prediction wraps around in the width of `T`.
    pub fn predict(&self, predictor: Predictor) -> T {
        let a: i64 = self.values[0].as_();
        let b: i64 = self.values[1].as_();
        let c: i64 = self.values[2].as_();
        let prediction = match (predictor, self.len) {
            (Predictor::Quadratic, 3) => 3 * a - 3 * b + c,
            (Predictor::Quadratic, 2) | (Predictor::Linear, 2..=3) => 2 * a - b,
            _ => a,
        };
        prediction.as_()
    }
}

/// Groups the number of bits of the previous corrector into contexts
#[inline]
fn k_bucket(k: u32) -> u32 {
    match k {
        0 => 0,
        1..=4 => 1,
        5..=12 => 2,
        _ => 3,
    }
}

#[inline]
fn bits_of<T>() -> u32 {
    (std::mem::size_of::<T>() * 8) as u32
}

/// Compressor of a single integer field of type `T`
pub struct IntegerFieldCompressor<T> {
    predictor: Predictor,
    history: Option<History<T>>,
    last_k: u32,
    compressor: IntegerCompressor,
}

impl<T> IntegerFieldCompressor<T> {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            predictor,
            history: None,
            last_k: 0,
            compressor: IntegerCompressorBuilder::new()
                .bits(bits_of::<T>())
                .contexts(NUM_K_CONTEXTS)
                .build(),
        }
    }
}

impl<T, W> FieldCompressor<W> for IntegerFieldCompressor<T>
where
    W: Write,
    T: PrimInt + Packable<Type = T> + AsPrimitive<i64> + AsPrimitive<i32>,
    i64: AsPrimitive<T>,
{
    fn size_of_field(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()> {
        let value = T::unpack_from(buf);
        self.history = Some(History::new(value));
        dst.write_all(&buf[..std::mem::size_of::<T>()])
    }

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()> {
        let value = T::unpack_from(buf);
        let history = self.history.get_or_insert_with(|| History::new(T::zero()));
        let prediction = history.predict(self.predictor);
        self.compressor.compress(
            encoder,
            prediction.as_(),
            value.as_(),
            k_bucket(self.last_k),
        )?;
        self.last_k = self.compressor.k();
        history.push(value);
        Ok(())
    }
}

/// Decompressor of a single integer field of type `T`
pub struct IntegerFieldDecompressor<T> {
    predictor: Predictor,
    history: Option<History<T>>,
    last_k: u32,
    decompressor: IntegerDecompressor,
}

impl<T> IntegerFieldDecompressor<T> {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            predictor,
            history: None,
            last_k: 0,
            decompressor: IntegerDecompressorBuilder::new()
                .bits(bits_of::<T>())
                .contexts(NUM_K_CONTEXTS)
                .build(),
        }
    }
}

impl<T, R> FieldDecompressor<R> for IntegerFieldDecompressor<T>
where
    R: Read,
    T: PrimInt + Packable<Type = T> + AsPrimitive<i64> + AsPrimitive<i32>,
    i64: AsPrimitive<T>,
    i32: AsPrimitive<T>,
{
    fn size_of_field(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()> {
        let field = &mut first_point[..std::mem::size_of::<T>()];
        src.read_exact(field)?;
        self.history = Some(History::new(T::unpack_from(field)));
        Ok(())
    }

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        let history = self.history.get_or_insert_with(|| History::new(T::zero()));
        let prediction = history.predict(self.predictor);
        let real =
            self.decompressor
                .decompress(decoder, prediction.as_(), k_bucket(self.last_k))?;
        self.last_k = self.decompressor.k();
        let value: T = real.as_();
        value.pack_into(buf);
        history.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn predictions_use_the_available_history() {
        let mut history = History::new(10i32);
        assert_eq!(history.predict(Predictor::Quadratic), 10);
        history.push(13);
        assert_eq!(history.predict(Predictor::Previous), 13);
        assert_eq!(history.predict(Predictor::Linear), 16);
        assert_eq!(history.predict(Predictor::Quadratic), 16);
        history.push(18);
        // 3 * 18 - 3 * 13 + 10
        assert_eq!(history.predict(Predictor::Quadratic), 25);
    }

    #[test]
    fn predictions_wrap_in_the_field_width() {
        let mut history = History::new(0u16);
        history.push(u16::MAX);
        assert_eq!(history.predict(Predictor::Linear), u16::MAX - 1);

        let mut history = History::new(i32::MIN);
        history.push(i32::MAX);
        assert_eq!(history.predict(Predictor::Linear), i32::MAX - 1);
    }

    fn round_trip<T>(predictor: Predictor, values: &[T])
    where
        T: PrimInt
            + Packable<Type = T>
            + AsPrimitive<i64>
            + AsPrimitive<i32>
            + std::fmt::Debug,
        i64: AsPrimitive<T>,
        i32: AsPrimitive<T>,
    {
        let size = std::mem::size_of::<T>();
        let mut bytes = vec![0u8; size * values.len()];
        for (v, chunk) in values.iter().zip(bytes.chunks_exact_mut(size)) {
            v.pack_into(chunk);
        }

        let mut compressor = IntegerFieldCompressor::<T>::new(predictor);
        let mut out = Vec::<u8>::new();
        compressor
            .compress_first(&mut out, &bytes[..size])
            .unwrap();
        let mut encoder = ArithmeticEncoder::new(out);
        for chunk in bytes[size..].chunks_exact(size) {
            compressor.compress_with(&mut encoder, chunk).unwrap();
        }
        encoder.done().unwrap();
        let compressed = encoder.into_stream();

        let mut decompressor = IntegerFieldDecompressor::<T>::new(predictor);
        let mut decoded = vec![0u8; bytes.len()];
        let mut src = compressed.as_slice();
        decompressor
            .decompress_first(&mut src, &mut decoded[..size])
            .unwrap();
        let mut decoder = ArithmeticDecoder::new(src);
        decoder.read_init_bytes().unwrap();
        for chunk in decoded[size..].chunks_exact_mut(size) {
            decompressor.decompress_with(&mut decoder, chunk).unwrap();
        }
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn every_predictor_restores_the_values() {
        let ramp: Vec<i32> = (0..500).map(|i| i * i - 40 * i).collect();
        let noisy: Vec<u16> = (0..500u32).map(|i| (i * 7919 % 65536) as u16).collect();
        let signed: Vec<i8> = (0..300i32).map(|i| ((i * 37) % 256) as i8).collect();
        let extremes = vec![u32::MAX, 0, u32::MAX, 1, 0x8000_0000, 7];
        for &predictor in &[Predictor::Previous, Predictor::Linear, Predictor::Quadratic] {
            round_trip(predictor, &ramp);
            round_trip(predictor, &noisy);
            round_trip(predictor, &signed);
            round_trip(predictor, &extremes);
        }
    }
}
