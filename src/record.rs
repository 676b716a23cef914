//! Record compressors: a list of field codecs sharing one range coder.
//!
//! Within a coding session the data is organized as follows:
//!
//! 1) 1 raw record (each field writes its own bytes as is)
//! 2) n compressed records
//!
//! When the field state is carried over from a previous session,
//! the raw record is skipped and every record is compressed.

use std::io::{Read, Write};

use crate::decoders;
use crate::encoders;
use crate::las;
use crate::las::point_format::{IntegerWidth, RecordItem, RecordLayout};
use crate::predictors::{IntegerFieldCompressor, IntegerFieldDecompressor, Predictor};

/***************************************************************************************************
                    Compression Related Traits
***************************************************************************************************/

pub trait FieldCompressor<W: Write> {
    fn size_of_field(&self) -> usize;

    /// Writes the first record of a session raw and seeds the field state with it
    fn compress_first(&mut self, dst: &mut W, buf: &[u8]) -> std::io::Result<()>;

    fn compress_with(
        &mut self,
        encoder: &mut encoders::ArithmeticEncoder<W>,
        buf: &[u8],
    ) -> std::io::Result<()>;
}

/***************************************************************************************************
                    Decompression Related Traits
***************************************************************************************************/

pub trait FieldDecompressor<R: Read> {
    fn size_of_field(&self) -> usize;

    fn decompress_first(&mut self, src: &mut R, first_point: &mut [u8]) -> std::io::Result<()>;

    fn decompress_with(
        &mut self,
        decoder: &mut decoders::ArithmeticDecoder<R>,
        buf: &mut [u8],
    ) -> std::io::Result<()>;
}

/***************************************************************************************************
                    Record Compressor
***************************************************************************************************/

pub struct SequentialPointRecordCompressor<W: Write> {
    is_first_compression: bool,
    field_compressors: Vec<Box<dyn FieldCompressor<W>>>,
    encoder: encoders::ArithmeticEncoder<W>,
    record_size: usize,
}

impl<W: Write> SequentialPointRecordCompressor<W> {
    pub fn new(output: W) -> Self {
        Self {
            is_first_compression: true,
            field_compressors: vec![],
            encoder: encoders::ArithmeticEncoder::new(output),
            record_size: 0,
        }
    }

    pub fn add_field_compressor<T: 'static + FieldCompressor<W>>(&mut self, field: T) {
        self.record_size += field.size_of_field();
        self.field_compressors.push(Box::new(field));
    }

    /// Appends the field compressors of the layout's items, in order
    pub fn set_fields_from(&mut self, layout: &RecordLayout) {
        for item in layout.items() {
            match *item {
                RecordItem::Point10 => {
                    self.add_field_compressor(las::point10::LasPoint10Compressor::default())
                }
                RecordItem::Point14 => {
                    self.add_field_compressor(las::point14::LasPoint14Compressor::default())
                }
                RecordItem::GpsTime => {
                    self.add_field_compressor(las::gps::GpsTimeCompressor::default())
                }
                RecordItem::Rgb => self.add_field_compressor(las::rgb::LasRGBCompressor::default()),
                RecordItem::Nir => self.add_field_compressor(las::nir::LasNIRCompressor::default()),
                RecordItem::WavePacket => {
                    self.add_field_compressor(las::wavepacket::LasWavepacketCompressor::default())
                }
                RecordItem::ExtraBytes(count) => self.add_field_compressor(
                    las::extra_bytes::LasExtraByteCompressor::new(usize::from(count)),
                ),
                RecordItem::Integer { width, predictor } => {
                    self.add_integer_compressor(width, predictor)
                }
            }
        }
    }

    fn add_integer_compressor(&mut self, width: IntegerWidth, predictor: Predictor) {
        match width {
            IntegerWidth::U8 => self.add_field_compressor(IntegerFieldCompressor::<u8>::new(predictor)),
            IntegerWidth::I8 => self.add_field_compressor(IntegerFieldCompressor::<i8>::new(predictor)),
            IntegerWidth::U16 => {
                self.add_field_compressor(IntegerFieldCompressor::<u16>::new(predictor))
            }
            IntegerWidth::I16 => {
                self.add_field_compressor(IntegerFieldCompressor::<i16>::new(predictor))
            }
            IntegerWidth::U32 => {
                self.add_field_compressor(IntegerFieldCompressor::<u32>::new(predictor))
            }
            IntegerWidth::I32 => {
                self.add_field_compressor(IntegerFieldCompressor::<i32>::new(predictor))
            }
        }
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn compress_next(&mut self, input: &[u8]) -> std::io::Result<()> {
        let mut field_start = 0;
        if self.is_first_compression {
            for field in &mut self.field_compressors {
                let field_end = field_start + field.size_of_field();
                field.compress_first(self.encoder.out_stream(), &input[field_start..field_end])?;
                field_start = field_end;
            }
            self.is_first_compression = false;
        } else {
            for field in &mut self.field_compressors {
                let field_end = field_start + field.size_of_field();
                field.compress_with(&mut self.encoder, &input[field_start..field_end])?;
                field_start = field_end;
            }
        }
        Ok(())
    }

    /// Ends the coding session, all the bytes are in the output afterwards
    pub fn done(&mut self) -> std::io::Result<()> {
        self.encoder.done()
    }

    /// Forgets the fields: they have to be set again and the next record will be raw
    pub fn reset(&mut self) {
        self.encoder.reset();
        self.is_first_compression = true;
        self.field_compressors.clear();
        self.record_size = 0;
    }

    /// Starts a new coding session that keeps the state of the fields
    pub fn reset_coder(&mut self) {
        self.encoder.reset();
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.encoder.out_stream()
    }

    pub fn into_inner(self) -> W {
        self.encoder.into_stream()
    }
}

/***************************************************************************************************
                    Record Decompressor
***************************************************************************************************/

pub struct SequentialPointRecordDecompressor<R: Read> {
    field_decompressors: Vec<Box<dyn FieldDecompressor<R>>>,
    decoder: decoders::ArithmeticDecoder<R>,
    is_first_decompression: bool,
    needs_init_bytes: bool,
    record_size: usize,
}

impl<R: Read> SequentialPointRecordDecompressor<R> {
    pub fn new(input: R) -> Self {
        Self {
            field_decompressors: vec![],
            decoder: decoders::ArithmeticDecoder::new(input),
            is_first_decompression: true,
            needs_init_bytes: false,
            record_size: 0,
        }
    }

    pub fn add_field_decompressor<T: 'static + FieldDecompressor<R>>(&mut self, field: T) {
        self.record_size += field.size_of_field();
        self.field_decompressors.push(Box::new(field));
    }

    /// Appends the field decompressors of the layout's items, in order
    pub fn set_fields_from(&mut self, layout: &RecordLayout) {
        for item in layout.items() {
            match *item {
                RecordItem::Point10 => {
                    self.add_field_decompressor(las::point10::LasPoint10Decompressor::default())
                }
                RecordItem::Point14 => {
                    self.add_field_decompressor(las::point14::LasPoint14Decompressor::default())
                }
                RecordItem::GpsTime => {
                    self.add_field_decompressor(las::gps::GpsTimeDecompressor::default())
                }
                RecordItem::Rgb => {
                    self.add_field_decompressor(las::rgb::LasRGBDecompressor::default())
                }
                RecordItem::Nir => {
                    self.add_field_decompressor(las::nir::LasNIRDecompressor::default())
                }
                RecordItem::WavePacket => self
                    .add_field_decompressor(las::wavepacket::LasWavepacketDecompressor::default()),
                RecordItem::ExtraBytes(count) => self.add_field_decompressor(
                    las::extra_bytes::LasExtraByteDecompressor::new(usize::from(count)),
                ),
                RecordItem::Integer { width, predictor } => {
                    self.add_integer_decompressor(width, predictor)
                }
            }
        }
    }

    fn add_integer_decompressor(&mut self, width: IntegerWidth, predictor: Predictor) {
        match width {
            IntegerWidth::U8 => {
                self.add_field_decompressor(IntegerFieldDecompressor::<u8>::new(predictor))
            }
            IntegerWidth::I8 => {
                self.add_field_decompressor(IntegerFieldDecompressor::<i8>::new(predictor))
            }
            IntegerWidth::U16 => {
                self.add_field_decompressor(IntegerFieldDecompressor::<u16>::new(predictor))
            }
            IntegerWidth::I16 => {
                self.add_field_decompressor(IntegerFieldDecompressor::<i16>::new(predictor))
            }
            IntegerWidth::U32 => {
                self.add_field_decompressor(IntegerFieldDecompressor::<u32>::new(predictor))
            }
            IntegerWidth::I32 => {
                self.add_field_decompressor(IntegerFieldDecompressor::<i32>::new(predictor))
            }
        }
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn decompress_next(&mut self, out: &mut [u8]) -> std::io::Result<()> {
        let mut field_start = 0;
        if self.is_first_decompression {
            for field in &mut self.field_decompressors {
                let field_end = field_start + field.size_of_field();
                field.decompress_first(self.decoder.in_stream(), &mut out[field_start..field_end])?;
                field_start = field_end;
            }
            self.is_first_decompression = false;
            // the coded part starts right after the raw record
            self.decoder.read_init_bytes()?;
        } else {
            if self.needs_init_bytes {
                self.decoder.read_init_bytes()?;
                self.needs_init_bytes = false;
            }
            for field in &mut self.field_decompressors {
                let field_end = field_start + field.size_of_field();
                field.decompress_with(&mut self.decoder, &mut out[field_start..field_end])?;
                field_start = field_end;
            }
        }
        Ok(())
    }

    /// Forgets the fields: they have to be set again and the next record will be raw
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.is_first_decompression = true;
        self.needs_init_bytes = false;
        self.field_decompressors.clear();
        self.record_size = 0;
    }

    /// Starts a new coding session that keeps the state of the fields
    pub fn reset_coder(&mut self) {
        self.decoder.reset();
        self.needs_init_bytes = !self.is_first_decompression;
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.decoder.in_stream()
    }

    pub fn into_inner(self) -> R {
        self.decoder.into_stream()
    }
}
