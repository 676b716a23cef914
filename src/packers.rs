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

//! Little-endian packing of fixed width fields into record bytes.
//!
//! Callers always hand in slices of at least `size_of::<Type>()` bytes,
//! record layouts are checked once when codecs are built.

use byteorder::{ByteOrder, LittleEndian};

pub trait Packable {
    type Type;

    fn unpack_from(input: &[u8]) -> Self::Type;
    fn pack_into(&self, output: &mut [u8]);
}

macro_rules! impl_packable {
    ($type:ty, $read:ident, $write:ident) => {
        impl Packable for $type {
            type Type = $type;

            fn unpack_from(input: &[u8]) -> Self::Type {
                LittleEndian::$read(input)
            }

            fn pack_into(&self, output: &mut [u8]) {
                LittleEndian::$write(output, *self)
            }
        }
    };
}

impl_packable!(u16, read_u16, write_u16);
impl_packable!(i16, read_i16, write_i16);
impl_packable!(u32, read_u32, write_u32);
impl_packable!(i32, read_i32, write_i32);
impl_packable!(u64, read_u64, write_u64);
impl_packable!(i64, read_i64, write_i64);
impl_packable!(f32, read_f32, write_f32);
impl_packable!(f64, read_f64, write_f64);

impl Packable for u8 {
    type Type = u8;

    fn unpack_from(input: &[u8]) -> Self::Type {
        input[0]
    }

    fn pack_into(&self, output: &mut [u8]) {
        output[0] = *self;
    }
}

impl Packable for i8 {
    type Type = i8;

    fn unpack_from(input: &[u8]) -> Self::Type {
        input[0] as i8
    }

    fn pack_into(&self, output: &mut [u8]) {
        output[0] = *self as u8;
    }
}
