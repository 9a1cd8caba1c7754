// Copyright (c) 2013-2015 Sandstorm Development Group, Inc. and contributors
// Licensed under the MIT License:
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

use byteorder::{ByteOrder, LittleEndian};

/// A value stored in little-endian order inside a segment. `get` and `set`
/// take a byte slice of exactly `BYTES` bytes.
pub trait Primitive: Copy {
    const BYTES: usize;

    /// Raw bit pattern used for default-value masks.
    type Raw: Copy + Default;

    fn get(raw: &[u8]) -> Self;
    fn set(raw: &mut [u8], value: Self);

    fn zero() -> Self;

    /// XORs `value` with `mask`, the encoding for fields with non-zero defaults.
    fn mask(value: Self, mask: Self::Raw) -> Self;
}

macro_rules! primitive_impl(
    ($typ:ty, $n:expr, $read:ident, $write:ident) => (
        impl Primitive for $typ {
            const BYTES: usize = $n;
            type Raw = $typ;

            #[inline]
            fn get(raw: &[u8]) -> Self {
                <LittleEndian as ByteOrder>::$read(raw)
            }

            #[inline]
            fn set(raw: &mut [u8], value: Self) {
                <LittleEndian as ByteOrder>::$write(raw, value)
            }

            #[inline]
            fn zero() -> Self { 0 }

            #[inline]
            fn mask(value: Self, mask: Self::Raw) -> Self {
                value ^ mask
            }
        }
        );
    );

primitive_impl!(u16, 2, read_u16, write_u16);
primitive_impl!(i16, 2, read_i16, write_i16);
primitive_impl!(u32, 4, read_u32, write_u32);
primitive_impl!(i32, 4, read_i32, write_i32);
primitive_impl!(u64, 8, read_u64, write_u64);
primitive_impl!(i64, 8, read_i64, write_i64);

impl Primitive for u8 {
    const BYTES: usize = 1;
    type Raw = u8;

    fn get(raw: &[u8]) -> Self {
        raw[0]
    }
    fn set(raw: &mut [u8], value: Self) {
        raw[0] = value;
    }
    fn zero() -> Self {
        0
    }
    fn mask(value: Self, mask: u8) -> Self {
        value ^ mask
    }
}

impl Primitive for i8 {
    const BYTES: usize = 1;
    type Raw = i8;

    fn get(raw: &[u8]) -> Self {
        raw[0] as i8
    }
    fn set(raw: &mut [u8], value: Self) {
        raw[0] = value as u8;
    }
    fn zero() -> Self {
        0
    }
    fn mask(value: Self, mask: i8) -> Self {
        value ^ mask
    }
}

impl Primitive for f32 {
    const BYTES: usize = 4;
    type Raw = u32;

    fn get(raw: &[u8]) -> Self {
        <LittleEndian as ByteOrder>::read_f32(raw)
    }
    fn set(raw: &mut [u8], value: Self) {
        <LittleEndian as ByteOrder>::write_f32(raw, value)
    }
    fn zero() -> Self {
        0.0
    }
    fn mask(value: Self, mask: u32) -> Self {
        Self::from_bits(value.to_bits() ^ mask)
    }
}

impl Primitive for f64 {
    const BYTES: usize = 8;
    type Raw = u64;

    fn get(raw: &[u8]) -> Self {
        <LittleEndian as ByteOrder>::read_f64(raw)
    }
    fn set(raw: &mut [u8], value: Self) {
        <LittleEndian as ByteOrder>::write_f64(raw, value)
    }
    fn zero() -> Self {
        0.0
    }
    fn mask(value: Self, mask: u64) -> Self {
        Self::from_bits(value.to_bits() ^ mask)
    }
}

#[cfg(test)]
mod tests {
    use super::Primitive;

    #[test]
    fn little_endian_layout() {
        let mut buf = [0u8; 8];
        <u32 as Primitive>::set(&mut buf[0..4], 0x01020304);
        assert_eq!(&buf[0..4], &[4, 3, 2, 1]);
        assert_eq!(<u16 as Primitive>::get(&buf[0..2]), 0x0304);

        <f64 as Primitive>::set(&mut buf[..], -1.5);
        assert_eq!(<f64 as Primitive>::get(&buf[..]), -1.5);
    }

    #[test]
    fn masks_flip_defaults() {
        assert_eq!(<i32 as Primitive>::mask(0, 123), 123);
        assert_eq!(<i32 as Primitive>::mask(123, 123), 0);
        assert_eq!(<f32 as Primitive>::mask(0.0, 2.5f32.to_bits()), 2.5);
    }
}
