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

//! UTF-8 encoded text.
//!
//! On the wire, text is a byte list with a NUL terminator. Readers do not
//! validate UTF-8 until asked to with [`Reader::to_str`].

use core::fmt;

use crate::private::layout::{PointerBuilder, PointerReader};
use crate::{Error, ErrorKind, Result};

#[derive(Copy, Clone)]
pub struct Owned(());

impl crate::traits::Owned for Owned {
    type Reader<'a> = Reader<'a>;
    type Builder<'a> = Builder<'a>;
}

/// Text bytes, not including the NUL terminator.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(self) -> &'a [u8] {
        self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails with `TextContainsNonUtf8Data` if the bytes are not UTF-8.
    pub fn to_str(self) -> Result<&'a str> {
        Ok(core::str::from_utf8(self.0)?)
    }

    pub fn to_string(self) -> Result<String> {
        Ok(self.to_str()?.to_string())
    }
}

impl<'a> From<&'a str> for Reader<'a> {
    fn from(value: &'a str) -> Self {
        Self(value.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for Reader<'a> {
    fn from(value: &'a [u8]) -> Self {
        Self(value)
    }
}

impl PartialEq<&str> for Reader<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<Reader<'_>> for &str {
    fn eq(&self, other: &Reader<'_>) -> bool {
        self.as_bytes() == other.0
    }
}

impl fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(self.0) {
            Ok(s) => write!(f, "{s:?}"),
            Err(_) => write!(f, "<invalid utf-8: {:?}>", self.0),
        }
    }
}

impl<'a> crate::traits::FromPointerReader<'a> for Reader<'a> {
    fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Reader<'a>> {
        reader.get_text(None)
    }
}

impl<'a> crate::traits::SetPointerBuilder for Reader<'a> {
    fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Reader<'a>) -> Result<()> {
        pointer.set_text(value)
    }
}

impl<'a> crate::traits::SetPointerBuilder for &'a str {
    fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: &'a str) -> Result<()> {
        pointer.set_text(value.into())
    }
}

/// A text region of fixed capacity, filled incrementally.
pub struct Builder<'a> {
    bytes: &'a mut [u8],
    pos: usize,
}

impl<'a> Builder<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn with_pos(bytes: &'a mut [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn overflow(&self, extra: usize) -> Error {
        Error {
            kind: ErrorKind::IndexOutOfBounds,
            extra: format!(
                "cannot write {extra} bytes at {} into text of capacity {}",
                self.pos,
                self.bytes.len()
            ),
        }
    }

    pub fn push_ascii(&mut self, ascii: u8) -> Result<()> {
        assert!(ascii < 128);
        if self.pos >= self.bytes.len() {
            return Err(self.overflow(1));
        }
        self.bytes[self.pos] = ascii;
        self.pos += 1;
        Ok(())
    }

    /// Appends `string`. Fails with `IndexOutOfBounds` if it does not fit.
    pub fn push_str(&mut self, string: &str) -> Result<()> {
        let bytes = string.as_bytes();
        if bytes.len() > self.bytes.len() - self.pos {
            return Err(self.overflow(bytes.len()));
        }
        self.bytes[self.pos..(self.pos + bytes.len())].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.bytes[..self.pos].fill(0);
        self.pos = 0;
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.bytes
    }

    pub fn to_str(&self) -> Result<&str> {
        Ok(core::str::from_utf8(self.bytes)?)
    }

    pub fn into_reader(self) -> Reader<'a> {
        Reader(self.bytes)
    }

    pub fn reborrow(&mut self) -> Builder<'_> {
        Builder {
            bytes: self.bytes,
            pos: self.pos,
        }
    }

    pub fn reborrow_as_reader(&self) -> Reader<'_> {
        Reader(self.bytes)
    }
}

impl<'a> crate::traits::FromPointerBuilder<'a> for Builder<'a> {
    fn init_pointer(builder: PointerBuilder<'a>, size: u32) -> Result<Builder<'a>> {
        builder.init_text(size)
    }
    fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Builder<'a>> {
        builder.get_text(None)
    }
}

#[cfg(test)]
mod tests {
    use super::{Builder, Reader};
    use crate::ErrorKind;

    #[test]
    fn incremental_fill() {
        let mut buf = [0u8; 8];
        let mut builder = Builder::new(&mut buf);
        builder.push_str("abc").unwrap();
        builder.push_ascii(b'd').unwrap();
        assert_eq!(builder.len(), 4);
        assert_eq!(
            builder.push_str("efghi").unwrap_err().kind,
            ErrorKind::IndexOutOfBounds
        );
        builder.push_str("efgh").unwrap();
        assert_eq!(builder.to_str().unwrap(), "abcdefgh");
        builder.clear();
        assert!(builder.is_empty());
        assert_eq!(builder.as_bytes(), &[0u8; 8]);
    }

    #[test]
    fn reader_utf8() {
        let ok = Reader::from("héllo");
        assert_eq!(ok.to_str().unwrap(), "héllo");
        assert!(ok == "héllo");

        let bad = Reader::new(&[0xff, 0xfe]);
        assert!(matches!(
            bad.to_str().unwrap_err().kind,
            ErrorKind::TextContainsNonUtf8Data(_)
        ));
    }
}
