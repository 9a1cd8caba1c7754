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

//! List of byte sequences.

use crate::private::layout::{ListBuilder, ListReader, Pointer, PointerBuilder, PointerReader};
use crate::traits::{FromPointerBuilder, FromPointerReader, IndexMove, ListIter};
use crate::{data, Error, Result};

#[derive(Copy, Clone)]
pub struct Owned;

impl crate::traits::Owned for Owned {
    type Reader<'a> = Reader<'a>;
    type Builder<'a> = Builder<'a>;
}

#[derive(Clone, Copy)]
pub struct Reader<'a> {
    reader: ListReader<'a>,
}

impl<'a> Reader<'a> {
    pub fn new(reader: ListReader<'a>) -> Self {
        Self { reader }
    }

    pub fn len(&self) -> u32 {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(self) -> ListIter<Reader<'a>, Result<data::Reader<'a>>> {
        let l = self.len();
        ListIter::new(self, l)
    }
}

impl<'a> FromPointerReader<'a> for Reader<'a> {
    fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Reader<'a>> {
        Ok(Reader {
            reader: reader.get_list(Pointer)?,
        })
    }
}

impl<'a> IndexMove<u32, Result<data::Reader<'a>>> for Reader<'a> {
    fn index_move(&self, index: u32) -> Result<data::Reader<'a>> {
        self.reader.get_pointer_element(index).get_data(None)
    }
}

impl<'a> Reader<'a> {
    /// Gets the bytes at position `index`. Fails with `IndexOutOfBounds` if
    /// `index` is greater than or equal to `len()`.
    pub fn get(self, index: u32) -> Result<data::Reader<'a>> {
        if index < self.len() {
            self.index_move(index)
        } else {
            Err(Error::index_out_of_bounds(index, self.len()))
        }
    }

    /// Gets the bytes at position `index`. Returns `None` if `index`
    /// is greater than or equal to `len()`.
    pub fn try_get(self, index: u32) -> Option<Result<data::Reader<'a>>> {
        if index < self.len() {
            Some(self.index_move(index))
        } else {
            None
        }
    }
}

impl<'a> crate::traits::IntoInternalListReader<'a> for Reader<'a> {
    fn into_internal_list_reader(self) -> ListReader<'a> {
        self.reader
    }
}

pub struct Builder<'a> {
    builder: ListBuilder<'a>,
}

impl<'a> Builder<'a> {
    pub fn new(builder: ListBuilder<'a>) -> Builder<'a> {
        Builder { builder }
    }

    pub fn len(&self) -> u32 {
        self.builder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if index < self.len() {
            Ok(())
        } else {
            Err(Error::index_out_of_bounds(index, self.len()))
        }
    }

    pub fn set(&mut self, index: u32, value: &[u8]) -> Result<()> {
        self.check_index(index)?;
        self.builder.reborrow().get_pointer_element(index).set_data(value)
    }

    /// Replaces the element with zeroed bytes of length `size` for incremental fill.
    pub fn init(self, index: u32, size: u32) -> Result<data::Builder<'a>> {
        self.check_index(index)?;
        self.builder.get_pointer_element(index).init_data(size)
    }

    pub fn into_reader(self) -> Reader<'a> {
        Reader {
            reader: self.builder.into_reader(),
        }
    }

    pub fn reborrow(&mut self) -> Builder<'_> {
        Builder {
            builder: self.builder.reborrow(),
        }
    }

    pub fn reborrow_as_reader(&self) -> Reader<'_> {
        Reader {
            reader: self.builder.as_reader(),
        }
    }
}

impl<'a> FromPointerBuilder<'a> for Builder<'a> {
    fn init_pointer(builder: PointerBuilder<'a>, size: u32) -> Result<Builder<'a>> {
        Ok(Builder {
            builder: builder.init_list(Pointer, size)?,
        })
    }
    fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Builder<'a>> {
        Ok(Builder {
            builder: builder.get_list(Pointer)?,
        })
    }
}

impl<'a> Builder<'a> {
    pub fn get(self, index: u32) -> Result<data::Builder<'a>> {
        self.check_index(index)?;
        self.builder.get_pointer_element(index).get_data(None)
    }
}

impl<'a> crate::traits::SetPointerBuilder for Reader<'a> {
    fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Reader<'a>) -> Result<()> {
        pointer.set_list(&value.reader)
    }
}

impl<'a> ::core::iter::IntoIterator for Reader<'a> {
    type Item = Result<data::Reader<'a>>;
    type IntoIter = ListIter<Reader<'a>, Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
