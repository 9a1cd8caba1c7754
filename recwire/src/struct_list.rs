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

//! List of structs.

use core::marker::PhantomData;

use crate::private::layout::{
    InlineComposite, ListBuilder, ListReader, PointerBuilder, PointerReader,
};
use crate::traits::{
    FromPointerBuilder, FromPointerReader, FromStructBuilder, FromStructReader, HasStructSize,
    IndexMove, IntoInternalStructReader, ListIter,
};
use crate::{Error, Result};

#[derive(Copy, Clone)]
pub struct Owned<T>
where
    T: crate::traits::OwnedStruct,
{
    marker: PhantomData<T>,
}

impl<T> crate::traits::Owned for Owned<T>
where
    T: crate::traits::OwnedStruct,
{
    type Reader<'a> = Reader<'a, T>;
    type Builder<'a> = Builder<'a, T>;
}

pub struct Reader<'a, T>
where
    T: crate::traits::OwnedStruct,
{
    marker: PhantomData<T>,
    reader: ListReader<'a>,
}

impl<'a, T> Clone for Reader<'a, T>
where
    T: crate::traits::OwnedStruct,
{
    fn clone(&self) -> Reader<'a, T> {
        *self
    }
}
impl<'a, T> Copy for Reader<'a, T> where T: crate::traits::OwnedStruct {}

impl<'a, T> Reader<'a, T>
where
    T: crate::traits::OwnedStruct,
{
    pub fn len(&self) -> u32 {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(self) -> ListIter<Reader<'a, T>, T::Reader<'a>> {
        ListIter::new(self, self.reader.len())
    }

    /// Gets the element at position `index`. Fails with `IndexOutOfBounds` if
    /// `index` is greater than or equal to `len()`.
    pub fn get(self, index: u32) -> Result<T::Reader<'a>> {
        self.try_get(index)
            .ok_or_else(|| Error::index_out_of_bounds(index, self.len()))
    }

    /// Gets the element at position `index`. Returns `None` if `index`
    /// is greater than or equal to `len()`.
    pub fn try_get(self, index: u32) -> Option<T::Reader<'a>> {
        if index < self.len() {
            Some(FromStructReader::new(self.reader.get_struct_element(index)))
        } else {
            None
        }
    }
}

impl<'a, T> FromPointerReader<'a> for Reader<'a, T>
where
    T: crate::traits::OwnedStruct,
{
    fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Reader<'a, T>> {
        Ok(Reader {
            reader: reader.get_list(InlineComposite)?,
            marker: PhantomData,
        })
    }
}

impl<'a, T> IndexMove<u32, T::Reader<'a>> for Reader<'a, T>
where
    T: crate::traits::OwnedStruct,
{
    fn index_move(&self, index: u32) -> T::Reader<'a> {
        FromStructReader::new(self.reader.get_struct_element(index))
    }
}

impl<'a, T> crate::traits::IntoInternalListReader<'a> for Reader<'a, T>
where
    T: crate::traits::OwnedStruct,
{
    fn into_internal_list_reader(self) -> ListReader<'a> {
        self.reader
    }
}

pub struct Builder<'a, T>
where
    T: crate::traits::OwnedStruct,
{
    marker: PhantomData<T>,
    builder: ListBuilder<'a>,
}

impl<'a, T> Builder<'a, T>
where
    T: crate::traits::OwnedStruct,
{
    pub fn len(&self) -> u32 {
        self.builder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_reader(self) -> Reader<'a, T> {
        Reader {
            marker: PhantomData,
            reader: self.builder.into_reader(),
        }
    }

    pub fn reborrow(&mut self) -> Builder<'_, T> {
        Builder {
            marker: PhantomData,
            builder: self.builder.reborrow(),
        }
    }

    /// Overwrites the element at `index` with a copy of `value`. Fields that
    /// do not fit in this list's element size are dropped.
    pub fn set_with_caveats<'b>(&mut self, index: u32, value: T::Reader<'b>) -> Result<()> {
        if index >= self.len() {
            return Err(Error::index_out_of_bounds(index, self.len()));
        }
        self.builder
            .reborrow()
            .get_struct_element(index)
            .copy_content_from(&value.into_internal_struct_reader())
    }

    /// Fails with `IndexOutOfBounds` if `index` is greater than or equal to `len()`.
    pub fn get(self, index: u32) -> Result<T::Builder<'a>> {
        if index >= self.len() {
            return Err(Error::index_out_of_bounds(index, self.len()));
        }
        Ok(FromStructBuilder::new(
            self.builder.get_struct_element(index),
        ))
    }
}

impl<'a, T> FromPointerBuilder<'a> for Builder<'a, T>
where
    T: crate::traits::OwnedStruct,
{
    fn init_pointer(builder: PointerBuilder<'a>, size: u32) -> Result<Builder<'a, T>> {
        Ok(Builder {
            marker: PhantomData,
            builder: builder.init_struct_list(size, <T::Builder<'a> as HasStructSize>::STRUCT_SIZE)?,
        })
    }

    fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Builder<'a, T>> {
        Ok(Builder {
            marker: PhantomData,
            builder: builder.get_struct_list(<T::Builder<'a> as HasStructSize>::STRUCT_SIZE)?,
        })
    }
}

impl<'a, T> crate::traits::SetPointerBuilder for Reader<'a, T>
where
    T: crate::traits::OwnedStruct,
{
    fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Reader<'a, T>) -> Result<()> {
        pointer.set_list(&value.reader)
    }
}

impl<'a, T> ::core::iter::IntoIterator for Reader<'a, T>
where
    T: crate::traits::OwnedStruct,
{
    type Item = T::Reader<'a>;
    type IntoIter = ListIter<Reader<'a, T>, Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
