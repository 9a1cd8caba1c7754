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

//! Dynamically typed values, as produced by the field-table driven accessors in
//! [`dynamic_struct`].

use crate::{data, data_list, dynamic_struct, text, text_list};

/// A dynamically-typed read-only value.
#[derive(Clone, Copy)]
pub enum Reader<'a> {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Text(text::Reader<'a>),
    Data(data::Reader<'a>),
    TextList(text_list::Reader<'a>),
    DataList(data_list::Reader<'a>),
    Struct(dynamic_struct::Reader<'a>),
}

impl<'a> Reader<'a> {
    /// Downcasts the `Reader` into a more specific type. Panics if the
    /// expected type does not match the value.
    pub fn downcast<T: DowncastReader<'a>>(self) -> T {
        T::downcast_reader(self)
    }
}

macro_rules! primitive_dynamic_value(
    ($t:ty, $v:ident) => (
        impl <'a> From<$t> for Reader<'a> {
            fn from(x: $t) -> Reader<'a> { Reader::$v(x) }
        }
    )
);

primitive_dynamic_value!(bool, Bool);
primitive_dynamic_value!(i8, Int8);
primitive_dynamic_value!(i16, Int16);
primitive_dynamic_value!(i32, Int32);
primitive_dynamic_value!(i64, Int64);
primitive_dynamic_value!(u8, UInt8);
primitive_dynamic_value!(u16, UInt16);
primitive_dynamic_value!(u32, UInt32);
primitive_dynamic_value!(u64, UInt64);
primitive_dynamic_value!(f32, Float32);
primitive_dynamic_value!(f64, Float64);

impl<'a> From<&'a str> for Reader<'a> {
    fn from(t: &'a str) -> Reader<'a> {
        Reader::Text(t.into())
    }
}

impl<'a> From<&'a [u8]> for Reader<'a> {
    fn from(d: &'a [u8]) -> Reader<'a> {
        Reader::Data(d)
    }
}

impl<'a> From<text::Reader<'a>> for Reader<'a> {
    fn from(t: text::Reader<'a>) -> Reader<'a> {
        Reader::Text(t)
    }
}

impl<'a> From<text_list::Reader<'a>> for Reader<'a> {
    fn from(l: text_list::Reader<'a>) -> Reader<'a> {
        Reader::TextList(l)
    }
}

impl<'a> From<data_list::Reader<'a>> for Reader<'a> {
    fn from(l: data_list::Reader<'a>) -> Reader<'a> {
        Reader::DataList(l)
    }
}

/// Helper trait for the `dynamic_value::Reader::downcast()` method.
pub trait DowncastReader<'a> {
    fn downcast_reader(v: Reader<'a>) -> Self;
}

macro_rules! downcast_reader_impl(
    ($t:ty, $v:ident, $s:expr) => (
        impl <'a> DowncastReader<'a> for $t {
            fn downcast_reader(value: Reader<'a>) -> Self {
                let Reader::$v(x) = value else { panic!("error downcasting to {}", $s) };
                x
            }
        }
    )
);

downcast_reader_impl!(bool, Bool, "bool");
downcast_reader_impl!(i8, Int8, "i8");
downcast_reader_impl!(i16, Int16, "i16");
downcast_reader_impl!(i32, Int32, "i32");
downcast_reader_impl!(i64, Int64, "i64");
downcast_reader_impl!(u8, UInt8, "u8");
downcast_reader_impl!(u16, UInt16, "u16");
downcast_reader_impl!(u32, UInt32, "u32");
downcast_reader_impl!(u64, UInt64, "u64");
downcast_reader_impl!(f32, Float32, "f32");
downcast_reader_impl!(f64, Float64, "f64");
downcast_reader_impl!(text::Reader<'a>, Text, "text");
downcast_reader_impl!(data::Reader<'a>, Data, "data");
downcast_reader_impl!(text_list::Reader<'a>, TextList, "text list");
downcast_reader_impl!(data_list::Reader<'a>, DataList, "data list");
downcast_reader_impl!(dynamic_struct::Reader<'a>, Struct, "struct");

/// A dynamically-typed value with mutable interior.
pub enum Builder<'a> {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Text(text::Builder<'a>),
    Data(data::Builder<'a>),
    TextList(text_list::Builder<'a>),
    DataList(data_list::Builder<'a>),
    Struct(dynamic_struct::Builder<'a>),
}

impl<'a> Builder<'a> {
    pub fn reborrow(&mut self) -> Builder<'_> {
        match self {
            Builder::Bool(b) => Builder::Bool(*b),
            Builder::Int8(x) => Builder::Int8(*x),
            Builder::Int16(x) => Builder::Int16(*x),
            Builder::Int32(x) => Builder::Int32(*x),
            Builder::Int64(x) => Builder::Int64(*x),
            Builder::UInt8(x) => Builder::UInt8(*x),
            Builder::UInt16(x) => Builder::UInt16(*x),
            Builder::UInt32(x) => Builder::UInt32(*x),
            Builder::UInt64(x) => Builder::UInt64(*x),
            Builder::Float32(x) => Builder::Float32(*x),
            Builder::Float64(x) => Builder::Float64(*x),
            Builder::Text(t) => Builder::Text(t.reborrow()),
            Builder::Data(d) => Builder::Data(d),
            Builder::TextList(l) => Builder::TextList(l.reborrow()),
            Builder::DataList(l) => Builder::DataList(l.reborrow()),
            Builder::Struct(s) => Builder::Struct(s.reborrow()),
        }
    }

    pub fn into_reader(self) -> Reader<'a> {
        match self {
            Builder::Bool(b) => Reader::Bool(b),
            Builder::Int8(x) => Reader::Int8(x),
            Builder::Int16(x) => Reader::Int16(x),
            Builder::Int32(x) => Reader::Int32(x),
            Builder::Int64(x) => Reader::Int64(x),
            Builder::UInt8(x) => Reader::UInt8(x),
            Builder::UInt16(x) => Reader::UInt16(x),
            Builder::UInt32(x) => Reader::UInt32(x),
            Builder::UInt64(x) => Reader::UInt64(x),
            Builder::Float32(x) => Reader::Float32(x),
            Builder::Float64(x) => Reader::Float64(x),
            Builder::Text(t) => Reader::Text(t.into_reader()),
            Builder::Data(d) => Reader::Data(d),
            Builder::TextList(l) => Reader::TextList(l.into_reader()),
            Builder::DataList(l) => Reader::DataList(l.into_reader()),
            Builder::Struct(s) => Reader::Struct(s.into_reader()),
        }
    }

    /// Downcasts the `Builder` into a more specific type. Panics if the
    /// expected type does not match the value.
    pub fn downcast<T: DowncastBuilder<'a>>(self) -> T {
        T::downcast_builder(self)
    }
}

/// Helper trait for the `dynamic_value::Builder::downcast()` method.
pub trait DowncastBuilder<'a> {
    fn downcast_builder(v: Builder<'a>) -> Self;
}

macro_rules! downcast_builder_impl(
    ($t:ty, $v:ident, $s:expr) => (
        impl <'a> DowncastBuilder<'a> for $t {
            fn downcast_builder(value: Builder<'a>) -> Self {
                let Builder::$v(x) = value else { panic!("error downcasting to {}", $s) };
                x
            }
        }
    )
);

downcast_builder_impl!(bool, Bool, "bool");
downcast_builder_impl!(i8, Int8, "i8");
downcast_builder_impl!(i16, Int16, "i16");
downcast_builder_impl!(i32, Int32, "i32");
downcast_builder_impl!(i64, Int64, "i64");
downcast_builder_impl!(u8, UInt8, "u8");
downcast_builder_impl!(u16, UInt16, "u16");
downcast_builder_impl!(u32, UInt32, "u32");
downcast_builder_impl!(u64, UInt64, "u64");
downcast_builder_impl!(f32, Float32, "f32");
downcast_builder_impl!(f64, Float64, "f64");
downcast_builder_impl!(text::Builder<'a>, Text, "text");
downcast_builder_impl!(data::Builder<'a>, Data, "data");
downcast_builder_impl!(text_list::Builder<'a>, TextList, "text list");
downcast_builder_impl!(data_list::Builder<'a>, DataList, "data list");
downcast_builder_impl!(dynamic_struct::Builder<'a>, Struct, "struct");
