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

//! # recwire runtime
//!
//! A zero-copy, schema-typed message encoding. A message is a sequence of
//! word-aligned segments; structs and lists are reached through 64-bit
//! pointer words that hold relative offsets, so the bytes can be read in
//! place without a parsing step.
//!
//! Generated accessor modules (such as [`recursive_serde`]) sit on top of the
//! untyped machinery in `private::layout`, driven by the field tables in
//! [`schema`]. Subtrees can be moved between slots without copying through
//! [`orphan::Orphan`] handles.

pub mod any_pointer;
pub mod data;
pub mod data_list;
pub mod dynamic_struct;
pub mod dynamic_value;
pub mod message;
pub mod orphan;
pub mod primitive_list;
pub mod private;
pub mod recursive_serde;
pub mod schema;
pub mod serialize;
pub mod struct_list;
pub mod text;
pub mod text_list;
pub mod traits;

/// Eight bytes of memory with opaque interior.
///
/// This type is used to ensure that the data of a message is properly aligned.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
#[repr(C, align(8))]
pub struct Word {
    raw_content: [u8; 8],
}

/// Constructs a word with the given bytes.
#[macro_export]
macro_rules! word {
    ($b0:expr, $b1:expr, $b2:expr, $b3:expr, $b4:expr, $b5:expr, $b6:expr, $b7:expr) => {
        $crate::Word::from_bytes([$b0, $b1, $b2, $b3, $b4, $b5, $b6, $b7])
    };
}

impl Word {
    pub const fn from_bytes(raw_content: [u8; 8]) -> Self {
        Self { raw_content }
    }

    /// Allocates a vec of `length` words, all set to zero.
    pub fn allocate_zeroed_vec(length: usize) -> Vec<Self> {
        vec![Self::default(); length]
    }

    pub fn words_to_bytes(words: &[Self]) -> &[u8] {
        // `Word` is `repr(C)` over `[u8; 8]`, so the cast cannot misread padding.
        unsafe { core::slice::from_raw_parts(words.as_ptr() as *const u8, words.len() * 8) }
    }

    pub fn words_to_bytes_mut(words: &mut [Self]) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(words.as_mut_ptr() as *mut u8, words.len() * 8) }
    }
}

/// Size of a message. Every generated struct has a method `.total_size()` that returns this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MessageSize {
    pub word_count: u64,
}

impl MessageSize {
    pub fn plus_eq(&mut self, other: Self) {
        self.word_count += other.word_count;
    }
}

/// Because messages are lazily validated, the return type of any method that reads a pointer field
/// must be wrapped in a Result.
pub type Result<T> = ::core::result::Result<T, Error>;

/// Describes an arbitrary error that prevented an operation from completing.
#[derive(Debug, Clone)]
pub struct Error {
    /// The general kind of the error. Code that decides how to respond to an error
    /// should read only this field in making its decision.
    pub kind: ErrorKind,

    /// Extra context about error
    pub extra: String,
}

/// The general nature of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Something went wrong
    Failed,

    /// A pointer word is malformed, points outside its segment, chains more than one far
    /// indirection, or has a shape that does not match the field being read.
    CorruptPointer,

    /// A list element or pointer slot index is beyond the declared bounds on a write path.
    IndexOutOfBounds,

    /// The requested list or blob length cannot be encoded.
    LengthOverflow,

    /// The orphan handle was already adopted somewhere.
    AlreadyAdopted,

    /// The orphan handle belongs to a different message than the slot adopting it.
    OrphanFromDifferentMessage,

    /// The stream ended before a complete message was read.
    PrematureEndOfFile,

    /// Exceeded the traversal limit set in `ReaderOptions`.
    ReadLimitExceeded,

    /// Exceeded the nesting limit set in `ReaderOptions`.
    NestingLimitExceeded,

    /// Text blob contains bytes that are not valid UTF-8.
    TextContainsNonUtf8Data(core::str::Utf8Error),
}

impl Error {
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            extra: String::new(),
        }
    }

    pub fn failed(description: String) -> Self {
        Self {
            kind: ErrorKind::Failed,
            extra: description,
        }
    }

    pub fn corrupt(description: &str) -> Self {
        Self {
            kind: ErrorKind::CorruptPointer,
            extra: description.to_string(),
        }
    }

    pub(crate) fn index_out_of_bounds(index: u32, len: u32) -> Self {
        Self {
            kind: ErrorKind::IndexOutOfBounds,
            extra: format!("index {index} in a list of length {len}"),
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::Failed => write!(fmt, "Failed"),
            Self::CorruptPointer => write!(fmt, "Corrupt pointer"),
            Self::IndexOutOfBounds => write!(fmt, "Index out of bounds"),
            Self::LengthOverflow => write!(fmt, "Length overflow"),
            Self::AlreadyAdopted => write!(fmt, "Orphan was already adopted"),
            Self::OrphanFromDifferentMessage => {
                write!(fmt, "Orphan belongs to a different message")
            }
            Self::PrematureEndOfFile => write!(fmt, "Premature end of file"),
            Self::ReadLimitExceeded => write!(fmt, "Read limit exceeded"),
            Self::NestingLimitExceeded => write!(fmt, "Nesting limit exceeded"),
            Self::TextContainsNonUtf8Data(e) => write!(fmt, "Text contains non-utf8 data: {e}"),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::result::Result<(), core::fmt::Error> {
        if self.extra.is_empty() {
            write!(fmt, "{}", self.kind)
        } else {
            write!(fmt, "{}: {}", self.kind, self.extra)
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::UnexpectedEof => ErrorKind::PrematureEndOfFile,
            _ => ErrorKind::Failed,
        };
        Self {
            kind,
            extra: format!("{err}"),
        }
    }
}

impl From<core::str::Utf8Error> for Error {
    fn from(err: core::str::Utf8Error) -> Self {
        Self::from_kind(ErrorKind::TextContainsNonUtf8Data(err))
    }
}

/// Helper struct that allows `message::Builder::get_segments_for_output()` to avoid heap allocations
/// in the single-segment case.
pub enum OutputSegments<'a> {
    SingleSegment([&'a [u8]; 1]),
    MultiSegment(Vec<&'a [u8]>),
}

impl<'a> core::ops::Deref for OutputSegments<'a> {
    type Target = [&'a [u8]];
    fn deref(&self) -> &[&'a [u8]] {
        match self {
            OutputSegments::SingleSegment(s) => s,
            OutputSegments::MultiSegment(v) => v,
        }
    }
}

impl<'s> message::ReaderSegments for OutputSegments<'s> {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        match self {
            OutputSegments::SingleSegment(s) => s.get(id as usize).copied(),
            OutputSegments::MultiSegment(v) => v.get(id as usize).copied(),
        }
    }

    fn len(&self) -> usize {
        match self {
            OutputSegments::SingleSegment(_) => 1,
            OutputSegments::MultiSegment(v) => v.len(),
        }
    }
}
