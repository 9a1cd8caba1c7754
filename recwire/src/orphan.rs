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

//! Objects that have been detached from, or not yet attached to, the message tree.
//!
//! An [`Orphan`] is produced by a `disown_*` accessor or by an [`Orphanage`], and is attached
//! with the matching `adopt_*` accessor. Adoption moves the pointer, not the bytes, and can
//! happen at most once per orphan.

use core::marker::PhantomData;

use crate::message::{self, Allocator};
use crate::private::arena::BuilderArena;
use crate::private::layout::OrphanBuilder;
use crate::traits::{FromPointerReader, Owned};
use crate::{data, data_list, text, text_list, Error, ErrorKind, Result};

pub struct Orphan<T> {
    builder: OrphanBuilder,
    marker: PhantomData<T>,
}

impl<T> Orphan<T>
where
    T: Owned,
{
    pub(crate) fn new(builder: OrphanBuilder) -> Self {
        Self {
            builder,
            marker: PhantomData,
        }
    }

    /// True if the orphan was disowned from a null pointer.
    pub fn is_null(&self) -> bool {
        self.builder.is_null()
    }

    /// True once the orphan has been adopted somewhere.
    pub fn is_consumed(&self) -> bool {
        self.builder.is_adopted()
    }

    /// Reads the orphan's content. Null orphans read as the type's default.
    pub fn get_reader<'a, A: Allocator>(
        &self,
        message: &'a message::Builder<A>,
    ) -> Result<T::Reader<'a>> {
        let arena = message.arena();
        if self.builder.message_id() != arena.message_id() {
            return Err(Error::from_kind(ErrorKind::OrphanFromDifferentMessage));
        }
        let reader = self.builder.as_reader(arena.as_reader())?;
        FromPointerReader::get_from_pointer(&reader)
    }

    pub(crate) fn builder_mut(&mut self) -> &mut OrphanBuilder {
        &mut self.builder
    }
}

impl<T> Drop for Orphan<T> {
    fn drop(&mut self) {
        if !self.builder.is_null() && !self.builder.is_adopted() {
            log::trace!(
                "orphan in segment {} dropped without adoption",
                self.builder.segment_id()
            );
        }
    }
}

/// Creates orphans directly in a message's arena.
pub struct Orphanage<'a> {
    arena: &'a mut dyn BuilderArena,
}

impl<'a> Orphanage<'a> {
    pub(crate) fn new(arena: &'a mut dyn BuilderArena) -> Self {
        Self { arena }
    }

    pub fn new_orphan_text(&mut self, value: &str) -> Result<Orphan<text::Owned>> {
        Ok(Orphan::new(OrphanBuilder::new_text(
            self.arena,
            value.as_bytes(),
        )?))
    }

    pub fn new_orphan_data(&mut self, value: &[u8]) -> Result<Orphan<data::Owned>> {
        Ok(Orphan::new(OrphanBuilder::new_data(self.arena, value)?))
    }

    pub fn new_orphan_text_list(&mut self, values: &[&str]) -> Result<Orphan<text_list::Owned>> {
        let bytes: Vec<&[u8]> = values.iter().map(|s| s.as_bytes()).collect();
        Ok(Orphan::new(OrphanBuilder::new_blob_list(
            self.arena, &bytes, true,
        )?))
    }

    pub fn new_orphan_data_list(&mut self, values: &[&[u8]]) -> Result<Orphan<data_list::Owned>> {
        Ok(Orphan::new(OrphanBuilder::new_blob_list(
            self.arena, values, false,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use crate::message;
    use crate::{any_pointer, text, ErrorKind};

    #[test]
    fn orphanage_text_adopts_into_root() {
        let mut message = message::Builder::new_default();
        let mut orphan = message.get_orphanage().new_orphan_text("hello").unwrap();
        assert!(!orphan.is_null());
        assert_eq!(orphan.get_reader(&message).unwrap(), "hello");

        let mut root: any_pointer::Builder = message.get_root().unwrap();
        root.adopt(&mut orphan).unwrap();
        assert!(orphan.is_consumed());
        assert_eq!(
            orphan.get_reader(&message).unwrap_err().kind,
            ErrorKind::AlreadyAdopted
        );
        let text: text::Reader = message.get_root_as_reader().unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn orphan_from_other_message() {
        let mut first = message::Builder::new_default();
        let mut second = message::Builder::new_default();
        let mut orphan = first.get_orphanage().new_orphan_data(&[1, 2, 3]).unwrap();
        assert_eq!(
            orphan.get_reader(&second).unwrap_err().kind,
            ErrorKind::OrphanFromDifferentMessage
        );
        let mut root: any_pointer::Builder = second.get_root().unwrap();
        assert_eq!(
            root.adopt(&mut orphan).unwrap_err().kind,
            ErrorKind::OrphanFromDifferentMessage
        );
        assert!(!orphan.is_consumed());
    }

    #[test]
    fn orphan_lists() {
        let mut message = message::Builder::new_default();
        let mut orphanage = message.get_orphanage();
        let names = orphanage.new_orphan_text_list(&["x", "yz"]).unwrap();
        let blobs = orphanage
            .new_orphan_data_list(&[&[9u8][..], &[][..]])
            .unwrap();
        let names = names.get_reader(&message).unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names.get(1).unwrap(), "yz");
        let blobs = blobs.get_reader(&message).unwrap();
        assert_eq!(blobs.get(0).unwrap(), &[9u8][..]);
        assert!(blobs.get(1).unwrap().is_empty());
    }
}
