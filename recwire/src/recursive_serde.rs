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

//! Accessors for the `RecursiveSerde` struct type:
//!
//! ```text
//! struct RecursiveSerde {
//!   fieldsName @0 :List(Text);
//!   fieldsData @1 :List(Data);
//!   fullyQualifiedName @2 :Text;
//!   nonrecursiveBlob @3 :Data;
//! }
//! ```
//!
//! The type has no data section and four pointer slots, one per field, in declaration order.

use crate::orphan::Orphan;
use crate::private::layout::{self, StructSize};
use crate::schema::{DefaultValue, Field, FieldKind, StructSchema};
use crate::traits::{FromPointerBuilder, FromPointerReader};
use crate::{data, data_list, dynamic_struct, dynamic_value, text, text_list, Result};

pub const TYPE_ID: u64 = 0xb3f1_9c4e_27d8_a615;

pub const STRUCT_SIZE: StructSize = StructSize {
    data: 0,
    pointers: 4,
};

pub static SCHEMA: StructSchema = StructSchema {
    type_id: TYPE_ID,
    name: "RecursiveSerde",
    struct_size: STRUCT_SIZE,
    fields: &[
        Field {
            name: "fieldsName",
            index: 0,
            kind: FieldKind::TextList,
            default: DefaultValue::None,
        },
        Field {
            name: "fieldsData",
            index: 1,
            kind: FieldKind::DataList,
            default: DefaultValue::None,
        },
        Field {
            name: "fullyQualifiedName",
            index: 2,
            kind: FieldKind::Text,
            default: DefaultValue::None,
        },
        Field {
            name: "nonrecursiveBlob",
            index: 3,
            kind: FieldKind::Data,
            default: DefaultValue::None,
        },
    ],
};

#[derive(Copy, Clone)]
pub struct Owned(());

impl crate::traits::Owned for Owned {
    type Reader<'a> = Reader<'a>;
    type Builder<'a> = Builder<'a>;
}

impl crate::traits::OwnedStruct for Owned {
    type Reader<'a> = Reader<'a>;
    type Builder<'a> = Builder<'a>;
}

impl crate::traits::HasTypeId for Owned {
    const TYPE_ID: u64 = TYPE_ID;
}

#[derive(Clone, Copy)]
pub struct Reader<'a> {
    reader: layout::StructReader<'a>,
}

impl<'a> crate::traits::HasTypeId for Reader<'a> {
    const TYPE_ID: u64 = TYPE_ID;
}

impl<'a> crate::traits::FromStructReader<'a> for Reader<'a> {
    fn new(reader: layout::StructReader<'a>) -> Reader<'a> {
        Reader { reader }
    }
}

impl<'a> From<Reader<'a>> for dynamic_struct::Reader<'a> {
    fn from(reader: Reader<'a>) -> Self {
        dynamic_struct::Reader::new(reader.reader, &SCHEMA)
    }
}

impl<'a> From<Reader<'a>> for dynamic_value::Reader<'a> {
    fn from(reader: Reader<'a>) -> Self {
        dynamic_value::Reader::Struct(reader.into())
    }
}

impl<'a> FromPointerReader<'a> for Reader<'a> {
    fn get_from_pointer(reader: &layout::PointerReader<'a>) -> Result<Reader<'a>> {
        Ok(Reader {
            reader: reader.get_struct()?,
        })
    }
}

impl<'a> crate::traits::IntoInternalStructReader<'a> for Reader<'a> {
    fn into_internal_struct_reader(self) -> layout::StructReader<'a> {
        self.reader
    }
}

impl<'a> crate::traits::SetPointerBuilder for Reader<'a> {
    fn set_pointer_builder(mut pointer: layout::PointerBuilder<'_>, value: Reader<'a>) -> Result<()> {
        pointer.set_struct(&value.reader)
    }
}

impl<'a> Reader<'a> {
    pub fn reborrow(&self) -> Reader<'_> {
        Reader { ..*self }
    }

    pub fn total_size(&self) -> Result<crate::MessageSize> {
        self.reader.total_size()
    }

    #[inline]
    pub fn get_fields_name(self) -> Result<text_list::Reader<'a>> {
        FromPointerReader::get_from_pointer(&self.reader.get_pointer_field(0))
    }

    #[inline]
    pub fn has_fields_name(&self) -> bool {
        !self.reader.is_pointer_field_null(0)
    }

    #[inline]
    pub fn get_fields_data(self) -> Result<data_list::Reader<'a>> {
        FromPointerReader::get_from_pointer(&self.reader.get_pointer_field(1))
    }

    #[inline]
    pub fn has_fields_data(&self) -> bool {
        !self.reader.is_pointer_field_null(1)
    }

    #[inline]
    pub fn get_fully_qualified_name(self) -> Result<text::Reader<'a>> {
        self.reader.get_pointer_field(2).get_text(None)
    }

    #[inline]
    pub fn has_fully_qualified_name(&self) -> bool {
        !self.reader.is_pointer_field_null(2)
    }

    #[inline]
    pub fn get_nonrecursive_blob(self) -> Result<data::Reader<'a>> {
        self.reader.get_pointer_field(3).get_data(None)
    }

    #[inline]
    pub fn has_nonrecursive_blob(&self) -> bool {
        !self.reader.is_pointer_field_null(3)
    }
}

pub struct Builder<'a> {
    builder: layout::StructBuilder<'a>,
}

impl<'a> crate::traits::HasStructSize for Builder<'a> {
    const STRUCT_SIZE: StructSize = STRUCT_SIZE;
}

impl<'a> crate::traits::HasTypeId for Builder<'a> {
    const TYPE_ID: u64 = TYPE_ID;
}

impl<'a> crate::traits::FromStructBuilder<'a> for Builder<'a> {
    fn new(builder: layout::StructBuilder<'a>) -> Builder<'a> {
        Builder { builder }
    }
}

impl<'a> From<Builder<'a>> for dynamic_struct::Builder<'a> {
    fn from(builder: Builder<'a>) -> Self {
        dynamic_struct::Builder::new(builder.builder, &SCHEMA)
    }
}

impl<'a> From<Builder<'a>> for dynamic_value::Builder<'a> {
    fn from(builder: Builder<'a>) -> Self {
        dynamic_value::Builder::Struct(builder.into())
    }
}

impl<'a> FromPointerBuilder<'a> for Builder<'a> {
    fn init_pointer(builder: layout::PointerBuilder<'a>, _size: u32) -> Result<Builder<'a>> {
        Ok(Builder {
            builder: builder.init_struct(STRUCT_SIZE),
        })
    }
    fn get_from_pointer(builder: layout::PointerBuilder<'a>) -> Result<Builder<'a>> {
        Ok(Builder {
            builder: builder.get_struct(STRUCT_SIZE)?,
        })
    }
}

impl<'a> Builder<'a> {
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

    pub fn total_size(&self) -> Result<crate::MessageSize> {
        self.builder.total_size()
    }

    #[inline]
    pub fn get_fields_name(self) -> Result<text_list::Builder<'a>> {
        FromPointerBuilder::get_from_pointer(self.builder.get_pointer_field(0)?)
    }

    #[inline]
    pub fn set_fields_name(&mut self, value: text_list::Reader<'_>) -> Result<()> {
        crate::traits::SetPointerBuilder::set_pointer_builder(
            self.builder.get_pointer_field_mut(0)?,
            value,
        )
    }

    #[inline]
    pub fn init_fields_name(self, size: u32) -> Result<text_list::Builder<'a>> {
        FromPointerBuilder::init_pointer(self.builder.get_pointer_field(0)?, size)
    }

    #[inline]
    pub fn has_fields_name(&self) -> bool {
        !self.builder.is_pointer_field_null(0)
    }

    pub fn disown_fields_name(&mut self) -> Result<Orphan<text_list::Owned>> {
        Ok(Orphan::new(self.builder.get_pointer_field_mut(0)?.disown()?))
    }

    pub fn adopt_fields_name(&mut self, orphan: &mut Orphan<text_list::Owned>) -> Result<()> {
        self.builder
            .get_pointer_field_mut(0)?
            .adopt(orphan.builder_mut())
    }

    #[inline]
    pub fn get_fields_data(self) -> Result<data_list::Builder<'a>> {
        FromPointerBuilder::get_from_pointer(self.builder.get_pointer_field(1)?)
    }

    #[inline]
    pub fn set_fields_data(&mut self, value: data_list::Reader<'_>) -> Result<()> {
        crate::traits::SetPointerBuilder::set_pointer_builder(
            self.builder.get_pointer_field_mut(1)?,
            value,
        )
    }

    #[inline]
    pub fn init_fields_data(self, size: u32) -> Result<data_list::Builder<'a>> {
        FromPointerBuilder::init_pointer(self.builder.get_pointer_field(1)?, size)
    }

    #[inline]
    pub fn has_fields_data(&self) -> bool {
        !self.builder.is_pointer_field_null(1)
    }

    pub fn disown_fields_data(&mut self) -> Result<Orphan<data_list::Owned>> {
        Ok(Orphan::new(self.builder.get_pointer_field_mut(1)?.disown()?))
    }

    pub fn adopt_fields_data(&mut self, orphan: &mut Orphan<data_list::Owned>) -> Result<()> {
        self.builder
            .get_pointer_field_mut(1)?
            .adopt(orphan.builder_mut())
    }

    #[inline]
    pub fn get_fully_qualified_name(self) -> Result<text::Builder<'a>> {
        self.builder.get_pointer_field(2)?.get_text(None)
    }

    #[inline]
    pub fn set_fully_qualified_name<'b>(&mut self, value: impl Into<text::Reader<'b>>) -> Result<()> {
        self.builder
            .get_pointer_field_mut(2)?
            .set_text(value.into())
    }

    #[inline]
    pub fn init_fully_qualified_name(self, size: u32) -> Result<text::Builder<'a>> {
        self.builder.get_pointer_field(2)?.init_text(size)
    }

    #[inline]
    pub fn has_fully_qualified_name(&self) -> bool {
        !self.builder.is_pointer_field_null(2)
    }

    pub fn disown_fully_qualified_name(&mut self) -> Result<Orphan<text::Owned>> {
        Ok(Orphan::new(self.builder.get_pointer_field_mut(2)?.disown()?))
    }

    pub fn adopt_fully_qualified_name(&mut self, orphan: &mut Orphan<text::Owned>) -> Result<()> {
        self.builder
            .get_pointer_field_mut(2)?
            .adopt(orphan.builder_mut())
    }

    #[inline]
    pub fn get_nonrecursive_blob(self) -> Result<data::Builder<'a>> {
        self.builder.get_pointer_field(3)?.get_data(None)
    }

    #[inline]
    pub fn set_nonrecursive_blob(&mut self, value: &[u8]) -> Result<()> {
        self.builder.get_pointer_field_mut(3)?.set_data(value)
    }

    #[inline]
    pub fn init_nonrecursive_blob(self, size: u32) -> Result<data::Builder<'a>> {
        self.builder.get_pointer_field(3)?.init_data(size)
    }

    #[inline]
    pub fn has_nonrecursive_blob(&self) -> bool {
        !self.builder.is_pointer_field_null(3)
    }

    pub fn disown_nonrecursive_blob(&mut self) -> Result<Orphan<data::Owned>> {
        Ok(Orphan::new(self.builder.get_pointer_field_mut(3)?.disown()?))
    }

    pub fn adopt_nonrecursive_blob(&mut self, orphan: &mut Orphan<data::Owned>) -> Result<()> {
        self.builder
            .get_pointer_field_mut(3)?
            .adopt(orphan.builder_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::{Builder, Reader, SCHEMA, STRUCT_SIZE};
    use crate::message;
    use crate::schema::FieldKind;
    use crate::traits::HasStructSize;

    #[test]
    fn schema_matches_accessors() {
        assert_eq!(SCHEMA.struct_size, STRUCT_SIZE);
        assert_eq!(<Builder as HasStructSize>::STRUCT_SIZE.pointers, 4);
        for field in SCHEMA.get_fields() {
            SCHEMA.check_field(field).unwrap();
        }
        assert!(matches!(
            SCHEMA.get_field_by_name("fieldsData").unwrap().kind,
            FieldKind::DataList
        ));
    }

    #[test]
    fn dynamic_view_sees_generated_writes() {
        let mut message = message::Builder::new_default();
        {
            let mut root = message.init_root::<Builder>().unwrap();
            root.set_fully_qualified_name("a.b.C").unwrap();
            root.set_nonrecursive_blob(&[1, 2]).unwrap();
        }
        let root = message.get_root_as_reader::<Reader>().unwrap();
        let dynamic: crate::dynamic_struct::Reader = root.into();
        assert_eq!(
            dynamic
                .get_named("fullyQualifiedName")
                .unwrap()
                .downcast::<crate::text::Reader>(),
            "a.b.C"
        );
        assert_eq!(
            dynamic
                .get_named("nonrecursiveBlob")
                .unwrap()
                .downcast::<&[u8]>(),
            &[1u8, 2][..]
        );
        assert!(!dynamic.has_named("fieldsName").unwrap());
    }
}
