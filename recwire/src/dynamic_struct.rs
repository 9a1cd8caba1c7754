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

//! Structs accessed through their field descriptor table instead of generated accessors.

use crate::any_pointer;
use crate::dynamic_value;
use crate::orphan::Orphan;
use crate::private::layout::{self, PointerBuilder};
use crate::schema::{Field, FieldKind, PrimitiveKind, StructSchema};
use crate::traits::{FromPointerBuilder, FromPointerReader, Owned, SetPointerBuilder};
use crate::{data_list, text_list, Error, Result};

fn type_mismatch(field: &Field) -> Error {
    Error::failed(format!("value does not match the type of field {}", field.name))
}

fn not_a_pointer(field: &Field) -> Error {
    Error::failed(format!("field {} is not a pointer field", field.name))
}

// Reads a primitive field from a struct reader or builder, applying the field's default.
macro_rules! get_primitive(
    ($value:ident, $s:expr, $kind:expr, $offset:expr, $bits:expr) => (
        match $kind {
            PrimitiveKind::Bool => dynamic_value::$value::Bool($s.get_bool_field_mask($offset, $bits != 0)),
            PrimitiveKind::Int8 => dynamic_value::$value::Int8($s.get_data_field_mask::<i8>($offset, $bits as i8)),
            PrimitiveKind::Int16 => dynamic_value::$value::Int16($s.get_data_field_mask::<i16>($offset, $bits as i16)),
            PrimitiveKind::Int32 => dynamic_value::$value::Int32($s.get_data_field_mask::<i32>($offset, $bits as i32)),
            PrimitiveKind::Int64 => dynamic_value::$value::Int64($s.get_data_field_mask::<i64>($offset, $bits as i64)),
            PrimitiveKind::UInt8 => dynamic_value::$value::UInt8($s.get_data_field_mask::<u8>($offset, $bits as u8)),
            PrimitiveKind::UInt16 => dynamic_value::$value::UInt16($s.get_data_field_mask::<u16>($offset, $bits as u16)),
            PrimitiveKind::UInt32 => dynamic_value::$value::UInt32($s.get_data_field_mask::<u32>($offset, $bits as u32)),
            PrimitiveKind::UInt64 => dynamic_value::$value::UInt64($s.get_data_field_mask::<u64>($offset, $bits)),
            PrimitiveKind::Float32 => dynamic_value::$value::Float32($s.get_data_field_mask::<f32>($offset, $bits as u32)),
            PrimitiveKind::Float64 => dynamic_value::$value::Float64($s.get_data_field_mask::<f64>($offset, $bits)),
        }
    )
);

/// A read-only struct interpreted through its schema.
#[derive(Clone, Copy)]
pub struct Reader<'a> {
    pub(crate) reader: layout::StructReader<'a>,
    schema: &'static StructSchema,
}

impl<'a> From<Reader<'a>> for dynamic_value::Reader<'a> {
    fn from(x: Reader<'a>) -> dynamic_value::Reader<'a> {
        dynamic_value::Reader::Struct(x)
    }
}

impl<'a> Reader<'a> {
    pub fn new(reader: layout::StructReader<'a>, schema: &'static StructSchema) -> Self {
        Self { reader, schema }
    }

    pub fn total_size(&self) -> Result<crate::MessageSize> {
        self.reader.total_size()
    }

    pub fn get_schema(&self) -> &'static StructSchema {
        self.schema
    }

    /// Reads a field. Fields beyond the encoded size of this struct read as their default.
    pub fn get(self, field: Field) -> Result<dynamic_value::Reader<'a>> {
        let index = field.index as usize;
        let pointer = || self.reader.get_pointer_field(index);
        match field.kind {
            FieldKind::Primitive(kind) => Ok(get_primitive!(
                Reader,
                self.reader,
                kind,
                index,
                field.default.mask_bits()
            )),
            FieldKind::Text => Ok(dynamic_value::Reader::Text(
                pointer().get_text(field.default.blob())?,
            )),
            FieldKind::Data => Ok(dynamic_value::Reader::Data(
                pointer().get_data(field.default.blob())?,
            )),
            FieldKind::TextList => Ok(dynamic_value::Reader::TextList(
                text_list::Reader::get_from_pointer(&pointer())?,
            )),
            FieldKind::DataList => Ok(dynamic_value::Reader::DataList(
                data_list::Reader::get_from_pointer(&pointer())?,
            )),
            FieldKind::Struct(schema) => Ok(Reader::new(pointer().get_struct()?, schema).into()),
        }
    }

    /// Gets the field with the given name.
    pub fn get_named(self, field_name: &str) -> Result<dynamic_value::Reader<'a>> {
        self.get(self.schema.get_field_by_name(field_name)?)
    }

    /// Returns `false` if the field is a pointer and the pointer is null.
    pub fn has(&self, field: Field) -> Result<bool> {
        if field.kind.is_pointer() {
            Ok(!self.reader.is_pointer_field_null(field.index as usize))
        } else {
            Ok(true)
        }
    }

    pub fn has_named(&self, field_name: &str) -> Result<bool> {
        self.has(self.schema.get_field_by_name(field_name)?)
    }
}

impl<'a> SetPointerBuilder for Reader<'a> {
    fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Reader<'a>) -> Result<()> {
        pointer.set_struct(&value.reader)
    }
}

/// A mutable struct interpreted through its schema.
pub struct Builder<'a> {
    builder: layout::StructBuilder<'a>,
    schema: &'static StructSchema,
}

impl<'a> From<Builder<'a>> for dynamic_value::Builder<'a> {
    fn from(x: Builder<'a>) -> dynamic_value::Builder<'a> {
        dynamic_value::Builder::Struct(x)
    }
}

impl<'a> Builder<'a> {
    pub fn new(builder: layout::StructBuilder<'a>, schema: &'static StructSchema) -> Self {
        Self { builder, schema }
    }

    pub fn reborrow(&mut self) -> Builder<'_> {
        Builder {
            builder: self.builder.reborrow(),
            schema: self.schema,
        }
    }

    pub fn reborrow_as_reader(&self) -> Reader<'_> {
        Reader {
            reader: self.builder.as_reader(),
            schema: self.schema,
        }
    }

    pub fn into_reader(self) -> Reader<'a> {
        Reader {
            reader: self.builder.into_reader(),
            schema: self.schema,
        }
    }

    pub fn get_schema(&self) -> &'static StructSchema {
        self.schema
    }

    pub fn total_size(&self) -> Result<crate::MessageSize> {
        self.builder.total_size()
    }

    fn pointer_field(&mut self, field: &Field) -> Result<PointerBuilder<'_>> {
        if !field.kind.is_pointer() {
            return Err(not_a_pointer(field));
        }
        self.builder.get_pointer_field_mut(field.index as usize)
    }

    /// Gets a writable view of the field. Null blob fields are filled with their default.
    pub fn get(self, field: Field) -> Result<dynamic_value::Builder<'a>> {
        let index = field.index as usize;
        match field.kind {
            FieldKind::Primitive(kind) => Ok(get_primitive!(
                Builder,
                self.builder,
                kind,
                index,
                field.default.mask_bits()
            )),
            FieldKind::Text => Ok(dynamic_value::Builder::Text(
                self.builder.get_pointer_field(index)?.get_text(field.default.blob())?,
            )),
            FieldKind::Data => Ok(dynamic_value::Builder::Data(
                self.builder.get_pointer_field(index)?.get_data(field.default.blob())?,
            )),
            FieldKind::TextList => Ok(dynamic_value::Builder::TextList(
                text_list::Builder::get_from_pointer(self.builder.get_pointer_field(index)?)?,
            )),
            FieldKind::DataList => Ok(dynamic_value::Builder::DataList(
                data_list::Builder::get_from_pointer(self.builder.get_pointer_field(index)?)?,
            )),
            FieldKind::Struct(schema) => {
                let pointer = self.builder.get_pointer_field(index)?;
                Ok(Builder::new(pointer.get_struct(schema.struct_size)?, schema).into())
            }
        }
    }

    pub fn get_named(self, field_name: &str) -> Result<dynamic_value::Builder<'a>> {
        let field = self.schema.get_field_by_name(field_name)?;
        self.get(field)
    }

    pub fn has(&self, field: Field) -> Result<bool> {
        self.reborrow_as_reader().has(field)
    }

    pub fn has_named(&self, field_name: &str) -> Result<bool> {
        let field = self.schema.get_field_by_name(field_name)?;
        self.has(field)
    }

    /// Sets the field to a copy of `value`.
    pub fn set(&mut self, field: Field, value: dynamic_value::Reader<'_>) -> Result<()> {
        use dynamic_value::Reader as V;
        let offset = field.index as usize;
        let bits = field.default.mask_bits();
        match (field.kind, value) {
            (FieldKind::Primitive(PrimitiveKind::Bool), V::Bool(v)) => {
                self.builder.set_bool_field_mask(offset, v, bits != 0)
            }
            (FieldKind::Primitive(PrimitiveKind::Int8), V::Int8(v)) => {
                self.builder.set_data_field_mask::<i8>(offset, v, bits as i8)
            }
            (FieldKind::Primitive(PrimitiveKind::Int16), V::Int16(v)) => {
                self.builder.set_data_field_mask::<i16>(offset, v, bits as i16)
            }
            (FieldKind::Primitive(PrimitiveKind::Int32), V::Int32(v)) => {
                self.builder.set_data_field_mask::<i32>(offset, v, bits as i32)
            }
            (FieldKind::Primitive(PrimitiveKind::Int64), V::Int64(v)) => {
                self.builder.set_data_field_mask::<i64>(offset, v, bits as i64)
            }
            (FieldKind::Primitive(PrimitiveKind::UInt8), V::UInt8(v)) => {
                self.builder.set_data_field_mask::<u8>(offset, v, bits as u8)
            }
            (FieldKind::Primitive(PrimitiveKind::UInt16), V::UInt16(v)) => {
                self.builder.set_data_field_mask::<u16>(offset, v, bits as u16)
            }
            (FieldKind::Primitive(PrimitiveKind::UInt32), V::UInt32(v)) => {
                self.builder.set_data_field_mask::<u32>(offset, v, bits as u32)
            }
            (FieldKind::Primitive(PrimitiveKind::UInt64), V::UInt64(v)) => {
                self.builder.set_data_field_mask::<u64>(offset, v, bits)
            }
            (FieldKind::Primitive(PrimitiveKind::Float32), V::Float32(v)) => {
                self.builder.set_data_field_mask::<f32>(offset, v, bits as u32)
            }
            (FieldKind::Primitive(PrimitiveKind::Float64), V::Float64(v)) => {
                self.builder.set_data_field_mask::<f64>(offset, v, bits)
            }
            (FieldKind::Text, V::Text(t)) => self.pointer_field(&field)?.set_text(t),
            (FieldKind::Data, V::Data(d)) => self.pointer_field(&field)?.set_data(d),
            (FieldKind::TextList, V::TextList(l)) => {
                SetPointerBuilder::set_pointer_builder(self.pointer_field(&field)?, l)
            }
            (FieldKind::DataList, V::DataList(l)) => {
                SetPointerBuilder::set_pointer_builder(self.pointer_field(&field)?, l)
            }
            (FieldKind::Struct(schema), V::Struct(s)) if schema == s.schema => {
                self.pointer_field(&field)?.set_struct(&s.reader)
            }
            _ => Err(type_mismatch(&field)),
        }
    }

    pub fn set_named(&mut self, field_name: &str, value: dynamic_value::Reader<'_>) -> Result<()> {
        let field = self.schema.get_field_by_name(field_name)?;
        self.set(field, value)
    }

    /// Initializes a struct field to an empty struct of its type.
    pub fn init(mut self, field: Field) -> Result<dynamic_value::Builder<'a>> {
        match field.kind {
            FieldKind::Struct(schema) => {
                self.pointer_field(&field)?;
                let pointer = self.builder.get_pointer_field(field.index as usize)?;
                Ok(Builder::new(pointer.init_struct(schema.struct_size), schema).into())
            }
            _ => Err(Error::failed(format!(
                "field {} needs a size, use initn",
                field.name
            ))),
        }
    }

    pub fn init_named(self, field_name: &str) -> Result<dynamic_value::Builder<'a>> {
        let field = self.schema.get_field_by_name(field_name)?;
        self.init(field)
    }

    /// Initializes a blob or list field with room for `size` bytes or elements.
    pub fn initn(mut self, field: Field, size: u32) -> Result<dynamic_value::Builder<'a>> {
        self.pointer_field(&field)?;
        let pointer = self.builder.get_pointer_field(field.index as usize)?;
        match field.kind {
            FieldKind::Text => Ok(dynamic_value::Builder::Text(pointer.init_text(size)?)),
            FieldKind::Data => Ok(dynamic_value::Builder::Data(pointer.init_data(size)?)),
            FieldKind::TextList => Ok(dynamic_value::Builder::TextList(
                text_list::Builder::init_pointer(pointer, size)?,
            )),
            FieldKind::DataList => Ok(dynamic_value::Builder::DataList(
                data_list::Builder::init_pointer(pointer, size)?,
            )),
            _ => Err(Error::failed(format!(
                "field {} is not a blob or list field",
                field.name
            ))),
        }
    }

    pub fn initn_named(self, field_name: &str, size: u32) -> Result<dynamic_value::Builder<'a>> {
        let field = self.schema.get_field_by_name(field_name)?;
        self.initn(field, size)
    }

    /// Resets the field: pointers become null, primitives read as their default again.
    pub fn clear(&mut self, field: Field) -> Result<()> {
        let offset = field.index as usize;
        match field.kind {
            FieldKind::Primitive(PrimitiveKind::Bool) => self.builder.set_bool_field(offset, false),
            FieldKind::Primitive(PrimitiveKind::Int8) => self.builder.set_data_field::<i8>(offset, 0),
            FieldKind::Primitive(PrimitiveKind::Int16) => self.builder.set_data_field::<i16>(offset, 0),
            FieldKind::Primitive(PrimitiveKind::Int32) => self.builder.set_data_field::<i32>(offset, 0),
            FieldKind::Primitive(PrimitiveKind::Int64) => self.builder.set_data_field::<i64>(offset, 0),
            FieldKind::Primitive(PrimitiveKind::UInt8) => self.builder.set_data_field::<u8>(offset, 0),
            FieldKind::Primitive(PrimitiveKind::UInt16) => self.builder.set_data_field::<u16>(offset, 0),
            FieldKind::Primitive(PrimitiveKind::UInt32) => self.builder.set_data_field::<u32>(offset, 0),
            FieldKind::Primitive(PrimitiveKind::UInt64) => self.builder.set_data_field::<u64>(offset, 0),
            FieldKind::Primitive(PrimitiveKind::Float32) => self.builder.set_data_field::<f32>(offset, 0.0),
            FieldKind::Primitive(PrimitiveKind::Float64) => self.builder.set_data_field::<f64>(offset, 0.0),
            _ => {
                self.pointer_field(&field)?.clear();
                Ok(())
            }
        }
    }

    pub fn clear_named(&mut self, field_name: &str) -> Result<()> {
        let field = self.schema.get_field_by_name(field_name)?;
        self.clear(field)
    }

    /// Detaches the field's content, leaving the field null.
    pub fn disown(&mut self, field: Field) -> Result<Orphan<any_pointer::Owned>> {
        Ok(Orphan::new(self.pointer_field(&field)?.disown()?))
    }

    pub fn disown_named(&mut self, field_name: &str) -> Result<Orphan<any_pointer::Owned>> {
        let field = self.schema.get_field_by_name(field_name)?;
        self.disown(field)
    }

    /// Attaches `orphan` at the field, discarding the field's previous content.
    pub fn adopt<T: Owned>(&mut self, field: Field, orphan: &mut Orphan<T>) -> Result<()> {
        self.pointer_field(&field)?.adopt(orphan.builder_mut())
    }

    pub fn adopt_named<T: Owned>(&mut self, field_name: &str, orphan: &mut Orphan<T>) -> Result<()> {
        let field = self.schema.get_field_by_name(field_name)?;
        self.adopt(field, orphan)
    }
}

#[cfg(test)]
mod tests {
    use super::{Builder, Reader};
    use crate::private::layout::StructSize;
    use crate::{any_pointer, message};
    use crate::schema::{DefaultValue, Field, FieldKind, PrimitiveKind, StructSchema};
    use crate::{text, ErrorKind};

    static NODE: StructSchema = StructSchema {
        type_id: 0xc4a3_5f10_77e2_0b91,
        name: "Node",
        struct_size: StructSize {
            data: 1,
            pointers: 3,
        },
        fields: &[
            Field {
                name: "flag",
                index: 0,
                kind: FieldKind::Primitive(PrimitiveKind::Bool),
                default: DefaultValue::Bool(true),
            },
            Field {
                name: "weight",
                index: 1,
                kind: FieldKind::Primitive(PrimitiveKind::Int32),
                default: DefaultValue::Int32(-7),
            },
            Field {
                name: "label",
                index: 0,
                kind: FieldKind::Text,
                default: DefaultValue::Text("unnamed"),
            },
            Field {
                name: "tags",
                index: 1,
                kind: FieldKind::TextList,
                default: DefaultValue::None,
            },
            Field {
                name: "next",
                index: 2,
                kind: FieldKind::Struct(&NODE),
                default: DefaultValue::None,
            },
        ],
    };

    fn root<A: message::Allocator>(message: &mut message::Builder<A>) -> Builder<'_> {
        message
            .get_root::<any_pointer::Builder>()
            .unwrap()
            .init_dynamic(&NODE)
    }

    #[test]
    fn defaults_then_values() {
        let mut message = message::Builder::new_default();
        let mut node = root(&mut message);

        let r = node.reborrow_as_reader();
        assert!(r.get_named("flag").unwrap().downcast::<bool>());
        assert_eq!(r.get_named("weight").unwrap().downcast::<i32>(), -7);
        assert_eq!(
            r.get_named("label").unwrap().downcast::<text::Reader>(),
            "unnamed"
        );
        assert!(!r.has_named("label").unwrap());
        assert!(r.has_named("weight").unwrap());

        node.set_named("flag", false.into()).unwrap();
        node.set_named("weight", 40i32.into()).unwrap();
        node.set_named("label", "root".into()).unwrap();
        let r = node.reborrow_as_reader();
        assert!(!r.get_named("flag").unwrap().downcast::<bool>());
        assert_eq!(r.get_named("weight").unwrap().downcast::<i32>(), 40);
        assert_eq!(
            r.get_named("label").unwrap().downcast::<text::Reader>(),
            "root"
        );

        node.clear_named("weight").unwrap();
        node.clear_named("label").unwrap();
        let r = node.reborrow_as_reader();
        assert_eq!(r.get_named("weight").unwrap().downcast::<i32>(), -7);
        assert!(!r.has_named("label").unwrap());
    }

    #[test]
    fn builder_get_dispatches_by_kind() {
        let mut message = message::Builder::new_default();
        let mut node = root(&mut message);
        assert_eq!(node.reborrow().get_named("weight").unwrap().downcast::<i32>(), -7);
        node.set_named("weight", 12i32.into()).unwrap();
        assert_eq!(node.reborrow().get_named("weight").unwrap().downcast::<i32>(), 12);
        assert!(node.reborrow().get_named("flag").unwrap().downcast::<bool>());

        assert!(!node.has_named("label").unwrap());
        {
            let label = node
                .reborrow()
                .get_named("label")
                .unwrap()
                .downcast::<text::Builder>();
            assert_eq!(label.to_str().unwrap(), "unnamed");
        }
        assert!(node.has_named("label").unwrap());

        let mut next = node
            .reborrow()
            .get_named("next")
            .unwrap()
            .downcast::<Builder>();
        next.set_named("weight", 3i32.into()).unwrap();
        let r = node.into_reader();
        let next = r.get_named("next").unwrap().downcast::<Reader>();
        assert_eq!(next.get_named("weight").unwrap().downcast::<i32>(), 3);
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut message = message::Builder::new_default();
        let mut node = root(&mut message);
        assert!(node.set_named("weight", "heavy".into()).is_err());
        assert!(node.set_named("missing", 1i32.into()).is_err());
        assert!(node.reborrow().init_named("label").is_err());
    }

    #[test]
    fn nested_struct_and_list() {
        let mut message = message::Builder::new_default();
        let mut node = root(&mut message);
        {
            let mut tags = node
                .reborrow()
                .initn_named("tags", 2)
                .unwrap()
                .downcast::<crate::text_list::Builder>();
            tags.set(0, "a").unwrap();
            tags.set(1, "b").unwrap();
        }
        {
            let mut next = node
                .reborrow()
                .init_named("next")
                .unwrap()
                .downcast::<Builder>();
            next.set_named("weight", 5i32.into()).unwrap();
        }
        let r = node.into_reader();
        let tags = r
            .get_named("tags")
            .unwrap()
            .downcast::<crate::text_list::Reader>();
        assert_eq!(tags.get(1).unwrap(), "b");
        let next = r.get_named("next").unwrap().downcast::<Reader>();
        assert_eq!(next.get_named("weight").unwrap().downcast::<i32>(), 5);
        assert!(!next.has_named("next").unwrap());
    }

    #[test]
    fn disown_and_adopt_between_fields() {
        let mut message = message::Builder::new_default();
        let mut node = root(&mut message);
        node.set_named("label", "moved".into()).unwrap();
        let mut orphan = node.disown_named("label").unwrap();
        assert!(!node.has_named("label").unwrap());

        let mut next = node
            .reborrow()
            .init_named("next")
            .unwrap()
            .downcast::<Builder>();
        next.adopt_named("label", &mut orphan).unwrap();
        assert_eq!(
            next.reborrow_as_reader()
                .get_named("label")
                .unwrap()
                .downcast::<text::Reader>(),
            "moved"
        );
        assert_eq!(
            next.adopt_named("label", &mut orphan).unwrap_err().kind,
            ErrorKind::AlreadyAdopted
        );
        assert!(next.disown_named("weight").is_err());
    }
}
