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

//! Field descriptor tables.
//!
//! A code generator emits one [`StructSchema`] per struct type: its id, its encoded size, and
//! one [`Field`] per field giving the slot the field lives in, its kind, and its default. The
//! [`dynamic_struct`](crate::dynamic_struct) views interpret a struct through such a table.

use crate::private::layout::StructSize;
use crate::{Error, ErrorKind, Result};

/// Fixed-width scalar stored in the data section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl PrimitiveKind {
    /// Width of the field in bits. Data-section offsets are counted in units of this width.
    pub fn bits(self) -> u32 {
        match self {
            Self::Bool => 1,
            Self::Int8 | Self::UInt8 => 8,
            Self::Int16 | Self::UInt16 => 16,
            Self::Int32 | Self::UInt32 | Self::Float32 => 32,
            Self::Int64 | Self::UInt64 | Self::Float64 => 64,
        }
    }
}

/// The closed set of field kinds a descriptor table can name.
#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    Primitive(PrimitiveKind),
    Text,
    Data,
    TextList,
    DataList,
    Struct(&'static StructSchema),
}

impl FieldKind {
    pub fn is_pointer(&self) -> bool {
        !matches!(self, Self::Primitive(_))
    }
}

/// Declared default of a field. `None` is zero, null, or empty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DefaultValue {
    None,
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
    Text(&'static str),
    Data(&'static [u8]),
}

impl DefaultValue {
    /// Bit pattern XORed into the stored value of a primitive field.
    pub(crate) fn mask_bits(&self) -> u64 {
        match *self {
            Self::Bool(b) => u64::from(b),
            Self::Int8(v) => u64::from(v as u8),
            Self::Int16(v) => u64::from(v as u16),
            Self::Int32(v) => u64::from(v as u32),
            Self::Int64(v) => v as u64,
            Self::UInt8(v) => u64::from(v),
            Self::UInt16(v) => u64::from(v),
            Self::UInt32(v) => u64::from(v),
            Self::UInt64(v) => v,
            Self::Float32(v) => u64::from(v.to_bits()),
            Self::Float64(v) => v.to_bits(),
            Self::None | Self::Text(_) | Self::Data(_) => 0,
        }
    }

    /// Default content of a blob field, if it has one.
    pub(crate) fn blob(&self) -> Option<&'static [u8]> {
        match *self {
            Self::Text(t) => Some(t.as_bytes()),
            Self::Data(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Field {
    pub name: &'static str,

    /// Pointer-section slot for pointer fields; data-section offset, in units of the
    /// field's width, for primitive fields.
    pub index: u32,

    pub kind: FieldKind,
    pub default: DefaultValue,
}

impl Field {
    pub fn get_name(&self) -> &'static str {
        self.name
    }

    pub fn get_index(&self) -> u32 {
        self.index
    }

    pub fn get_kind(&self) -> FieldKind {
        self.kind
    }

    pub fn get_default(&self) -> DefaultValue {
        self.default
    }
}

#[derive(Debug)]
pub struct StructSchema {
    pub type_id: u64,
    pub name: &'static str,
    pub struct_size: StructSize,
    pub fields: &'static [Field],
}

impl StructSchema {
    pub fn get_fields(&'static self) -> &'static [Field] {
        self.fields
    }

    pub fn find_field_by_name(&self, name: &str) -> Option<Field> {
        self.fields.iter().find(|f| f.name == name).copied()
    }

    pub fn get_field_by_name(&self, name: &str) -> Result<Field> {
        match self.find_field_by_name(name) {
            Some(f) => Ok(f),
            None => Err(Error::failed(format!(
                "struct {} has no field named {name}",
                self.name
            ))),
        }
    }

    /// Checks that a field fits inside the struct's declared size. Descriptor tables come from
    /// a generator, so a failure here means the table itself is broken.
    pub fn check_field(&self, field: &Field) -> Result<()> {
        let fits = match field.kind {
            FieldKind::Primitive(kind) => {
                (u64::from(field.index) + 1) * u64::from(kind.bits())
                    <= u64::from(self.struct_size.data) * 64
            }
            _ => field.index < u32::from(self.struct_size.pointers),
        };
        if fits {
            Ok(())
        } else {
            Err(Error {
                kind: ErrorKind::IndexOutOfBounds,
                extra: format!("field {} does not fit in struct {}", field.name, self.name),
            })
        }
    }
}

impl PartialEq for StructSchema {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

#[cfg(test)]
mod tests {
    use super::{DefaultValue, Field, FieldKind, PrimitiveKind, StructSchema};
    use crate::private::layout::StructSize;

    static NODE: StructSchema = StructSchema {
        type_id: 0xd1f4_0000_0000_0001,
        name: "Node",
        struct_size: StructSize {
            data: 1,
            pointers: 2,
        },
        fields: &[
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
                name: "next",
                index: 1,
                kind: FieldKind::Struct(&NODE),
                default: DefaultValue::None,
            },
        ],
    };

    #[test]
    fn lookup_by_name() {
        let next = NODE.get_field_by_name("next").unwrap();
        match next.kind {
            FieldKind::Struct(schema) => assert_eq!(schema.name, "Node"),
            _ => panic!("expected a struct field"),
        }
        assert!(NODE.find_field_by_name("missing").is_none());
        assert!(NODE.get_field_by_name("missing").is_err());
    }

    #[test]
    fn fields_fit() {
        for field in NODE.get_fields() {
            NODE.check_field(field).unwrap();
        }
        let wide = Field {
            name: "wide",
            index: 1,
            kind: FieldKind::Primitive(PrimitiveKind::Int64),
            default: DefaultValue::None,
        };
        assert!(NODE.check_field(&wide).is_err());
    }

    #[test]
    fn default_masks() {
        assert_eq!(DefaultValue::Int32(-7).mask_bits(), 0xffff_fff9);
        assert_eq!(DefaultValue::Float64(1.0).mask_bits(), 1.0f64.to_bits());
        assert_eq!(DefaultValue::Text("x").mask_bits(), 0);
        assert_eq!(DefaultValue::Text("x").blob(), Some(&b"x"[..]));
    }
}
