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

use crate::message::ReaderOptions;
use crate::private::arena::ReaderArenaImpl;
use crate::private::layout::{ElementSize, PointerReader};
use crate::{word, ErrorKind, Word};

fn with_root<R>(segments: &[&[Word]], f: impl FnOnce(PointerReader<'_>) -> R) -> R {
    let bytes: Vec<&[u8]> = segments.iter().map(|s| Word::words_to_bytes(s)).collect();
    let arena = ReaderArenaImpl::new(&bytes[..], ReaderOptions::new());
    let root = PointerReader::get_root(&arena, 0, 0, 64).unwrap();
    f(root)
}

#[test]
fn simple_raw_data_struct() {
    let data: &[Word] = &[
        word!(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word!(0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef),
    ];

    with_root(&[data], |root| {
        let reader = root.get_struct().unwrap();

        assert_eq!(0xefcdab8967452301u64, reader.get_data_field::<u64>(0));
        assert_eq!(0, reader.get_data_field::<u64>(1)); // past end of struct --> default value

        assert_eq!(0x67452301u32, reader.get_data_field::<u32>(0));
        assert_eq!(0xefcdab89u32, reader.get_data_field::<u32>(1));
        assert_eq!(0, reader.get_data_field::<u32>(2));

        assert_eq!(0x2301u16, reader.get_data_field::<u16>(0));
        assert_eq!(0x6745u16, reader.get_data_field::<u16>(1));
        assert_eq!(0xab89u16, reader.get_data_field::<u16>(2));
        assert_eq!(0xefcdu16, reader.get_data_field::<u16>(3));
        assert_eq!(0u16, reader.get_data_field::<u16>(4));

        assert_eq!(321u32 ^ 0x67452301, reader.get_data_field_mask::<u32>(0, 321));

        // Bits.
        assert!(reader.get_bool_field(0));
        assert!(!reader.get_bool_field(1));
        assert!(!reader.get_bool_field(7));
        assert!(reader.get_bool_field(8));
        assert!(reader.get_bool_field(9));
        assert!(!reader.get_bool_field(10));
        assert!(!reader.get_bool_field(64)); // past end of struct
        assert!(reader.get_bool_field_mask(64, true));

        // No pointer section.
        assert!(reader.get_pointer_field(0).is_null());
    });
}

#[test]
fn empty_struct_is_not_null() {
    let data: &[Word] = &[word!(0xfc, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00)];
    with_root(&[data], |root| {
        assert!(!root.is_null());
        let reader = root.get_struct().unwrap();
        assert_eq!(reader.get_data_section_size(), 0);
        assert_eq!(reader.get_pointer_section_size(), 0);
    });
}

#[test]
fn single_far_pointer() {
    let seg0: &[Word] = &[word!(0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00)];
    let seg1: &[Word] = &[
        word!(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word!(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    with_root(&[seg0, seg1], |root| {
        assert_eq!(root.get_struct().unwrap().get_data_field::<u64>(0), 42);
    });
}

#[test]
fn double_far_pointer() {
    let seg0: &[Word] = &[word!(0x06, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00)];
    let seg1: &[Word] = &[
        word!(0x02, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00),
        word!(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
    ];
    let seg2: &[Word] = &[word!(0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00)];
    with_root(&[seg0, seg1, seg2], |root| {
        assert_eq!(root.get_struct().unwrap().get_data_field::<u64>(0), 7);
    });
}

#[test]
fn far_chain_is_corrupt() {
    let seg0: &[Word] = &[word!(0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00)];
    let seg1: &[Word] = &[word!(0x02, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00)];
    let seg2: &[Word] = &[word!(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00)];
    with_root(&[seg0, seg1, seg2], |root| {
        let err = root.get_struct().err().unwrap();
        assert_eq!(err.kind, ErrorKind::CorruptPointer);
    });
}

#[test]
fn far_to_missing_segment_is_corrupt() {
    let seg0: &[Word] = &[word!(0x02, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00)];
    with_root(&[seg0], |root| {
        assert_eq!(
            root.get_struct().err().unwrap().kind,
            ErrorKind::CorruptPointer
        );
    });
}

#[test]
fn other_pointer_kind_is_corrupt() {
    let data: &[Word] = &[word!(0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00)];
    with_root(&[data], |root| {
        assert_eq!(
            root.get_struct().err().unwrap().kind,
            ErrorKind::CorruptPointer
        );
        assert_eq!(
            root.get_text(None).err().unwrap().kind,
            ErrorKind::CorruptPointer
        );
    });
}

#[test]
fn offset_out_of_bounds_is_corrupt() {
    // Struct of one data word, five words past the end of the segment.
    let data: &[Word] = &[word!(0x14, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00)];
    with_root(&[data], |root| {
        assert_eq!(
            root.get_struct().err().unwrap().kind,
            ErrorKind::CorruptPointer
        );
    });

    // In range, but the struct runs off the end.
    let data: &[Word] = &[word!(0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00)];
    with_root(&[data], |root| {
        assert_eq!(
            root.get_struct().err().unwrap().kind,
            ErrorKind::CorruptPointer
        );
    });
}

#[test]
fn text_and_shape_mismatch() {
    // List of 3 bytes: "ab\0".
    let text: &[Word] = &[
        word!(0x01, 0x00, 0x00, 0x00, 0x1a, 0x00, 0x00, 0x00),
        word!(0x61, 0x62, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    with_root(&[text], |root| {
        assert_eq!(root.get_text(None).unwrap(), "ab");
        assert_eq!(root.get_data(None).unwrap(), b"ab\0");
        assert_eq!(
            root.get_struct().err().unwrap().kind,
            ErrorKind::CorruptPointer
        );
    });

    // Same list without the terminator.
    let unterminated: &[Word] = &[
        word!(0x01, 0x00, 0x00, 0x00, 0x1a, 0x00, 0x00, 0x00),
        word!(0x61, 0x62, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    with_root(&[unterminated], |root| {
        assert_eq!(
            root.get_text(None).err().unwrap().kind,
            ErrorKind::CorruptPointer
        );
    });

    // A struct pointer where a blob is expected.
    let data: &[Word] = &[
        word!(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word!(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    with_root(&[data], |root| {
        assert_eq!(
            root.get_data(None).err().unwrap().kind,
            ErrorKind::CorruptPointer
        );
    });
}

#[test]
fn bit_list() {
    // Ten one-bit elements.
    let data: &[Word] = &[
        word!(0x01, 0x00, 0x00, 0x00, 0x51, 0x00, 0x00, 0x00),
        word!(0x05, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    with_root(&[data], |root| {
        let list = root.get_list(ElementSize::Bit).unwrap();
        assert_eq!(list.len(), 10);
        let bits: Vec<bool> = (0..10).map(|i| list.get_bool_element(i)).collect();
        assert_eq!(
            bits,
            [true, false, true, false, false, false, false, false, false, true]
        );
        assert_eq!(
            root.get_list(ElementSize::Byte).err().unwrap().kind,
            ErrorKind::CorruptPointer
        );
    });
}

#[test]
fn struct_read_through_older_size() {
    // A struct with one pointer, read by a type that expects more.
    let data: &[Word] = &[
        word!(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00),
        word!(0x01, 0x00, 0x00, 0x00, 0x12, 0x00, 0x00, 0x00),
        word!(0x78, 0x79, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];
    with_root(&[data], |root| {
        let reader = root.get_struct().unwrap();
        assert_eq!(reader.get_pointer_field(0).get_data(None).unwrap(), b"xy");
        assert!(reader.get_pointer_field(3).is_null());
        assert!(reader.is_pointer_field_null(3));
        assert!(reader.get_pointer_field(3).get_text(None).unwrap().is_empty());
    });
}

#[test]
fn nesting_limit() {
    // A struct whose only pointer points at itself.
    let data: &[Word] = &[
        word!(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00),
        word!(0xfc, 0xff, 0xff, 0xff, 0x00, 0x00, 0x01, 0x00),
    ];
    let bytes = [Word::words_to_bytes(data)];
    let arena = ReaderArenaImpl::new(&bytes[..], ReaderOptions::new());
    let root = PointerReader::get_root(&arena, 0, 0, 4).unwrap();
    let mut reader = root.get_struct().unwrap();
    let mut depth = 0;
    let err = loop {
        match reader.get_pointer_field(0).get_struct() {
            Ok(next) => {
                reader = next;
                depth += 1;
            }
            Err(e) => break e,
        }
    };
    assert_eq!(err.kind, ErrorKind::NestingLimitExceeded);
    assert_eq!(depth, 3);
}
