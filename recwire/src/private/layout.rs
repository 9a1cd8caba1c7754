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

use byteorder::{ByteOrder, LittleEndian};

use crate::data;
use crate::private::arena::{BuilderArena, NullArena, ReaderArena, SegmentId};
use crate::private::primitive::Primitive;
use crate::private::units::*;
use crate::text;
use crate::{Error, ErrorKind, MessageSize, Result};

pub use self::ElementSize::{
    Bit, Byte, EightBytes, FourBytes, InlineComposite, Pointer, TwoBytes, Void,
};

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ElementSize {
    Void = 0,
    Bit = 1,
    Byte = 2,
    TwoBytes = 3,
    FourBytes = 4,
    EightBytes = 5,
    Pointer = 6,
    InlineComposite = 7,
}

impl ElementSize {
    fn from(val: u8) -> Self {
        match val & 7 {
            0 => Self::Void,
            1 => Self::Bit,
            2 => Self::Byte,
            3 => Self::TwoBytes,
            4 => Self::FourBytes,
            5 => Self::EightBytes,
            6 => Self::Pointer,
            _ => Self::InlineComposite,
        }
    }
}

pub fn data_bits_per_element(size: ElementSize) -> BitCount32 {
    match size {
        Void => 0,
        Bit => 1,
        Byte => 8,
        TwoBytes => 16,
        FourBytes => 32,
        EightBytes => 64,
        Pointer => 0,
        InlineComposite => 0,
    }
}

pub fn pointers_per_element(size: ElementSize) -> WirePointerCount32 {
    match size {
        Pointer => 1,
        _ => 0,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructSize {
    pub data: WordCount16,
    pub pointers: WirePointerCount16,
}

impl StructSize {
    pub fn total(&self) -> WordCount32 {
        u32::from(self.data) + u32::from(self.pointers) * WORDS_PER_POINTER as WordCount32
    }
}

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WirePointerKind {
    Struct = 0,
    List = 1,
    Far = 2,
    Other = 3,
}

impl WirePointerKind {
    fn from(val: u8) -> Self {
        match val & 3 {
            0 => Self::Struct,
            1 => Self::List,
            2 => Self::Far,
            _ => Self::Other,
        }
    }
}

/// One decoded pointer word.
///
/// The lower 32 bits hold the kind and, for positional pointers, a signed
/// word offset from the end of the pointer to its target. The upper 32 bits
/// describe the target's shape, or name the landing pad's segment for far
/// pointers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WirePointer {
    offset_and_kind: u32,
    upper32bits: u32,
}

impl WirePointer {
    pub fn from_word(bytes: &[u8]) -> Self {
        Self {
            offset_and_kind: LittleEndian::read_u32(&bytes[0..4]),
            upper32bits: LittleEndian::read_u32(&bytes[4..8]),
        }
    }

    /// Reads the pointer stored at word `pos` of `segment`.
    #[inline]
    pub fn read(segment: &[u8], pos: WordCount32) -> Self {
        let start = word_to_byte(pos);
        Self::from_word(&segment[start..start + BYTES_PER_WORD])
    }

    #[inline]
    pub fn write(self, segment: &mut [u8], pos: WordCount32) {
        let start = word_to_byte(pos);
        LittleEndian::write_u32(&mut segment[start..start + 4], self.offset_and_kind);
        LittleEndian::write_u32(&mut segment[start + 4..start + 8], self.upper32bits);
    }

    #[inline]
    pub fn kind(&self) -> WirePointerKind {
        WirePointerKind::from(self.offset_and_kind as u8)
    }

    #[inline]
    pub fn is_positional(&self) -> bool {
        (self.offset_and_kind & 2) == 0 // match Struct and List but not Far and Other.
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.offset_and_kind == 0 && self.upper32bits == 0
    }

    /// Word position of the target of a positional pointer stored at `pos`.
    /// May be out of range for corrupt input.
    #[inline]
    pub fn target(&self, pos: WordCount32) -> i64 {
        i64::from(pos) + 1 + i64::from((self.offset_and_kind as i32) >> 2)
    }

    #[inline]
    pub fn set_kind_and_target(
        &mut self,
        kind: WirePointerKind,
        pos: WordCount32,
        target: WordCount32,
    ) {
        let offset = i64::from(target) - (i64::from(pos) + 1);
        self.offset_and_kind = ((offset as i32 as u32) << 2) | (kind as u32);
    }

    #[inline]
    pub fn set_kind_with_zero_offset(&mut self, kind: WirePointerKind) {
        self.offset_and_kind = kind as u32
    }

    #[inline]
    pub fn set_kind_and_target_for_empty_struct(&mut self) {
        // This pointer points at itself, so a zero-sized struct never reads as null.
        self.offset_and_kind = 0xfffffffc;
    }

    #[inline]
    pub fn inline_composite_list_element_count(&self) -> ElementCount32 {
        self.offset_and_kind >> 2
    }

    #[inline]
    pub fn set_kind_and_inline_composite_list_element_count(
        &mut self,
        kind: WirePointerKind,
        element_count: ElementCount32,
    ) {
        self.offset_and_kind = (element_count << 2) | (kind as u32)
    }

    #[inline]
    pub fn far_position_in_segment(&self) -> WordCount32 {
        self.offset_and_kind >> 3
    }

    #[inline]
    pub fn is_double_far(&self) -> bool {
        ((self.offset_and_kind >> 2) & 1) != 0
    }

    #[inline]
    pub fn set_far(&mut self, is_double_far: bool, pos: WordCount32) {
        self.offset_and_kind =
            (pos << 3) | (u32::from(is_double_far) << 2) | WirePointerKind::Far as u32;
    }

    #[inline]
    pub fn far_segment_id(&self) -> SegmentId {
        self.upper32bits
    }

    #[inline]
    pub fn set_far_segment_id(&mut self, id: SegmentId) {
        self.upper32bits = id
    }

    #[inline]
    pub fn struct_data_size(&self) -> WordCount16 {
        self.upper32bits as WordCount16
    }

    #[inline]
    pub fn struct_ptr_count(&self) -> WirePointerCount16 {
        (self.upper32bits >> 16) as WirePointerCount16
    }

    #[inline]
    pub fn struct_word_size(&self) -> WordCount32 {
        u32::from(self.struct_data_size())
            + u32::from(self.struct_ptr_count()) * WORDS_PER_POINTER as u32
    }

    #[inline]
    pub fn set_struct_size(&mut self, size: StructSize) {
        self.upper32bits = u32::from(size.data) | (u32::from(size.pointers) << 16)
    }

    #[inline]
    pub fn list_element_size(&self) -> ElementSize {
        ElementSize::from(self.upper32bits as u8)
    }

    #[inline]
    pub fn list_element_count(&self) -> ElementCount32 {
        self.upper32bits >> 3
    }

    #[inline]
    pub fn list_inline_composite_word_count(&self) -> WordCount32 {
        self.list_element_count()
    }

    /// Fails with `LengthOverflow` if `count` does not fit in 29 bits.
    #[inline]
    pub fn set_list_size_and_count(&mut self, es: ElementSize, count: ElementCount32) -> Result<()> {
        if count > MAX_LIST_ELEMENTS {
            return Err(Error {
                kind: ErrorKind::LengthOverflow,
                extra: format!("list of {count} elements"),
            });
        }
        self.upper32bits = (count << 3) | (es as u32);
        Ok(())
    }

    #[inline]
    pub fn upper32bits(&self) -> u32 {
        self.upper32bits
    }

    #[inline]
    pub fn set_upper32bits(&mut self, value: u32) {
        self.upper32bits = value
    }
}

/// A pointer after following any far indirection: the segment holding the
/// object, the word where the object starts, and the pointer (or tag) that
/// describes its shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target {
    pub segment_id: SegmentId,
    pub tag: WirePointer,
    pub pos: WordCount32,
}

#[inline]
fn round_bits_up_to_words(bits: ElementCount64) -> WordCount32 {
    ((bits + 63) / (BITS_PER_WORD as u64)) as WordCount32
}

#[inline]
fn round_bytes_up_to_words(bytes: ByteCount32) -> WordCount32 {
    ((u64::from(bytes) + 7) / BYTES_PER_WORD as u64) as WordCount32
}

mod wire_helpers {
    use super::*;

    #[inline]
    pub fn read_ptr(arena: &dyn BuilderArena, segment_id: SegmentId, pos: WordCount32) -> WirePointer {
        WirePointer::read(arena.get_segment_ref(segment_id), pos)
    }

    #[inline]
    pub fn write_ptr(
        arena: &mut dyn BuilderArena,
        segment_id: SegmentId,
        pos: WordCount32,
        value: WirePointer,
    ) {
        value.write(arena.get_segment_mut(segment_id), pos)
    }

    #[inline]
    pub fn zero_words(
        arena: &mut dyn BuilderArena,
        segment_id: SegmentId,
        pos: WordCount32,
        count: WordCount32,
    ) {
        let start = word_to_byte(pos);
        let end = word_to_byte(pos + count);
        arena.get_segment_mut(segment_id)[start..end].fill(0);
    }

    pub fn copy_bytes(
        arena: &mut dyn BuilderArena,
        dst_segment_id: SegmentId,
        dst: ByteCount,
        src_segment_id: SegmentId,
        src: ByteCount,
        len: ByteCount,
    ) {
        if dst_segment_id == src_segment_id {
            arena
                .get_segment_mut(dst_segment_id)
                .copy_within(src..src + len, dst);
        } else {
            let tmp = arena.get_segment_ref(src_segment_id)[src..src + len].to_vec();
            arena.get_segment_mut(dst_segment_id)[dst..dst + len].copy_from_slice(&tmp);
        }
    }

    pub fn list_upper(es: ElementSize, count: ElementCount32) -> Result<u32> {
        let mut reff = WirePointer::default();
        reff.set_list_size_and_count(es, count)?;
        Ok(reff.upper32bits())
    }

    pub fn struct_upper(size: StructSize) -> u32 {
        let mut reff = WirePointer::default();
        reff.set_struct_size(size);
        reff.upper32bits()
    }

    /// Checks that a positional pointer at `ref_pos` lands inside its segment.
    fn checked_target(
        arena: &dyn ReaderArena,
        segment_id: SegmentId,
        reff: WirePointer,
        ref_pos: WordCount32,
    ) -> Result<WordCount32> {
        let target = reff.target(ref_pos);
        let len = i64::from(arena.segment_len(segment_id)?);
        if target < 0 || target > len {
            Err(Error::corrupt("pointer offset out of segment bounds"))
        } else {
            Ok(target as WordCount32)
        }
    }

    /// Resolves the pointer `reff`, stored at word `ref_pos` of segment `segment_id`,
    /// to the object it describes.
    pub fn follow_fars(
        arena: &dyn ReaderArena,
        reff: WirePointer,
        ref_pos: WordCount32,
        segment_id: SegmentId,
    ) -> Result<Target> {
        if reff.kind() == WirePointerKind::Other {
            return Err(Error::corrupt("unknown pointer type"));
        }
        if reff.kind() != WirePointerKind::Far {
            let pos = checked_target(arena, segment_id, reff, ref_pos)?;
            return Ok(Target {
                segment_id,
                tag: reff,
                pos,
            });
        }

        let far_segment_id = reff.far_segment_id();
        let pad_pos = reff.far_position_in_segment();
        let pad_words: usize = if reff.is_double_far() { 2 } else { 1 };
        arena.contains_interval(far_segment_id, pad_pos, pad_words)?;
        let segment = arena.get_segment(far_segment_id)?;
        let pad = WirePointer::read(segment, pad_pos);

        if !reff.is_double_far() {
            if !pad.is_positional() {
                return Err(Error::corrupt(
                    "far pointer landing pad is not a struct or list pointer",
                ));
            }
            let pos = checked_target(arena, far_segment_id, pad, pad_pos)?;
            Ok(Target {
                segment_id: far_segment_id,
                tag: pad,
                pos,
            })
        } else {
            // The landing pad is a far pointer to the content, followed by a tag
            // describing it.
            if pad.kind() != WirePointerKind::Far || pad.is_double_far() {
                return Err(Error::corrupt(
                    "double-far landing pad is not a single far pointer",
                ));
            }
            let tag = WirePointer::read(segment, pad_pos + 1);
            if !tag.is_positional() {
                return Err(Error::corrupt("double-far tag is not a struct or list pointer"));
            }
            let content_segment_id = pad.far_segment_id();
            let pos = pad.far_position_in_segment();
            if pos > arena.segment_len(content_segment_id)? {
                return Err(Error::corrupt("pointer offset out of segment bounds"));
            }
            Ok(Target {
                segment_id: content_segment_id,
                tag,
                pos,
            })
        }
    }

    #[inline]
    pub fn follow_builder_fars(
        arena: &dyn BuilderArena,
        reff: WirePointer,
        ref_pos: WordCount32,
        segment_id: SegmentId,
    ) -> Result<Target> {
        follow_fars(arena.as_reader(), reff, ref_pos, segment_id)
    }

    /// Zeroes the object the pointer at `ref_pos` points to, including any
    /// far landing pads, but not the pointer itself.
    pub fn zero_object(arena: &mut dyn BuilderArena, segment_id: SegmentId, ref_pos: WordCount32) {
        let reff = read_ptr(arena, segment_id, ref_pos);
        if reff.is_null() {
            return;
        }
        match reff.kind() {
            WirePointerKind::Struct | WirePointerKind::List => {
                let target = reff.target(ref_pos) as WordCount32;
                zero_object_helper(arena, segment_id, reff, target)
            }
            WirePointerKind::Far => {
                let pad_segment_id = reff.far_segment_id();
                let pad_pos = reff.far_position_in_segment();
                if reff.is_double_far() {
                    let pad = read_ptr(arena, pad_segment_id, pad_pos);
                    let tag = read_ptr(arena, pad_segment_id, pad_pos + 1);
                    zero_object_helper(
                        arena,
                        pad.far_segment_id(),
                        tag,
                        pad.far_position_in_segment(),
                    );
                    zero_words(arena, pad_segment_id, pad_pos, 2);
                } else {
                    zero_object(arena, pad_segment_id, pad_pos);
                    zero_words(arena, pad_segment_id, pad_pos, 1);
                }
            }
            WirePointerKind::Other => {}
        }
    }

    fn zero_object_helper(
        arena: &mut dyn BuilderArena,
        segment_id: SegmentId,
        tag: WirePointer,
        pos: WordCount32,
    ) {
        match tag.kind() {
            WirePointerKind::Struct => {
                let pointers = pos + u32::from(tag.struct_data_size());
                for i in 0..u32::from(tag.struct_ptr_count()) {
                    zero_object(arena, segment_id, pointers + i);
                }
                zero_words(arena, segment_id, pos, tag.struct_word_size());
            }
            WirePointerKind::List => match tag.list_element_size() {
                Void => {}
                Bit | Byte | TwoBytes | FourBytes | EightBytes => {
                    let bits = u64::from(tag.list_element_count())
                        * u64::from(data_bits_per_element(tag.list_element_size()));
                    zero_words(arena, segment_id, pos, round_bits_up_to_words(bits));
                }
                Pointer => {
                    let count = tag.list_element_count();
                    for i in 0..count {
                        zero_object(arena, segment_id, pos + i);
                    }
                    zero_words(arena, segment_id, pos, count);
                }
                InlineComposite => {
                    let element_tag = read_ptr(arena, segment_id, pos);
                    let data_size = u32::from(element_tag.struct_data_size());
                    let pointer_count = u32::from(element_tag.struct_ptr_count());
                    let mut p = pos + POINTER_SIZE_IN_WORDS as u32;
                    for _ in 0..element_tag.inline_composite_list_element_count() {
                        p += data_size;
                        for _ in 0..pointer_count {
                            zero_object(arena, segment_id, p);
                            p += 1;
                        }
                    }
                    zero_words(
                        arena,
                        segment_id,
                        pos,
                        tag.list_inline_composite_word_count() + POINTER_SIZE_IN_WORDS as u32,
                    );
                }
            },
            WirePointerKind::Far | WirePointerKind::Other => {}
        }
    }

    /// Zeroes the pointer at `ref_pos` and any landing pads it uses, leaving
    /// the object itself alone.
    pub fn zero_pointer_and_fars(
        arena: &mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
    ) {
        let reff = read_ptr(arena, segment_id, ref_pos);
        if reff.kind() == WirePointerKind::Far {
            let pad_words = if reff.is_double_far() { 2 } else { 1 };
            zero_words(
                arena,
                reff.far_segment_id(),
                reff.far_position_in_segment(),
                pad_words,
            );
        }
        zero_words(arena, segment_id, ref_pos, 1);
    }

    /// Points the pointer at `ref_pos` to a fresh zeroed region of `amount`
    /// words, first discarding whatever it pointed to. `upper32bits`
    /// describes the new object. Returns where the region starts.
    pub fn allocate(
        arena: &mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        amount: WordCount32,
        kind: WirePointerKind,
        upper32bits: u32,
    ) -> (SegmentId, WordCount32) {
        zero_object(arena, segment_id, ref_pos);

        let mut reff = WirePointer::default();
        reff.set_upper32bits(upper32bits);

        if amount == 0 && kind == WirePointerKind::Struct {
            reff.set_kind_and_target_for_empty_struct();
            write_ptr(arena, segment_id, ref_pos, reff);
            return (segment_id, ref_pos);
        }

        match arena.allocate(segment_id, amount) {
            Some(pos) => {
                reff.set_kind_and_target(kind, ref_pos, pos);
                write_ptr(arena, segment_id, ref_pos, reff);
                (segment_id, pos)
            }
            None => {
                // Need to allocate in a different segment, behind a landing pad.
                let amount_plus_ref = amount + POINTER_SIZE_IN_WORDS as u32;
                let (far_segment_id, pad_pos) = arena.allocate_anywhere(amount_plus_ref);
                log::trace!(
                    "allocated {} words in segment {} behind a far pointer from segment {}",
                    amount,
                    far_segment_id,
                    segment_id
                );
                let mut far = WirePointer::default();
                far.set_far(false, pad_pos);
                far.set_far_segment_id(far_segment_id);
                write_ptr(arena, segment_id, ref_pos, far);

                reff.set_kind_and_target(kind, pad_pos, pad_pos + 1);
                write_ptr(arena, far_segment_id, pad_pos, reff);
                (far_segment_id, pad_pos + 1)
            }
        }
    }

    /// Writes at `dst_pos` a pointer to an object that already exists at
    /// `src_pos` of `src_segment_id`, shaped like `src_tag`. Adds a landing pad
    /// when the object lives in another segment.
    pub fn transfer_pointer_split(
        arena: &mut dyn BuilderArena,
        dst_segment_id: SegmentId,
        dst_pos: WordCount32,
        src_segment_id: SegmentId,
        src_tag: WirePointer,
        src_pos: WordCount32,
    ) {
        let mut dst = WirePointer::default();
        if src_tag.is_null() {
            write_ptr(arena, dst_segment_id, dst_pos, dst);
            return;
        }
        dst.set_upper32bits(src_tag.upper32bits());

        if src_tag.kind() == WirePointerKind::Struct && src_tag.struct_word_size() == 0 {
            dst.set_kind_and_target_for_empty_struct();
            write_ptr(arena, dst_segment_id, dst_pos, dst);
            return;
        }

        if dst_segment_id == src_segment_id {
            dst.set_kind_and_target(src_tag.kind(), dst_pos, src_pos);
            write_ptr(arena, dst_segment_id, dst_pos, dst);
            return;
        }

        // Targets in other segments need a far pointer. Put the landing pad in the
        // object's segment if there is room there.
        let mut far = WirePointer::default();
        match arena.allocate(src_segment_id, 1) {
            Some(pad_pos) => {
                log::trace!(
                    "landing pad at {}:{} for a pointer from segment {}",
                    src_segment_id,
                    pad_pos,
                    dst_segment_id
                );
                dst.set_kind_and_target(src_tag.kind(), pad_pos, src_pos);
                write_ptr(arena, src_segment_id, pad_pos, dst);
                far.set_far(false, pad_pos);
                far.set_far_segment_id(src_segment_id);
            }
            None => {
                let (pad_segment_id, pad_pos) = arena.allocate_anywhere(2);
                log::trace!(
                    "double-far landing pad at {}:{} for an object in segment {}",
                    pad_segment_id,
                    pad_pos,
                    src_segment_id
                );
                let mut pad = WirePointer::default();
                pad.set_far(false, src_pos);
                pad.set_far_segment_id(src_segment_id);
                write_ptr(arena, pad_segment_id, pad_pos, pad);

                dst.set_kind_with_zero_offset(src_tag.kind());
                write_ptr(arena, pad_segment_id, pad_pos + 1, dst);

                far.set_far(true, pad_pos);
                far.set_far_segment_id(pad_segment_id);
            }
        }
        write_ptr(arena, dst_segment_id, dst_pos, far);
    }

    /// Moves the pointer at `src_pos` to `dst_pos`. The source word is left as is.
    pub fn transfer_pointer(
        arena: &mut dyn BuilderArena,
        dst_segment_id: SegmentId,
        dst_pos: WordCount32,
        src_segment_id: SegmentId,
        src_pos: WordCount32,
    ) {
        let src = read_ptr(arena, src_segment_id, src_pos);
        if src.is_null() {
            write_ptr(arena, dst_segment_id, dst_pos, WirePointer::default());
        } else if src.is_positional() {
            let target = src.target(src_pos) as WordCount32;
            transfer_pointer_split(arena, dst_segment_id, dst_pos, src_segment_id, src, target);
        } else {
            // Far pointers are position-independent.
            write_ptr(arena, dst_segment_id, dst_pos, src);
        }
    }

    pub fn init_struct_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        size: StructSize,
    ) -> StructBuilder<'a> {
        let (segment_id, pos) = allocate(
            arena,
            segment_id,
            ref_pos,
            size.total(),
            WirePointerKind::Struct,
            struct_upper(size),
        );
        StructBuilder {
            arena,
            segment_id,
            data: pos,
            data_size: u32::from(size.data) * BITS_PER_WORD as u32,
            pointers: pos + u32::from(size.data),
            pointer_count: size.pointers,
        }
    }

    pub fn get_writable_struct_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        size: StructSize,
    ) -> Result<StructBuilder<'a>> {
        let reff = read_ptr(arena, segment_id, ref_pos);
        if reff.is_null() {
            return Ok(init_struct_pointer(arena, segment_id, ref_pos, size));
        }
        let old = follow_builder_fars(arena, reff, ref_pos, segment_id)?;
        if old.tag.kind() != WirePointerKind::Struct {
            return Err(Error::corrupt(
                "called get_writable_struct_pointer() but existing pointer is not a struct",
            ));
        }

        let old_data_size = old.tag.struct_data_size();
        let old_pointer_count = old.tag.struct_ptr_count();

        if old_data_size >= size.data && old_pointer_count >= size.pointers {
            return Ok(StructBuilder {
                arena,
                segment_id: old.segment_id,
                data: old.pos,
                data_size: u32::from(old_data_size) * BITS_PER_WORD as u32,
                pointers: old.pos + u32::from(old_data_size),
                pointer_count: old_pointer_count,
            });
        }

        // The space allocated for this struct is too small. Unlike with readers, we
        // can't just run with it and do bounds checks at access time, because how
        // would we handle writes? Instead, we have to copy the struct to a new space
        // now.
        let new_size = StructSize {
            data: core::cmp::max(old_data_size, size.data),
            pointers: core::cmp::max(old_pointer_count, size.pointers),
        };
        log::debug!(
            "upgrading struct from {}+{} to {}+{} words",
            old_data_size,
            old_pointer_count,
            new_size.data,
            new_size.pointers
        );

        // Don't let allocate() zero out the object just yet.
        zero_pointer_and_fars(arena, segment_id, ref_pos);

        let (new_segment_id, new_pos) = allocate(
            arena,
            segment_id,
            ref_pos,
            new_size.total(),
            WirePointerKind::Struct,
            struct_upper(new_size),
        );

        copy_bytes(
            arena,
            new_segment_id,
            word_to_byte(new_pos),
            old.segment_id,
            word_to_byte(old.pos),
            usize::from(old_data_size) * BYTES_PER_WORD,
        );

        let old_pointers = old.pos + u32::from(old_data_size);
        let new_pointers = new_pos + u32::from(new_size.data);
        for i in 0..u32::from(old_pointer_count) {
            transfer_pointer(
                arena,
                new_segment_id,
                new_pointers + i,
                old.segment_id,
                old_pointers + i,
            );
        }

        zero_words(arena, old.segment_id, old.pos, old.tag.struct_word_size());

        Ok(StructBuilder {
            arena,
            segment_id: new_segment_id,
            data: new_pos,
            data_size: u32::from(new_size.data) * BITS_PER_WORD as u32,
            pointers: new_pointers,
            pointer_count: new_size.pointers,
        })
    }

    pub fn init_list_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        element_count: ElementCount32,
        element_size: ElementSize,
    ) -> Result<ListBuilder<'a>> {
        assert!(
            element_size != InlineComposite,
            "Should have called init_struct_list_pointer() instead"
        );

        let data_size = data_bits_per_element(element_size);
        let pointer_count = pointers_per_element(element_size);
        let step = data_size + pointer_count * BITS_PER_POINTER as u32;
        let upper = list_upper(element_size, element_count)?;
        let word_count = round_bits_up_to_words(u64::from(element_count) * u64::from(step));
        let (segment_id, pos) = allocate(
            arena,
            segment_id,
            ref_pos,
            word_count,
            WirePointerKind::List,
            upper,
        );

        Ok(ListBuilder {
            arena,
            segment_id,
            ptr: pos,
            step,
            element_count,
            element_size,
            struct_data_size: data_size,
            struct_pointer_count: pointer_count as u16,
        })
    }

    pub fn init_struct_list_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        element_count: ElementCount32,
        element_size: StructSize,
    ) -> Result<ListBuilder<'a>> {
        let words_per_element = element_size.total();
        let word_count = u64::from(element_count) * u64::from(words_per_element);
        if element_count > MAX_LIST_ELEMENTS || word_count > u64::from(MAX_LIST_ELEMENTS) {
            return Err(Error {
                kind: ErrorKind::LengthOverflow,
                extra: format!("struct list of {element_count} elements"),
            });
        }
        let word_count = word_count as WordCount32;
        let upper = list_upper(InlineComposite, word_count)?;

        let (segment_id, pos) = allocate(
            arena,
            segment_id,
            ref_pos,
            word_count + POINTER_SIZE_IN_WORDS as u32,
            WirePointerKind::List,
            upper,
        );

        let mut tag = WirePointer::default();
        tag.set_kind_and_inline_composite_list_element_count(
            WirePointerKind::Struct,
            element_count,
        );
        tag.set_struct_size(element_size);
        write_ptr(arena, segment_id, pos, tag);

        Ok(ListBuilder {
            arena,
            segment_id,
            ptr: pos + POINTER_SIZE_IN_WORDS as u32,
            step: words_per_element * BITS_PER_WORD as u32,
            element_count,
            element_size: InlineComposite,
            struct_data_size: u32::from(element_size.data) * BITS_PER_WORD as u32,
            struct_pointer_count: element_size.pointers,
        })
    }

    /// Checks that a list whose elements hold `data_size` bits and
    /// `pointer_count` pointers can be viewed as a list of `expected`.
    fn check_list_shape(
        actual: ElementSize,
        data_size: BitCount32,
        pointer_count: WirePointerCount32,
        expected: ElementSize,
    ) -> Result<()> {
        match expected {
            Void => Ok(()),
            Bit => {
                if actual == Bit {
                    Ok(())
                } else {
                    Err(Error::corrupt(
                        "expected a bit list, but got a list of another type",
                    ))
                }
            }
            InlineComposite => {
                if actual == Bit {
                    Err(Error::corrupt(
                        "found bit list where struct list was expected",
                    ))
                } else {
                    Ok(())
                }
            }
            _ => {
                if actual == Bit {
                    return Err(Error::corrupt(
                        "found bit list where a different list type was expected",
                    ));
                }
                if data_bits_per_element(expected) > data_size {
                    return Err(Error::corrupt(
                        "list elements have a smaller data section than expected",
                    ));
                }
                if pointers_per_element(expected) > pointer_count {
                    return Err(Error::corrupt(
                        "list elements have a smaller pointer section than expected",
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn get_writable_list_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        element_size: ElementSize,
    ) -> Result<ListBuilder<'a>> {
        assert!(
            element_size != InlineComposite,
            "Use get_writable_struct_list_pointer() for struct lists"
        );

        let reff = read_ptr(arena, segment_id, ref_pos);
        if reff.is_null() {
            return Ok(ListBuilder::new_default(arena));
        }
        let target = follow_builder_fars(arena, reff, ref_pos, segment_id)?;
        if target.tag.kind() != WirePointerKind::List {
            return Err(Error::corrupt(
                "called get_writable_list_pointer() but existing pointer is not a list",
            ));
        }

        let old_size = target.tag.list_element_size();
        if old_size == InlineComposite {
            let tag = read_ptr(arena, target.segment_id, target.pos);
            let data_size = u32::from(tag.struct_data_size()) * BITS_PER_WORD as u32;
            let pointer_count = tag.struct_ptr_count();
            check_list_shape(old_size, data_size, u32::from(pointer_count), element_size)?;
            Ok(ListBuilder {
                arena,
                segment_id: target.segment_id,
                ptr: target.pos + POINTER_SIZE_IN_WORDS as u32,
                step: tag.struct_word_size() * BITS_PER_WORD as u32,
                element_count: tag.inline_composite_list_element_count(),
                element_size: old_size,
                struct_data_size: data_size,
                struct_pointer_count: pointer_count,
            })
        } else {
            let data_size = data_bits_per_element(old_size);
            let pointer_count = pointers_per_element(old_size);
            check_list_shape(old_size, data_size, pointer_count, element_size)?;
            Ok(ListBuilder {
                arena,
                segment_id: target.segment_id,
                ptr: target.pos,
                step: data_size + pointer_count * BITS_PER_POINTER as u32,
                element_count: target.tag.list_element_count(),
                element_size: old_size,
                struct_data_size: data_size,
                struct_pointer_count: pointer_count as u16,
            })
        }
    }

    pub fn get_writable_struct_list_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        element_size: StructSize,
    ) -> Result<ListBuilder<'a>> {
        let reff = read_ptr(arena, segment_id, ref_pos);
        if reff.is_null() {
            return Ok(ListBuilder::new_default(arena));
        }
        let target = follow_builder_fars(arena, reff, ref_pos, segment_id)?;
        if target.tag.kind() != WirePointerKind::List {
            return Err(Error::corrupt(
                "called get_writable_struct_list_pointer() but existing pointer is not a list",
            ));
        }
        if target.tag.list_element_size() != InlineComposite {
            return Err(Error::corrupt(
                "existing list is not a list of structs",
            ));
        }

        let old_tag = read_ptr(arena, target.segment_id, target.pos);
        let old_data_size = old_tag.struct_data_size();
        let old_pointer_count = old_tag.struct_ptr_count();
        let old_step = old_tag.struct_word_size();
        let element_count = old_tag.inline_composite_list_element_count();

        if old_data_size >= element_size.data && old_pointer_count >= element_size.pointers {
            return Ok(ListBuilder {
                arena,
                segment_id: target.segment_id,
                ptr: target.pos + POINTER_SIZE_IN_WORDS as u32,
                step: old_step * BITS_PER_WORD as u32,
                element_count,
                element_size: InlineComposite,
                struct_data_size: u32::from(old_data_size) * BITS_PER_WORD as u32,
                struct_pointer_count: old_pointer_count,
            });
        }

        // The elements are too small for the requested type; move the whole
        // list to a region with larger elements.
        let new_size = StructSize {
            data: core::cmp::max(old_data_size, element_size.data),
            pointers: core::cmp::max(old_pointer_count, element_size.pointers),
        };
        log::debug!(
            "upgrading struct list of {} elements from {}+{} to {}+{} words",
            element_count,
            old_data_size,
            old_pointer_count,
            new_size.data,
            new_size.pointers
        );

        zero_pointer_and_fars(arena, segment_id, ref_pos);
        let new_segment_id;
        let new_ptr;
        {
            let builder =
                init_struct_list_pointer(&mut *arena, segment_id, ref_pos, element_count, new_size)?;
            new_segment_id = builder.segment_id;
            new_ptr = builder.ptr;
        }

        let new_step = new_size.total();
        let mut src = target.pos + POINTER_SIZE_IN_WORDS as u32;
        let mut dst = new_ptr;
        for _ in 0..element_count {
            copy_bytes(
                arena,
                new_segment_id,
                word_to_byte(dst),
                target.segment_id,
                word_to_byte(src),
                usize::from(old_data_size) * BYTES_PER_WORD,
            );
            let src_pointers = src + u32::from(old_data_size);
            let dst_pointers = dst + u32::from(new_size.data);
            for j in 0..u32::from(old_pointer_count) {
                transfer_pointer(
                    arena,
                    new_segment_id,
                    dst_pointers + j,
                    target.segment_id,
                    src_pointers + j,
                );
            }
            src += old_step;
            dst += new_step;
        }

        zero_words(
            arena,
            target.segment_id,
            target.pos,
            target.tag.list_inline_composite_word_count() + POINTER_SIZE_IN_WORDS as u32,
        );

        Ok(ListBuilder {
            arena,
            segment_id: new_segment_id,
            ptr: new_ptr,
            step: new_step * BITS_PER_WORD as u32,
            element_count,
            element_size: InlineComposite,
            struct_data_size: u32::from(new_size.data) * BITS_PER_WORD as u32,
            struct_pointer_count: new_size.pointers,
        })
    }

    /// Allocates a byte list of `byte_size` bytes and returns its bytes.
    fn init_byte_list<'a>(
        arena: &'a mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        byte_size: ByteCount32,
    ) -> Result<&'a mut [u8]> {
        let upper = list_upper(Byte, byte_size)?;
        let (segment_id, pos) = allocate(
            arena,
            segment_id,
            ref_pos,
            round_bytes_up_to_words(byte_size),
            WirePointerKind::List,
            upper,
        );
        let start = word_to_byte(pos);
        Ok(&mut arena.get_segment_mut(segment_id)[start..start + byte_size as usize])
    }

    /// Returns the text bytes, not including the NUL terminator.
    pub fn init_text_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        size: ByteCount32,
    ) -> Result<&'a mut [u8]> {
        // The byte list must include a NUL terminator.
        let byte_size = match size.checked_add(1) {
            Some(n) => n,
            None => return Err(Error::from_kind(ErrorKind::LengthOverflow)),
        };
        let bytes = init_byte_list(arena, segment_id, ref_pos, byte_size)?;
        Ok(&mut bytes[..size as usize])
    }

    pub fn set_text_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        value: &[u8],
    ) -> Result<()> {
        let size = blob_len(value)?;
        let bytes = init_text_pointer(arena, segment_id, ref_pos, size)?;
        bytes.copy_from_slice(value);
        Ok(())
    }

    pub fn init_data_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        size: ByteCount32,
    ) -> Result<&'a mut [u8]> {
        init_byte_list(arena, segment_id, ref_pos, size)
    }

    pub fn set_data_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        value: &[u8],
    ) -> Result<()> {
        let size = blob_len(value)?;
        let bytes = init_data_pointer(arena, segment_id, ref_pos, size)?;
        bytes.copy_from_slice(value);
        Ok(())
    }

    pub fn blob_len(value: &[u8]) -> Result<ByteCount32> {
        if value.len() > MAX_LIST_ELEMENTS as usize {
            Err(Error {
                kind: ErrorKind::LengthOverflow,
                extra: format!("blob of {} bytes", value.len()),
            })
        } else {
            Ok(value.len() as ByteCount32)
        }
    }

    /// Returns the target of an existing byte list, checking its shape.
    fn writable_byte_list(
        arena: &dyn BuilderArena,
        reff: WirePointer,
        segment_id: SegmentId,
        ref_pos: WordCount32,
    ) -> Result<Target> {
        let target = follow_builder_fars(arena, reff, ref_pos, segment_id)?;
        if target.tag.kind() != WirePointerKind::List || target.tag.list_element_size() != Byte {
            return Err(Error::corrupt(
                "existing pointer is not a byte list",
            ));
        }
        Ok(target)
    }

    pub fn get_writable_text_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        default: Option<&[u8]>,
    ) -> Result<text::Builder<'a>> {
        let reff = read_ptr(arena, segment_id, ref_pos);
        if reff.is_null() {
            return match default {
                None => Ok(text::Builder::new(&mut [])),
                Some(d) => {
                    let bytes = init_text_pointer(arena, segment_id, ref_pos, blob_len(d)?)?;
                    bytes.copy_from_slice(d);
                    Ok(text::Builder::with_pos(bytes, d.len()))
                }
            };
        }
        let target = writable_byte_list(arena, reff, segment_id, ref_pos)?;
        let count = target.tag.list_element_count() as usize;
        let start = word_to_byte(target.pos);
        let bytes = &mut arena.get_segment_mut(target.segment_id)[start..start + count];
        match bytes.split_last_mut() {
            Some((0, chars)) => {
                let len = chars.len();
                Ok(text::Builder::with_pos(chars, len))
            }
            _ => Err(Error::corrupt("text is missing its NUL terminator")),
        }
    }

    pub fn get_writable_data_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        default: Option<&[u8]>,
    ) -> Result<data::Builder<'a>> {
        let reff = read_ptr(arena, segment_id, ref_pos);
        if reff.is_null() {
            return match default {
                None => Ok(&mut []),
                Some(d) => {
                    let bytes = init_data_pointer(arena, segment_id, ref_pos, blob_len(d)?)?;
                    bytes.copy_from_slice(d);
                    Ok(bytes)
                }
            };
        }
        let target = writable_byte_list(arena, reff, segment_id, ref_pos)?;
        let count = target.tag.list_element_count() as usize;
        let start = word_to_byte(target.pos);
        Ok(&mut arena.get_segment_mut(target.segment_id)[start..start + count])
    }

    pub fn read_struct_pointer<'a>(
        arena: &'a dyn ReaderArena,
        target: Target,
        nesting_limit: i32,
    ) -> Result<StructReader<'a>> {
        if nesting_limit <= 0 {
            return Err(Error::from_kind(ErrorKind::NestingLimitExceeded));
        }
        if target.tag.kind() != WirePointerKind::Struct {
            return Err(Error::corrupt("expected a struct pointer"));
        }

        let data_size = u32::from(target.tag.struct_data_size());
        let pointer_count = target.tag.struct_ptr_count();
        arena.contains_interval(
            target.segment_id,
            target.pos,
            (data_size + u32::from(pointer_count)) as usize,
        )?;
        let segment = arena.get_segment(target.segment_id)?;
        let start = word_to_byte(target.pos);

        Ok(StructReader {
            arena,
            segment,
            segment_id: target.segment_id,
            data: &segment[start..start + data_size as usize * BYTES_PER_WORD],
            pointers: target.pos + data_size,
            pointer_count,
            nesting_limit: nesting_limit - 1,
        })
    }

    pub fn read_list_pointer<'a>(
        arena: &'a dyn ReaderArena,
        target: Target,
        expected_element_size: ElementSize,
        nesting_limit: i32,
    ) -> Result<ListReader<'a>> {
        if nesting_limit <= 0 {
            return Err(Error::from_kind(ErrorKind::NestingLimitExceeded));
        }
        if target.tag.kind() != WirePointerKind::List {
            return Err(Error::corrupt("expected a list pointer"));
        }

        let element_size = target.tag.list_element_size();
        if element_size == InlineComposite {
            let word_count = target.tag.list_inline_composite_word_count();
            arena.contains_interval(
                target.segment_id,
                target.pos,
                word_count as usize + POINTER_SIZE_IN_WORDS,
            )?;
            let segment = arena.get_segment(target.segment_id)?;
            let tag = WirePointer::read(segment, target.pos);
            if tag.kind() != WirePointerKind::Struct {
                return Err(Error::corrupt(
                    "inline composite lists of non-struct type are not supported",
                ));
            }

            let element_count = tag.inline_composite_list_element_count();
            let words_per_element = tag.struct_word_size();
            if u64::from(element_count) * u64::from(words_per_element) > u64::from(word_count) {
                return Err(Error::corrupt(
                    "inline composite list's elements overrun its word count",
                ));
            }
            if words_per_element == 0 {
                // Zero-sized elements cost no words; charge them against the
                // traversal limit anyway.
                arena.amplified_read(u64::from(element_count))?;
            }

            let data_size = u32::from(tag.struct_data_size()) * BITS_PER_WORD as u32;
            let pointer_count = tag.struct_ptr_count();
            check_list_shape(
                element_size,
                data_size,
                u32::from(pointer_count),
                expected_element_size,
            )?;

            Ok(ListReader {
                arena,
                segment,
                segment_id: target.segment_id,
                ptr: target.pos + POINTER_SIZE_IN_WORDS as u32,
                element_count,
                element_size,
                step: words_per_element * BITS_PER_WORD as u32,
                struct_data_size: data_size,
                struct_pointer_count: pointer_count,
                nesting_limit: nesting_limit - 1,
            })
        } else {
            let data_size = data_bits_per_element(element_size);
            let pointer_count = pointers_per_element(element_size);
            let element_count = target.tag.list_element_count();
            let step = data_size + pointer_count * BITS_PER_POINTER as u32;
            let word_count = round_bits_up_to_words(u64::from(element_count) * u64::from(step));
            arena.contains_interval(target.segment_id, target.pos, word_count as usize)?;
            if element_size == Void {
                arena.amplified_read(u64::from(element_count))?;
            }
            check_list_shape(element_size, data_size, pointer_count, expected_element_size)?;

            Ok(ListReader {
                arena,
                segment: arena.get_segment(target.segment_id)?,
                segment_id: target.segment_id,
                ptr: target.pos,
                element_count,
                element_size,
                step,
                struct_data_size: data_size,
                struct_pointer_count: pointer_count as u16,
                nesting_limit: nesting_limit - 1,
            })
        }
    }

    /// Returns the bytes of a byte list, checking its shape.
    fn read_byte_list<'a>(arena: &'a dyn ReaderArena, target: Target) -> Result<&'a [u8]> {
        if target.tag.kind() != WirePointerKind::List {
            return Err(Error::corrupt(
                "expected a blob, but got a struct pointer",
            ));
        }
        if target.tag.list_element_size() != Byte {
            return Err(Error::corrupt(
                "expected a blob, but got a list of non-byte elements",
            ));
        }
        let size = target.tag.list_element_count();
        arena.contains_interval(
            target.segment_id,
            target.pos,
            round_bytes_up_to_words(size) as usize,
        )?;
        let segment = arena.get_segment(target.segment_id)?;
        let start = word_to_byte(target.pos);
        Ok(&segment[start..start + size as usize])
    }

    pub fn read_text_pointer<'a>(
        arena: &'a dyn ReaderArena,
        target: Target,
    ) -> Result<text::Reader<'a>> {
        match read_byte_list(arena, target)?.split_last() {
            Some((0, chars)) => Ok(text::Reader::new(chars)),
            _ => Err(Error::corrupt("text is missing its NUL terminator")),
        }
    }

    pub fn read_data_pointer<'a>(
        arena: &'a dyn ReaderArena,
        target: Target,
    ) -> Result<data::Reader<'a>> {
        read_byte_list(arena, target)
    }

    pub fn set_struct_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        value: &StructReader,
    ) -> Result<()> {
        let data_words = round_bytes_up_to_words(value.data.len() as ByteCount32);
        let size = StructSize {
            data: data_words as WordCount16,
            pointers: value.pointer_count,
        };
        let (segment_id, pos) = allocate(
            arena,
            segment_id,
            ref_pos,
            size.total(),
            WirePointerKind::Struct,
            struct_upper(size),
        );
        copy_struct_content(arena, segment_id, pos, data_words, value)
    }

    /// Copies the data and pointers of `value` into the zeroed struct at `pos`,
    /// which has at least as many data words and pointers.
    fn copy_struct_content(
        arena: &mut dyn BuilderArena,
        segment_id: SegmentId,
        pos: WordCount32,
        data_words: WordCount32,
        value: &StructReader,
    ) -> Result<()> {
        let start = word_to_byte(pos);
        arena.get_segment_mut(segment_id)[start..start + value.data.len()]
            .copy_from_slice(value.data);
        for i in 0..value.pointer_count {
            copy_pointer(
                arena,
                segment_id,
                pos + data_words + u32::from(i),
                &value.get_pointer_field(usize::from(i)),
            )?;
        }
        Ok(())
    }

    pub fn set_list_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        value: &ListReader,
    ) -> Result<()> {
        let count = value.element_count;
        match value.element_size {
            InlineComposite => {
                let size = StructSize {
                    data: (value.struct_data_size / BITS_PER_WORD as u32) as WordCount16,
                    pointers: value.struct_pointer_count,
                };
                let builder =
                    init_struct_list_pointer(&mut *arena, segment_id, ref_pos, count, size)?;
                let (list_segment_id, ptr) = (builder.segment_id, builder.ptr);
                let step = size.total();
                for i in 0..count {
                    copy_struct_content(
                        arena,
                        list_segment_id,
                        ptr + i * step,
                        u32::from(size.data),
                        &value.get_struct_element(i),
                    )?;
                }
            }
            Pointer => {
                let builder = init_list_pointer(&mut *arena, segment_id, ref_pos, count, Pointer)?;
                let (list_segment_id, ptr) = (builder.segment_id, builder.ptr);
                for i in 0..count {
                    copy_pointer(arena, list_segment_id, ptr + i, &value.get_pointer_element(i))?;
                }
            }
            element_size => {
                let builder =
                    init_list_pointer(&mut *arena, segment_id, ref_pos, count, element_size)?;
                let (list_segment_id, ptr) = (builder.segment_id, builder.ptr);
                let byte_len = ((u64::from(count) * u64::from(value.step) + 7) / 8) as usize;
                let src = word_to_byte(value.ptr);
                let dst = word_to_byte(ptr);
                arena.get_segment_mut(list_segment_id)[dst..dst + byte_len]
                    .copy_from_slice(&value.segment[src..src + byte_len]);
            }
        }
        Ok(())
    }

    /// Deep-copies whatever `src` points to into the pointer at `ref_pos`.
    pub fn copy_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: SegmentId,
        ref_pos: WordCount32,
        src: &PointerReader,
    ) -> Result<()> {
        let target = match src.resolve()? {
            None => {
                zero_object(arena, segment_id, ref_pos);
                write_ptr(arena, segment_id, ref_pos, WirePointer::default());
                return Ok(());
            }
            Some(target) => target,
        };
        match target.tag.kind() {
            WirePointerKind::Struct => {
                let value = read_struct_pointer(src.arena, target, src.nesting_limit)?;
                set_struct_pointer(arena, segment_id, ref_pos, &value)
            }
            WirePointerKind::List => {
                let value = read_list_pointer(src.arena, target, Void, src.nesting_limit)?;
                set_list_pointer(arena, segment_id, ref_pos, &value)
            }
            WirePointerKind::Far | WirePointerKind::Other => {
                Err(Error::corrupt("unknown pointer type"))
            }
        }
    }
}

static NULL_ARENA: NullArena = NullArena;

#[derive(Clone, Copy, Debug)]
enum Location {
    Null,
    /// A pointer word at this position of the segment.
    Word(WordCount32),
    /// An object with no pointer to it, as held by an orphan.
    Detached(WirePointer, WordCount32),
}

#[derive(Clone, Copy)]
pub struct PointerReader<'a> {
    arena: &'a dyn ReaderArena,
    segment: &'a [u8],
    segment_id: SegmentId,
    location: Location,
    nesting_limit: i32,
}

impl<'a> PointerReader<'a> {
    pub fn new_default<'b>() -> PointerReader<'b> {
        PointerReader {
            arena: &NULL_ARENA,
            segment: &[],
            segment_id: 0,
            location: Location::Null,
            nesting_limit: 0x7fffffff,
        }
    }

    pub fn get_root(
        arena: &'a dyn ReaderArena,
        segment_id: SegmentId,
        location: WordCount32,
        nesting_limit: i32,
    ) -> Result<Self> {
        arena.contains_interval(segment_id, location, POINTER_SIZE_IN_WORDS)?;
        Ok(PointerReader {
            arena,
            segment: arena.get_segment(segment_id)?,
            segment_id,
            location: Location::Word(location),
            nesting_limit,
        })
    }

    fn detached(
        arena: &'a dyn ReaderArena,
        segment_id: SegmentId,
        tag: WirePointer,
        pos: WordCount32,
    ) -> Result<Self> {
        Ok(PointerReader {
            arena,
            segment: arena.get_segment(segment_id)?,
            segment_id,
            location: Location::Detached(tag, pos),
            nesting_limit: arena.nesting_limit(),
        })
    }

    fn resolve(&self) -> Result<Option<Target>> {
        match self.location {
            Location::Null => Ok(None),
            Location::Word(pos) => {
                let reff = WirePointer::read(self.segment, pos);
                if reff.is_null() {
                    Ok(None)
                } else {
                    wire_helpers::follow_fars(self.arena, reff, pos, self.segment_id).map(Some)
                }
            }
            Location::Detached(tag, pos) => {
                if tag.is_null() {
                    Ok(None)
                } else {
                    Ok(Some(Target {
                        segment_id: self.segment_id,
                        tag,
                        pos,
                    }))
                }
            }
        }
    }

    pub fn is_null(&self) -> bool {
        match self.location {
            Location::Null => true,
            Location::Word(pos) => WirePointer::read(self.segment, pos).is_null(),
            Location::Detached(tag, _) => tag.is_null(),
        }
    }

    pub fn total_size(&self) -> Result<MessageSize> {
        let target = match self.resolve()? {
            None => return Ok(MessageSize { word_count: 0 }),
            Some(target) => target,
        };
        match target.tag.kind() {
            WirePointerKind::Struct => {
                wire_helpers::read_struct_pointer(self.arena, target, self.nesting_limit)?
                    .total_size()
            }
            WirePointerKind::List => {
                wire_helpers::read_list_pointer(self.arena, target, Void, self.nesting_limit)?
                    .total_size()
            }
            WirePointerKind::Far | WirePointerKind::Other => {
                Err(Error::corrupt("unknown pointer type"))
            }
        }
    }

    pub fn get_struct(&self) -> Result<StructReader<'a>> {
        match self.resolve()? {
            None => Ok(StructReader::new_default()),
            Some(target) => {
                wire_helpers::read_struct_pointer(self.arena, target, self.nesting_limit)
            }
        }
    }

    pub fn get_list(&self, expected_element_size: ElementSize) -> Result<ListReader<'a>> {
        match self.resolve()? {
            None => Ok(ListReader::new_default()),
            Some(target) => wire_helpers::read_list_pointer(
                self.arena,
                target,
                expected_element_size,
                self.nesting_limit,
            ),
        }
    }

    pub fn get_text(&self, default: Option<&'a [u8]>) -> Result<text::Reader<'a>> {
        match self.resolve()? {
            None => Ok(text::Reader::new(default.unwrap_or(&[]))),
            Some(target) => wire_helpers::read_text_pointer(self.arena, target),
        }
    }

    pub fn get_data(&self, default: Option<&'a [u8]>) -> Result<data::Reader<'a>> {
        match self.resolve()? {
            None => Ok(default.unwrap_or(&[])),
            Some(target) => wire_helpers::read_data_pointer(self.arena, target),
        }
    }
}

pub struct PointerBuilder<'a> {
    arena: &'a mut dyn BuilderArena,
    segment_id: SegmentId,
    pos: WordCount32,
}

impl<'a> PointerBuilder<'a> {
    #[inline]
    pub fn get_root(arena: &'a mut dyn BuilderArena, segment_id: SegmentId, pos: WordCount32) -> Self {
        PointerBuilder {
            arena,
            segment_id,
            pos,
        }
    }

    #[inline]
    pub fn reborrow(&mut self) -> PointerBuilder<'_> {
        PointerBuilder {
            arena: self.arena,
            ..*self
        }
    }

    pub fn is_null(&self) -> bool {
        wire_helpers::read_ptr(self.arena, self.segment_id, self.pos).is_null()
    }

    pub fn as_reader(&self) -> PointerReader<'_> {
        PointerReader {
            arena: self.arena.as_reader(),
            segment: self.arena.get_segment_ref(self.segment_id),
            segment_id: self.segment_id,
            location: Location::Word(self.pos),
            nesting_limit: 0x7fffffff,
        }
    }

    pub fn into_reader(self) -> PointerReader<'a> {
        let arena: &'a dyn BuilderArena = self.arena;
        PointerReader {
            arena: arena.as_reader(),
            segment: arena.get_segment_ref(self.segment_id),
            segment_id: self.segment_id,
            location: Location::Word(self.pos),
            nesting_limit: 0x7fffffff,
        }
    }

    pub fn get_struct(self, size: StructSize) -> Result<StructBuilder<'a>> {
        wire_helpers::get_writable_struct_pointer(self.arena, self.segment_id, self.pos, size)
    }

    pub fn init_struct(self, size: StructSize) -> StructBuilder<'a> {
        wire_helpers::init_struct_pointer(self.arena, self.segment_id, self.pos, size)
    }

    pub fn get_list(self, element_size: ElementSize) -> Result<ListBuilder<'a>> {
        wire_helpers::get_writable_list_pointer(self.arena, self.segment_id, self.pos, element_size)
    }

    pub fn get_struct_list(self, element_size: StructSize) -> Result<ListBuilder<'a>> {
        wire_helpers::get_writable_struct_list_pointer(
            self.arena,
            self.segment_id,
            self.pos,
            element_size,
        )
    }

    pub fn init_list(
        self,
        element_size: ElementSize,
        element_count: ElementCount32,
    ) -> Result<ListBuilder<'a>> {
        wire_helpers::init_list_pointer(
            self.arena,
            self.segment_id,
            self.pos,
            element_count,
            element_size,
        )
    }

    pub fn init_struct_list(
        self,
        element_count: ElementCount32,
        element_size: StructSize,
    ) -> Result<ListBuilder<'a>> {
        wire_helpers::init_struct_list_pointer(
            self.arena,
            self.segment_id,
            self.pos,
            element_count,
            element_size,
        )
    }

    pub fn get_text(self, default: Option<&[u8]>) -> Result<text::Builder<'a>> {
        wire_helpers::get_writable_text_pointer(self.arena, self.segment_id, self.pos, default)
    }

    pub fn init_text(self, size: ByteCount32) -> Result<text::Builder<'a>> {
        let bytes = wire_helpers::init_text_pointer(self.arena, self.segment_id, self.pos, size)?;
        Ok(text::Builder::new(bytes))
    }

    pub fn set_text(&mut self, value: text::Reader<'_>) -> Result<()> {
        wire_helpers::set_text_pointer(self.arena, self.segment_id, self.pos, value.as_bytes())
    }

    pub fn get_data(self, default: Option<&[u8]>) -> Result<data::Builder<'a>> {
        wire_helpers::get_writable_data_pointer(self.arena, self.segment_id, self.pos, default)
    }

    pub fn init_data(self, size: ByteCount32) -> Result<data::Builder<'a>> {
        wire_helpers::init_data_pointer(self.arena, self.segment_id, self.pos, size)
    }

    pub fn set_data(&mut self, value: &[u8]) -> Result<()> {
        wire_helpers::set_data_pointer(self.arena, self.segment_id, self.pos, value)
    }

    pub fn set_struct(&mut self, value: &StructReader) -> Result<()> {
        wire_helpers::set_struct_pointer(self.arena, self.segment_id, self.pos, value)
    }

    pub fn set_list(&mut self, value: &ListReader) -> Result<()> {
        wire_helpers::set_list_pointer(self.arena, self.segment_id, self.pos, value)
    }

    pub fn copy_from(&mut self, other: PointerReader) -> Result<()> {
        wire_helpers::copy_pointer(self.arena, self.segment_id, self.pos, &other)
    }

    /// Sets the pointer to null, zeroing what it pointed to.
    pub fn clear(&mut self) {
        wire_helpers::zero_object(self.arena, self.segment_id, self.pos);
        wire_helpers::zero_words(self.arena, self.segment_id, self.pos, 1);
    }

    /// Detaches the object from this pointer, which becomes null. The object
    /// stays where it is.
    pub fn disown(&mut self) -> Result<OrphanBuilder> {
        let message_id = self.arena.message_id();
        let reff = wire_helpers::read_ptr(self.arena, self.segment_id, self.pos);
        if reff.is_null() {
            return Ok(OrphanBuilder::null(message_id));
        }
        let target =
            wire_helpers::follow_builder_fars(self.arena, reff, self.pos, self.segment_id)?;
        wire_helpers::zero_pointer_and_fars(self.arena, self.segment_id, self.pos);
        Ok(OrphanBuilder {
            segment_id: target.segment_id,
            tag: target.tag,
            location: target.pos,
            message_id,
            adopted: false,
        })
    }

    /// Points this pointer at the orphan's object, discarding whatever it
    /// pointed to before.
    pub fn adopt(&mut self, orphan: &mut OrphanBuilder) -> Result<()> {
        if orphan.adopted {
            return Err(Error::from_kind(ErrorKind::AlreadyAdopted));
        }
        if orphan.message_id != self.arena.message_id() {
            return Err(Error::from_kind(ErrorKind::OrphanFromDifferentMessage));
        }
        wire_helpers::zero_object(self.arena, self.segment_id, self.pos);
        wire_helpers::transfer_pointer_split(
            self.arena,
            self.segment_id,
            self.pos,
            orphan.segment_id,
            orphan.tag,
            orphan.location,
        );
        orphan.adopted = true;
        Ok(())
    }
}

/// An object that no pointer in the message refers to.
///
/// Created by [`PointerBuilder::disown`] or directly in a builder arena, and
/// consumed by [`PointerBuilder::adopt`]. Holds no borrow of the message; the
/// object's bytes stay in the arena until the message is dropped.
#[derive(Debug)]
pub struct OrphanBuilder {
    segment_id: SegmentId,
    tag: WirePointer,
    location: WordCount32,
    message_id: u64,
    adopted: bool,
}

impl OrphanBuilder {
    pub fn null(message_id: u64) -> Self {
        Self {
            segment_id: 0,
            tag: WirePointer::default(),
            location: 0,
            message_id,
            adopted: false,
        }
    }

    pub fn is_null(&self) -> bool {
        self.tag.is_null()
    }

    pub fn is_adopted(&self) -> bool {
        self.adopted
    }

    pub fn message_id(&self) -> u64 {
        self.message_id
    }

    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    pub fn as_reader<'a>(&self, arena: &'a dyn ReaderArena) -> Result<PointerReader<'a>> {
        if self.adopted {
            return Err(Error::from_kind(ErrorKind::AlreadyAdopted));
        }
        if self.is_null() {
            return Ok(PointerReader::new_default());
        }
        PointerReader::detached(arena, self.segment_id, self.tag, self.location)
    }

    fn new_byte_list(arena: &mut dyn BuilderArena, value: &[u8], extra: u32) -> Result<Self> {
        let byte_size = wire_helpers::blob_len(value)? + extra;
        let upper = wire_helpers::list_upper(Byte, byte_size)?;
        let (segment_id, pos) = arena.allocate_anywhere(round_bytes_up_to_words(byte_size));
        let start = word_to_byte(pos);
        arena.get_segment_mut(segment_id)[start..start + value.len()].copy_from_slice(value);
        let mut tag = WirePointer::default();
        tag.set_kind_with_zero_offset(WirePointerKind::List);
        tag.set_upper32bits(upper);
        Ok(Self {
            segment_id,
            tag,
            location: pos,
            message_id: arena.message_id(),
            adopted: false,
        })
    }

    pub fn new_text(arena: &mut dyn BuilderArena, value: &[u8]) -> Result<Self> {
        Self::new_byte_list(arena, value, 1)
    }

    pub fn new_data(arena: &mut dyn BuilderArena, value: &[u8]) -> Result<Self> {
        Self::new_byte_list(arena, value, 0)
    }

    /// A list of text (`is_text`) or data blobs.
    pub fn new_blob_list(
        arena: &mut dyn BuilderArena,
        values: &[&[u8]],
        is_text: bool,
    ) -> Result<Self> {
        let count = values.len() as u64;
        if count > u64::from(MAX_LIST_ELEMENTS) {
            return Err(Error::from_kind(ErrorKind::LengthOverflow));
        }
        let count = count as ElementCount32;
        let upper = wire_helpers::list_upper(Pointer, count)?;
        let (segment_id, pos) = arena.allocate_anywhere(count);
        for (i, value) in values.iter().enumerate() {
            let ref_pos = pos + i as u32;
            if is_text {
                wire_helpers::set_text_pointer(arena, segment_id, ref_pos, value)?;
            } else {
                wire_helpers::set_data_pointer(arena, segment_id, ref_pos, value)?;
            }
        }
        let mut tag = WirePointer::default();
        tag.set_kind_with_zero_offset(WirePointerKind::List);
        tag.set_upper32bits(upper);
        Ok(Self {
            segment_id,
            tag,
            location: pos,
            message_id: arena.message_id(),
            adopted: false,
        })
    }
}

#[derive(Clone, Copy)]
pub struct StructReader<'a> {
    arena: &'a dyn ReaderArena,
    segment: &'a [u8],
    segment_id: SegmentId,
    data: &'a [u8],
    pointers: WordCount32,
    pointer_count: WirePointerCount16,
    nesting_limit: i32,
}

impl<'a> StructReader<'a> {
    pub fn new_default<'b>() -> StructReader<'b> {
        StructReader {
            arena: &NULL_ARENA,
            segment: &[],
            segment_id: 0,
            data: &[],
            pointers: 0,
            pointer_count: 0,
            nesting_limit: 0x7fffffff,
        }
    }

    pub fn get_data_section_size(&self) -> BitCount32 {
        (self.data.len() * BITS_PER_BYTE) as BitCount32
    }

    pub fn get_pointer_section_size(&self) -> WirePointerCount16 {
        self.pointer_count
    }

    /// Reads the `offset`-th `T`-sized slot of the data section, or zero if
    /// the section is too small to hold it.
    #[inline]
    pub fn get_data_field<T: Primitive>(&self, offset: ElementCount) -> T {
        let start = offset * T::BYTES;
        match self.data.get(start..start + T::BYTES) {
            Some(bytes) => T::get(bytes),
            None => T::zero(),
        }
    }

    #[inline]
    pub fn get_data_field_mask<T: Primitive>(&self, offset: ElementCount, mask: T::Raw) -> T {
        T::mask(self.get_data_field(offset), mask)
    }

    #[inline]
    pub fn get_bool_field(&self, offset: ElementCount) -> bool {
        match self.data.get(offset / BITS_PER_BYTE) {
            Some(&byte) => (byte >> (offset % BITS_PER_BYTE)) & 1 == 1,
            None => false,
        }
    }

    #[inline]
    pub fn get_bool_field_mask(&self, offset: ElementCount, mask: bool) -> bool {
        self.get_bool_field(offset) ^ mask
    }

    /// Slots past the end of the pointer section read as null.
    #[inline]
    pub fn get_pointer_field(&self, ptr_index: WirePointerCount) -> PointerReader<'a> {
        if ptr_index < usize::from(self.pointer_count) {
            PointerReader {
                arena: self.arena,
                segment: self.segment,
                segment_id: self.segment_id,
                location: Location::Word(self.pointers + ptr_index as u32),
                nesting_limit: self.nesting_limit,
            }
        } else {
            PointerReader::new_default()
        }
    }

    #[inline]
    pub fn is_pointer_field_null(&self, ptr_index: WirePointerCount) -> bool {
        self.get_pointer_field(ptr_index).is_null()
    }

    pub fn total_size(&self) -> Result<MessageSize> {
        let mut result = MessageSize {
            word_count: u64::from(round_bytes_up_to_words(self.data.len() as ByteCount32))
                + u64::from(self.pointer_count),
        };
        for i in 0..usize::from(self.pointer_count) {
            result.plus_eq(self.get_pointer_field(i).total_size()?);
        }
        Ok(result)
    }
}

pub struct StructBuilder<'a> {
    arena: &'a mut dyn BuilderArena,
    segment_id: SegmentId,
    data: WordCount32,
    data_size: BitCount32,
    pointers: WordCount32,
    pointer_count: WirePointerCount16,
}

impl<'a> StructBuilder<'a> {
    #[inline]
    pub fn reborrow(&mut self) -> StructBuilder<'_> {
        StructBuilder {
            arena: self.arena,
            ..*self
        }
    }

    pub fn as_reader(&self) -> StructReader<'_> {
        let segment = self.arena.get_segment_ref(self.segment_id);
        let start = word_to_byte(self.data);
        StructReader {
            arena: self.arena.as_reader(),
            segment,
            segment_id: self.segment_id,
            data: &segment[start..start + self.data_size as usize / BITS_PER_BYTE],
            pointers: self.pointers,
            pointer_count: self.pointer_count,
            nesting_limit: 0x7fffffff,
        }
    }

    pub fn into_reader(self) -> StructReader<'a> {
        let arena: &'a dyn BuilderArena = self.arena;
        let segment = arena.get_segment_ref(self.segment_id);
        let start = word_to_byte(self.data);
        StructReader {
            arena: arena.as_reader(),
            segment,
            segment_id: self.segment_id,
            data: &segment[start..start + self.data_size as usize / BITS_PER_BYTE],
            pointers: self.pointers,
            pointer_count: self.pointer_count,
            nesting_limit: 0x7fffffff,
        }
    }

    pub fn get_data_section_size(&self) -> BitCount32 {
        self.data_size
    }

    pub fn get_pointer_section_size(&self) -> WirePointerCount16 {
        self.pointer_count
    }

    fn data_range<T: Primitive>(&self, offset: ElementCount) -> Option<core::ops::Range<usize>> {
        if (offset + 1) * T::BYTES * BITS_PER_BYTE <= self.data_size as usize {
            let start = word_to_byte(self.data) + offset * T::BYTES;
            Some(start..start + T::BYTES)
        } else {
            None
        }
    }

    #[inline]
    pub fn get_data_field<T: Primitive>(&self, offset: ElementCount) -> T {
        match self.data_range::<T>(offset) {
            Some(range) => T::get(&self.arena.get_segment_ref(self.segment_id)[range]),
            None => T::zero(),
        }
    }

    #[inline]
    pub fn get_data_field_mask<T: Primitive>(&self, offset: ElementCount, mask: T::Raw) -> T {
        T::mask(self.get_data_field(offset), mask)
    }

    /// Fails with `IndexOutOfBounds` if the data section cannot hold the slot.
    #[inline]
    pub fn set_data_field<T: Primitive>(&mut self, offset: ElementCount, value: T) -> Result<()> {
        match self.data_range::<T>(offset) {
            Some(range) => {
                T::set(&mut self.arena.get_segment_mut(self.segment_id)[range], value);
                Ok(())
            }
            None => Err(Error {
                kind: ErrorKind::IndexOutOfBounds,
                extra: format!("data field {offset} is beyond the data section"),
            }),
        }
    }

    #[inline]
    pub fn set_data_field_mask<T: Primitive>(
        &mut self,
        offset: ElementCount,
        value: T,
        mask: T::Raw,
    ) -> Result<()> {
        self.set_data_field(offset, T::mask(value, mask))
    }

    #[inline]
    pub fn get_bool_field(&self, offset: ElementCount) -> bool {
        if offset < self.data_size as usize {
            let byte = word_to_byte(self.data) + offset / BITS_PER_BYTE;
            (self.arena.get_segment_ref(self.segment_id)[byte] >> (offset % BITS_PER_BYTE)) & 1
                == 1
        } else {
            false
        }
    }

    #[inline]
    pub fn get_bool_field_mask(&self, offset: ElementCount, mask: bool) -> bool {
        self.get_bool_field(offset) ^ mask
    }

    #[inline]
    pub fn set_bool_field(&mut self, offset: ElementCount, value: bool) -> Result<()> {
        if offset >= self.data_size as usize {
            return Err(Error {
                kind: ErrorKind::IndexOutOfBounds,
                extra: format!("bool field {offset} is beyond the data section"),
            });
        }
        let byte = word_to_byte(self.data) + offset / BITS_PER_BYTE;
        let bit = offset % BITS_PER_BYTE;
        let segment = self.arena.get_segment_mut(self.segment_id);
        segment[byte] = (segment[byte] & !(1 << bit)) | (u8::from(value) << bit);
        Ok(())
    }

    #[inline]
    pub fn set_bool_field_mask(
        &mut self,
        offset: ElementCount,
        value: bool,
        mask: bool,
    ) -> Result<()> {
        self.set_bool_field(offset, value ^ mask)
    }

    /// Fails with `IndexOutOfBounds` past the end of the pointer section.
    #[inline]
    pub fn get_pointer_field(self, ptr_index: WirePointerCount) -> Result<PointerBuilder<'a>> {
        if ptr_index >= usize::from(self.pointer_count) {
            return Err(Error {
                kind: ErrorKind::IndexOutOfBounds,
                extra: format!(
                    "pointer slot {ptr_index} of a struct with {} pointers",
                    self.pointer_count
                ),
            });
        }
        Ok(PointerBuilder {
            arena: self.arena,
            segment_id: self.segment_id,
            pos: self.pointers + ptr_index as u32,
        })
    }

    #[inline]
    pub fn get_pointer_field_mut(
        &mut self,
        ptr_index: WirePointerCount,
    ) -> Result<PointerBuilder<'_>> {
        self.reborrow().get_pointer_field(ptr_index)
    }

    #[inline]
    pub fn is_pointer_field_null(&self, ptr_index: WirePointerCount) -> bool {
        ptr_index >= usize::from(self.pointer_count)
            || wire_helpers::read_ptr(
                self.arena,
                self.segment_id,
                self.pointers + ptr_index as u32,
            )
            .is_null()
    }

    /// Overwrites this struct's content with a copy of `other`'s, truncating
    /// whatever does not fit.
    pub fn copy_content_from(&mut self, other: &StructReader) -> Result<()> {
        let data_len = self.data_size as usize / BITS_PER_BYTE;
        let shared = core::cmp::min(data_len, other.data.len());
        let start = word_to_byte(self.data);
        {
            let segment = self.arena.get_segment_mut(self.segment_id);
            segment[start..start + shared].copy_from_slice(&other.data[..shared]);
            segment[start + shared..start + data_len].fill(0);
        }

        for i in 0..usize::from(self.pointer_count) {
            let pos = self.pointers + i as u32;
            wire_helpers::zero_object(self.arena, self.segment_id, pos);
            wire_helpers::zero_words(self.arena, self.segment_id, pos, 1);
        }
        let shared_pointers = core::cmp::min(self.pointer_count, other.pointer_count);
        for i in 0..usize::from(shared_pointers) {
            wire_helpers::copy_pointer(
                self.arena,
                self.segment_id,
                self.pointers + i as u32,
                &other.get_pointer_field(i),
            )?;
        }
        Ok(())
    }

    pub fn total_size(&self) -> Result<MessageSize> {
        self.as_reader().total_size()
    }
}

#[derive(Clone, Copy)]
pub struct ListReader<'a> {
    arena: &'a dyn ReaderArena,
    segment: &'a [u8],
    segment_id: SegmentId,
    ptr: WordCount32,
    element_count: ElementCount32,
    element_size: ElementSize,
    step: BitCount32,
    struct_data_size: BitCount32,
    struct_pointer_count: WirePointerCount16,
    nesting_limit: i32,
}

impl<'a> ListReader<'a> {
    pub fn new_default<'b>() -> ListReader<'b> {
        ListReader {
            arena: &NULL_ARENA,
            segment: &[],
            segment_id: 0,
            ptr: 0,
            element_count: 0,
            element_size: Void,
            step: 0,
            struct_data_size: 0,
            struct_pointer_count: 0,
            nesting_limit: 0x7fffffff,
        }
    }

    #[inline]
    pub fn len(&self) -> ElementCount32 {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_element_size(&self) -> ElementSize {
        self.element_size
    }

    #[inline]
    fn element_bit(&self, index: ElementCount32) -> u64 {
        word_to_byte(self.ptr) as u64 * BITS_PER_BYTE as u64
            + u64::from(index) * u64::from(self.step)
    }

    pub fn get_struct_element(&self, index: ElementCount32) -> StructReader<'a> {
        let start = (self.element_bit(index) / BITS_PER_BYTE as u64) as usize;
        let data_len = self.struct_data_size as usize / BITS_PER_BYTE;
        let pointers = ((start + data_len) / BYTES_PER_WORD) as WordCount32;
        StructReader {
            arena: self.arena,
            segment: self.segment,
            segment_id: self.segment_id,
            data: &self.segment[start..start + data_len],
            pointers,
            pointer_count: self.struct_pointer_count,
            nesting_limit: self.nesting_limit,
        }
    }

    #[inline]
    pub fn get_pointer_element(&self, index: ElementCount32) -> PointerReader<'a> {
        let bit = self.element_bit(index) + u64::from(self.struct_data_size);
        PointerReader {
            arena: self.arena,
            segment: self.segment,
            segment_id: self.segment_id,
            location: Location::Word((bit / BITS_PER_WORD as u64) as WordCount32),
            nesting_limit: self.nesting_limit,
        }
    }

    #[inline]
    pub fn get_primitive<T: Primitive>(&self, index: ElementCount32) -> T {
        let start = (self.element_bit(index) / BITS_PER_BYTE as u64) as usize;
        T::get(&self.segment[start..start + T::BYTES])
    }

    #[inline]
    pub fn get_bool_element(&self, index: ElementCount32) -> bool {
        let bit = self.element_bit(index);
        let byte = self.segment[(bit / BITS_PER_BYTE as u64) as usize];
        (byte >> (bit % BITS_PER_BYTE as u64)) & 1 == 1
    }

    pub fn total_size(&self) -> Result<MessageSize> {
        let count = self.element_count;
        match self.element_size {
            Void => Ok(MessageSize { word_count: 0 }),
            Bit | Byte | TwoBytes | FourBytes | EightBytes => Ok(MessageSize {
                word_count: u64::from(round_bits_up_to_words(
                    u64::from(count) * u64::from(self.step),
                )),
            }),
            Pointer => {
                let mut result = MessageSize {
                    word_count: u64::from(count),
                };
                for i in 0..count {
                    result.plus_eq(self.get_pointer_element(i).total_size()?);
                }
                Ok(result)
            }
            InlineComposite => {
                let mut result = MessageSize {
                    word_count: u64::from(count) * u64::from(self.step)
                        / BITS_PER_WORD as u64
                        + POINTER_SIZE_IN_WORDS as u64,
                };
                for i in 0..count {
                    let element = self.get_struct_element(i);
                    for j in 0..usize::from(self.struct_pointer_count) {
                        result.plus_eq(element.get_pointer_field(j).total_size()?);
                    }
                }
                Ok(result)
            }
        }
    }
}

pub struct ListBuilder<'a> {
    arena: &'a mut dyn BuilderArena,
    segment_id: SegmentId,
    ptr: WordCount32,
    element_count: ElementCount32,
    element_size: ElementSize,
    step: BitCount32,
    struct_data_size: BitCount32,
    struct_pointer_count: WirePointerCount16,
}

impl<'a> ListBuilder<'a> {
    #[inline]
    pub fn new_default(arena: &mut dyn BuilderArena) -> ListBuilder<'_> {
        ListBuilder {
            arena,
            segment_id: 0,
            ptr: 0,
            element_count: 0,
            element_size: Void,
            step: 0,
            struct_data_size: 0,
            struct_pointer_count: 0,
        }
    }

    #[inline]
    pub fn reborrow(&mut self) -> ListBuilder<'_> {
        ListBuilder {
            arena: self.arena,
            ..*self
        }
    }

    pub fn as_reader(&self) -> ListReader<'_> {
        ListReader {
            arena: self.arena.as_reader(),
            segment: self.segment_bytes(),
            segment_id: self.segment_id,
            ptr: self.ptr,
            element_count: self.element_count,
            element_size: self.element_size,
            step: self.step,
            struct_data_size: self.struct_data_size,
            struct_pointer_count: self.struct_pointer_count,
            nesting_limit: 0x7fffffff,
        }
    }

    pub fn into_reader(self) -> ListReader<'a> {
        let arena: &'a dyn BuilderArena = self.arena;
        ListReader {
            arena: arena.as_reader(),
            segment: if self.element_count == 0 {
                &[]
            } else {
                arena.get_segment_ref(self.segment_id)
            },
            segment_id: self.segment_id,
            ptr: self.ptr,
            element_count: self.element_count,
            element_size: self.element_size,
            step: self.step,
            struct_data_size: self.struct_data_size,
            struct_pointer_count: self.struct_pointer_count,
            nesting_limit: 0x7fffffff,
        }
    }

    fn segment_bytes(&self) -> &[u8] {
        // An empty default list may be built before any segment exists.
        if self.element_count == 0 {
            &[]
        } else {
            self.arena.get_segment_ref(self.segment_id)
        }
    }

    #[inline]
    pub fn len(&self) -> ElementCount32 {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_element_size(&self) -> ElementSize {
        self.element_size
    }

    #[inline]
    fn element_bit(&self, index: ElementCount32) -> u64 {
        word_to_byte(self.ptr) as u64 * BITS_PER_BYTE as u64
            + u64::from(index) * u64::from(self.step)
    }

    pub fn get_struct_element(self, index: ElementCount32) -> StructBuilder<'a> {
        let bit = self.element_bit(index);
        let data = (bit / BITS_PER_WORD as u64) as WordCount32;
        StructBuilder {
            arena: self.arena,
            segment_id: self.segment_id,
            data,
            data_size: self.struct_data_size,
            pointers: data + self.struct_data_size / BITS_PER_WORD as u32,
            pointer_count: self.struct_pointer_count,
        }
    }

    #[inline]
    pub fn get_pointer_element(self, index: ElementCount32) -> PointerBuilder<'a> {
        let bit = self.element_bit(index) + u64::from(self.struct_data_size);
        PointerBuilder {
            arena: self.arena,
            segment_id: self.segment_id,
            pos: (bit / BITS_PER_WORD as u64) as WordCount32,
        }
    }

    #[inline]
    pub fn get_primitive<T: Primitive>(&self, index: ElementCount32) -> T {
        let start = (self.element_bit(index) / BITS_PER_BYTE as u64) as usize;
        T::get(&self.arena.get_segment_ref(self.segment_id)[start..start + T::BYTES])
    }

    #[inline]
    pub fn set_primitive<T: Primitive>(&mut self, index: ElementCount32, value: T) {
        let start = (self.element_bit(index) / BITS_PER_BYTE as u64) as usize;
        T::set(
            &mut self.arena.get_segment_mut(self.segment_id)[start..start + T::BYTES],
            value,
        )
    }

    #[inline]
    pub fn get_bool_element(&self, index: ElementCount32) -> bool {
        let bit = self.element_bit(index);
        let byte = self.arena.get_segment_ref(self.segment_id)[(bit / 8) as usize];
        (byte >> (bit % 8)) & 1 == 1
    }

    #[inline]
    pub fn set_bool_element(&mut self, index: ElementCount32, value: bool) {
        let bit = self.element_bit(index);
        let shift = bit % 8;
        let byte = &mut self.arena.get_segment_mut(self.segment_id)[(bit / 8) as usize];
        *byte = (*byte & !(1 << shift)) | (u8::from(value) << shift);
    }
}

/// An element type of `primitive_list`, stored in the narrowest list
/// encoding that holds it.
pub trait PrimitiveElement: Copy {
    fn get(list_reader: &ListReader, index: ElementCount32) -> Self;
    fn get_from_builder(list_builder: &ListBuilder, index: ElementCount32) -> Self;
    fn set(list_builder: &mut ListBuilder, index: ElementCount32, value: Self);
    fn element_size() -> ElementSize;
}

macro_rules! primitive_element_impl(
    ($typ:ty, $size:expr) => (
        impl PrimitiveElement for $typ {
            #[inline]
            fn get(list_reader: &ListReader, index: ElementCount32) -> Self {
                list_reader.get_primitive(index)
            }

            #[inline]
            fn get_from_builder(list_builder: &ListBuilder, index: ElementCount32) -> Self {
                list_builder.get_primitive(index)
            }

            #[inline]
            fn set(list_builder: &mut ListBuilder, index: ElementCount32, value: Self) {
                list_builder.set_primitive(index, value)
            }

            fn element_size() -> ElementSize {
                $size
            }
        }
        );
    );

primitive_element_impl!(u8, Byte);
primitive_element_impl!(i8, Byte);
primitive_element_impl!(u16, TwoBytes);
primitive_element_impl!(i16, TwoBytes);
primitive_element_impl!(u32, FourBytes);
primitive_element_impl!(i32, FourBytes);
primitive_element_impl!(u64, EightBytes);
primitive_element_impl!(i64, EightBytes);
primitive_element_impl!(f32, FourBytes);
primitive_element_impl!(f64, EightBytes);

impl PrimitiveElement for bool {
    #[inline]
    fn get(list: &ListReader, index: ElementCount32) -> Self {
        list.get_bool_element(index)
    }

    #[inline]
    fn get_from_builder(list: &ListBuilder, index: ElementCount32) -> Self {
        list.get_bool_element(index)
    }

    #[inline]
    fn set(list: &mut ListBuilder, index: ElementCount32, value: Self) {
        list.set_bool_element(index, value)
    }

    fn element_size() -> ElementSize {
        Bit
    }
}

impl PrimitiveElement for () {
    #[inline]
    fn get(_list: &ListReader, _index: ElementCount32) {}

    #[inline]
    fn get_from_builder(_list: &ListBuilder, _index: ElementCount32) {}

    #[inline]
    fn set(_list: &mut ListBuilder, _index: ElementCount32, _value: ()) {}

    fn element_size() -> ElementSize {
        Void
    }
}
