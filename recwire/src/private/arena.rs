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

use core::sync::atomic::{AtomicU64, Ordering};

use crate::message;
use crate::message::Allocator;
use crate::message::ReaderSegments;
use crate::private::read_limiter::ReadLimiter;
use crate::private::units::*;
use crate::OutputSegments;
use crate::{Error, ErrorKind, Result};

pub type SegmentId = u32;

pub trait ReaderArena {
    /// Returns the bytes of the segment. Always a whole number of words.
    fn get_segment(&self, id: u32) -> Result<&[u8]>;

    /// Checks that `size_in_words` words starting at word `start` lie inside the segment,
    /// and charges them against the traversal limit.
    fn contains_interval(&self, segment_id: u32, start: u32, size_in_words: usize) -> Result<()>;
    fn amplified_read(&self, virtual_amount: u64) -> Result<()>;

    fn nesting_limit(&self) -> i32;

    /// Number of words in the segment.
    fn segment_len(&self, id: u32) -> Result<u32> {
        Ok((self.get_segment(id)?.len() / BYTES_PER_WORD) as u32)
    }
}

pub struct ReaderArenaImpl<S> {
    segments: S,
    read_limiter: ReadLimiter,
    nesting_limit: i32,
}

impl<S> ReaderArenaImpl<S>
where
    S: ReaderSegments,
{
    pub fn new(segments: S, options: message::ReaderOptions) -> Self {
        let limiter = ReadLimiter::new(options.traversal_limit_in_words);
        Self {
            segments,
            read_limiter: limiter,
            nesting_limit: options.nesting_limit,
        }
    }

    pub fn into_segments(self) -> S {
        self.segments
    }
}

impl<S> ReaderArena for ReaderArenaImpl<S>
where
    S: ReaderSegments,
{
    fn get_segment(&self, id: u32) -> Result<&[u8]> {
        match self.segments.get_segment(id) {
            Some(seg) => {
                let words = seg.len() / BYTES_PER_WORD;
                Ok(&seg[..words * BYTES_PER_WORD])
            }
            None => Err(Error::corrupt(&format!("invalid segment id {id}"))),
        }
    }

    fn contains_interval(&self, id: u32, start: u32, size_in_words: usize) -> Result<()> {
        let len = self.segment_len(id)? as usize;
        let start = start as usize;
        if start > len || size_in_words > len - start {
            Err(Error::corrupt("pointer target out of segment bounds"))
        } else {
            self.read_limiter.can_read(size_in_words)
        }
    }

    fn amplified_read(&self, virtual_amount: u64) -> Result<()> {
        self.read_limiter.can_read(virtual_amount as usize)
    }

    fn nesting_limit(&self) -> i32 {
        self.nesting_limit
    }
}

pub trait BuilderArena: ReaderArena {
    fn allocate(&mut self, segment_id: u32, amount: WordCount32) -> Option<u32>;
    fn allocate_anywhere(&mut self, amount: u32) -> (SegmentId, u32);

    /// The allocated part of the segment.
    fn get_segment_mut(&mut self, id: u32) -> &mut [u8];
    fn get_segment_ref(&self, id: u32) -> &[u8];

    fn as_reader(&self) -> &dyn ReaderArena;

    /// Identifies the message this arena belongs to. Orphans carry it so that they
    /// cannot be adopted into a foreign message.
    fn message_id(&self) -> u64;
}

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// A memory segment used in building a message.
struct BuilderSegment {
    /// Zero-initialized storage, `capacity * 8` bytes long.
    bytes: Vec<u8>,

    /// Number of words already used in the segment.
    allocated: u32,
}

impl BuilderSegment {
    fn capacity(&self) -> u32 {
        (self.bytes.len() / BYTES_PER_WORD) as u32
    }
}

pub struct BuilderArenaImpl<A>
where
    A: Allocator,
{
    allocator: Option<A>, // None if has already been taken.
    segments: Vec<BuilderSegment>,
    message_id: u64,
}

impl<A> BuilderArenaImpl<A>
where
    A: Allocator,
{
    pub fn new(allocator: A) -> Self {
        Self {
            allocator: Some(allocator),
            segments: Vec::new(),
            message_id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Allocates a new segment with capacity for at least `minimum_size` words.
    pub fn allocate_segment(&mut self, minimum_size: WordCount32) {
        let mut bytes = match &mut self.allocator {
            Some(a) => a.allocate_segment(minimum_size),
            None => Vec::new(),
        };
        // Round down to whole words and make sure the request fits.
        let words = core::cmp::max(bytes.len() / BYTES_PER_WORD, minimum_size as usize);
        bytes.resize(words * BYTES_PER_WORD, 0);
        log::debug!(
            "allocated segment {} with {} words",
            self.segments.len(),
            words
        );
        self.segments.push(BuilderSegment {
            bytes,
            allocated: 0,
        });
    }

    pub fn get_segments_for_output(&self) -> OutputSegments<'_> {
        if self.segments.len() == 1 {
            let seg = &self.segments[0];
            OutputSegments::SingleSegment([&seg.bytes[..seg.allocated as usize * BYTES_PER_WORD]])
        } else {
            OutputSegments::MultiSegment(
                self.segments
                    .iter()
                    .map(|seg| &seg.bytes[..seg.allocated as usize * BYTES_PER_WORD])
                    .collect(),
            )
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieves the underlying `Allocator`, handing all currently-allocated
    /// segments back to it.
    pub fn into_allocator(mut self) -> A {
        self.deallocate_all();
        match self.allocator.take() {
            Some(a) => a,
            None => unreachable!("allocator is only taken here"),
        }
    }

    fn deallocate_all(&mut self) {
        if let Some(a) = &mut self.allocator {
            for seg in self.segments.drain(..) {
                let allocated = seg.allocated;
                a.deallocate_segment(seg.bytes, allocated);
            }
        }
    }
}

impl<A> ReaderArena for BuilderArenaImpl<A>
where
    A: Allocator,
{
    fn get_segment(&self, id: u32) -> Result<&[u8]> {
        match self.segments.get(id as usize) {
            Some(seg) => Ok(&seg.bytes[..seg.allocated as usize * BYTES_PER_WORD]),
            None => Err(Error::corrupt(&format!("invalid segment id {id}"))),
        }
    }

    fn contains_interval(&self, id: u32, start: u32, size_in_words: usize) -> Result<()> {
        let len = self.segment_len(id)? as usize;
        let start = start as usize;
        if start > len || size_in_words > len - start {
            Err(Error::corrupt("pointer target out of segment bounds"))
        } else {
            Ok(())
        }
    }

    fn amplified_read(&self, _virtual_amount: u64) -> Result<()> {
        Ok(())
    }

    fn nesting_limit(&self) -> i32 {
        0x7fffffff
    }
}

impl<A> BuilderArena for BuilderArenaImpl<A>
where
    A: Allocator,
{
    fn allocate(&mut self, segment_id: u32, amount: WordCount32) -> Option<u32> {
        let seg = self.segments.get_mut(segment_id as usize)?;
        if amount > seg.capacity() - seg.allocated {
            None
        } else {
            let result = seg.allocated;
            seg.allocated += amount;
            Some(result)
        }
    }

    fn allocate_anywhere(&mut self, amount: u32) -> (SegmentId, u32) {
        // first try the existing segments, then try allocating a new segment.
        let allocated_len = self.segments.len() as u32;
        for segment_id in 0..allocated_len {
            if let Some(idx) = self.allocate(segment_id, amount) {
                return (segment_id, idx);
            }
        }

        self.allocate_segment(amount);
        let seg = &mut self.segments[allocated_len as usize];
        seg.allocated = amount;
        (allocated_len, 0)
    }

    fn get_segment_mut(&mut self, id: u32) -> &mut [u8] {
        let seg = &mut self.segments[id as usize];
        &mut seg.bytes[..seg.allocated as usize * BYTES_PER_WORD]
    }

    fn get_segment_ref(&self, id: u32) -> &[u8] {
        let seg = &self.segments[id as usize];
        &seg.bytes[..seg.allocated as usize * BYTES_PER_WORD]
    }

    fn as_reader(&self) -> &dyn ReaderArena {
        self
    }

    fn message_id(&self) -> u64 {
        self.message_id
    }
}

impl<A> Drop for BuilderArenaImpl<A>
where
    A: Allocator,
{
    fn drop(&mut self) {
        self.deallocate_all()
    }
}

/// Arena behind readers of default values. Nothing can be dereferenced through it.
pub struct NullArena;

impl ReaderArena for NullArena {
    fn get_segment(&self, _id: u32) -> Result<&[u8]> {
        Err(Error::from_kind(ErrorKind::CorruptPointer))
    }

    fn contains_interval(&self, _id: u32, _start: u32, _size: usize) -> Result<()> {
        Err(Error::from_kind(ErrorKind::CorruptPointer))
    }

    fn amplified_read(&self, _virtual_amount: u64) -> Result<()> {
        Ok(())
    }

    fn nesting_limit(&self) -> i32 {
        0x7fffffff
    }
}

#[cfg(test)]
mod tests {
    use super::{BuilderArena, BuilderArenaImpl, ReaderArena};
    use crate::message::{AllocationStrategy, HeapAllocator};

    #[test]
    fn allocate_spills_into_new_segment() {
        let allocator = HeapAllocator::new()
            .first_segment_words(4)
            .allocation_strategy(AllocationStrategy::FixedSize);
        let mut arena = BuilderArenaImpl::new(allocator);
        assert_eq!(arena.allocate_anywhere(3), (0, 0));
        assert_eq!(arena.allocate(0, 1), Some(3));
        assert_eq!(arena.allocate(0, 1), None);
        assert_eq!(arena.allocate_anywhere(2), (1, 0));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.segment_len(0).unwrap(), 4);
        assert_eq!(arena.segment_len(1).unwrap(), 2);
        assert!(arena.contains_interval(1, 0, 2).is_ok());
        assert!(arena.contains_interval(1, 1, 2).is_err());
    }

    #[test]
    fn oversized_request_gets_own_segment() {
        let allocator = HeapAllocator::new()
            .first_segment_words(2)
            .allocation_strategy(AllocationStrategy::FixedSize);
        let mut arena = BuilderArenaImpl::new(allocator);
        assert_eq!(arena.allocate_anywhere(10), (0, 0));
        assert_eq!(arena.get_segment_mut(0).len(), 80);
    }

    #[test]
    fn message_ids_differ() {
        let a = BuilderArenaImpl::new(HeapAllocator::new());
        let b = BuilderArenaImpl::new(HeapAllocator::new());
        assert_ne!(a.message_id(), b.message_id());
    }
}
