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

//! Reading and writing of messages using the standard stream framing: a segment table
//! followed by the segments themselves.
//!
//! The table is a little-endian `u32` holding the segment count minus one, then one `u32`
//! word count per segment, padded with zeroes to a whole number of words.

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::message;
use crate::private::units::BYTES_PER_WORD;
use crate::{Error, ErrorKind, Result, Word};

/// Segment tables with at least this many entries are rejected.
pub const SEGMENTS_COUNT_LIMIT: usize = 512;

/// Segments read from a single flat slice of bytes.
pub struct SliceSegments<'a> {
    bytes: &'a [u8],
    segment_slices: Vec<(usize, usize)>,
}

impl<'a> message::ReaderSegments for SliceSegments<'a> {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        let (a, b) = *self.segment_slices.get(id as usize)?;
        Some(&self.bytes[a * BYTES_PER_WORD..b * BYTES_PER_WORD])
    }

    fn len(&self) -> usize {
        self.segment_slices.len()
    }
}

/// Reads a serialized message from a flat slice of bytes without copying it. On success,
/// `slice` is advanced past the message.
pub fn read_message_from_flat_slice<'a>(
    slice: &mut &'a [u8],
    options: message::ReaderOptions,
) -> Result<message::Reader<SliceSegments<'a>>> {
    let all_bytes = *slice;
    let mut cursor = all_bytes;
    let (num_words, segment_slices) = read_segment_table(&mut cursor, options)?;
    let header_len = all_bytes.len() - cursor.len();
    let body_len = num_words * BYTES_PER_WORD;
    if cursor.len() < body_len {
        return Err(Error {
            kind: ErrorKind::PrematureEndOfFile,
            extra: format!(
                "message ends prematurely: header claimed {} words, but the slice has {} bytes",
                num_words,
                cursor.len()
            ),
        });
    }
    let (body, rest) = all_bytes[header_len..].split_at(body_len);
    *slice = rest;
    Ok(message::Reader::new(
        SliceSegments {
            bytes: body,
            segment_slices,
        },
        options,
    ))
}

/// Segments read into a buffer owned by the message.
pub struct OwnedSegments {
    segment_slices: Vec<(usize, usize)>,
    owned_space: Vec<u8>,
}

impl message::ReaderSegments for OwnedSegments {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        let (a, b) = *self.segment_slices.get(id as usize)?;
        Some(&self.owned_space[a * BYTES_PER_WORD..b * BYTES_PER_WORD])
    }

    fn len(&self) -> usize {
        self.segment_slices.len()
    }
}

/// Reads a serialized message from a stream with the provided options.
///
/// For optimal performance, `read` should be a buffered reader type.
pub fn read_message<R>(
    mut read: R,
    options: message::ReaderOptions,
) -> Result<message::Reader<OwnedSegments>>
where
    R: Read,
{
    let (total_words, segment_slices) = read_segment_table(&mut read, options)?;
    let mut owned_space = vec![0u8; total_words * BYTES_PER_WORD];
    read.read_exact(&mut owned_space[..])?;
    Ok(message::Reader::new(
        OwnedSegments {
            segment_slices,
            owned_space,
        },
        options,
    ))
}

/// Reads a segment table from `read` and returns the total number of words across all
/// segments, as well as the segment offsets in words.
fn read_segment_table<R>(
    read: &mut R,
    options: message::ReaderOptions,
) -> Result<(usize, Vec<(usize, usize)>)>
where
    R: Read,
{
    let mut buf: [u8; 8] = [0; 8];

    // read the first word, which contains segment_count and the 1st segment length
    read.read_exact(&mut buf)?;
    let segment_count = LittleEndian::read_u32(&buf[0..4]).wrapping_add(1) as usize;

    if segment_count >= SEGMENTS_COUNT_LIMIT {
        return Err(Error::failed(format!("Too many segments: {segment_count}")));
    } else if segment_count == 0 {
        return Err(Error::failed(format!("Too few segments: {segment_count}")));
    }

    let mut segment_slices = Vec::with_capacity(segment_count);
    let mut total_words = LittleEndian::read_u32(&buf[4..8]) as usize;
    segment_slices.push((0, total_words));

    if segment_count > 1 {
        // The remaining sizes, padded to a whole word.
        let mut segment_sizes = vec![0u8; (segment_count & !1) * 4];
        read.read_exact(&mut segment_sizes[..])?;
        for idx in 0..(segment_count - 1) {
            let segment_len = LittleEndian::read_u32(&segment_sizes[(idx * 4)..(idx + 1) * 4]) as usize;
            segment_slices.push((total_words, total_words + segment_len));
            total_words += segment_len;
        }
    }

    // Don't accept a message which the receiver couldn't possibly traverse without hitting the
    // traversal limit. Without this check, a very large segment size could make the receiver
    // allocate excessive space.
    if total_words as u64 > options.traversal_limit_in_words {
        return Err(Error::failed(format!(
            "Message has {total_words} words, which is too large. To increase the limit on the \
             receiving end, see recwire::message::ReaderOptions."
        )));
    }

    Ok((total_words, segment_slices))
}

/// Word counts of the segments. A message with no segments is framed as one empty segment.
fn segment_word_counts(segments: &[&[u8]]) -> Vec<u32> {
    if segments.is_empty() {
        vec![0]
    } else {
        segments
            .iter()
            .map(|s| (s.len() / BYTES_PER_WORD) as u32)
            .collect()
    }
}

fn segment_table(segments: &[&[u8]]) -> Vec<u8> {
    let sizes = segment_word_counts(segments);
    let mut table = vec![0u8; (sizes.len() / 2 + 1) * BYTES_PER_WORD];
    LittleEndian::write_u32(&mut table[0..4], sizes.len() as u32 - 1);
    for (idx, size) in sizes.iter().enumerate() {
        LittleEndian::write_u32(&mut table[4 + idx * 4..8 + idx * 4], *size);
    }
    table
}

fn collect_segments<R: message::ReaderSegments + ?Sized>(segments: &R) -> Vec<&[u8]> {
    (0..segments.len() as u32)
        .filter_map(|id| segments.get_segment(id))
        .collect()
}

fn compute_serialized_size(segments: &[&[u8]]) -> usize {
    let table_words = segment_word_counts(segments).len() / 2 + 1;
    table_words
        + segments
            .iter()
            .map(|s| s.len() / BYTES_PER_WORD)
            .sum::<usize>()
}

fn flatten_segments(segments: &[&[u8]]) -> Vec<Word> {
    let mut result = Word::allocate_zeroed_vec(compute_serialized_size(segments));
    let bytes = Word::words_to_bytes_mut(&mut result[..]);
    let table = segment_table(segments);
    bytes[..table.len()].copy_from_slice(&table);
    let mut pos = table.len();
    for segment in segments {
        let len = segment.len() / BYTES_PER_WORD * BYTES_PER_WORD;
        bytes[pos..pos + len].copy_from_slice(&segment[..len]);
        pos += len;
    }
    result
}

/// Constructs a flat vector containing the entire message.
pub fn write_message_to_words<A>(message: &message::Builder<A>) -> Vec<Word>
where
    A: message::Allocator,
{
    flatten_segments(&message.get_segments_for_output())
}

pub fn write_message_segments_to_words<R>(message: &R) -> Vec<Word>
where
    R: message::ReaderSegments + ?Sized,
{
    flatten_segments(&collect_segments(message))
}

/// Writes the provided message to `write`.
///
/// For optimal performance, `write` should be a buffered writer. `flush` will not be called on
/// the writer.
pub fn write_message<W, A>(write: W, message: &message::Builder<A>) -> Result<()>
where
    W: Write,
    A: message::Allocator,
{
    write_segments(write, &message.get_segments_for_output())
}

pub fn write_message_segments<W, R>(write: W, segments: &R) -> Result<()>
where
    W: Write,
    R: message::ReaderSegments + ?Sized,
{
    write_segments(write, &collect_segments(segments))
}

fn write_segments<W: Write>(mut write: W, segments: &[&[u8]]) -> Result<()> {
    write.write_all(&segment_table(segments))?;
    for segment in segments {
        let len = segment.len() / BYTES_PER_WORD * BYTES_PER_WORD;
        write.write_all(&segment[..len])?;
    }
    Ok(())
}

/// Returns the number of words required to serialize the message.
pub fn compute_serialized_size_in_words<A>(message: &message::Builder<A>) -> usize
where
    A: message::Allocator,
{
    compute_serialized_size(&message.get_segments_for_output())
}

#[cfg(test)]
pub mod test {
    use std::io::Cursor;

    use quickcheck::{quickcheck, TestResult};

    use super::{
        flatten_segments, read_message, read_message_from_flat_slice, read_segment_table,
        segment_table, write_message, write_message_segments, write_message_segments_to_words,
        write_message_to_words,
    };
    use crate::message::{self, ReaderSegments};
    use crate::{ErrorKind, Word};

    fn to_bytes(segments: &[Vec<u64>]) -> Vec<Vec<u8>> {
        segments
            .iter()
            .map(|s| s.iter().flat_map(|w| w.to_le_bytes()).collect())
            .collect()
    }

    #[test]
    fn test_read_segment_table() {
        let mut buf: Vec<u8> = vec![];

        buf.extend([0,0,0,0, // 1 segments
                    0,0,0,0]); // 0 length
        let (words, segment_slices) =
            read_segment_table(&mut Cursor::new(&buf[..]), message::ReaderOptions::new()).unwrap();
        assert_eq!(0, words);
        assert_eq!(vec![(0, 0)], segment_slices);
        buf.clear();

        buf.extend([1,0,0,0, // 2 segments
                    1,0,0,0, // 1 length
                    1,0,0,0, // 1 length
                    0,0,0,0]); // padding
        let (words, segment_slices) =
            read_segment_table(&mut Cursor::new(&buf[..]), message::ReaderOptions::new()).unwrap();
        assert_eq!(2, words);
        assert_eq!(vec![(0, 1), (1, 2)], segment_slices);
        buf.clear();

        buf.extend([2,0,0,0, // 3 segments
                    1,0,0,0, // 1 length
                    1,0,0,0, // 1 length
                    0,1,0,0]); // 256 length
        let (words, segment_slices) =
            read_segment_table(&mut Cursor::new(&buf[..]), message::ReaderOptions::new()).unwrap();
        assert_eq!(258, words);
        assert_eq!(vec![(0, 1), (1, 2), (2, 258)], segment_slices);
        buf.clear();

        buf.extend([3,0,0,0,  // 4 segments
                    77,0,0,0, // 77 length
                    23,0,0,0, // 23 length
                    1,0,0,0,  // 1 length
                    99,0,0,0, // 99 length
                    0,0,0,0]); // padding
        let (words, segment_slices) =
            read_segment_table(&mut Cursor::new(&buf[..]), message::ReaderOptions::new()).unwrap();
        assert_eq!(200, words);
        assert_eq!(
            vec![(0, 77), (77, 100), (100, 101), (101, 200)],
            segment_slices
        );
    }

    #[test]
    fn test_read_invalid_segment_table() {
        let mut buf: Vec<u8> = vec![];

        buf.extend([0, 2, 0, 0]); // 513 segments
        buf.extend([0; 513 * 4]);
        assert!(
            read_segment_table(&mut Cursor::new(&buf[..]), message::ReaderOptions::new()).is_err()
        );
        buf.clear();

        buf.extend([0, 0, 0, 0]); // 1 segments
        assert_eq!(
            read_segment_table(&mut Cursor::new(&buf[..]), message::ReaderOptions::new())
                .unwrap_err()
                .kind,
            ErrorKind::PrematureEndOfFile
        );
        buf.clear();

        buf.extend([255, 255, 255, 255]); // 0 segments
        buf.extend([0; 4]);
        assert!(
            read_segment_table(&mut Cursor::new(&buf[..]), message::ReaderOptions::new()).is_err()
        );
        buf.clear();

        buf.extend([0, 0, 0, 0, 9, 0, 0, 0]); // 1 segment of 9 words
        let mut options = message::ReaderOptions::new();
        options.traversal_limit_in_words(8);
        assert!(read_segment_table(&mut Cursor::new(&buf[..]), options).is_err());
    }

    #[test]
    fn test_write_segment_table() {
        let segment_0: &[u8] = &[];
        let segment_1: &[u8] = &[1; 8];
        let segment_199: &[u8] = &[7; 199 * 8];

        assert_eq!(
            segment_table(&[segment_0]),
            [0u8, 0, 0, 0, // 1 segments
             0, 0, 0, 0] // 0 length
        );
        assert_eq!(
            segment_table(&[segment_199]),
            [0u8, 0, 0, 0, // 1 segments
             199, 0, 0, 0] // 199 length
        );
        assert_eq!(
            segment_table(&[segment_0, segment_1]),
            [1u8, 0, 0, 0, // 2 segments
             0, 0, 0, 0, // 0 length
             1, 0, 0, 0, // 1 length
             0, 0, 0, 0] // padding
        );
        assert_eq!(
            segment_table(&[segment_199, segment_1, segment_199, segment_0, segment_1]),
            [4u8, 0, 0, 0, // 5 segments
             199, 0, 0, 0, // 199 length
             1, 0, 0, 0, // 1 length
             199, 0, 0, 0, // 199 length
             0, 0, 0, 0, // 0 length
             1, 0, 0, 0] // 1 length
        );
        assert_eq!(segment_table(&[]), [0u8; 8]);
    }

    #[test]
    fn flat_slice_advances_past_message() {
        let segments = to_bytes(&[vec![1, 2], vec![3]]);
        let borrowed: Vec<&[u8]> = segments.iter().map(|s| &s[..]).collect();
        let words = flatten_segments(&borrowed);
        let mut bytes = Word::words_to_bytes(&words).to_vec();
        bytes.extend([0xaa; 3]);

        let mut slice = &bytes[..];
        let message = read_message_from_flat_slice(&mut slice, message::ReaderOptions::new()).unwrap();
        assert_eq!(slice, &[0xaau8; 3][..]);
        let result = message.into_segments();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get_segment(1).unwrap(), &3u64.to_le_bytes());
    }

    #[test]
    fn flat_slice_truncated() {
        let segments = to_bytes(&[vec![1, 2, 3]]);
        let borrowed: Vec<&[u8]> = segments.iter().map(|s| &s[..]).collect();
        let words = flatten_segments(&borrowed);
        let bytes = Word::words_to_bytes(&words);
        let mut slice = &bytes[..bytes.len() - 8];
        match read_message_from_flat_slice(&mut slice, message::ReaderOptions::new()) {
            Ok(_) => panic!("expected truncation to be detected"),
            Err(e) => assert_eq!(e.kind, ErrorKind::PrematureEndOfFile),
        }
    }

    #[test]
    fn rewrite_segments_of_read_message() {
        let allocator = message::HeapAllocator::new().first_segment_words(1);
        let mut builder = message::Builder::new(allocator);
        {
            let mut names = builder.initn_root::<crate::text_list::Builder>(2).unwrap();
            names.set(0, "first").unwrap();
            names.set(1, "second").unwrap();
        }
        let mut original = Vec::new();
        write_message(&mut original, &builder).unwrap();

        let reader = read_message(&original[..], message::ReaderOptions::new()).unwrap();
        let segments = reader.into_segments();
        assert!(segments.len() > 1);

        let mut rewritten = Vec::new();
        write_message_segments(&mut rewritten, &segments).unwrap();
        assert_eq!(rewritten, original);

        let words = write_message_segments_to_words(&segments);
        assert_eq!(Word::words_to_bytes(&words), &original[..]);
        assert_eq!(
            Word::words_to_bytes(&write_message_to_words(&builder)),
            &original[..]
        );

        let mut slice = Word::words_to_bytes(&words);
        let message = read_message_from_flat_slice(&mut slice, message::ReaderOptions::new()).unwrap();
        let names = message.get_root::<crate::text_list::Reader>().unwrap();
        assert_eq!(names.get(1).unwrap(), "second");
    }

    #[test]
    fn check_round_trip() {
        fn round_trip(segments: Vec<Vec<u64>>) -> TestResult {
            if segments.is_empty() || segments.len() >= 512 {
                return TestResult::discard();
            }
            let segments = to_bytes(&segments);
            let borrowed: Vec<&[u8]> = segments.iter().map(|s| &s[..]).collect();
            let mut cursor = Cursor::new(Vec::new());
            super::write_segments(&mut cursor, &borrowed).unwrap();
            cursor.set_position(0);

            let message = read_message(&mut cursor, message::ReaderOptions::new()).unwrap();
            let result_segments = message.into_segments();

            TestResult::from_bool(
                result_segments.len() == segments.len()
                    && segments.iter().enumerate().all(|(i, segment)| {
                        &segment[..] == result_segments.get_segment(i as u32).unwrap()
                    }),
            )
        }

        quickcheck(round_trip as fn(Vec<Vec<u64>>) -> TestResult);
    }

    #[test]
    fn check_round_trip_flat_slice() {
        fn round_trip(segments: Vec<Vec<u64>>) -> TestResult {
            if segments.is_empty() || segments.len() >= 512 {
                return TestResult::discard();
            }
            let segments = to_bytes(&segments);
            let borrowed: Vec<&[u8]> = segments.iter().map(|s| &s[..]).collect();
            let words = flatten_segments(&borrowed);
            let mut slice = Word::words_to_bytes(&words);
            let message =
                read_message_from_flat_slice(&mut slice, message::ReaderOptions::new()).unwrap();
            let result_segments = message.into_segments();

            TestResult::from_bool(
                slice.is_empty()
                    && segments.iter().enumerate().all(|(i, segment)| {
                        &segment[..] == result_segments.get_segment(i as u32).unwrap()
                    }),
            )
        }

        quickcheck(round_trip as fn(Vec<Vec<u64>>) -> TestResult);
    }
}
