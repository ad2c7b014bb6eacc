//! A scatter-gather byte buffer: a sequence of fixed-size chunks rather
//! than one contiguous allocation.
//!
//! Grounded on the teacher's `common::segmented_buffer` (a cyclic buffer
//! of length-prefixed segments) and on design note "Dynamic buffer" in
//! SPEC_FULL.md/spec.md §9: a vector of fixed-size boxed buffers gives
//! bytes already appended a stable address, which a single contiguous
//! growable `Vec<u8>` cannot (a `Vec` reallocation moves everything).
//! Used both as the HTTP response-body accumulator and as a read target
//! for chunked file/archive I/O.

use std::collections::VecDeque;

use base_error::Result;
use byteorder::{ByteOrder, LittleEndian};

/// Size of one internal chunk. Matches the 64 KiB streaming granularity
/// used throughout the HTTP pipeline and zip engine (spec §4.4, §4.5).
pub const CHUNK_SIZE: usize = 64 * 1024;

struct Chunk {
    data: Vec<u8>,
}

pub struct DynamicBuffer {
    chunks: VecDeque<Chunk>,
    /// Bytes already consumed from the front of `chunks[0]`.
    front_offset: usize,
    /// Total number of unconsumed bytes across all chunks.
    len: usize,
}

impl Default for DynamicBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicBuffer {
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            front_offset: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends bytes, splitting across chunk boundaries as needed. Never
    /// touches bytes already written to an earlier chunk, so any address
    /// taken via `data()` before this call stays valid.
    pub fn append(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let need_new_chunk = match self.chunks.back() {
                Some(chunk) => chunk.data.len() >= CHUNK_SIZE,
                None => true,
            };
            if need_new_chunk {
                self.chunks.push_back(Chunk {
                    data: Vec::with_capacity(CHUNK_SIZE),
                });
            }

            let chunk = self.chunks.back_mut().unwrap();
            let room = CHUNK_SIZE - chunk.data.len();
            let n = room.min(data.len());
            chunk.data.extend_from_slice(&data[..n]);
            data = &data[n..];
            self.len += n;
        }
    }

    /// Drops a prefix of `n` unconsumed bytes.
    pub fn consume(&mut self, mut n: usize) {
        assert!(n <= self.len, "consume past end of DynamicBuffer");
        self.len -= n;

        while n > 0 {
            let chunk_len = self.chunks[0].data.len() - self.front_offset;
            if n < chunk_len {
                self.front_offset += n;
                n = 0;
            } else {
                n -= chunk_len;
                self.chunks.pop_front();
                self.front_offset = 0;
            }
        }
    }

    /// A gather view over the unconsumed bytes, suitable for a vectored
    /// write.
    pub fn data(&self) -> Vec<&[u8]> {
        self.data_range(0, self.len)
    }

    /// A typed view over `len` bytes starting at `offset` within the
    /// unconsumed region, for partial reads without consuming.
    pub fn data_range(&self, offset: usize, len: usize) -> Vec<&[u8]> {
        assert!(offset + len <= self.len, "DynamicBuffer::data_range out of bounds");

        let mut out = Vec::new();
        let mut skip = offset;
        let mut remaining = len;

        for (i, chunk) in self.chunks.iter().enumerate() {
            let start = if i == 0 { self.front_offset } else { 0 };
            let available = chunk.data.len() - start;

            if skip >= available {
                skip -= available;
                continue;
            }

            let slice_start = start + skip;
            skip = 0;
            let slice_len = (chunk.data.len() - slice_start).min(remaining);
            out.push(&chunk.data[slice_start..slice_start + slice_len]);
            remaining -= slice_len;

            if remaining == 0 {
                break;
            }
        }

        out
    }

    /// Copies the full unconsumed contents into one contiguous buffer.
    /// Only used at the edges (e.g. handing a complete cached response
    /// body to a caller); internal processing should prefer `data()`.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for slice in self.data() {
            out.extend_from_slice(slice);
        }
        out
    }

    /// Moves the first chunk's unconsumed bytes out, consuming them from
    /// this buffer. Enables a zero-copy handoff of one chunk straight to
    /// a file write, as opposed to copying through `to_vec()`.
    pub fn take_internal_buffer(&mut self) -> Option<Vec<u8>> {
        let chunk = self.chunks.pop_front()?;
        let taken = chunk.data[self.front_offset..].to_vec();
        self.len -= taken.len();
        self.front_offset = 0;
        Some(taken)
    }

    fn read_fixed<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        if offset + N > self.len {
            return Err(base_error::GenericError::EndOfFile.into());
        }
        let mut out = [0u8; N];
        let mut written = 0;
        for slice in self.data_range(offset, N) {
            out[written..written + slice.len()].copy_from_slice(slice);
            written += slice.len();
        }
        Ok(out)
    }

    pub fn read_u16_le(&self, offset: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(&self.read_fixed::<2>(offset)?))
    }

    pub fn read_u32_le(&self, offset: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(&self.read_fixed::<4>(offset)?))
    }

    pub fn read_u64_le(&self, offset: usize) -> Result<u64> {
        Ok(LittleEndian::read_u64(&self.read_fixed::<8>(offset)?))
    }
}
