//! RFC 1951 DEFLATE: a whole-buffer `inflate` plus a streaming
//! `inflate_streaming` that flushes decompressed output to a sink in
//! `STREAM_CHUNK_SIZE` increments, and a writer that emits valid (if
//! unambitious) fixed-Huffman streams.
//!
//! Grounded on the teacher's `compression::deflate` module
//! (`read_inflate`, `fixed_huffman_lenlit_tree`/`fixed_huffman_dist_tree`,
//! the `CyclicBuffer`/`MatchingWindow` LZ77 matcher). The zip engine
//! (spec §4.4) only requires *reading* arbitrary deflate streams and
//! *writing* ones it can round-trip itself, so the LZ77 match finder is
//! not reimplemented here — the writer emits literal-only fixed blocks.
//! This is recorded as a simplification in DESIGN.md.

use async_trait::async_trait;
use base_error::{Result, StreamError};

use crate::bits::{BitReader, BitWriter};
use crate::huffman::{HuffmanDecoder, HuffmanEncoder};

/// The furthest a DEFLATE back-reference can legally reach (a 15-bit
/// distance code plus up to 13 extra bits never exceeds this).
/// `inflate_streaming` never discards output more recent than this, so
/// every valid back-reference still resolves against what's retained.
const WINDOW_SIZE: usize = 32 * 1024;

/// How much decompressed output `inflate_streaming` accumulates before
/// handing a chunk to its sink — the same figure the zip reader chunks
/// its compressed-byte reads by (spec §4.4's 64 KiB streaming design).
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Destination for `inflate_streaming`'s decompressed output, one chunk
/// at a time, so a caller can write each chunk to disk as it arrives
/// instead of waiting on the whole entry.
#[async_trait]
pub trait InflateSink: Send {
    async fn write(&mut self, chunk: &[u8]) -> Result<()>;
}

const BTYPE_NO_COMPRESSION: u32 = 0;
const BTYPE_FIXED_CODES: u32 = 1;
const BTYPE_DYNAMIC_CODES: u32 = 2;

const END_OF_BLOCK: u16 = 256;

const CODE_LEN_CODE_LEN_ORDERING: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// (extra_bits, base_length) indexed by litlen code - 257.
const LENGTH_TABLE: [(u8, u16); 29] = [
    (0, 3), (0, 4), (0, 5), (0, 6), (0, 7), (0, 8), (0, 9), (0, 10),
    (1, 11), (1, 13), (1, 15), (1, 17),
    (2, 19), (2, 23), (2, 27), (2, 31),
    (3, 35), (3, 43), (3, 51), (3, 59),
    (4, 67), (4, 83), (4, 99), (4, 115),
    (5, 131), (5, 163), (5, 195), (5, 227),
    (0, 258),
];

/// (extra_bits, base_distance) indexed by distance code.
const DISTANCE_TABLE: [(u8, u16); 30] = [
    (0, 1), (0, 2), (0, 3), (0, 4),
    (1, 5), (1, 7),
    (2, 9), (2, 13),
    (3, 17), (3, 25),
    (4, 33), (4, 49),
    (5, 65), (5, 97),
    (6, 129), (6, 193),
    (7, 257), (7, 385),
    (8, 513), (8, 769),
    (9, 1025), (9, 1537),
    (10, 2049), (10, 3073),
    (11, 4097), (11, 6145),
    (12, 8193), (12, 12289),
    (13, 16385), (13, 24577),
];

fn fixed_litlen_lens() -> Vec<u16> {
    let mut lens = vec![0u16; 288];
    for (i, l) in lens.iter_mut().enumerate() {
        *l = if i < 144 {
            8
        } else if i < 256 {
            9
        } else if i < 280 {
            7
        } else {
            8
        };
    }
    lens
}

fn fixed_dist_lens() -> Vec<u16> {
    vec![5u16; 30]
}

fn read_length(code: u16, reader: &mut BitReader) -> Result<usize> {
    let idx = (code - 257) as usize;
    if idx >= LENGTH_TABLE.len() {
        return Err(StreamError::InvalidBackReference.into());
    }
    let (extra, base) = LENGTH_TABLE[idx];
    let extra_val = if extra > 0 { reader.read_bits(extra)? } else { 0 };
    Ok(base as usize + extra_val as usize)
}

fn read_distance(code: u16, reader: &mut BitReader) -> Result<usize> {
    let idx = code as usize;
    if idx >= DISTANCE_TABLE.len() {
        return Err(StreamError::InvalidBackReference.into());
    }
    let (extra, base) = DISTANCE_TABLE[idx];
    let extra_val = if extra > 0 { reader.read_bits(extra)? } else { 0 };
    Ok(base as usize + extra_val as usize)
}

fn read_dynamic_lens(
    reader: &mut BitReader,
    code_len_decoder: &HuffmanDecoder,
    nsymbols: usize,
) -> Result<Vec<u16>> {
    let mut lens = Vec::with_capacity(nsymbols);
    while lens.len() < nsymbols {
        let c = code_len_decoder.read_symbol(reader)?;
        match c {
            0..=15 => lens.push(c),
            16 => {
                let n = 3 + reader.read_bits(2)?;
                let last = *lens.last().ok_or(StreamError::InvalidHuffmanCode)?;
                for _ in 0..n {
                    lens.push(last);
                }
            }
            17 => {
                let n = 3 + reader.read_bits(3)?;
                for _ in 0..n {
                    lens.push(0);
                }
            }
            18 => {
                let n = 11 + reader.read_bits(7)?;
                for _ in 0..n {
                    lens.push(0);
                }
            }
            _ => return Err(StreamError::InvalidHuffmanCode.into()),
        }
    }
    lens.truncate(nsymbols);
    Ok(lens)
}

fn read_block_codes(
    reader: &mut BitReader,
    litlen: &HuffmanDecoder,
    dist: &HuffmanDecoder,
    out: &mut Vec<u8>,
) -> Result<()> {
    loop {
        let code = litlen.read_symbol(reader)?;
        if code < END_OF_BLOCK {
            out.push(code as u8);
        } else if code == END_OF_BLOCK {
            return Ok(());
        } else {
            let len = read_length(code, reader)?;
            let dist_code = dist.read_symbol(reader)?;
            let distance = read_distance(dist_code, reader)?;

            if distance == 0 || distance > out.len() {
                return Err(StreamError::InvalidBackReference.into());
            }

            let start = out.len() - distance;
            for i in 0..len {
                let byte = out[start + i];
                out.push(byte);
            }
        }
    }
}

/// Flushes `out`'s unflushed tail to `sink` once it reaches
/// `STREAM_CHUNK_SIZE`, then trims `out` down to `WINDOW_SIZE` bytes so
/// memory use stays bounded by the window rather than the whole entry.
async fn flush_and_trim(
    out: &mut Vec<u8>,
    discarded: &mut u64,
    flushed: &mut u64,
    sink: &mut dyn InflateSink,
) -> Result<()> {
    let total = *discarded + out.len() as u64;
    if total - *flushed < STREAM_CHUNK_SIZE as u64 {
        return Ok(());
    }

    let start = (*flushed - *discarded) as usize;
    sink.write(&out[start..]).await?;
    *flushed = total;

    if out.len() > WINDOW_SIZE {
        let drop = out.len() - WINDOW_SIZE;
        out.drain(0..drop);
        *discarded += drop as u64;
    }
    Ok(())
}

/// Flushes whatever remains unflushed regardless of `STREAM_CHUNK_SIZE`,
/// used once the final block has been decoded.
async fn flush_remaining(out: &[u8], discarded: u64, flushed: &mut u64, sink: &mut dyn InflateSink) -> Result<()> {
    let total = discarded + out.len() as u64;
    if total > *flushed {
        let start = (*flushed - discarded) as usize;
        sink.write(&out[start..]).await?;
        *flushed = total;
    }
    Ok(())
}

/// Same decode as `read_block_codes`, but flushes/trims `out` after
/// every symbol instead of only at block boundaries — a single block
/// can hold far more than one window's worth of output.
#[allow(clippy::too_many_arguments)]
async fn read_block_codes_streaming(
    reader: &mut BitReader,
    litlen: &HuffmanDecoder,
    dist: &HuffmanDecoder,
    out: &mut Vec<u8>,
    discarded: &mut u64,
    flushed: &mut u64,
    sink: &mut dyn InflateSink,
) -> Result<()> {
    loop {
        let code = litlen.read_symbol(reader)?;
        if code < END_OF_BLOCK {
            out.push(code as u8);
        } else if code == END_OF_BLOCK {
            return Ok(());
        } else {
            let len = read_length(code, reader)?;
            let dist_code = dist.read_symbol(reader)?;
            let distance = read_distance(dist_code, reader)?;

            if distance == 0 || distance > out.len() {
                return Err(StreamError::InvalidBackReference.into());
            }

            let start = out.len() - distance;
            for i in 0..len {
                let byte = out[start + i];
                out.push(byte);
            }
        }

        flush_and_trim(out, discarded, flushed, sink).await?;
    }
}

/// Inflates a deflate stream, handing decompressed output to `sink` in
/// `STREAM_CHUNK_SIZE` increments rather than materializing the whole
/// entry before any byte is usable (spec §4.4's 64 KiB streaming
/// design). Keeps at most `WINDOW_SIZE` bytes of already-flushed history
/// in memory, discarding anything further back the moment it's flushed.
pub async fn inflate_streaming(data: &[u8], sink: &mut dyn InflateSink) -> Result<()> {
    let mut reader = BitReader::new(data);
    let mut out: Vec<u8> = Vec::new();
    let mut discarded: u64 = 0;
    let mut flushed: u64 = 0;

    loop {
        let bfinal = reader.read_bits(1)?;
        let btype = reader.read_bits(2)?;

        match btype {
            BTYPE_NO_COMPRESSION => {
                reader.align_to_byte();
                let len_bytes = reader.read_aligned_bytes(4)?;
                let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]);
                let nlen = u16::from_le_bytes([len_bytes[2], len_bytes[3]]);
                if len != !nlen {
                    return Err(StreamError::InvalidBlockHeader.into());
                }
                let block = reader.read_aligned_bytes(len as usize)?.to_vec();
                out.extend_from_slice(&block);
                flush_and_trim(&mut out, &mut discarded, &mut flushed, sink).await?;
            }
            BTYPE_FIXED_CODES => {
                let litlen = HuffmanDecoder::from_lens(&fixed_litlen_lens())?;
                let dist = HuffmanDecoder::from_lens(&fixed_dist_lens())?;
                read_block_codes_streaming(&mut reader, &litlen, &dist, &mut out, &mut discarded, &mut flushed, sink)
                    .await?;
            }
            BTYPE_DYNAMIC_CODES => {
                let hlit = reader.read_bits(5)? as usize + 257;
                let hdist = reader.read_bits(5)? as usize + 1;
                let hclen = reader.read_bits(4)? as usize + 4;

                let mut code_len_lens = [0u16; 19];
                for i in 0..hclen {
                    code_len_lens[CODE_LEN_CODE_LEN_ORDERING[i]] = reader.read_bits(3)? as u16;
                }
                let code_len_decoder = HuffmanDecoder::from_lens(&code_len_lens)?;

                let all_lens = read_dynamic_lens(&mut reader, &code_len_decoder, hlit + hdist)?;
                let litlen = HuffmanDecoder::from_lens(&all_lens[0..hlit])?;
                let dist = HuffmanDecoder::from_lens(&all_lens[hlit..])?;

                read_block_codes_streaming(&mut reader, &litlen, &dist, &mut out, &mut discarded, &mut flushed, sink)
                    .await?;
            }
            _ => return Err(StreamError::InvalidBlockHeader.into()),
        }

        if bfinal != 0 {
            flush_remaining(&out, discarded, &mut flushed, sink).await?;
            break;
        }
    }

    Ok(())
}

/// Inflates a full deflate stream into one buffer. For entries large
/// enough that holding the whole decompressed output in memory matters,
/// use `inflate_streaming` instead; this is kept for the small fixed
/// blocks `deflate` itself produces and for tests.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = BitReader::new(data);
    let mut out = Vec::new();

    loop {
        let bfinal = reader.read_bits(1)?;
        let btype = reader.read_bits(2)?;

        match btype {
            BTYPE_NO_COMPRESSION => {
                reader.align_to_byte();
                let len_bytes = reader.read_aligned_bytes(4)?;
                let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]);
                let nlen = u16::from_le_bytes([len_bytes[2], len_bytes[3]]);
                if len != !nlen {
                    return Err(StreamError::InvalidBlockHeader.into());
                }
                let data = reader.read_aligned_bytes(len as usize)?;
                out.extend_from_slice(data);
            }
            BTYPE_FIXED_CODES => {
                let litlen = HuffmanDecoder::from_lens(&fixed_litlen_lens())?;
                let dist = HuffmanDecoder::from_lens(&fixed_dist_lens())?;
                read_block_codes(&mut reader, &litlen, &dist, &mut out)?;
            }
            BTYPE_DYNAMIC_CODES => {
                let hlit = reader.read_bits(5)? as usize + 257;
                let hdist = reader.read_bits(5)? as usize + 1;
                let hclen = reader.read_bits(4)? as usize + 4;

                let mut code_len_lens = [0u16; 19];
                for i in 0..hclen {
                    code_len_lens[CODE_LEN_CODE_LEN_ORDERING[i]] = reader.read_bits(3)? as u16;
                }
                let code_len_decoder = HuffmanDecoder::from_lens(&code_len_lens)?;

                let all_lens = read_dynamic_lens(&mut reader, &code_len_decoder, hlit + hdist)?;
                let litlen = HuffmanDecoder::from_lens(&all_lens[0..hlit])?;
                let dist = HuffmanDecoder::from_lens(&all_lens[hlit..])?;

                read_block_codes(&mut reader, &litlen, &dist, &mut out)?;
            }
            _ => return Err(StreamError::InvalidBlockHeader.into()),
        }

        if bfinal != 0 {
            break;
        }
    }

    Ok(out)
}

/// Compresses `data` into a single final fixed-Huffman block. No LZ77
/// matching is performed (see module docs); every byte is emitted as a
/// literal.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let litlen_lens = fixed_litlen_lens();
    let encoder = HuffmanEncoder::from_lens(&litlen_lens);

    let mut writer = BitWriter::new();
    writer.write_bits(1, 1); // BFINAL
    writer.write_bits(BTYPE_FIXED_CODES, 2);

    for &byte in data {
        encoder.write_symbol(&mut writer, byte as u16);
    }
    encoder.write_symbol(&mut writer, END_OF_BLOCK);

    writer.into_bytes()
}
