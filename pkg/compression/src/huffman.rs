//! Canonical Huffman coding (RFC 1951 §3.2.2), used for both the fixed
//! and dynamic blocks in deflate/inflate.
//!
//! Grounded on the teacher's `compression::huffman` module
//! (`HuffmanTree`/`huffman_canonical_codes_from_lens`), with the
//! decode side rewritten as a flat code-length-indexed table instead of
//! a pointer tree — cheaper to build and to query per symbol, and the
//! canonical-code derivation it's built from is identical to the
//! teacher's.

use std::collections::HashMap;

use base_error::{Result, StreamError};

use crate::bits::{BitReader, BitWriter};

/// Derives canonical codes from per-symbol code lengths, in symbol
/// order. A zero length means the symbol is unused.
pub fn canonical_codes_from_lens(lens: &[u16]) -> Vec<(u16, u16)> {
    let max_len = lens.iter().cloned().max().unwrap_or(0) as usize;

    let mut bl_count = vec![0u32; max_len + 1];
    for &l in lens {
        if l > 0 {
            bl_count[l as usize] += 1;
        }
    }

    let mut next_code = vec![0u32; max_len + 2];
    let mut code = 0u32;
    for bits in 1..=max_len {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    let mut out = Vec::with_capacity(lens.len());
    for &len in lens {
        if len == 0 {
            out.push((0, 0));
            continue;
        }
        let c = next_code[len as usize];
        next_code[len as usize] += 1;
        out.push((c as u16, len));
    }
    out
}

/// Decodes one symbol at a time against a canonical-length table.
pub struct HuffmanDecoder {
    /// Maps (code_length, code_value) -> symbol. Small alphabets (at
    /// most 288 litlen symbols, 30 distance symbols, 19 code-length
    /// symbols) make a hash lookup per bit-length cheap enough.
    by_len: HashMap<(u8, u16), u16>,
    max_len: u8,
}

impl HuffmanDecoder {
    pub fn from_lens(lens: &[u16]) -> Result<Self> {
        let codes = canonical_codes_from_lens(lens);
        let mut by_len = HashMap::new();
        let mut max_len = 0u8;
        for (symbol, &(code, len)) in codes.iter().enumerate() {
            if len == 0 {
                continue;
            }
            by_len.insert((len as u8, code), symbol as u16);
            max_len = max_len.max(len as u8);
        }
        if by_len.is_empty() {
            return Err(StreamError::InvalidHuffmanCode.into());
        }
        Ok(Self { by_len, max_len })
    }

    /// Reads bits one at a time (MSB-first within the *code*, though the
    /// underlying stream is read LSB-first per RFC 1951 §3.1.1) until a
    /// valid code of some length is recognized.
    pub fn read_symbol(&self, reader: &mut BitReader) -> Result<u16> {
        let mut code: u16 = 0;
        for len in 1..=self.max_len {
            let bit = reader.read_bit()?;
            code = (code << 1) | (bit as u16);
            if let Some(&symbol) = self.by_len.get(&(len, code)) {
                return Ok(symbol);
            }
        }
        Err(StreamError::InvalidHuffmanCode.into())
    }
}

/// Encodes symbols against a fixed set of canonical codes. Used by the
/// deflate writer, which only ever emits fixed Huffman blocks.
pub struct HuffmanEncoder {
    codes: Vec<(u16, u16)>,
}

impl HuffmanEncoder {
    pub fn from_lens(lens: &[u16]) -> Self {
        Self {
            codes: canonical_codes_from_lens(lens),
        }
    }

    pub fn write_symbol(&self, writer: &mut BitWriter, symbol: u16) {
        let (code, len) = self.codes[symbol as usize];
        // Huffman codes are conceptually MSB-first; reverse into the
        // stream's LSB-first bit order one bit at a time.
        for i in (0..len).rev() {
            let bit = (code >> i) & 1;
            writer.write_bits(bit as u32, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_codes_match_rfc_example() {
        // RFC 1951 §3.2.2 worked example.
        let lens = [3u16, 3, 3, 3, 3, 2, 4, 4];
        let codes = canonical_codes_from_lens(&lens);
        assert_eq!(codes[5], (0b00, 2));
        assert_eq!(codes[0], (0b010, 3));
        assert_eq!(codes[6], (0b1110, 4));
        assert_eq!(codes[7], (0b1111, 4));
    }

    #[test]
    fn encode_then_decode_roundtrip() {
        let lens = [3u16, 3, 3, 3, 3, 2, 4, 4];
        let encoder = HuffmanEncoder::from_lens(&lens);
        let decoder = HuffmanDecoder::from_lens(&lens).unwrap();

        let mut w = BitWriter::new();
        for &sym in &[5u16, 0, 7, 6, 5] {
            encoder.write_symbol(&mut w, sym);
        }
        let bytes = w.into_bytes();

        let mut r = BitReader::new(&bytes);
        for &expected in &[5u16, 0, 7, 6, 5] {
            assert_eq!(decoder.read_symbol(&mut r).unwrap(), expected);
        }
    }
}
