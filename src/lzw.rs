// lzw.rs
//
// Copyright (c) 2020-2023  Douglas Lau
//
//! Lempel-Ziv-Welch decompression for GIF
use crate::error::{Error, Result};
use crate::subblock::BitReader;
use std::ops::AddAssign;

/// Code Bits
#[derive(Clone, Copy, Debug, PartialEq)]
struct Bits(u8);

impl From<u8> for Bits {
    fn from(bits: u8) -> Self {
        Bits(bits.min(Self::MAX.0))
    }
}

impl From<Bits> for u8 {
    fn from(bits: Bits) -> Self {
        bits.0
    }
}

impl AddAssign<u8> for Bits {
    fn add_assign(&mut self, rhs: u8) {
        self.0 = (self.0 + rhs).min(Self::MAX.0)
    }
}

impl Bits {
    /// Maximum code bits allowed for GIF
    const MAX: Self = Bits(12);

    /// Get the number of entries
    fn entries(self) -> u16 {
        1 << (self.0 as u16)
    }
}

/// Code type
type Code = u16;

/// Dictionary capacity
const CAPACITY: usize = 1 << 12;

/// Dictionary node (prefix code + suffix index)
#[derive(Clone, Copy, Debug, Default)]
struct Node {
    /// Prefix code
    prefix: Option<Code>,
    /// Suffix index
    suffix: u8,
    /// First index of the whole sequence
    first: u8,
}

/// Code dictionary, addressed directly by code
#[derive(Debug)]
struct Dictionary {
    /// Table of codes
    table: Box<[Node]>,
    /// Next free code
    next_code: Code,
    /// Minimum code bits
    min_code_bits: u8,
}

impl Dictionary {
    /// Create a new code dictionary
    fn new(min_code_bits: u8) -> Self {
        let mut dict = Dictionary {
            table: vec![Node::default(); CAPACITY].into_boxed_slice(),
            next_code: 0,
            min_code_bits,
        };
        dict.reset();
        dict
    }

    /// Get the clear code
    fn clear_code(&self) -> Code {
        1 << self.min_code_bits
    }

    /// Get the end code
    fn end_code(&self) -> Code {
        self.clear_code() + 1
    }

    /// Check if every code is defined
    fn is_full(&self) -> bool {
        usize::from(self.next_code) >= CAPACITY
    }

    /// Reset the dictionary
    fn reset(&mut self) {
        for code in 0..self.clear_code() {
            let byte = code as u8;
            self.table[usize::from(code)] = Node {
                prefix: None,
                suffix: byte,
                first: byte,
            };
        }
        self.next_code = self.end_code() + 1;
    }

    /// Check if a code has a sequence
    fn is_defined(&self, code: Code) -> bool {
        code < self.clear_code()
            || (code > self.end_code() && code < self.next_code)
    }

    /// Get the first index of a code's sequence
    fn first(&self, code: Code) -> u8 {
        self.table[usize::from(code)].first
    }

    /// Push a node into the next free slot
    fn push_node(&mut self, prefix: Code, suffix: u8) {
        debug_assert!(!self.is_full());
        let first = self.first(prefix);
        self.table[usize::from(self.next_code)] = Node {
            prefix: Some(prefix),
            suffix,
            first,
        };
        self.next_code += 1;
    }

    /// Decompress a code into a buffer
    fn decompress(&self, code: Code, buffer: &mut Vec<u8>) {
        let start = buffer.len();
        let mut node = self.table[usize::from(code)];
        while let Some(prefix) = node.prefix {
            buffer.push(node.suffix);
            node = self.table[usize::from(prefix)];
        }
        buffer.push(node.suffix);
        buffer[start..].reverse();
    }
}

/// LZW Data Decompressor
#[derive(Debug)]
pub struct Decompressor {
    /// Code dictionary
    dict: Dictionary,
    /// Minimum code bits
    min_code_bits: u8,
    /// Current code bits
    code_bits: Bits,
    /// Last code
    last: Option<Code>,
}

impl Decompressor {
    /// Create a new decompressor.
    ///
    /// The minimum code size must be between 1 and 8, since indices are
    /// bytes.
    pub fn new(min_code_bits: u8) -> Result<Self> {
        if !(1..=8).contains(&min_code_bits) {
            return Err(Error::InvalidCodeSize(min_code_bits));
        }
        Ok(Decompressor {
            dict: Dictionary::new(min_code_bits),
            min_code_bits,
            code_bits: Bits::from(min_code_bits + 1),
            last: None,
        })
    }

    /// Reset the dictionary and code width
    fn reset(&mut self) {
        self.dict.reset();
        self.code_bits = Bits::from(self.min_code_bits + 1);
        self.last = None;
    }

    /// Decompress codes until the end code.
    ///
    /// * `bits` Compressed data.
    /// * `buffer` Output indices.
    /// * `limit` Maximum number of indices expected.
    pub fn decompress(
        &mut self,
        bits: &mut BitReader,
        buffer: &mut Vec<u8>,
        limit: usize,
    ) -> Result<()> {
        let start = buffer.len();
        let code = bits.read_code(self.code_bits.into())?;
        if code != self.dict.clear_code() {
            warn!("LZW data missing leading clear code");
        }
        let mut code = Some(code);
        loop {
            let c = match code.take() {
                Some(c) => c,
                None => bits.read_code(self.code_bits.into())?,
            };
            if c == self.dict.clear_code() {
                debug!("LZW reset at {} indices", buffer.len() - start);
                self.reset();
            } else if c == self.dict.end_code() {
                break;
            } else {
                self.decompress_code(c, buffer)?;
                let actual = buffer.len() - start;
                if actual > limit {
                    return Err(Error::FrameSizeMismatch {
                        expected: limit,
                        actual,
                    });
                }
            }
        }
        if bits.remaining_bytes() > 0 {
            warn!("{} bytes after LZW end code", bits.remaining_bytes());
        }
        Ok(())
    }

    /// Decompress one data code
    fn decompress_code(
        &mut self,
        code: Code,
        buffer: &mut Vec<u8>,
    ) -> Result<()> {
        match self.last {
            None => {
                if !self.dict.is_defined(code) {
                    return Err(Error::InvalidLzwCode(code));
                }
                self.dict.decompress(code, buffer);
                // with 1-bit minimum, the next code already needs 3 bits
                self.grow();
            }
            Some(last) => {
                if self.dict.is_defined(code) {
                    self.dict.decompress(code, buffer);
                    if !self.dict.is_full() {
                        self.dict.push_node(last, self.dict.first(code));
                        self.grow();
                    }
                } else if self.dict.is_full() {
                    // a full 12-bit dictionary has no undefined codes
                    return Err(Error::DictionaryOverflow);
                } else if code == self.dict.next_code {
                    // code is defined by this step: last + first(last)
                    self.dict.push_node(last, self.dict.first(last));
                    self.dict.decompress(code, buffer);
                    self.grow();
                } else {
                    return Err(Error::InvalidLzwCode(code));
                }
            }
        }
        self.last = Some(code);
        Ok(())
    }

    /// Widen codes once the next code needs one more bit
    fn grow(&mut self) {
        if self.dict.next_code >= self.code_bits.entries()
            && self.code_bits != Bits::MAX
        {
            self.code_bits += 1;
        }
    }
}

/// Decompress LZW data into color indices.
///
/// * `min_code_bits` LZW minimum code size.
/// * `data` Compressed bytes (sub-blocks concatenated).
/// * `limit` Maximum number of indices expected.
pub fn decompress(min_code_bits: u8, data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut dec = Decompressor::new(min_code_bits)?;
    let mut bits = BitReader::new(data);
    let mut buffer = Vec::with_capacity(limit);
    dec.decompress(&mut bits, &mut buffer, limit)?;
    Ok(buffer)
}

/// Pack literal indices as LZW codes (test fixtures only).
///
/// Code widths follow the decoder: each literal after the first one since a
/// clear code defines one dictionary entry.
#[cfg(test)]
pub(crate) fn pack_literals(
    min_code_bits: u8,
    indices: &[u8],
    clear_at: &[usize],
) -> Vec<u8> {
    let clear: u32 = 1 << min_code_bits;
    let mut out = vec![];
    let mut acc = 0u32;
    let mut n_bits = 0;
    let mut pack = |code: u32, width: u8, out: &mut Vec<u8>| {
        acc |= code << n_bits;
        n_bits += width;
        while n_bits >= 8 {
            out.push(acc as u8);
            acc >>= 8;
            n_bits -= 8;
        }
    };
    let mut width = min_code_bits + 1;
    let mut next = clear + 2;
    let mut first = true;
    pack(clear, width, &mut out);
    for (i, idx) in indices.iter().enumerate() {
        if clear_at.contains(&i) {
            pack(clear, width, &mut out);
            width = min_code_bits + 1;
            next = clear + 2;
            first = true;
        }
        pack(u32::from(*idx), width, &mut out);
        if !first && next < CAPACITY as u32 {
            next += 1;
        }
        if next >= 1 << width && width < 12 {
            width += 1;
        }
        first = false;
    }
    pack(clear + 1, width, &mut out);
    if n_bits > 0 {
        out.push(acc as u8);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    /// Pack codes with explicit widths
    fn pack(codes: &[(u16, u8)]) -> Vec<u8> {
        let mut out = vec![];
        let mut acc = 0u32;
        let mut n_bits = 0;
        for (code, width) in codes {
            acc |= u32::from(*code) << n_bits;
            n_bits += width;
            while n_bits >= 8 {
                out.push(acc as u8);
                acc >>= 8;
                n_bits -= 8;
            }
        }
        if n_bits > 0 {
            out.push(acc as u8);
        }
        out
    }

    #[test]
    fn simple_2x2() -> Result<()> {
        let data = decompress(2, &[0x0C, 0x10, 0x05], 4)?;
        assert_eq!(data, [1, 0, 0, 1]);
        Ok(())
    }

    #[test]
    fn simple_10x10() -> Result<()> {
        let data = [
            0x8C, 0x2D, 0x99, 0x87, 0x2A, 0x1C, 0xDC, 0x33, 0xA0, 0x02, 0x75,
            0xEC, 0x95, 0xFA, 0xA8, 0xDE, 0x60, 0x8C, 0x04, 0x91, 0x4C, 0x01,
        ];
        let image = [
            1, 1, 1, 1, 1, 2, 2, 2, 2, 2,
            1, 1, 1, 1, 1, 2, 2, 2, 2, 2,
            1, 1, 1, 1, 1, 2, 2, 2, 2, 2,
            1, 1, 1, 0, 0, 0, 0, 2, 2, 2,
            1, 1, 1, 0, 0, 0, 0, 2, 2, 2,
            2, 2, 2, 0, 0, 0, 0, 1, 1, 1,
            2, 2, 2, 0, 0, 0, 0, 1, 1, 1,
            2, 2, 2, 2, 2, 1, 1, 1, 1, 1,
            2, 2, 2, 2, 2, 1, 1, 1, 1, 1,
            2, 2, 2, 2, 2, 1, 1, 1, 1, 1,
        ];
        assert_eq!(decompress(2, &data, 100)?, image);
        Ok(())
    }

    #[test]
    fn kwk() -> Result<()> {
        // clear, 1, 6 (not yet defined: [1, 1]), end
        let data = pack(&[(4, 3), (1, 3), (6, 3), (5, 3)]);
        assert_eq!(decompress(2, &data, 3)?, [1, 1, 1]);
        // clear, 2, 3, 7 (not yet defined: [3, 3]), end
        let data = pack(&[(4, 3), (2, 3), (3, 3), (7, 3), (5, 4)]);
        assert_eq!(decompress(2, &data, 4)?, [2, 3, 3, 3]);
        Ok(())
    }

    #[test]
    fn missing_clear_code() -> Result<()> {
        let data = pack(&[(1, 3), (2, 3), (5, 3)]);
        assert_eq!(decompress(2, &data, 2)?, [1, 2]);
        Ok(())
    }

    #[test]
    fn invalid_code() {
        // 7 is beyond next free code (6)
        let data = pack(&[(4, 3), (1, 3), (7, 3), (5, 3)]);
        assert!(matches!(
            decompress(2, &data, 4),
            Err(Error::InvalidLzwCode(7))
        ));
        // first code after clear must be a literal
        let data = pack(&[(4, 3), (6, 3), (5, 3)]);
        assert!(matches!(
            decompress(2, &data, 4),
            Err(Error::InvalidLzwCode(6))
        ));
    }

    #[test]
    fn truncated() {
        let data = pack(&[(4, 3), (1, 3), (1, 3)]);
        assert!(matches!(decompress(2, &data, 4), Err(Error::TruncatedCode)));
        assert!(matches!(decompress(2, &[], 4), Err(Error::TruncatedCode)));
    }

    #[test]
    fn too_much_data() {
        let data = pack_literals(2, &[1, 2, 3, 0, 1], &[]);
        match decompress(2, &data, 4) {
            Err(Error::FrameSizeMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (4, 5));
            }
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn code_size() {
        assert!(matches!(Decompressor::new(0), Err(Error::InvalidCodeSize(0))));
        assert!(matches!(
            Decompressor::new(9),
            Err(Error::InvalidCodeSize(9))
        ));
        assert!(Decompressor::new(8).is_ok());
    }

    #[test]
    fn min_code_one() -> Result<()> {
        // clear and first literal at 2 bits, then 3 bits
        let data = pack(&[(2, 2), (0, 2), (1, 3), (3, 3)]);
        assert_eq!(decompress(1, &data, 2)?, [0, 1]);
        let indices = [0, 1, 1, 0, 0, 0, 1, 1, 1, 1, 0, 1, 0, 0];
        let data = pack_literals(1, &indices, &[5]);
        assert_eq!(decompress(1, &data, indices.len())?, indices);
        Ok(())
    }

    #[test]
    fn full_dictionary() -> Result<()> {
        // enough literals to fill all 4096 entries without a clear code
        let indices: Vec<u8> = (0..6000).map(|i| (i * 7 % 251) as u8).collect();
        let data = pack_literals(8, &indices, &[]);
        assert_eq!(decompress(8, &data, indices.len())?, indices);
        let data = pack_literals(8, &indices, &[4000, 4500]);
        assert_eq!(decompress(8, &data, indices.len())?, indices);
        Ok(())
    }

    #[test]
    fn code_growth() -> Result<()> {
        let indices: Vec<u8> = (0..40).map(|i| (i % 4) as u8).collect();
        let data = pack_literals(2, &indices, &[]);
        let mut dec = Decompressor::new(2)?;
        let mut buf = vec![];
        dec.decompress(&mut BitReader::new(&data), &mut buf, 40)?;
        assert_eq!(u8::from(dec.code_bits), 6);
        assert_eq!(dec.dict.next_code, 6 + 39);
        Ok(())
    }

    quickcheck! {
        fn clear_code_resets_state(indices: Vec<u8>, at: usize) -> bool {
            let indices: Vec<u8> = indices.iter().map(|i| i % 16).collect();
            if indices.is_empty() {
                return true;
            }
            let at = at % indices.len();
            let data = clear_then_end(4, &indices[..at]);
            let mut dec = match Decompressor::new(4) {
                Ok(dec) => dec,
                Err(_) => return false,
            };
            let mut buf = vec![];
            let ok = dec
                .decompress(&mut BitReader::new(&data), &mut buf, indices.len())
                .is_ok();
            ok && buf == indices[..at]
                && u8::from(dec.code_bits) == 5
                && dec.dict.next_code == 18
        }
    }

    /// Pack literals followed by a clear code and an end code
    fn clear_then_end(min_code_bits: u8, indices: &[u8]) -> Vec<u8> {
        let clear = 1u16 << min_code_bits;
        let mut codes = vec![(clear, min_code_bits + 1)];
        let mut width = min_code_bits + 1;
        let mut next = clear + 2;
        for (i, idx) in indices.iter().enumerate() {
            codes.push((u16::from(*idx), width));
            if i > 0 && usize::from(next) < CAPACITY {
                next += 1;
                if next >= 1 << width && width < 12 {
                    width += 1;
                }
            }
        }
        codes.push((clear, width));
        codes.push((clear + 1, min_code_bits + 1));
        pack(&codes)
    }
}
