// subblock.rs
//
// Copyright (c) 2019-2023  Douglas Lau
//
//! Byte cursor, data sub-blocks and LSB-first bit reader
use crate::error::{Error, Result};

/// Cursor into a GIF byte stream
#[derive(Clone, Debug)]
pub(crate) struct Cursor<'a> {
    /// Entire stream
    buf: &'a [u8],
    /// Current position
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a new cursor at the start of a buffer
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    /// Get the current position
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Check whether all bytes have been consumed
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Read a slice of `n` bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::TruncatedStream)?;
        let bytes =
            self.buf.get(self.pos..end).ok_or(Error::TruncatedStream)?;
        self.pos = end;
        Ok(bytes)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read a little-endian 16-bit value
    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a sequence of data sub-blocks, calling `f` with each one.
    ///
    /// Stops after the zero-length terminator.
    pub fn for_each_sub_block<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&'a [u8]),
    {
        loop {
            let len = self.read_u8()?;
            if len == 0 {
                return Ok(());
            }
            f(self.read_bytes(len.into())?);
        }
    }

    /// Read data sub-blocks, concatenated into one buffer
    pub fn read_sub_blocks(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.for_each_sub_block(|b| data.extend_from_slice(b))?;
        Ok(data)
    }

    /// Read data sub-blocks, keeping each one separate
    pub fn read_sub_block_list(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut blocks = Vec::new();
        self.for_each_sub_block(|b| blocks.push(b.to_vec()))?;
        Ok(blocks)
    }

    /// Skip data sub-blocks
    pub fn skip_sub_blocks(&mut self) -> Result<()> {
        self.for_each_sub_block(|_| ())
    }
}

/// Bit reader over compressed data.
///
/// Bits are consumed least-significant first within each byte, with bytes
/// in stream order.
#[derive(Debug)]
pub struct BitReader<'a> {
    /// Compressed bytes
    bytes: &'a [u8],
    /// Byte position
    pos: usize,
    /// Bit accumulator
    acc: u32,
    /// Number of valid bits in accumulator
    n_bits: u8,
}

impl<'a> BitReader<'a> {
    /// Create a new bit reader
    pub fn new(bytes: &'a [u8]) -> Self {
        BitReader {
            bytes,
            pos: 0,
            acc: 0,
            n_bits: 0,
        }
    }

    /// Read one code of `n_bits` bits (at most 16)
    pub fn read_code(&mut self, n_bits: u8) -> Result<u16> {
        debug_assert!(n_bits > 0 && n_bits <= 16);
        while self.n_bits < n_bits {
            let byte = *self.bytes.get(self.pos).ok_or(Error::TruncatedCode)?;
            self.acc |= u32::from(byte) << self.n_bits;
            self.n_bits += 8;
            self.pos += 1;
        }
        let code = (self.acc & ((1 << n_bits) - 1)) as u16;
        self.acc >>= n_bits;
        self.n_bits -= n_bits;
        Ok(code)
    }

    /// Count bytes which have not been touched yet
    pub fn remaining_bytes(&self) -> usize {
        self.bytes.len() - self.pos
    }
}
