//! Seekable big-endian reader over an immutable byte slice.
//!
//! All multi-byte integers in ISO BMFF are big-endian; every typed read here
//! follows that convention and fails with [`Error::BufferUnderflow`] when the
//! slice runs out.

use crate::error::{Error, Result};
use crate::mp4::FourCC;

/// Cursor over a read-only byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current position from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying buffer.
    pub fn count(&self) -> usize {
        self.data.len()
    }

    /// Bytes left between the position and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether any bytes remain.
    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Consume `n` bytes, or fail with the exact shortfall.
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::BufferUnderflow {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a u8.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian u16.
    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a big-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian u64.
    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Read a big-endian i32.
    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian i64.
    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Read a four-character code. The four bytes must be printable ASCII.
    pub fn read_four_cc(&mut self) -> Result<FourCC> {
        let b = self.take(4)?;
        if b.iter().any(|&c| !c.is_ascii() || c.is_ascii_control()) {
            return Err(Error::invalid_data(format!(
                "non-ASCII FourCC bytes {:02x?}",
                b
            )));
        }
        Ok(FourCC::from_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a 16.16 fixed-point value as f64.
    pub fn read_fixed_16_16(&mut self) -> Result<f64> {
        Ok(self.read_u32()? as f64 / 65536.0)
    }

    /// Read an 8.8 fixed-point value as f64.
    pub fn read_fixed_8_8(&mut self) -> Result<f64> {
        Ok(self.read_u16()? as f64 / 256.0)
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read a null-terminated UTF-8 string.
    ///
    /// Reads up to the first 0x00 or the end of the buffer; the position
    /// advances past the terminator when one is present.
    pub fn read_c_string(&mut self) -> Result<String> {
        let rest = &self.data[self.pos..];
        let (raw, consumed) = match rest.iter().position(|&b| b == 0) {
            Some(nul) => (&rest[..nul], nul + 1),
            None => (rest, rest.len()),
        };
        let s = std::str::from_utf8(raw)
            .map_err(|_| Error::invalid_data("string is not valid UTF-8"))?
            .to_string();
        self.pos += consumed;
        Ok(s)
    }

    /// Read a full-box header byte, returning (version, flags).
    pub fn read_version_flags(&mut self) -> Result<(u8, u32)> {
        let val = self.read_u32()?;
        Ok(((val >> 24) as u8, val & 0x00FF_FFFF))
    }

    /// Advance the position by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Move the position to an absolute offset.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::invalid_data(format!(
                "seek to {pos} beyond buffer of {} bytes",
                self.data.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    /// Split off a reader over the next `n` bytes, advancing this reader
    /// past them.
    pub fn sub_reader(&mut self, n: usize) -> Result<ByteReader<'a>> {
        Ok(ByteReader::new(self.take(n)?))
    }
}
