//! Big-endian bit cursor used by the box codecs and the HEVC bridge.

use crate::error::{HeifError, Result};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::Write;

/// Sequential MSB-first reader over a byte slice with absolute positioning.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: u64, // in bits
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current byte offset. Any partially consumed byte counts as consumed.
    pub fn tell(&self) -> usize {
        self.pos.div_ceil(8) as usize
    }

    pub fn seek(&mut self, byte_offset: usize) {
        self.pos = (byte_offset.min(self.data.len()) as u64) * 8;
    }

    pub fn is_aligned(&self) -> bool {
        self.pos % 8 == 0
    }

    /// Does the buffer hold at least `n` more bits?
    pub fn has_bits(&self, n: u64) -> bool {
        self.pos + n <= (self.data.len() as u64) * 8
    }

    pub fn has_bytes(&self, n: u64) -> bool {
        self.has_bits(n * 8)
    }

    pub fn remaining_bytes(&self) -> usize {
        self.data.len().saturating_sub(self.tell())
    }

    fn need(&self, n: u64) -> Result<()> {
        if self.has_bits(n) {
            Ok(())
        } else {
            Err(HeifError::EndOfData { bit: self.pos + n })
        }
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        self.need(1)?;
        let byte = self.data[(self.pos / 8) as usize];
        let bit = (byte >> (7 - (self.pos % 8))) & 1;
        self.pos += 1;
        Ok(bit != 0)
    }

    /// Read an unsigned value of up to 64 bits.
    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        if n > 64 {
            return Err(HeifError::UnsupportedConstruction(format!(
                "{n}-bit field read"
            )));
        }
        if n == 0 {
            return Ok(0);
        }
        self.need(n as u64)?;
        if self.is_aligned() && n % 8 == 0 {
            let start = (self.pos / 8) as usize;
            let nbytes = (n / 8) as usize;
            let v = BigEndian::read_uint(&self.data[start..start + nbytes], nbytes);
            self.pos += n as u64;
            return Ok(v);
        }
        let mut v = 0u64;
        for _ in 0..n {
            v = (v << 1) | self.read_bit()? as u64;
        }
        Ok(v)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.read_bits(16)? as u16)
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        Ok(self.read_bits(24)? as u32)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_bits(32)? as u32)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_bits(32)? as u32 as i32)
    }

    /// Read a `width`-byte unsigned integer; a zero width yields 0.
    pub fn read_uint(&mut self, width: u8) -> Result<u64> {
        self.read_bits(width as u32 * 8)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if !self.is_aligned() {
            return Err(HeifError::UnsupportedConstruction(
                "unaligned byte read".to_string(),
            ));
        }
        self.need(n as u64 * 8)?;
        let start = (self.pos / 8) as usize;
        self.pos += n as u64 * 8;
        Ok(&self.data[start..start + n])
    }

    pub fn read_rest(&mut self) -> Result<&'a [u8]> {
        let n = self.remaining_bytes();
        self.read_bytes(n)
    }

    pub fn read_fourcc(&mut self) -> Result<crate::boxes::FourCC> {
        let b = self.read_bytes(4)?;
        Ok(crate::boxes::FourCC([b[0], b[1], b[2], b[3]]))
    }

    /// Read up to and including a NUL byte. The terminator is not part of the
    /// result; a string running to the end of the buffer is accepted.
    pub fn read_cstring(&mut self) -> Result<&'a [u8]> {
        let start = self.tell();
        let rest = &self.data[start..];
        let (s, consumed) = match rest.iter().position(|&b| b == 0) {
            Some(n) => (&rest[..n], n + 1),
            None => (rest, rest.len()),
        };
        self.pos = ((start + consumed) as u64) * 8;
        Ok(s)
    }

    /// Unsigned Exp-Golomb code.
    pub fn read_ue(&mut self) -> Result<u32> {
        let mut leading_zeros = 0u32;
        while !self.read_bit()? {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(HeifError::Hevc("exp-golomb overflow".to_string()));
            }
        }
        if leading_zeros == 0 {
            return Ok(0);
        }
        let suffix = self.read_bits(leading_zeros)? as u32;
        Ok((1u32 << leading_zeros) - 1 + suffix)
    }

    pub fn skip_bits(&mut self, n: u64) -> Result<()> {
        self.need(n)?;
        self.pos += n;
        Ok(())
    }
}

/// Growable MSB-first writer with absolute overwrite for back-patching.
#[derive(Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    acc: u64,
    nbits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset of the next write. Pending bits are not counted.
    pub fn tell(&self) -> usize {
        self.buf.len()
    }

    pub fn is_aligned(&self) -> bool {
        self.nbits == 0
    }

    pub fn put_bit(&mut self, bit: bool) -> Result<()> {
        self.put_bits(bit as u64, 1)
    }

    /// Write the low `n` bits of `value`, most significant first.
    pub fn put_bits(&mut self, value: u64, n: u32) -> Result<()> {
        if n > 64 {
            return Err(HeifError::UnsupportedConstruction(format!(
                "{n}-bit field write"
            )));
        }
        if self.is_aligned() && n % 8 == 0 {
            if n > 0 {
                self.buf.write_uint::<BigEndian>(value & mask(n), (n / 8) as usize)?;
            }
            return Ok(());
        }
        for i in (0..n).rev() {
            self.acc = (self.acc << 1) | ((value >> i) & 1);
            self.nbits += 1;
            if self.nbits == 8 {
                self.buf.write_u8(self.acc as u8)?;
                self.acc = 0;
                self.nbits = 0;
            }
        }
        Ok(())
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        self.put_bits(v as u64, 8)
    }

    pub fn put_u16(&mut self, v: u16) -> Result<()> {
        self.put_bits(v as u64, 16)
    }

    pub fn put_u24(&mut self, v: u32) -> Result<()> {
        self.put_bits(v as u64, 24)
    }

    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        self.put_bits(v as u64, 32)
    }

    pub fn put_i32(&mut self, v: i32) -> Result<()> {
        self.put_bits(v as u32 as u64, 32)
    }

    pub fn put_uint(&mut self, v: u64, width: u8) -> Result<()> {
        self.put_bits(v, width as u32 * 8)
    }

    pub fn put_bytes(&mut self, data: &[u8]) -> Result<()> {
        if !self.is_aligned() {
            return Err(HeifError::UnsupportedConstruction(
                "unaligned byte write".to_string(),
            ));
        }
        self.buf.write_all(data)?;
        Ok(())
    }

    /// Overwrite a `width`-byte big-endian field at an absolute byte offset.
    pub fn overwrite_uint(&mut self, offset: usize, width: u8, value: u64) -> Result<()> {
        let end = offset + width as usize;
        if width == 0 || width > 8 || end > self.buf.len() {
            return Err(HeifError::UnsupportedConstruction(format!(
                "{width}-byte overwrite at offset {offset}"
            )));
        }
        if value > max_for_width(width) {
            return Err(HeifError::UnsupportedConstruction(format!(
                "value {value} does not fit a {width}-byte field at offset {offset}"
            )));
        }
        BigEndian::write_uint(&mut self.buf[offset..end], value, width as usize);
        Ok(())
    }

    pub fn overwrite_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.overwrite_uint(offset, 4, value as u64)
    }

    /// Finish, zero-padding any trailing partial byte.
    pub fn into_bytes(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            let last = (self.acc << (8 - self.nbits)) as u8;
            self.buf.push(last);
        }
        self.buf
    }
}

fn mask(n: u32) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}

/// Largest value representable in `width` bytes.
pub fn max_for_width(width: u8) -> u64 {
    mask(width as u32 * 8)
}
