//! Byte-order aware primitive reader.
//!
//! Reads fixed-width integers, floats, packed variable-length integers and
//! length-prefixed strings from an in-memory capture. Running out of input
//! yields [`DecodeError::Truncated`] and leaves the position unchanged.

use crate::error::{DecodeError, Result};

/// Byte order of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the host.
    #[must_use]
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }

    /// The opposite byte order.
    #[must_use]
    pub fn swapped(self) -> Self {
        match self {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        }
    }

    /// Short lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ByteOrder::Little => "little-endian",
            ByteOrder::Big => "big-endian",
        }
    }
}

/// Cursor over capture bytes with a fixed byte order.
#[derive(Debug, Clone)]
pub struct PrimitiveReader<'a> {
    data: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> PrimitiveReader<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self { data, pos: 0, order }
    }

    /// Current byte offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[must_use]
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Reads `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n - remaining,
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let buf = self.read_array()?;
        Ok(match self.order {
            ByteOrder::Little => u16::from_le_bytes(buf),
            ByteOrder::Big => u16::from_be_bytes(buf),
        })
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let buf = self.read_array()?;
        Ok(match self.order {
            ByteOrder::Little => i16::from_le_bytes(buf),
            ByteOrder::Big => i16::from_be_bytes(buf),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let buf = self.read_array()?;
        Ok(match self.order {
            ByteOrder::Little => u32::from_le_bytes(buf),
            ByteOrder::Big => u32::from_be_bytes(buf),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let buf = self.read_array()?;
        Ok(match self.order {
            ByteOrder::Little => i32::from_le_bytes(buf),
            ByteOrder::Big => i32::from_be_bytes(buf),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let buf = self.read_array()?;
        Ok(match self.order {
            ByteOrder::Little => u64::from_le_bytes(buf),
            ByteOrder::Big => u64::from_be_bytes(buf),
        })
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let buf = self.read_array()?;
        Ok(match self.order {
            ByteOrder::Little => i64::from_le_bytes(buf),
            ByteOrder::Big => i64::from_be_bytes(buf),
        })
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Reads a packed unsigned integer.
    ///
    /// Each byte carries 7 value bits above a continuation bit in bit 0,
    /// least significant group first. Bits beyond 32 are discarded. On
    /// truncation the position is restored to the start of the integer.
    pub fn read_packed_uint(&mut self) -> Result<u32> {
        let start = self.pos;
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(e) => {
                    self.pos = start;
                    return Err(e);
                }
            };
            let group = u64::from(byte >> 1);
            value = value.wrapping_add(group.checked_shl(shift).unwrap_or(0));
            if byte & 1 == 0 {
                break;
            }
            shift = shift.saturating_add(7);
        }
        #[allow(clippy::cast_possible_truncation)]
        let value = value as u32;
        Ok(value)
    }

    /// Reads a `u32` length followed by that many bytes.
    pub fn read_length_prefixed_bytes(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let len = self.read_u32()? as usize;
        self.read_bytes(len).inspect_err(|_| self.pos = start)
    }

    /// Reads a length-prefixed string, dropping trailing NULs.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_length_prefixed_bytes()?;
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

#[cfg(test)]
pub(crate) fn encode_packed_uint(mut value: u32, out: &mut Vec<u8>) {
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let mut byte = ((value & 0x7f) << 1) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 1;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}
