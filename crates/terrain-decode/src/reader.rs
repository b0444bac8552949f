//! Little-endian cursor over a tile payload.

use crate::error::{DecodeError, DecodeResult};

/// A bounds-checked little-endian reader.
///
/// Every read either returns the full value or fails with
/// [`DecodeError::UnexpectedEof`]; the offset is only advanced on success.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read position.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Whether every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn take(&mut self, len: usize, context: &'static str) -> DecodeResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(DecodeError::UnexpectedEof {
                context,
                offset: self.offset,
            })?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    /// Skip `len` bytes.
    pub fn skip(&mut self, len: usize, context: &'static str) -> DecodeResult<()> {
        self.take(len, context).map(|_| ())
    }

    /// Advance to the next multiple of `alignment`.
    pub fn align_to(&mut self, alignment: usize, context: &'static str) -> DecodeResult<()> {
        let misalignment = self.offset % alignment;
        if misalignment != 0 {
            self.skip(alignment - misalignment, context)?;
        }
        Ok(())
    }

    fn array<const N: usize>(&mut self, context: &'static str) -> DecodeResult<[u8; N]> {
        let bytes = self.take(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self, context: &'static str) -> DecodeResult<u8> {
        Ok(self.array::<1>(context)?[0])
    }

    pub fn read_u16(&mut self, context: &'static str) -> DecodeResult<u16> {
        self.array(context).map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self, context: &'static str) -> DecodeResult<u32> {
        self.array(context).map(u32::from_le_bytes)
    }

    /// Read a big-endian `u32`.
    ///
    /// Only the legacy `vertexnormals` extension framing uses this.
    pub fn read_u32_be(&mut self, context: &'static str) -> DecodeResult<u32> {
        self.array(context).map(u32::from_be_bytes)
    }

    pub fn read_f32(&mut self, context: &'static str) -> DecodeResult<f32> {
        self.array(context).map(f32::from_le_bytes)
    }

    pub fn read_f64(&mut self, context: &'static str) -> DecodeResult<f64> {
        self.array(context).map(f64::from_le_bytes)
    }

    /// Read `count` consecutive `u16` values.
    ///
    /// The byte length is checked before allocating, so a corrupt count can
    /// not trigger a huge allocation.
    pub fn read_u16_vec(&mut self, count: usize, context: &'static str) -> DecodeResult<Vec<u16>> {
        let len = count.checked_mul(2).ok_or(DecodeError::UnexpectedEof {
            context,
            offset: self.offset,
        })?;
        let bytes = self.take(len, context)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    /// Read `count` consecutive `u32` values.
    pub fn read_u32_vec(&mut self, count: usize, context: &'static str) -> DecodeResult<Vec<u32>> {
        let len = count.checked_mul(4).ok_or(DecodeError::UnexpectedEof {
            context,
            offset: self.offset,
        })?;
        let bytes = self.take(len, context)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}
