//! The size-and-buffer primitive: a 4-byte little-endian length prefix
//! followed by exactly that many bytes.
//!
//! Every variable-length field on the wire — endpoint key bytes, signatures,
//! ciphertexts, URLs — goes through [`write_framed`] and [`Reader::read_framed`].
//! The ceiling is enforced before any allocation so a crafted length prefix
//! cannot be used to exhaust memory ahead of validation.

use bytes::BufMut;

use crate::errors::{ProtoError, Result};

/// Default ceiling for a single size-and-buffer field: 16 MiB.
pub const DEFAULT_CEILING: usize = 16 * 1024 * 1024;

/// Writes a size-and-buffer field: `len(u32 LE) || bytes`.
///
/// # Errors
///
/// Returns [`ProtoError::TooLarge`] if `bytes.len()` does not fit in a `u32`.
pub fn write_framed(dst: &mut impl BufMut, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| ProtoError::TooLarge)?;
    dst.put_u32_le(len);
    dst.put_slice(bytes);
    Ok(())
}

/// Writes a fixed-width little-endian `u64`, used for the notification
/// timestamp field.
pub fn write_u64(dst: &mut impl BufMut, value: u64) {
    dst.put_u64_le(value);
}

/// A cursor over borrowed bytes that enforces the size-and-buffer ceiling on
/// every framed read.
///
/// `Reader` never copies data until a field is extracted; callers own the
/// resulting slices only as long as the backing buffer lives.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    ceiling: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader with the default 16 MiB ceiling.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_ceiling(buf, DEFAULT_CEILING)
    }

    /// Creates a reader with a caller-supplied ceiling.
    #[must_use]
    pub fn with_ceiling(buf: &'a [u8], ceiling: usize) -> Self {
        Self { buf, pos: 0, ceiling }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Reads a raw `u32` little-endian integer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::Truncated`] if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        #[allow(clippy::unwrap_used)] // length fixed to 4 by `take`
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Reads a raw `u64` little-endian integer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::Truncated`] if fewer than 8 bytes remain.
    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        #[allow(clippy::unwrap_used)] // length fixed to 8 by `take`
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Reads a single raw byte, used for small tags such as an optional-field
    /// presence flag or a format-version marker.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::Truncated`] if no bytes remain.
    pub fn read_byte(&mut self) -> Result<u8> {
        let bytes = self.take(1)?;
        Ok(bytes[0])
    }

    /// Reads a size-and-buffer field, enforcing the reader's ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::LengthExceedsCeiling`] if the declared length
    /// exceeds the configured ceiling, or [`ProtoError::Truncated`] if the
    /// buffer does not contain that many bytes.
    pub fn read_framed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        if len > self.ceiling {
            return Err(ProtoError::LengthExceedsCeiling { declared: len, ceiling: self.ceiling });
        }
        self.take(len)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ProtoError::Truncated { needed: len, available: self.remaining() });
        }
        #[allow(clippy::arithmetic_side_effects)] // bounds checked above
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}
