// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Append-only byte sink and consume-only byte source.
//!
//! Little-endian scalars, LEB128 var-ints for compact ordinals and identity
//! indexes, length-prefixed bytes and strings with explicit bounds. No
//! seeking: the stream boundary is purely append on write and consume on
//! read, which is what keeps identity-index assignment order implicit in the
//! call sequence.

use crate::error::FormatKind;

/// Maximum length accepted for string payloads.
pub const MAX_STRING_LEN: usize = 64 * 1024;
/// Maximum length accepted for raw byte payloads.
pub const MAX_BYTES_LEN: usize = 16 * 1024 * 1024;

/// Append-only little-endian byte sink.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create a writer with a pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a little-endian u32.
    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a little-endian u64.
    pub fn write_u64_le(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a LEB128 var-u32 (1-5 bytes, low groups first).
    #[allow(clippy::cast_possible_truncation)] // masked to 7 bits first
    pub fn write_var_u32(&mut self, mut value: u32) {
        loop {
            let group = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(group);
                return;
            }
            self.buf.push(group | 0x80);
        }
    }

    /// Write raw bytes with no prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write var-u32-length-prefixed bytes with a max bound.
    pub fn write_len_prefixed(&mut self, bytes: &[u8], max_len: usize) -> Result<(), FormatKind> {
        if bytes.len() > max_len {
            return Err(FormatKind::LengthTooLarge {
                len: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
                max: u64::try_from(max_len).unwrap_or(u64::MAX),
            });
        }
        let len = u32::try_from(bytes.len()).map_err(|_| FormatKind::LengthTooLarge {
            len: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            max: u64::from(u32::MAX),
        })?;
        self.write_var_u32(len);
        self.write_raw(bytes);
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string bounded by [`MAX_STRING_LEN`].
    pub fn write_string(&mut self, value: &str) -> Result<(), FormatKind> {
        self.write_len_prefixed(value.as_bytes(), MAX_STRING_LEN)
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer and return the buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// Consume-only byte source over a borrowed slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader over the provided byte slice.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], FormatKind> {
        let end = self.offset.checked_add(len).ok_or(FormatKind::Truncated)?;
        if end > self.bytes.len() {
            return Err(FormatKind::Truncated);
        }
        let out = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, FormatKind> {
        let chunk = self.take(1)?;
        Ok(chunk[0])
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&mut self) -> Result<u32, FormatKind> {
        let chunk = self.take(4)?;
        let raw: [u8; 4] = chunk.try_into().map_err(|_| FormatKind::Truncated)?;
        Ok(u32::from_le_bytes(raw))
    }

    /// Read a little-endian u64.
    pub fn read_u64_le(&mut self) -> Result<u64, FormatKind> {
        let chunk = self.take(8)?;
        let raw: [u8; 8] = chunk.try_into().map_err(|_| FormatKind::Truncated)?;
        Ok(u64::from_le_bytes(raw))
    }

    /// Read a LEB128 var-u32.
    pub fn read_var_u32(&mut self) -> Result<u32, FormatKind> {
        let mut value: u32 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            let group = u32::from(byte & 0x7f);
            if shift == 28 && group > 0x0f {
                return Err(FormatKind::VarIntOverflow);
            }
            value |= group << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(FormatKind::VarIntOverflow)
    }

    /// Read var-u32-length-prefixed bytes with a max bound.
    pub fn read_len_prefixed(&mut self, max_len: usize) -> Result<&'a [u8], FormatKind> {
        let len = self.read_var_u32()?;
        let len = usize::try_from(len).map_err(|_| FormatKind::LengthTooLarge {
            len: u64::from(len),
            max: u64::try_from(max_len).unwrap_or(u64::MAX),
        })?;
        if len > max_len {
            return Err(FormatKind::LengthTooLarge {
                len: u64::try_from(len).unwrap_or(u64::MAX),
                max: u64::try_from(max_len).unwrap_or(u64::MAX),
            });
        }
        self.take(len)
    }

    /// Read a length-prefixed UTF-8 string bounded by [`MAX_STRING_LEN`].
    pub fn read_string(&mut self) -> Result<String, FormatKind> {
        let bytes = self.read_len_prefixed(MAX_STRING_LEN)?;
        core::str::from_utf8(bytes)
            .map(ToOwned::to_owned)
            .map_err(|_| FormatKind::InvalidUtf8)
    }

    /// Number of unconsumed bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. scalar and string round-trip ─────────────────────────────────

    #[test]
    fn scalars_and_string_round_trip() {
        let mut w = ByteWriter::with_capacity(64);
        w.write_u8(7);
        w.write_u32_le(0xdead_beef);
        w.write_u64_le(u64::MAX - 1);
        w.write_string("braid").unwrap();
        let bytes = w.into_vec();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.read_u32_le().unwrap(), 0xdead_beef);
        assert_eq!(r.read_u64_le().unwrap(), u64::MAX - 1);
        assert_eq!(r.read_string().unwrap(), "braid");
        assert_eq!(r.remaining(), 0);
    }

    // ── 2. var-u32 boundary values ──────────────────────────────────────

    #[test]
    fn var_u32_boundaries() {
        for value in [0, 1, 127, 128, 16_383, 16_384, u32::MAX - 1, u32::MAX] {
            let mut w = ByteWriter::default();
            w.write_var_u32(value);
            let bytes = w.into_vec();
            let mut r = ByteReader::new(&bytes);
            assert_eq!(r.read_var_u32().unwrap(), value, "value {value}");
            assert_eq!(r.remaining(), 0);
        }
    }

    // ── 3. var-u32 single-byte encodings are compact ────────────────────

    #[test]
    fn var_u32_small_values_are_one_byte() {
        let mut w = ByteWriter::default();
        w.write_var_u32(1);
        assert_eq!(hex::encode(w.into_vec()), "01");
    }

    // ── 4. overlong var-u32 rejected ────────────────────────────────────

    #[test]
    fn var_u32_overflow_rejected() {
        let mut r = ByteReader::new(&[0xff, 0xff, 0xff, 0xff, 0x7f]);
        assert_eq!(r.read_var_u32().unwrap_err(), FormatKind::VarIntOverflow);
    }

    // ── 5. truncated reads fail, never wrap ─────────────────────────────

    #[test]
    fn truncated_reads_fail() {
        let mut r = ByteReader::new(&[1, 2]);
        assert_eq!(r.read_u32_le().unwrap_err(), FormatKind::Truncated);

        let mut w = ByteWriter::default();
        w.write_string("hello").unwrap();
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes[..3]);
        assert_eq!(r.read_string().unwrap_err(), FormatKind::Truncated);
    }

    // ── 6. length prefix over bound rejected ────────────────────────────

    #[test]
    fn oversized_length_prefix_rejected() {
        let mut w = ByteWriter::default();
        w.write_var_u32(1024);
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            r.read_len_prefixed(16).unwrap_err(),
            FormatKind::LengthTooLarge { len: 1024, max: 16 }
        ));
    }

    // ── 7. invalid utf-8 rejected ───────────────────────────────────────

    #[test]
    fn invalid_utf8_rejected() {
        let mut w = ByteWriter::default();
        w.write_len_prefixed(&[0xff, 0xfe], MAX_STRING_LEN).unwrap();
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_string().unwrap_err(), FormatKind::InvalidUtf8);
    }
}
