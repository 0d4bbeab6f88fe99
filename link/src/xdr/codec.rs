//! XDR primitives.
//!
//! RFC 4506 layouts: big-endian 4- and 8-byte integers, fixed and variable
//! opaque data zero-padded to a multiple of four bytes, length-prefixed
//! strings, optional values as a boolean flag followed by the value.

use thiserror::Error;

/// Errors raised while decoding XDR.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XdrError {
    /// Input ended before `field` was complete.
    #[error("unexpected end of input reading {field}")]
    UnexpectedEnd { field: &'static str },

    /// A union discriminant or boolean had no valid arm.
    #[error("invalid discriminant {value} for {field}")]
    InvalidDiscriminant { field: &'static str, value: i64 },

    /// A length prefix exceeded its declared bound.
    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceeded {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A string was not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// Padding bytes were not zero.
    #[error("non-zero padding after {field}")]
    NonZeroPadding { field: &'static str },

    /// Bytes remained after the top-level value.
    #[error("{remaining} trailing bytes after envelope")]
    TrailingBytes { remaining: usize },

    /// A valid XDR shape this codec does not handle.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

/// Convenient alias for XDR results.
pub type XdrResult<T> = Result<T, XdrError>;

fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Append-only XDR encoder.
#[derive(Debug, Default)]
pub struct XdrWriter {
    buf: Vec<u8>,
}

impl XdrWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u32(value as u32);
    }

    /// Fixed-length opaque data, padded.
    pub fn write_fixed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        self.buf.extend(std::iter::repeat(0u8).take(padding(data.len())));
    }

    /// Variable-length opaque data: length prefix, bytes, padding.
    pub fn write_var(&mut self, data: &[u8]) {
        self.write_u32(data.len() as u32);
        self.write_fixed(data);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_var(value.as_bytes());
    }

    /// Optional value: presence flag, then the value when present.
    pub fn write_option<T>(&mut self, value: Option<&T>, write: impl FnOnce(&mut Self, &T)) {
        match value {
            Some(inner) => {
                self.write_bool(true);
                write(self, inner);
            }
            None => self.write_bool(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Cursor over XDR bytes providing structured reads with error context.
#[derive(Debug, Clone, Copy)]
pub struct XdrReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> XdrReader<'a> {
    /// Creates a reader over `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    /// Fails unless every byte has been consumed.
    pub fn ensure_consumed(&self) -> XdrResult<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(XdrError::TrailingBytes { remaining }),
        }
    }

    fn take(&mut self, len: usize, field: &'static str) -> XdrResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(XdrError::UnexpectedEnd { field });
        }
        let start = self.offset;
        self.offset += len;
        Ok(&self.bytes[start..start + len])
    }

    fn take_array<const N: usize>(&mut self, field: &'static str) -> XdrResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    fn skip_padding(&mut self, len: usize, field: &'static str) -> XdrResult<()> {
        let pad = self.take(padding(len), field)?;
        if pad.iter().any(|&b| b != 0) {
            return Err(XdrError::NonZeroPadding { field });
        }
        Ok(())
    }

    pub fn read_u32(&mut self, field: &'static str) -> XdrResult<u32> {
        Ok(u32::from_be_bytes(self.take_array(field)?))
    }

    pub fn read_i32(&mut self, field: &'static str) -> XdrResult<i32> {
        Ok(i32::from_be_bytes(self.take_array(field)?))
    }

    pub fn read_u64(&mut self, field: &'static str) -> XdrResult<u64> {
        Ok(u64::from_be_bytes(self.take_array(field)?))
    }

    pub fn read_i64(&mut self, field: &'static str) -> XdrResult<i64> {
        Ok(i64::from_be_bytes(self.take_array(field)?))
    }

    pub fn read_bool(&mut self, field: &'static str) -> XdrResult<bool> {
        match self.read_u32(field)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(XdrError::InvalidDiscriminant {
                field,
                value: other as i64,
            }),
        }
    }

    /// Fixed-length opaque data of `N` bytes.
    pub fn read_fixed<const N: usize>(&mut self, field: &'static str) -> XdrResult<[u8; N]> {
        let out = self.take_array::<N>(field)?;
        self.skip_padding(N, field)?;
        Ok(out)
    }

    /// Variable-length opaque data of at most `max` bytes.
    pub fn read_var(&mut self, max: usize, field: &'static str) -> XdrResult<Vec<u8>> {
        let len = self.read_u32(field)? as usize;
        if len > max {
            return Err(XdrError::LengthExceeded { field, len, max });
        }
        let data = self.take(len, field)?.to_vec();
        self.skip_padding(len, field)?;
        Ok(data)
    }

    /// UTF-8 string of at most `max` bytes.
    pub fn read_string(&mut self, max: usize, field: &'static str) -> XdrResult<String> {
        String::from_utf8(self.read_var(max, field)?).map_err(|_| XdrError::InvalidUtf8 { field })
    }

    /// Optional value.
    pub fn read_option<T>(
        &mut self,
        field: &'static str,
        read: impl FnOnce(&mut Self) -> XdrResult<T>,
    ) -> XdrResult<Option<T>> {
        if self.read_bool(field)? {
            Ok(Some(read(self)?))
        } else {
            Ok(None)
        }
    }

    /// Array length prefix bounded by `max`.
    pub fn read_len(&mut self, max: usize, field: &'static str) -> XdrResult<usize> {
        let len = self.read_u32(field)? as usize;
        if len > max {
            return Err(XdrError::LengthExceeded { field, len, max });
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut w = XdrWriter::new();
        w.write_u32(1);
        w.write_i64(-2);
        assert_eq!(
            w.into_bytes(),
            vec![0, 0, 0, 1, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]
        );
    }

    #[test]
    fn var_opaque_is_padded() {
        let mut w = XdrWriter::new();
        w.write_var(b"abcde");
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 4 + 8);
        assert_eq!(&bytes[9..], &[0, 0, 0]);

        let mut r = XdrReader::new(&bytes);
        assert_eq!(r.read_var(64, "data").unwrap(), b"abcde");
        r.ensure_consumed().unwrap();
    }

    #[test]
    fn length_bound_is_enforced() {
        let mut w = XdrWriter::new();
        w.write_string("this is too long");
        let bytes = w.into_bytes();
        let mut r = XdrReader::new(&bytes);
        assert!(matches!(
            r.read_string(4, "name"),
            Err(XdrError::LengthExceeded { len: 16, max: 4, .. })
        ));
    }

    #[test]
    fn truncated_input_reports_field() {
        let mut r = XdrReader::new(&[0, 0]);
        assert_eq!(
            r.read_u32("fee"),
            Err(XdrError::UnexpectedEnd { field: "fee" })
        );
    }

    #[test]
    fn nonzero_padding_is_rejected() {
        let bytes = [0, 0, 0, 1, b'a', 1, 0, 0];
        let mut r = XdrReader::new(&bytes);
        assert!(matches!(
            r.read_var(4, "x"),
            Err(XdrError::NonZeroPadding { .. })
        ));
    }

    #[test]
    fn option_flag_roundtrip() {
        let mut w = XdrWriter::new();
        w.write_option(Some(&7u32), |w, v| w.write_u32(*v));
        w.write_option(None::<&u32>, |w, v| w.write_u32(*v));
        let bytes = w.into_bytes();
        let mut r = XdrReader::new(&bytes);
        assert_eq!(r.read_option("a", |r| r.read_u32("a")).unwrap(), Some(7));
        assert_eq!(r.read_option("b", |r| r.read_u32("b")).unwrap(), None);
        r.ensure_consumed().unwrap();
    }
}
