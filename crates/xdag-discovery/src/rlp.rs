//! Recursive Length Prefix encoding.
//!
//! Every discovery payload is a single RLP item. Items are either byte strings
//! or lists of items:
//!
//! | First byte | Meaning |
//! |------------|---------|
//! | `0x00..=0x7f` | single byte, encodes itself |
//! | `0x80..=0xb7` | string of `b - 0x80` bytes (0..=55) |
//! | `0xb8..=0xbf` | long string, `b - 0xb7` length bytes follow |
//! | `0xc0..=0xf7` | list with `b - 0xc0` payload bytes (0..=55) |
//! | `0xf8..=0xff` | long list, `b - 0xf7` length bytes follow |
//!
//! The decoder is strict: non-canonical encodings (a single byte below
//! `0x80` wrapped in a string header, long forms for short lengths, length
//! prefixes with leading zeros, scalars with leading zeros) are rejected.

use thiserror::Error;

/// RLP decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RlpError {
    /// Input ended before the item did
    #[error("input too short: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required by the header
        needed: usize,
        /// Bytes actually available
        available: usize,
    },

    /// A list was found where a string was expected
    #[error("expected a string, found a list")]
    ExpectedString,

    /// A string was found where a list was expected
    #[error("expected a list, found a string")]
    ExpectedList,

    /// Encoding is valid but not the canonical one
    #[error("non-canonical encoding: {0}")]
    NonCanonical(&'static str),

    /// Bytes remain after the last expected item
    #[error("{0} trailing bytes after item")]
    TrailingBytes(usize),

    /// List ended before all expected fields were read
    #[error("list ended early")]
    EndOfList,

    /// Scalar does not fit the requested integer type
    #[error("integer overflow: {len} bytes for a {max}-byte integer")]
    IntegerOverflow {
        /// Encoded scalar length
        len: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Declared length does not fit in memory
    #[error("length prefix too large")]
    LengthOverflow,
}

/// Result alias for RLP decoding
pub type Result<T> = std::result::Result<T, RlpError>;

const EMPTY_STRING: u8 = 0x80;
const SHORT_LIST: u8 = 0xc0;

// ============================================================================
// Encoding
// ============================================================================

/// Streaming RLP writer.
///
/// Lists are opened with [`RlpStream::begin_list`] and closed with
/// [`RlpStream::end_list`]; the list header is written when the list is
/// closed, once its payload length is known.
///
/// ```
/// use xdag_discovery::rlp::RlpStream;
///
/// let mut stream = RlpStream::new();
/// stream.begin_list();
/// stream.append_bytes(b"cat");
/// stream.append_bytes(b"dog");
/// stream.end_list();
/// assert_eq!(stream.out(), &[0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']);
/// ```
#[derive(Debug, Default)]
pub struct RlpStream {
    buf: Vec<u8>,
    open_lists: Vec<usize>,
}

impl RlpStream {
    /// Create an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a byte string.
    pub fn append_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        if bytes.len() == 1 && bytes[0] < EMPTY_STRING {
            self.buf.push(bytes[0]);
        } else {
            write_header(&mut self.buf, EMPTY_STRING, bytes.len());
            self.buf.extend_from_slice(bytes);
        }
        self
    }

    /// Append the empty string, used as an RLP null.
    pub fn append_null(&mut self) -> &mut Self {
        self.buf.push(EMPTY_STRING);
        self
    }

    /// Append an unsigned integer as a minimal big-endian scalar.
    pub fn append_u64(&mut self, value: u64) -> &mut Self {
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        self.append_bytes(&bytes[first..])
    }

    /// Append a `u16` as a fixed two-byte big-endian string.
    pub fn append_u16_fixed(&mut self, value: u16) -> &mut Self {
        self.append_bytes(&value.to_be_bytes())
    }

    /// Append an already encoded item verbatim.
    pub fn append_raw(&mut self, encoded: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(encoded);
        self
    }

    /// Open a list.
    pub fn begin_list(&mut self) -> &mut Self {
        self.open_lists.push(self.buf.len());
        self
    }

    /// Close the innermost open list. Does nothing if no list is open.
    pub fn end_list(&mut self) -> &mut Self {
        let Some(start) = self.open_lists.pop() else {
            return self;
        };
        let payload_len = self.buf.len() - start;
        let mut header = Vec::with_capacity(9);
        write_header(&mut header, SHORT_LIST, payload_len);
        self.buf.splice(start..start, header);
        self
    }

    /// Encoded bytes written so far.
    #[must_use]
    pub fn out(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the stream and return the encoded bytes, closing any lists
    /// still open.
    #[must_use]
    pub fn into_bytes(mut self) -> Vec<u8> {
        while !self.open_lists.is_empty() {
            self.end_list();
        }
        self.buf
    }
}

fn write_header(buf: &mut Vec<u8>, offset: u8, len: usize) {
    if len <= 55 {
        buf.push(offset + len as u8);
    } else {
        let len_bytes = (len as u64).to_be_bytes();
        let first = len_bytes.iter().position(|b| *b != 0).unwrap_or(7);
        let len_of_len = len_bytes.len() - first;
        buf.push(offset + 55 + len_of_len as u8);
        buf.extend_from_slice(&len_bytes[first..]);
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decoded item header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    list: bool,
    header_len: usize,
    payload_len: usize,
}

impl Header {
    fn total_len(&self) -> usize {
        self.header_len + self.payload_len
    }
}

fn decode_header(input: &[u8]) -> Result<Header> {
    let first = *input.first().ok_or(RlpError::Truncated {
        needed: 1,
        available: 0,
    })?;

    let header = match first {
        0x00..=0x7f => Header {
            list: false,
            header_len: 0,
            payload_len: 1,
        },
        0x80..=0xb7 => Header {
            list: false,
            header_len: 1,
            payload_len: usize::from(first - 0x80),
        },
        0xb8..=0xbf => long_header(input, false, usize::from(first - 0xb7))?,
        0xc0..=0xf7 => Header {
            list: true,
            header_len: 1,
            payload_len: usize::from(first - 0xc0),
        },
        0xf8..=0xff => long_header(input, true, usize::from(first - 0xf7))?,
    };

    let total = header
        .header_len
        .checked_add(header.payload_len)
        .ok_or(RlpError::LengthOverflow)?;
    if input.len() < total {
        return Err(RlpError::Truncated {
            needed: total,
            available: input.len(),
        });
    }

    if !header.list && header.header_len == 1 && header.payload_len == 1 && input[1] < 0x80 {
        return Err(RlpError::NonCanonical("single byte below 0x80 wrapped in a header"));
    }

    Ok(header)
}

fn long_header(input: &[u8], list: bool, len_of_len: usize) -> Result<Header> {
    if input.len() < 1 + len_of_len {
        return Err(RlpError::Truncated {
            needed: 1 + len_of_len,
            available: input.len(),
        });
    }
    let len_bytes = &input[1..=len_of_len];
    if len_bytes[0] == 0 {
        return Err(RlpError::NonCanonical("length prefix with leading zero"));
    }
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(RlpError::LengthOverflow);
    }
    let payload_len = len_bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
    if payload_len <= 55 {
        return Err(RlpError::NonCanonical("long form used for a short item"));
    }
    Ok(Header {
        list,
        header_len: 1 + len_of_len,
        payload_len,
    })
}

/// Cursor over the items of an RLP list (or of a top-level sequence).
///
/// Each `read_*` call consumes exactly one item.
#[derive(Debug, Clone)]
pub struct RlpReader<'a> {
    data: &'a [u8],
}

impl<'a> RlpReader<'a> {
    /// Reader positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Decode `data` as exactly one list and return a reader over its items.
    ///
    /// # Errors
    ///
    /// Fails if `data` is not a single well-formed list with no trailing
    /// bytes.
    pub fn from_single_list(data: &'a [u8]) -> Result<Self> {
        let mut outer = Self::new(data);
        let list = outer.enter_list()?;
        outer.finish()?;
        Ok(list)
    }

    /// True when every item has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of items left, without decoding their contents.
    ///
    /// # Errors
    ///
    /// Fails if any remaining header is malformed.
    pub fn item_count(&self) -> Result<usize> {
        let mut rest = self.data;
        let mut count = 0;
        while !rest.is_empty() {
            let header = decode_header(rest)?;
            rest = &rest[header.total_len()..];
            count += 1;
        }
        Ok(count)
    }

    fn next_item(&mut self) -> Result<(Header, &'a [u8])> {
        if self.data.is_empty() {
            return Err(RlpError::EndOfList);
        }
        let header = decode_header(self.data)?;
        let payload = &self.data[header.header_len..header.total_len()];
        self.data = &self.data[header.total_len()..];
        Ok((header, payload))
    }

    fn peek_header(&self) -> Result<Header> {
        if self.data.is_empty() {
            return Err(RlpError::EndOfList);
        }
        decode_header(self.data)
    }

    /// Read a byte string.
    ///
    /// # Errors
    ///
    /// Fails on a list, a malformed header or the end of the list.
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let (header, payload) = self.next_item()?;
        if header.list {
            return Err(RlpError::ExpectedString);
        }
        Ok(payload)
    }

    /// Read a byte string of an exact length.
    ///
    /// # Errors
    ///
    /// Fails if the string length differs from `N`.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes()?;
        bytes.try_into().map_err(|_| RlpError::IntegerOverflow {
            len: bytes.len(),
            max: N,
        })
    }

    /// Read a minimal big-endian scalar as `u64`.
    ///
    /// # Errors
    ///
    /// Fails on leading zeros or more than eight bytes.
    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes()?;
        scalar(bytes, 8)
    }

    /// Read a big-endian `u16`.
    ///
    /// Accepts both the fixed two-byte form and the minimal scalar form,
    /// since both appear on the wire for ports.
    ///
    /// # Errors
    ///
    /// Fails on more than two bytes.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes()?;
        if bytes.len() > 2 {
            return Err(RlpError::IntegerOverflow {
                len: bytes.len(),
                max: 2,
            });
        }
        Ok(bytes.iter().fold(0u16, |acc, b| (acc << 8) | u16::from(*b)))
    }

    /// True if the next item is the empty string.
    #[must_use]
    pub fn next_is_null(&self) -> bool {
        self.data.first() == Some(&EMPTY_STRING)
    }

    /// True if the next item is a list.
    #[must_use]
    pub fn next_is_list(&self) -> bool {
        matches!(self.peek_header(), Ok(h) if h.list)
    }

    /// Skip the next item, whatever it is.
    ///
    /// # Errors
    ///
    /// Fails on a malformed header or the end of the list.
    pub fn skip(&mut self) -> Result<()> {
        self.next_item().map(|_| ())
    }

    /// Enter a nested list, returning a reader over its items.
    ///
    /// # Errors
    ///
    /// Fails if the next item is a string.
    pub fn enter_list(&mut self) -> Result<RlpReader<'a>> {
        let (header, payload) = self.next_item()?;
        if !header.list {
            return Err(RlpError::ExpectedList);
        }
        Ok(RlpReader::new(payload))
    }

    /// Assert that every item has been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`RlpError::TrailingBytes`] otherwise.
    pub fn finish(&self) -> Result<()> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(RlpError::TrailingBytes(self.data.len()))
        }
    }
}

fn scalar(bytes: &[u8], max: usize) -> Result<u64> {
    if bytes.len() > max {
        return Err(RlpError::IntegerOverflow {
            len: bytes.len(),
            max,
        });
    }
    if bytes.first() == Some(&0) {
        return Err(RlpError::NonCanonical("scalar with leading zero"));
    }
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
        let mut s = RlpStream::new();
        s.append_bytes(bytes);
        s.into_bytes()
    }

    #[test]
    fn test_single_byte_encodes_itself() {
        assert_eq!(encode_bytes(&[0x7f]), vec![0x7f]);
        assert_eq!(encode_bytes(&[0x80]), vec![0x81, 0x80]);
    }

    #[test]
    fn test_empty_string_and_list() {
        assert_eq!(encode_bytes(&[]), vec![0x80]);
        let mut s = RlpStream::new();
        s.begin_list().end_list();
        assert_eq!(s.into_bytes(), vec![0xc0]);
    }

    #[test]
    fn test_long_string_header() {
        let data = vec![0xaa; 56];
        let encoded = encode_bytes(&data);
        assert_eq!(&encoded[..2], &[0xb8, 56]);
        assert_eq!(encoded.len(), 58);

        let mut reader = RlpReader::new(&encoded);
        assert_eq!(reader.read_bytes().unwrap(), &data[..]);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_long_list_header() {
        let mut s = RlpStream::new();
        s.begin_list();
        for _ in 0..20 {
            s.append_bytes(b"abc");
        }
        s.end_list();
        let encoded = s.into_bytes();
        // 20 * 4 = 80 payload bytes
        assert_eq!(&encoded[..2], &[0xf8, 80]);

        let list = RlpReader::from_single_list(&encoded).unwrap();
        assert_eq!(list.item_count().unwrap(), 20);
    }

    #[test]
    fn test_nested_lists() {
        let mut s = RlpStream::new();
        s.begin_list();
        s.begin_list().append_u64(1).append_u64(2).end_list();
        s.append_bytes(b"x");
        s.end_list();
        let encoded = s.into_bytes();

        let mut outer = RlpReader::from_single_list(&encoded).unwrap();
        let mut inner = outer.enter_list().unwrap();
        assert_eq!(inner.read_u64().unwrap(), 1);
        assert_eq!(inner.read_u64().unwrap(), 2);
        inner.finish().unwrap();
        assert_eq!(outer.read_bytes().unwrap(), b"x");
        outer.finish().unwrap();
    }

    #[test]
    fn test_scalar_encoding() {
        let mut s = RlpStream::new();
        s.append_u64(0).append_u64(15).append_u64(1024);
        assert_eq!(s.into_bytes(), vec![0x80, 0x0f, 0x82, 0x04, 0x00]);
    }

    #[test]
    fn test_u64_max_roundtrip() {
        let mut s = RlpStream::new();
        s.append_u64(u64::MAX);
        let encoded = s.into_bytes();
        assert_eq!(RlpReader::new(&encoded).read_u64().unwrap(), u64::MAX);
    }

    #[test]
    fn test_scalar_leading_zero_rejected() {
        let encoded = [0x82, 0x00, 0x01];
        assert!(matches!(
            RlpReader::new(&encoded).read_u64(),
            Err(RlpError::NonCanonical(_))
        ));
    }

    #[test]
    fn test_u16_accepts_fixed_and_minimal() {
        let mut reader = RlpReader::new(&[0x82, 0x00, 0x50, 0x50]);
        assert_eq!(reader.read_u16().unwrap(), 80);
        assert_eq!(reader.read_u16().unwrap(), 80);
    }

    #[test]
    fn test_non_canonical_single_byte() {
        assert!(matches!(
            RlpReader::new(&[0x81, 0x05]).read_bytes(),
            Err(RlpError::NonCanonical(_))
        ));
    }

    #[test]
    fn test_non_canonical_long_form() {
        let mut encoded = vec![0xb8, 3];
        encoded.extend_from_slice(b"abc");
        assert!(matches!(
            RlpReader::new(&encoded).read_bytes(),
            Err(RlpError::NonCanonical(_))
        ));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(
            RlpReader::new(&[0x83, b'a']).read_bytes(),
            Err(RlpError::Truncated { needed: 4, available: 2 })
        ));
        assert!(matches!(
            RlpReader::new(&[0xb9, 0x01]).read_bytes(),
            Err(RlpError::Truncated { .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        assert_eq!(
            RlpReader::new(&[0xc0]).read_bytes(),
            Err(RlpError::ExpectedString)
        );
        assert_eq!(
            RlpReader::new(&[0x80]).enter_list().unwrap_err(),
            RlpError::ExpectedList
        );
    }

    #[test]
    fn test_trailing_bytes() {
        assert_eq!(
            RlpReader::from_single_list(&[0xc0, 0x01]).unwrap_err(),
            RlpError::TrailingBytes(1)
        );
    }

    #[test]
    fn test_end_of_list() {
        let mut reader = RlpReader::from_single_list(&[0xc1, 0x01]).unwrap();
        assert_eq!(reader.read_u64().unwrap(), 1);
        assert_eq!(reader.read_u64(), Err(RlpError::EndOfList));
    }

    #[test]
    fn test_null_and_skip() {
        let mut reader = RlpReader::new(&[0x80, 0xc1, 0x01, 0x02]);
        assert!(reader.next_is_null());
        reader.skip().unwrap();
        assert!(reader.next_is_list());
        reader.skip().unwrap();
        assert_eq!(reader.read_u64().unwrap(), 2);
    }

    #[test]
    fn test_read_array_length_checked() {
        let encoded = encode_bytes(&[1, 2, 3]);
        assert!(RlpReader::new(&encoded).read_array::<4>().is_err());
        assert_eq!(RlpReader::new(&encoded).read_array::<3>().unwrap(), [1, 2, 3]);
    }

    #[test]
    fn test_unbalanced_lists_stay_well_formed() {
        let mut s = RlpStream::new();
        s.end_list();
        assert!(s.out().is_empty());

        s.begin_list().append_u64(1).begin_list().append_u64(2);
        let encoded = s.into_bytes();
        assert_eq!(encoded, vec![0xc3, 0x01, 0xc1, 0x02]);

        let mut outer = RlpReader::from_single_list(&encoded).unwrap();
        assert_eq!(outer.read_u64().unwrap(), 1);
        let mut inner = outer.enter_list().unwrap();
        assert_eq!(inner.read_u64().unwrap(), 2);
        inner.finish().unwrap();
        outer.finish().unwrap();
    }
}
