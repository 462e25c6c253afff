//! Order-preserving encoding for variable-length key components.
//!
//! Row keys and family names are packed into a single flat store key, so
//! each component is escaped and terminated with `0x00`:
//!
//! - `0x00` → `0x01 0x01`
//! - `0x01` → `0x01 0x02`
//! - all other bytes unchanged
//!
//! A `0x00` terminator keeps shorter components sorting before longer ones
//! with the same prefix, which keeps cells grouped in row-major order.

use bytes::{BufMut, Bytes, BytesMut};
use std::ops::Bound::{Excluded, Included, Unbounded};

use super::DeserializeError;
use crate::BytesRange;
use crate::bytes::lex_increment;

const TERMINATOR_BYTE: u8 = 0x00;
const ESCAPE_BYTE: u8 = 0x01;

/// Serializes `data` into a fresh buffer.
pub fn serialize_to_bytes(data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(data.len() + 1);
    serialize(data, &mut buf);
    buf.freeze()
}

/// Appends the escaped, terminated form of `data` to `buf`.
pub fn serialize(data: &[u8], buf: &mut BytesMut) {
    for &byte in data {
        match byte {
            TERMINATOR_BYTE => buf.put_slice(&[ESCAPE_BYTE, 0x01]),
            ESCAPE_BYTE => buf.put_slice(&[ESCAPE_BYTE, 0x02]),
            _ => buf.put_u8(byte),
        }
    }
    buf.put_u8(TERMINATOR_BYTE);
}

/// Decodes one terminated component and advances `buf` past its terminator.
///
/// # Errors
///
/// Returns an error on a truncated or unknown escape sequence, or when the
/// terminator is missing.
pub fn deserialize(buf: &mut &[u8]) -> Result<Bytes, DeserializeError> {
    let mut result = BytesMut::new();
    let mut i = 0;

    while i < buf.len() {
        match buf[i] {
            TERMINATOR_BYTE => {
                *buf = &buf[i + 1..];
                return Ok(result.freeze());
            }
            ESCAPE_BYTE => {
                let next = buf.get(i + 1).copied().ok_or_else(|| DeserializeError {
                    message: "truncated escape sequence in terminated bytes".to_string(),
                })?;
                match next {
                    0x01 => result.put_u8(TERMINATOR_BYTE),
                    0x02 => result.put_u8(ESCAPE_BYTE),
                    _ => {
                        return Err(DeserializeError {
                            message: format!("invalid escape sequence: 0x01 0x{:02x}", next),
                        });
                    }
                }
                i += 2;
            }
            byte => {
                result.put_u8(byte);
                i += 1;
            }
        }
    }

    Err(DeserializeError {
        message: "unterminated bytes sequence (missing 0x00 terminator)".to_string(),
    })
}

/// Creates a range over encoded keys whose first component starts with
/// the raw `prefix`.
pub fn prefix_range(prefix: &[u8]) -> BytesRange {
    if prefix.is_empty() {
        return BytesRange::unbounded();
    }
    let start = serialize_to_bytes(prefix);
    match lex_increment(prefix) {
        Some(end) => BytesRange::new(Included(start), Excluded(serialize_to_bytes(&end))),
        None => BytesRange::new(Included(start), Unbounded),
    }
}
