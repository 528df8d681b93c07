//! Key codec: encoding, sizing and ordering of index keys.
//!
//! Three key types are supported:
//!
//! ```text
//! Int      4 bytes   i32, little-endian
//! Real     4 bytes   f32, little-endian
//! VarChar  4 + n     u32 payload length (little-endian) + n raw bytes
//! ```
//!
//! The tree stores and compares keys in this encoded form. Ordering is
//! numeric for `Int`, `f32::total_cmp` for `Real`, and lexicographic on the
//! payload (length prefix excluded) for `VarChar`. `-0.0` is stored and
//! compared as `0.0`, so both zeros are one key.

use std::cmp::Ordering;
use std::fmt;

use crate::common::config::MAX_KEY_SIZE;
use crate::common::{Error, Result};

/// Size of the VarChar length prefix.
const LENGTH_PREFIX: usize = 4;

/// Type of the keys held by an index file.
///
/// Fixed when the first entry is inserted and stored in the meta page.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Int = 0,
    Real = 1,
    VarChar = 2,
}

impl KeyType {
    /// Convert from u8, returning None for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(KeyType::Int),
            1 => Some(KeyType::Real),
            2 => Some(KeyType::VarChar),
            _ => None,
        }
    }

    /// Encoded size of fixed-width types.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            KeyType::Int | KeyType::Real => Some(4),
            KeyType::VarChar => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Int => write!(f, "int"),
            KeyType::Real => write!(f, "real"),
            KeyType::VarChar => write!(f, "varchar"),
        }
    }
}

/// An owned, typed key value.
///
/// # Example
/// ```
/// use ixdb::{Key, KeyType};
///
/// let key = Key::varchar("apple");
/// assert_eq!(key.key_type(), KeyType::VarChar);
///
/// let bytes = key.encode();
/// assert_eq!(&bytes[..4], &5u32.to_le_bytes());
/// assert_eq!(Key::decode(KeyType::VarChar, &bytes).unwrap(), key);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Int(i32),
    Real(f32),
    VarChar(Vec<u8>),
}

impl Key {
    /// Build a VarChar key from any byte-like value.
    pub fn varchar(value: impl AsRef<[u8]>) -> Self {
        Key::VarChar(value.as_ref().to_vec())
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Key::Int(_) => KeyType::Int,
            Key::Real(_) => KeyType::Real,
            Key::VarChar(_) => KeyType::VarChar,
        }
    }

    /// Encode into the on-page form.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Key::Int(v) => v.to_le_bytes().to_vec(),
            Key::Real(v) => unsigned_zero(*v).to_le_bytes().to_vec(),
            Key::VarChar(payload) => {
                let mut bytes = Vec::with_capacity(LENGTH_PREFIX + payload.len());
                bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                bytes.extend_from_slice(payload);
                bytes
            }
        }
    }

    /// Decode an on-page key of the given type.
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` if `bytes` is shorter than the encoding
    /// requires.
    pub fn decode(key_type: KeyType, bytes: &[u8]) -> Result<Self> {
        let size = encoded_size(key_type, bytes)?;
        let bytes = &bytes[..size];

        Ok(match key_type {
            KeyType::Int => Key::Int(i32::from_le_bytes(word(bytes))),
            KeyType::Real => Key::Real(f32::from_le_bytes(word(bytes))),
            KeyType::VarChar => Key::VarChar(bytes[LENGTH_PREFIX..].to_vec()),
        })
    }

    /// Encode, rejecting keys of the wrong type or above `MAX_KEY_SIZE`.
    pub(crate) fn encode_checked(&self, key_type: KeyType) -> Result<Vec<u8>> {
        if self.key_type() != key_type {
            return Err(Error::TypeMismatch {
                expected: key_type,
                found: self.key_type(),
            });
        }

        let bytes = self.encode();
        if bytes.len() > MAX_KEY_SIZE {
            return Err(Error::KeyTooLarge {
                size: bytes.len(),
                max: MAX_KEY_SIZE,
            });
        }
        Ok(bytes)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{}", v),
            Key::Real(v) => write!(f, "{}", v),
            Key::VarChar(payload) => write!(f, "{}", String::from_utf8_lossy(payload)),
        }
    }
}

/// Encoded size of a key, read from its bytes.
///
/// # Errors
/// Returns `Error::InvalidKey` if `bytes` is too short for the type (or,
/// for VarChar, for the length its prefix announces).
pub fn encoded_size(key_type: KeyType, bytes: &[u8]) -> Result<usize> {
    let size = match key_type.fixed_size() {
        Some(size) => size,
        None => {
            if bytes.len() < LENGTH_PREFIX {
                return Err(Error::InvalidKey {
                    key_type,
                    reason: "missing length prefix",
                });
            }
            LENGTH_PREFIX + u32::from_le_bytes(word(bytes)) as usize
        }
    };

    if bytes.len() < size {
        return Err(Error::InvalidKey {
            key_type,
            reason: "truncated key",
        });
    }
    Ok(size)
}

/// Compare two encoded keys of the same type.
///
/// Malformed input never panics: missing bytes compare as zero.
pub fn compare(key_type: KeyType, a: &[u8], b: &[u8]) -> Ordering {
    match key_type {
        KeyType::Int => i32::from_le_bytes(word(a)).cmp(&i32::from_le_bytes(word(b))),
        KeyType::Real => unsigned_zero(f32::from_le_bytes(word(a)))
            .total_cmp(&unsigned_zero(f32::from_le_bytes(word(b)))),
        KeyType::VarChar => payload(a).cmp(payload(b)),
    }
}

/// Fold `-0.0` into `0.0`; NaN and every other value pass through.
#[inline]
fn unsigned_zero(v: f32) -> f32 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// First four bytes, zero-padded.
#[inline]
fn word(bytes: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    let n = bytes.len().min(4);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

fn payload(bytes: &[u8]) -> &[u8] {
    if bytes.len() < LENGTH_PREFIX {
        return &[];
    }
    let len = u32::from_le_bytes(word(bytes)) as usize;
    let end = (LENGTH_PREFIX + len).min(bytes.len());
    &bytes[LENGTH_PREFIX..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_from_u8() {
        assert_eq!(KeyType::from_u8(0), Some(KeyType::Int));
        assert_eq!(KeyType::from_u8(1), Some(KeyType::Real));
        assert_eq!(KeyType::from_u8(2), Some(KeyType::VarChar));
        assert_eq!(KeyType::from_u8(3), None);
    }

    #[test]
    fn test_fixed_sizes() {
        assert_eq!(encoded_size(KeyType::Int, &Key::Int(-9).encode()).unwrap(), 4);
        assert_eq!(encoded_size(KeyType::Real, &Key::Real(1.5).encode()).unwrap(), 4);
    }

    #[test]
    fn test_varchar_size_includes_prefix() {
        let bytes = Key::varchar("hello").encode();
        assert_eq!(bytes.len(), 9);
        assert_eq!(encoded_size(KeyType::VarChar, &bytes).unwrap(), 9);

        // Trailing garbage is not part of the key
        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0xEE; 3]);
        assert_eq!(encoded_size(KeyType::VarChar, &padded).unwrap(), 9);
    }

    #[test]
    fn test_truncated_keys_rejected() {
        assert!(matches!(
            encoded_size(KeyType::Int, &[1, 2]),
            Err(Error::InvalidKey { .. })
        ));
        assert!(encoded_size(KeyType::VarChar, &[1]).is_err());
        // Prefix claims 10 bytes, only 2 present
        assert!(encoded_size(KeyType::VarChar, &[10, 0, 0, 0, b'a', b'b']).is_err());
    }

    #[test]
    fn test_int_compare_is_numeric() {
        let a = Key::Int(-5).encode();
        let b = Key::Int(3).encode();
        let c = Key::Int(300).encode();

        assert_eq!(compare(KeyType::Int, &a, &b), Ordering::Less);
        assert_eq!(compare(KeyType::Int, &c, &b), Ordering::Greater);
        assert_eq!(compare(KeyType::Int, &b, &b), Ordering::Equal);
    }

    #[test]
    fn test_real_compare_is_total() {
        let neg = Key::Real(-1.25).encode();
        let zero = Key::Real(0.0).encode();
        let pos = Key::Real(2.5).encode();
        let nan = Key::Real(f32::NAN).encode();

        assert_eq!(compare(KeyType::Real, &neg, &zero), Ordering::Less);
        assert_eq!(compare(KeyType::Real, &pos, &zero), Ordering::Greater);
        assert_eq!(compare(KeyType::Real, &nan, &nan), Ordering::Equal);
        assert_eq!(compare(KeyType::Real, &nan, &pos), Ordering::Greater);
    }

    #[test]
    fn test_real_signed_zeros_are_one_key() {
        let neg_zero = Key::Real(-0.0).encode();
        let zero = Key::Real(0.0).encode();

        assert_eq!(neg_zero, zero);
        assert_eq!(compare(KeyType::Real, &neg_zero, &zero), Ordering::Equal);

        // Bytes of -0.0 written by hand still compare equal to 0.0
        let raw_neg_zero = (-0.0f32).to_le_bytes();
        assert_eq!(compare(KeyType::Real, &raw_neg_zero, &zero), Ordering::Equal);
        assert_eq!(
            compare(KeyType::Real, &Key::Real(-1e-30).encode(), &raw_neg_zero),
            Ordering::Less
        );

        match Key::decode(KeyType::Real, &neg_zero).unwrap() {
            Key::Real(v) => assert!(v == 0.0 && v.is_sign_positive()),
            other => panic!("Expected Real, got {:?}", other),
        }
    }

    #[test]
    fn test_varchar_compare_ignores_length_prefix() {
        let short = Key::varchar("b").encode();
        let long = Key::varchar("abcdef").encode();
        let prefix = Key::varchar("ab").encode();

        // "b" > "abcdef" even though its length prefix is smaller
        assert_eq!(compare(KeyType::VarChar, &short, &long), Ordering::Greater);
        assert_eq!(compare(KeyType::VarChar, &prefix, &long), Ordering::Less);
        assert_eq!(compare(KeyType::VarChar, &long, &long), Ordering::Equal);
    }

    #[test]
    fn test_decode_roundtrip_per_type() {
        for key in [Key::Int(i32::MIN), Key::Real(-0.5), Key::varchar("zebra")] {
            let decoded = Key::decode(key.key_type(), &key.encode()).unwrap();
            assert_eq!(decoded, key);
        }
    }

    #[test]
    fn test_encode_checked() {
        assert!(matches!(
            Key::Int(1).encode_checked(KeyType::VarChar),
            Err(Error::TypeMismatch {
                expected: KeyType::VarChar,
                found: KeyType::Int
            })
        ));

        let huge = Key::VarChar(vec![b'x'; MAX_KEY_SIZE]);
        assert!(matches!(
            huge.encode_checked(KeyType::VarChar),
            Err(Error::KeyTooLarge { .. })
        ));

        let fits = Key::VarChar(vec![b'x'; MAX_KEY_SIZE - 4]);
        assert_eq!(
            fits.encode_checked(KeyType::VarChar).unwrap().len(),
            MAX_KEY_SIZE
        );
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key::Int(42).to_string(), "42");
        assert_eq!(Key::Real(1.5).to_string(), "1.5");
        assert_eq!(Key::varchar("abc").to_string(), "abc");
    }
}
