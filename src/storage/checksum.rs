//! Checksum framing
//!
//! Every persisted chunk, record and WAL entry carries a CRC32 so that torn
//! or bit-rotted files surface as [`DbError::Corruption`] instead of rows
//! that silently decode to the wrong thing.
//!
//! Two layouts are used:
//! - length framed: `[data_len: u32][data][crc: u32]` for records
//! - sealed: `[crc: u32][payload]` for chunk files, where the file length is
//!   the payload length

use crc32fast::Hasher;

use crate::error::{DbError, Result};

/// Checksum calculator
pub struct Checksum;

impl Checksum {
    pub fn compute(data: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Fails with the expected and actual values when `data` does not match
    pub fn verify(data: &[u8], expected: u32) -> std::result::Result<(), ChecksumError> {
        let actual = Self::compute(data);
        if actual != expected {
            return Err(ChecksumError::Mismatch {
                expected,
                actual,
                data_len: data.len(),
            });
        }
        Ok(())
    }

    /// Format: [data_len: u32][data: [u8]][checksum: u32]
    pub fn encode_with_checksum(data: &[u8]) -> Vec<u8> {
        let checksum = Self::compute(data);
        let mut encoded = Vec::with_capacity(4 + data.len() + 4);
        encoded.extend_from_slice(&(data.len() as u32).to_le_bytes());
        encoded.extend_from_slice(data);
        encoded.extend_from_slice(&checksum.to_le_bytes());
        encoded
    }

    pub fn decode_with_checksum(encoded: &[u8]) -> std::result::Result<&[u8], ChecksumError> {
        if encoded.len() < 8 {
            return Err(ChecksumError::InvalidFormat("data too short".to_string()));
        }

        let data_len = read_u32(&encoded[0..4]) as usize;
        if encoded.len() != 4 + data_len + 4 {
            return Err(ChecksumError::InvalidFormat(format!(
                "expected {} bytes, got {}",
                4 + data_len + 4,
                encoded.len()
            )));
        }

        let data = &encoded[4..4 + data_len];
        Self::verify(data, read_u32(&encoded[4 + data_len..]))?;
        Ok(data)
    }

    /// Format: [checksum: u32][payload: [u8]]
    pub fn seal(payload: &[u8]) -> Vec<u8> {
        let mut sealed = Vec::with_capacity(4 + payload.len());
        sealed.extend_from_slice(&Self::compute(payload).to_le_bytes());
        sealed.extend_from_slice(payload);
        sealed
    }

    pub fn unseal(sealed: &[u8]) -> std::result::Result<&[u8], ChecksumError> {
        if sealed.len() < 4 {
            return Err(ChecksumError::InvalidFormat("missing checksum header".to_string()));
        }
        let payload = &sealed[4..];
        Self::verify(payload, read_u32(&sealed[0..4]))?;
        Ok(payload)
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x} (data_len={data_len})")]
    Mismatch {
        expected: u32,
        actual: u32,
        data_len: usize,
    },

    #[error("invalid checksum format: {0}")]
    InvalidFormat(String),
}

impl From<ChecksumError> for DbError {
    fn from(err: ChecksumError) -> Self {
        DbError::Corruption(err.to_string())
    }
}

/// Unseal, attaching the path or key being read to the error
pub(crate) fn unseal_named<'a>(sealed: &'a [u8], what: &str) -> Result<&'a [u8]> {
    Checksum::unseal(sealed).map_err(|e| DbError::Corruption(format!("{}: {}", what, e)))
}

/// Length-framed decode, attaching the path or key being read to the error
pub(crate) fn decode_named<'a>(encoded: &'a [u8], what: &str) -> Result<&'a [u8]> {
    Checksum::decode_with_checksum(encoded).map_err(|e| DbError::Corruption(format!("{}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_basic() {
        let data = b"chunk payload";
        let checksum = Checksum::compute(data);

        assert!(Checksum::verify(data, checksum).is_ok());
        assert!(Checksum::verify(data, checksum.wrapping_add(1)).is_err());
        assert!(Checksum::verify(b"chunk paylaod", checksum).is_err());
    }

    #[test]
    fn test_empty_data() {
        assert_eq!(Checksum::compute(b""), 0);
        let sealed = Checksum::seal(b"");
        assert_eq!(sealed.len(), 4);
        assert_eq!(Checksum::unseal(&sealed).unwrap(), b"");
    }

    #[test]
    fn test_encode_decode() {
        let data = b"database record";
        let encoded = Checksum::encode_with_checksum(data);
        assert_eq!(encoded.len(), data.len() + 8);
        assert_eq!(Checksum::decode_with_checksum(&encoded).unwrap(), data);
    }

    #[test]
    fn test_decode_corrupted() {
        let mut encoded = Checksum::encode_with_checksum(b"database record");
        encoded[6] ^= 0xFF;
        assert!(matches!(
            Checksum::decode_with_checksum(&encoded),
            Err(ChecksumError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_format() {
        assert!(matches!(
            Checksum::decode_with_checksum(b"abc"),
            Err(ChecksumError::InvalidFormat(_))
        ));

        // claims 100 bytes of data, holds 12
        let mut invalid = vec![0u8; 20];
        invalid[0] = 100;
        assert!(matches!(
            Checksum::decode_with_checksum(&invalid),
            Err(ChecksumError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_unseal_truncated_file() {
        let sealed = Checksum::seal(b"[{\"id\":1},{\"id\":2}]");
        let torn = &sealed[..sealed.len() - 3];
        let err = unseal_named(torn, "chunks/shop/orders/0.chunk").unwrap_err();
        match err {
            DbError::Corruption(msg) => assert!(msg.starts_with("chunks/shop/orders/0.chunk")),
            other => panic!("expected corruption, got {:?}", other),
        }
        assert!(Checksum::unseal(b"ab").is_err());
    }
}
