//! WAL entry encoding and decoding
//!
//! This module frames WAL records with a length prefix and CRC32 checksum
//! for torn-write and corruption detection.
//!
//! ## Entry Format
//!
//! ```text
//! [length: u32][opcode: u8][payload: bytes][crc32: u32]
//! ```
//!
//! - **length**: Total size of opcode + payload + crc (NOT including length itself)
//! - **opcode**: Record opcode (see [`crate::record::opcodes`])
//! - **payload**: Fixed-layout little-endian record payload
//! - **crc32**: CRC32 checksum over \[opcode\]\[payload\]

use crate::record::WalRecord;
use crc32fast::Hasher;
use vectory_core::error::{Error, Result};

/// Bytes of framing around the opcode + payload body: length(4) + crc(4)
pub const FRAME_OVERHEAD: usize = 8;

/// Smallest valid `length` field: opcode(1) + crc(4)
const MIN_ENTRY_LEN: usize = 5;

/// Encode a WAL record to bytes
///
/// Format: `[length: u32][opcode: u8][payload: bytes][crc32: u32]`
///
/// Returns byte buffer ready for file I/O.
pub fn encode_entry(record: &WalRecord) -> Result<Vec<u8>> {
    let opcode = record.opcode();

    // Calculate total length: opcode(1) + payload + crc(4)
    let total_len = 1 + record.payload_len() + 4;

    let mut buf = Vec::with_capacity(4 + total_len);
    buf.extend_from_slice(&(total_len as u32).to_le_bytes());
    buf.push(opcode);
    record.write_payload(&mut buf)?;

    // CRC over [opcode][payload]
    let mut hasher = Hasher::new();
    hasher.update(&buf[4..]);
    let crc = hasher.finalize();
    buf.extend_from_slice(&crc.to_le_bytes());

    debug_assert_eq!(buf.len(), 4 + total_len);
    Ok(buf)
}

/// Decode a WAL record from bytes with CRC validation
///
/// Returns the decoded record and the number of bytes consumed.
///
/// # Arguments
///
/// * `buf` - Buffer starting at an encoded entry
/// * `offset` - File offset of `buf[0]`, for error reporting
///
/// # Errors
///
/// - `IncompleteEntry` if `buf` ends before the entry does (torn write)
/// - `Corruption` if the length field is impossible
/// - `ChecksumMismatch` if the CRC does not match
/// - `UnknownOpcode` / `Corruption` from record decoding, once the CRC passed
pub fn decode_entry(buf: &[u8], offset: u64) -> Result<(WalRecord, usize)> {
    let len_bytes: [u8; 4] = match buf.get(..4) {
        Some(b) => [b[0], b[1], b[2], b[3]],
        None => {
            // Buffer too short to read length - incomplete entry, not corruption
            return Err(Error::IncompleteEntry {
                offset,
                have: buf.len(),
                needed: 4,
            });
        }
    };
    let total_len = u32::from_le_bytes(len_bytes) as usize;

    // Validate minimum length before arithmetic (prevent underflow)
    if total_len < MIN_ENTRY_LEN {
        return Err(Error::Corruption(format!(
            "offset {}: Invalid entry length {} (minimum is {} bytes: opcode(1) + crc(4))",
            offset, total_len, MIN_ENTRY_LEN
        )));
    }

    // Check buffer has enough bytes - this is incomplete data, not corruption
    if buf.len() < 4 + total_len {
        return Err(Error::IncompleteEntry {
            offset,
            have: buf.len(),
            needed: 4 + total_len,
        });
    }

    let body = &buf[4..4 + total_len - 4];
    let crc_bytes = &buf[4 + total_len - 4..4 + total_len];
    let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

    let mut hasher = Hasher::new();
    hasher.update(body);
    let actual = hasher.finalize();

    if actual != expected {
        return Err(Error::ChecksumMismatch {
            offset,
            expected,
            actual,
        });
    }

    let record = WalRecord::from_bytes(body, offset)?;
    Ok((record, 4 + total_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::opcodes;

    #[test]
    fn test_encode_decode_roundtrip() {
        let record = WalRecord::SetConnectionsAtLevel {
            id: 3,
            level: 1,
            neighbors: vec![1, 2],
        };

        let encoded = encode_entry(&record).unwrap();
        let (decoded, bytes_consumed) = decode_entry(&encoded, 0).unwrap();

        assert_eq!(record, decoded);
        assert_eq!(bytes_consumed, encoded.len());
        assert_eq!(encoded.len(), FRAME_OVERHEAD + 1 + record.payload_len());
    }

    #[test]
    fn test_decode_consumes_only_first_entry() {
        let a = WalRecord::DeleteVertex { id: 1 };
        let b = WalRecord::AddVertex { id: 2, level: 0 };
        let mut buf = encode_entry(&a).unwrap();
        let first_len = buf.len();
        buf.extend(encode_entry(&b).unwrap());

        let (decoded, consumed) = decode_entry(&buf, 0).unwrap();
        assert_eq!(decoded, a);
        assert_eq!(consumed, first_len);

        let (decoded, _) = decode_entry(&buf[consumed..], consumed as u64).unwrap();
        assert_eq!(decoded, b);
    }

    #[test]
    fn test_truncated_entry_is_incomplete() {
        let encoded = encode_entry(&WalRecord::AddVertex { id: 9, level: 2 }).unwrap();

        for cut in [0, 2, 4, encoded.len() - 1] {
            let err = decode_entry(&encoded[..cut], 0).unwrap_err();
            assert!(err.is_incomplete(), "cut at {} gave {:?}", cut, err);
        }
    }

    #[test]
    fn test_crc_detects_bit_flip() {
        let mut encoded = encode_entry(&WalRecord::DeleteVertex { id: 77 }).unwrap();
        encoded[6] ^= 0xFF;

        let err = decode_entry(&encoded, 128).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { offset: 128, .. }));
    }

    #[test]
    fn test_invalid_length_is_corruption() {
        let buf = [2u8, 0, 0, 0, 0, 0];
        let err = decode_entry(&buf, 0).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }

    #[test]
    fn test_unknown_opcode_with_valid_crc() {
        let body = [0x7fu8, 1, 2, 3];
        let mut hasher = Hasher::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let mut buf = Vec::new();
        buf.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
        buf.extend_from_slice(&body);
        buf.extend_from_slice(&crc.to_le_bytes());

        let err = decode_entry(&buf, 0).unwrap_err();
        assert!(matches!(err, Error::UnknownOpcode { opcode: 0x7f, .. }));
        assert_ne!(0x7f, opcodes::DELETE_VERTEX);
    }
}
