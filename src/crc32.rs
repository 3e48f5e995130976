//! IEEE CRC32, as used to validate a Kafka `Message`'s `magic || attributes || key || value`
//! region.
//!
//! Delegates to the `crc` crate's table-driven IEEE implementation (polynomial `0xEDB88320`,
//! reflected, initial `0xFFFFFFFF`, final XOR `0xFFFFFFFF`) rather than hand-rolling a table,
//! matching how the teacher's own `protocol::message` module computes message checksums.

use crc::crc32;

/// Compute the IEEE CRC32 checksum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u32 {
    crc32::checksum_ieee(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // Standard CRC-32/ISO-HDLC check value for the ASCII string "123456789".
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn empty_input() {
        assert_eq!(checksum(b""), 0);
    }
}
