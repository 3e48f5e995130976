//! Portable signed-64-bit helpers.
//!
//! The protocol this client speaks is built on `i64` offsets and timestamps. On the Perl client
//! this library is descended from, a 32-bit host needed an explicit big-integer carrier for
//! these fields; every target Rust supports makes `i64` a native machine word, so this module is
//! a deliberately thin seam rather than a real emulation layer — it exists so the wire-format
//! boundary (big-endian two's complement, wrap-on-overflow arithmetic matching broker semantics)
//! has one place to live and be tested, instead of being reimplemented ad hoc at each call site.

use errors::{ErrorKind, Result};

/// Pack a signed 64-bit integer into its big-endian two's complement wire representation.
pub fn pack_i64(n: i64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    let bits = n as u64;
    for i in 0..8 {
        buf[i] = (bits >> (8 * (7 - i))) as u8;
    }
    buf
}

/// Unpack a big-endian two's complement signed 64-bit integer.
///
/// Returns `ErrorKind::MismatchArgument` if fewer than 8 bytes are supplied.
pub fn unpack_i64(bytes: &[u8]) -> Result<i64> {
    if bytes.len() < 8 {
        bail!(ErrorKind::MismatchArgument(format!(
            "unpack_i64 requires 8 bytes, got {}",
            bytes.len()
        )));
    }

    let mut bits: u64 = 0;
    for i in 0..8 {
        bits = (bits << 8) | u64::from(bytes[i]);
    }
    Ok(bits as i64)
}

/// Add two signed 64-bit integers, wrapping modulo 2^64 to match broker semantics rather than
/// panicking on overflow.
pub fn add_i64(a: i64, b: i64) -> i64 {
    a.wrapping_add(b)
}
