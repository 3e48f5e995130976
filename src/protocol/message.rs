//! `Message` and `MessageSet` — the wire format shared by `ProduceRequest` and `FetchResponse`
//! (§6.7).
//!
//! ```text
//! MessageSet => [Offset MessageSize Message]
//!   Offset => int64
//!   MessageSize => int32
//!
//! Message => Crc MagicByte Attributes [Timestamp] Key Value
//!   Crc => int32
//!   MagicByte => int8        ; 0 = v0 (no timestamp), 1 = v1 (with timestamp, 0.10+)
//!   Attributes => int8       ; low 3 bits = compression codec id
//!   Timestamp => int64       ; only present when MagicByte >= 1
//!   Key => bytes
//!   Value => bytes
//! ```
//!
//! The CRC is computed over exactly `magic || attributes || key_length || key || value_length ||
//! value` — the timestamp field, when present, sits on the wire but deliberately outside the CRC
//! region, matching the invariant this client was specified against.

use byteorder::{BigEndian, ByteOrder};

use crc32;
use compression::{self, Compression};
use errors::{ErrorKind, Result};
use protocol::codec::{Decoder, Encoder};

pub const TIMESTAMP_TYPE_MASK: i8 = 0x08;
pub const COMPRESSION_CODEC_MASK: i8 = 0x07;

/// Whether a v1 message's timestamp was stamped by the producer or rewritten by the broker on
/// append.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageTimestamp {
    CreateTime(i64),
    LogAppendTime(i64),
}

impl MessageTimestamp {
    pub fn value(&self) -> i64 {
        match *self {
            MessageTimestamp::CreateTime(v) | MessageTimestamp::LogAppendTime(v) => v,
        }
    }
}

/// A single Kafka record, independent of its position in a `MessageSet`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub magic: i8,
    pub compression: Compression,
    pub timestamp: Option<MessageTimestamp>,
}

impl Message {
    /// A v0 (no-timestamp), uncompressed message carrying `value` and no key.
    pub fn new(value: Vec<u8>) -> Message {
        Message {
            key: None,
            value: Some(value),
            magic: 0,
            compression: Compression::None,
            timestamp: None,
        }
    }

    pub fn with_key(key: Vec<u8>, value: Vec<u8>) -> Message {
        Message {
            key: Some(key),
            value: Some(value),
            magic: 0,
            compression: Compression::None,
            timestamp: None,
        }
    }

    fn attributes(&self) -> i8 {
        let timestamp_bit = match self.timestamp {
            Some(MessageTimestamp::LogAppendTime(_)) => TIMESTAMP_TYPE_MASK,
            _ => 0,
        };
        (self.compression.bits() as i8 & COMPRESSION_CODEC_MASK) | timestamp_bit
    }

    /// Encode this message's crc-protected region: `magic || attributes || key || value`.
    fn crc_region(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.write_i8(self.magic);
        enc.write_i8(self.attributes());
        enc.write_bytes(self.key.as_ref().map(Vec::as_slice));
        enc.write_bytes(self.value.as_ref().map(Vec::as_slice));
        enc.into_bytes()
    }

    fn encode(&self, offset: i64, enc: &mut Encoder) {
        enc.write_i64(offset);

        let region = self.crc_region();
        let crc = crc32::checksum(&region);

        // MessageSize covers crc + the crc region (but not the offset/size fields themselves).
        let message_size = 4 + region.len() + if self.magic > 0 { 8 } else { 0 };
        enc.write_i32(message_size as i32);
        enc.write_i32(crc as i32);
        enc.write_i8(self.magic);
        enc.write_i8(self.attributes());
        if self.magic > 0 {
            let ts = self.timestamp.map(|t| t.value()).unwrap_or(0);
            enc.write_i64(ts);
        }
        enc.write_bytes(self.key.as_ref().map(Vec::as_slice));
        enc.write_bytes(self.value.as_ref().map(Vec::as_slice));
    }
}

/// An ordered batch of records to encode into a single `ProduceRequest` partition entry, or
/// decoded out of a single `FetchResponse` partition entry before per-message validation.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSet {
    pub messages: Vec<(i64, Message)>,
}

impl MessageSet {
    pub fn new(messages: Vec<Message>) -> MessageSet {
        MessageSet {
            messages: messages.into_iter().map(|m| (0, m)).collect(),
        }
    }

    /// Encode the set. If `compression` is not `None`, the entire set is wrapped as the
    /// compressed value of a single outer message (one level of recursion, §4.2).
    pub fn encode(&self, compression: Compression) -> Result<Vec<u8>> {
        if compression == Compression::None {
            let mut enc = Encoder::new();
            for &(offset, ref message) in &self.messages {
                message.encode(offset, &mut enc);
            }
            return Ok(enc.into_bytes());
        }

        let mut inner = Encoder::new();
        for (i, &(_, ref message)) in self.messages.iter().enumerate() {
            message.encode(i as i64, &mut inner);
        }
        let inner_bytes = inner.into_bytes();
        let compressed = compression::compress(compression, &inner_bytes)?;

        let outer_offset = (self.messages.len() as i64).saturating_sub(1);
        let outer = Message {
            key: None,
            value: Some(compressed),
            magic: self.messages.first().map(|&(_, ref m)| m.magic).unwrap_or(0),
            compression: compression,
            timestamp: None,
        };

        let mut enc = Encoder::new();
        outer.encode(outer_offset, &mut enc);
        Ok(enc.into_bytes())
    }
}

/// A decoded, validated record as surfaced to a consumer (§4.9).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub offset: i64,
    pub next_offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub magic: i8,
    pub attributes: i8,
    pub valid: bool,
    pub error: Option<String>,
}

/// Decode a wire `MessageSet` byte region into validated records.
///
/// Tolerates a truncated final record (P5): EOF at a record boundary, or a declared
/// `MessageSize` that would run past the end of `bytes`, silently ends decoding and returns the
/// successfully decoded prefix rather than erroring. `max_inflate` bounds decompression of any
/// compressed inner set (0 disables the cap).
pub fn decode_message_set(bytes: &[u8], max_inflate: usize) -> Result<Vec<DecodedMessage>> {
    let mut dec = Decoder::new(bytes);
    let mut out = Vec::new();

    loop {
        let offset = match dec.try_take(8) {
            Some(raw) => ::int64::unpack_i64(raw)?,
            None => break, // clean end of set
        };

        let size = match dec.try_take(4) {
            Some(raw) => BigEndian::read_i32(raw) as usize,
            None => break, // truncated: offset present, size missing
        };

        let body = match dec.try_take(size) {
            Some(body) => body,
            None => break, // truncated: declared size runs past what we have
        };

        out.extend(decode_one_entry(offset, body, max_inflate)?);
    }

    Ok(out)
}

/// Decode a single `{offset, size, message}` entry into one or more `DecodedMessage`s — more
/// than one when the message is a compressed batch wrapping an inner `MessageSet`.
fn decode_one_entry(offset: i64, body: &[u8], max_inflate: usize) -> Result<Vec<DecodedMessage>> {
    let mut dec = Decoder::new(body);
    let mut faults = Vec::new();

    let crc = dec.read_i32()? as u32;

    let magic = dec.read_i8()?;
    let attributes = dec.read_i8()?;

    let recognized_magic = magic == 0 || magic == 1;
    if !recognized_magic {
        faults.push(format!("unrecognized magic byte {}", magic));
    }

    if magic > 0 {
        dec.read_i64()?; // timestamp: on the wire, outside the crc region
    }

    let key = dec.read_bytes()?;
    let value = dec.read_bytes()?;
    dec.expect_exhausted()?;

    // Recompute the crc over magic||attributes||key||value (the wire layout minus crc and
    // timestamp), matching the region `Message::crc_region` builds on encode.
    let mut crc_enc = Encoder::new();
    crc_enc.write_i8(magic);
    crc_enc.write_i8(attributes);
    crc_enc.write_bytes(key.as_ref().map(Vec::as_slice));
    crc_enc.write_bytes(value.as_ref().map(Vec::as_slice));
    let region = crc_enc.into_bytes();
    let computed = crc32::checksum(&region);

    if computed != crc {
        faults.push(format!(
            "checksum mismatch: expected {:#x}, computed {:#x}",
            crc, computed
        ));
    }

    let compression = match Compression::from_bits(attributes as u8) {
        Ok(c) => c,
        Err(err) => {
            faults.push(format!("{}", err));
            Compression::None
        }
    };

    if compression != Compression::None && recognized_magic && faults.is_empty() {
        // Decompress and recurse one level; the outer offset is that of the LAST inner message
        // (§4.2), so inner messages — which carry relative offsets `0..n-1` as written by
        // `MessageSet::encode` — are renumbered relative to it.
        let decompressed = match value {
            Some(ref v) => compression::decompress(compression, v, max_inflate),
            None => bail!(ErrorKind::Compression("compressed message has no value".into())),
        };

        match decompressed {
            Ok(inner_bytes) => {
                let inner = decode_message_set(&inner_bytes, max_inflate)?;
                let last_relative = inner.len().saturating_sub(1) as i64;
                return Ok(inner
                    .into_iter()
                    .map(|mut m| {
                        let absolute = offset - last_relative + m.offset;
                        m.next_offset = absolute + 1;
                        m.offset = absolute;
                        m
                    })
                    .collect());
            }
            Err(err) => faults.push(format!("{}", err)),
        }
    }

    let valid = faults.is_empty();
    let error = if valid { None } else { Some(faults.join("; ")) };

    // `next_offset` is derived as `offset + 1` (§3 invariant: each entry's wire offset is the
    // absolute offset of its last contained record) rather than read off a broker-supplied
    // fixture value, since a single uncompressed entry always spans exactly one offset.
    Ok(vec![DecodedMessage {
        offset: offset,
        next_offset: offset + 1,
        key: key,
        value: value,
        magic: magic,
        attributes: attributes,
        valid: valid,
        error: error,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use compression::Compression;

    #[test]
    fn round_trips_uncompressed_message_set() {
        let set = MessageSet::new(vec![
            Message::new(b"first".to_vec()),
            Message::new(b"second".to_vec()),
        ]);
        let bytes = set.encode(Compression::None).unwrap();
        let decoded = decode_message_set(&bytes, 0).unwrap();

        assert_eq!(decoded.len(), 2);
        assert!(decoded.iter().all(|m| m.valid));
        assert_eq!(decoded[0].value, Some(b"first".to_vec()));
        assert_eq!(decoded[1].value, Some(b"second".to_vec()));
    }

    #[test]
    fn crc_mismatch_marks_invalid_not_erroring() {
        let set = MessageSet::new(vec![Message::new(b"hello".to_vec())]);
        let mut bytes = set.encode(Compression::None).unwrap();
        // layout: offset(8) size(4) crc(4) ...; corrupt a byte inside the crc field.
        bytes[12] ^= 0xff;

        let decoded = decode_message_set(&bytes, 0).unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(!decoded[0].valid);
        assert!(decoded[0].error.as_ref().unwrap().contains("checksum mismatch"));
    }

    #[test]
    fn tolerates_truncated_tail() {
        let set = MessageSet::new(vec![
            Message::new(b"The first message".to_vec()),
            Message::new(b"The second message".to_vec()),
            Message::new(b"The third message".to_vec()),
        ]);
        let full = set.encode(Compression::None).unwrap();
        let truncated = &full[..full.len() - 3];

        let decoded = decode_message_set(truncated, 0).unwrap();
        assert_eq!(decoded.len(), 2);
        assert!(decoded.iter().all(|m| m.valid));
    }

    #[test]
    fn empty_set_decodes_to_empty_vec() {
        assert_eq!(decode_message_set(&[], 0).unwrap(), vec![]);
    }

    #[test]
    fn unrecognized_magic_marks_invalid_not_erroring() {
        let set = MessageSet::new(vec![Message::new(b"hello".to_vec())]);
        let mut bytes = set.encode(Compression::None).unwrap();
        // layout: offset(8) size(4) crc(4) magic(1) ...; magic lives right after the crc field.
        bytes[16] = 7;

        let decoded = decode_message_set(&bytes, 0).unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(!decoded[0].valid);
        assert!(decoded[0].error.as_ref().unwrap().contains("unrecognized magic"));
    }

    #[test]
    fn single_uncompressed_message_has_exact_wire_length() {
        // offset(8) + size(4) + [crc(4) + magic(1) + attributes(1) + key(4, null) + value(4 + len)]
        let payload = b"Single message";
        let set = MessageSet::new(vec![Message::new(payload.to_vec())]);
        let bytes = set.encode(Compression::None).unwrap();

        let crc_region_len = 1 + 1 + 4 + (4 + payload.len());
        let expected = 8 + 4 + crc_region_len;
        assert_eq!(bytes.len(), expected);

        let decoded = decode_message_set(&bytes, 0).unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(decoded[0].valid);
        assert_eq!(decoded[0].value, Some(payload.to_vec()));
    }
}
