//! Shared primitives for encoding requests and decoding responses: big-endian numeric writes,
//! length-prefixed strings and byte arrays, length-prefixed arrays of elements, and the common
//! request/response headers (§6.1).
//!
//! `Encoder` wraps an output `Vec<u8>`; `Decoder` wraps an input `&[u8]` cursor. Both are cheap,
//! single-use, and make no attempt to be zero-copy beyond borrowing the input slice for string
//! and byte-array spans before they are owned into `String`/`Vec<u8>`.

use byteorder::{BigEndian, ByteOrder};

use errors::{ErrorKind, Result};

/// The API keys this client knows how to encode/decode (§6.2), plus the ApiVersions probe used
/// by `Cluster::probe_api_versions` (§4.13).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApiKeys {
    Produce,
    Fetch,
    Offsets,
    Metadata,
    ApiVersions,
}

impl ApiKeys {
    pub fn code(&self) -> i16 {
        match *self {
            ApiKeys::Produce => 0,
            ApiKeys::Fetch => 1,
            ApiKeys::Offsets => 2,
            ApiKeys::Metadata => 3,
            ApiKeys::ApiVersions => 18,
        }
    }

    pub fn from_code(code: i16) -> Result<ApiKeys> {
        match code {
            0 => Ok(ApiKeys::Produce),
            1 => Ok(ApiKeys::Fetch),
            2 => Ok(ApiKeys::Offsets),
            3 => Ok(ApiKeys::Metadata),
            18 => Ok(ApiKeys::ApiVersions),
            other => bail!(ErrorKind::UnknownApiKey(other)),
        }
    }
}

/// Request header common to every request type (§6.1).
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHeader {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

impl RequestHeader {
    pub fn new(api_key: ApiKeys, correlation_id: i32, client_id: Option<&str>) -> RequestHeader {
        RequestHeader {
            api_key: api_key.code(),
            api_version: 0,
            correlation_id: correlation_id,
            client_id: client_id.map(str::to_owned),
        }
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.write_i16(self.api_key);
        enc.write_i16(self.api_version);
        enc.write_i32(self.correlation_id);
        enc.write_string(self.client_id.as_ref().map(String::as_str));
    }
}

/// Response header common to every response type (§6.1).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    pub correlation_id: i32,
}

impl ResponseHeader {
    pub fn decode(dec: &mut Decoder) -> Result<ResponseHeader> {
        Ok(ResponseHeader {
            correlation_id: dec.read_i32()?,
        })
    }
}

/// Append-only big-endian byte buffer used to build a request body (the `size` frame prefix is
/// added by `network::BrokerIo::send`, not here).
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Encoder {
        Encoder { buf: Vec::with_capacity(256) }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn write_i16(&mut self, v: i16) {
        let mut tmp = [0u8; 2];
        BigEndian::write_i16(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn write_i32(&mut self, v: i32) {
        let mut tmp = [0u8; 4];
        BigEndian::write_i32(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&::int64::pack_i64(v));
    }

    /// `nullable_string`: `i16` length prefix, `-1` for `None`.
    pub fn write_string(&mut self, s: Option<&str>) {
        match s {
            None => self.write_i16(-1),
            Some(s) => {
                self.write_i16(s.len() as i16);
                self.buf.extend_from_slice(s.as_bytes());
            }
        }
    }

    /// `bytes`: `i32` length prefix, `-1` for `None`.
    pub fn write_bytes(&mut self, b: Option<&[u8]>) {
        match b {
            None => self.write_i32(-1),
            Some(b) => {
                self.write_i32(b.len() as i32);
                self.buf.extend_from_slice(b);
            }
        }
    }

    /// `array`: `i32` count prefix, then each element encoded by `encode_one`.
    pub fn write_array<T, F>(&mut self, items: &[T], mut encode_one: F)
    where
        F: FnMut(&mut Encoder, &T),
    {
        self.write_i32(items.len() as i32);
        for item in items {
            encode_one(self, item);
        }
    }

    pub fn extend_raw(&mut self, raw: &[u8]) {
        self.buf.extend_from_slice(raw);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }
}

/// A cursor over a decoded response body. Every read advances the cursor and fails with
/// `ErrorKind::RequestOrResponse` if the declared frame doesn't have enough bytes left — this is
/// how P3 (length discipline) is enforced uniformly across every response type.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Decoder<'a> {
        Decoder { buf: buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fail unless every byte of the frame was consumed by decoding (P3).
    pub fn expect_exhausted(&self) -> Result<()> {
        if self.remaining() != 0 {
            bail!(ErrorKind::RequestOrResponse(format!(
                "{} trailing bytes after decoding response",
                self.remaining()
            )));
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            bail!(ErrorKind::RequestOrResponse(format!(
                "expected {} more bytes, only {} remain",
                n,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Like `take`, but returns `None` instead of erroring when fewer than `n` bytes remain —
    /// used by the message-set decoder to implement tail tolerance (P5) instead of failing.
    pub fn try_take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        Some(&self.buf[self.pos..self.pos + n])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        ::int64::unpack_i64(self.take(8)?)
    }

    pub fn read_string(&mut self) -> Result<Option<String>> {
        let len = self.read_i16()?;
        if len < 0 {
            return Ok(None);
        }
        let raw = self.take(len as usize)?;
        let s = ::std::str::from_utf8(raw)?;
        Ok(Some(s.to_owned()))
    }

    pub fn read_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(self.take(len as usize)?.to_vec()))
    }

    pub fn read_array<T, F>(&mut self, mut decode_one: F) -> Result<Vec<T>>
    where
        F: FnMut(&mut Decoder<'a>) -> Result<T>,
    {
        let count = self.read_i32()?;
        if count < 0 {
            return Ok(Vec::new());
        }
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(decode_one(self)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip() {
        let mut enc = Encoder::new();
        enc.write_string(Some("test"));
        enc.write_string(None);
        let bytes = enc.into_bytes();

        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.read_string().unwrap(), Some("test".to_owned()));
        assert_eq!(dec.read_string().unwrap(), None);
        dec.expect_exhausted().unwrap();
    }

    #[test]
    fn bytes_round_trip() {
        let mut enc = Encoder::new();
        enc.write_bytes(Some(b"payload"));
        enc.write_bytes(None);
        let bytes = enc.into_bytes();

        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.read_bytes().unwrap(), Some(b"payload".to_vec()));
        assert_eq!(dec.read_bytes().unwrap(), None);
    }

    #[test]
    fn array_round_trip() {
        let mut enc = Encoder::new();
        enc.write_array(&[1i32, 2, 3], |enc, v| enc.write_i32(*v));
        let bytes = enc.into_bytes();

        let mut dec = Decoder::new(&bytes);
        let items: Vec<i32> = dec.read_array(|dec| dec.read_i32()).unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn short_frame_is_an_error() {
        let mut dec = Decoder::new(&[0u8, 1]);
        assert!(dec.read_i32().is_err());
    }

    #[test]
    fn exhaustion_check_catches_trailing_bytes() {
        let dec = Decoder::new(&[0u8, 1, 2]);
        assert!(dec.expect_exhausted().is_err());
    }
}
