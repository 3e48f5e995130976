//! `ApiVersionsRequest` / `ApiVersionsResponse` (API key 18) — a supplemental probe (§4.13),
//! not one of the four APIs listed in §6.2, used only to discover what a freshly dialed broker
//! supports. Never fatal: older 0.8/0.9 brokers simply don't understand this key.

use errors::Result;
use protocol::codec::{Decoder, Encoder, RequestHeader, ResponseHeader};

#[derive(Debug, Clone, PartialEq)]
pub struct ApiVersionsRequest {
    pub header: RequestHeader,
}

impl ApiVersionsRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.header.encode(&mut enc);
        enc.into_bytes()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiVersionsResponse {
    pub header: ResponseHeader,
    pub error_code: i16,
    pub api_versions: Vec<SupportedApiVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedApiVersion {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

impl ApiVersionsResponse {
    pub fn decode(bytes: &[u8]) -> Result<ApiVersionsResponse> {
        let mut dec = Decoder::new(bytes);
        let header = ResponseHeader::decode(&mut dec)?;
        let error_code = dec.read_i16()?;
        let api_versions = dec.read_array(|dec| {
            Ok(SupportedApiVersion {
                api_key: dec.read_i16()?,
                min_version: dec.read_i16()?,
                max_version: dec.read_i16()?,
            })
        })?;
        dec.expect_exhausted()?;

        Ok(ApiVersionsResponse {
            header: header,
            error_code: error_code,
            api_versions: api_versions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::codec::ApiKeys;

    #[test]
    fn encodes_and_decodes() {
        let req = ApiVersionsRequest {
            header: RequestHeader::new(ApiKeys::ApiVersions, 123, Some("client")),
        };
        let bytes = req.encode();
        assert_eq!(&bytes[0..2], &[0, 18]); // api_key

        let mut enc = Encoder::new();
        enc.write_i32(123);
        enc.write_i16(0);
        enc.write_array(&[(1i16, 2i16, 3i16)], |enc, &(k, min, max)| {
            enc.write_i16(k);
            enc.write_i16(min);
            enc.write_i16(max);
        });
        let resp = ApiVersionsResponse::decode(&enc.into_bytes()).unwrap();
        assert_eq!(resp.api_versions[0].max_version, 3);
    }
}
