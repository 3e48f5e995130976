//! Per-message-set compression: GZIP, Snappy (both xerial-framed and raw-block), and LZ4-Frame.
//!
//! A `Message`'s attribute byte carries the codec in its low 3 bits (`protocol::message`); this
//! module only knows how to turn bytes into bytes, one codec at a time.

use std::io::{Read, Write};

#[cfg(feature = "gzip")]
use flate2::read::GzDecoder;
#[cfg(feature = "gzip")]
use flate2::write::GzEncoder;
#[cfg(feature = "gzip")]
use flate2::Compression as GzCompression;

#[cfg(feature = "snappy")]
use snap;

#[cfg(feature = "lz4")]
use lz4_compress;
#[cfg(feature = "lz4")]
use twox_hash::XxHash32;
#[cfg(feature = "lz4")]
use std::hash::Hasher;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use errors::{ErrorKind, Result};

/// The compression codec selected for a message (or message batch).
///
/// Encoded in the low 3 bits of a `Message`'s `attributes` byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Snappy,
    Lz4,
}

impl Compression {
    /// Decode the low 3 bits of an attributes byte into a `Compression`.
    ///
    /// Unrecognized bit patterns (4..=7) are surfaced as `ErrorKind::MetadataAttributes` by the
    /// caller rather than silently coerced to `None`; this function returns `None` only for
    /// wire value `0`, and panics-never by mapping anything else through `from_bits`.
    pub fn from_bits(bits: u8) -> Result<Compression> {
        match bits & 0x07 {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Gzip),
            2 => Ok(Compression::Snappy),
            3 => Ok(Compression::Lz4),
            other => bail!(ErrorKind::MetadataAttributes(format!(
                "unrecognized compression codec id {}",
                other
            ))),
        }
    }

    pub fn bits(&self) -> u8 {
        match *self {
            Compression::None => 0,
            Compression::Gzip => 1,
            Compression::Snappy => 2,
            Compression::Lz4 => 3,
        }
    }
}

/// Compress `data` under `codec`. `Compression::None` returns `data` unchanged.
pub fn compress(codec: Compression, data: &[u8]) -> Result<Vec<u8>> {
    match codec {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => compress_gzip(data),
        Compression::Snappy => compress_snappy_xerial(data),
        Compression::Lz4 => compress_lz4_frame(data),
    }
}

/// Decompress `data`, which was produced under `codec`. `Compression::None` returns `data`
/// unchanged. `max_inflate` bounds the size of the decompressed output to guard against
/// decompression bombs; `0` disables the check.
pub fn decompress(codec: Compression, data: &[u8], max_inflate: usize) -> Result<Vec<u8>> {
    let out = match codec {
        Compression::None => data.to_vec(),
        Compression::Gzip => decompress_gzip(data)?,
        Compression::Snappy => decompress_snappy(data)?,
        Compression::Lz4 => decompress_lz4_frame(data)?,
    };

    if max_inflate > 0 && out.len() > max_inflate {
        bail!(ErrorKind::Compression(format!(
            "decompressed {} bytes exceeds configured cap of {}",
            out.len(),
            max_inflate
        )));
    }

    Ok(out)
}

#[cfg(feature = "gzip")]
fn compress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), GzCompression::default());
    encoder
        .write_all(data)
        .map_err(|err| ErrorKind::Compression(format!("gzip encode failed: {}", err)))?;
    encoder
        .finish()
        .map_err(|err| ErrorKind::Compression(format!("gzip encode failed: {}", err)).into())
}

#[cfg(not(feature = "gzip"))]
fn compress_gzip(_data: &[u8]) -> Result<Vec<u8>> {
    bail!(ErrorKind::Compression("gzip support not compiled in".into()))
}

#[cfg(feature = "gzip")]
fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder =
        GzDecoder::new(data).map_err(|err| ErrorKind::Compression(format!("not gzip: {}", err)))?;
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|err| ErrorKind::Compression(format!("gzip decode failed: {}", err)))?;
    Ok(out)
}

#[cfg(not(feature = "gzip"))]
fn decompress_gzip(_data: &[u8]) -> Result<Vec<u8>> {
    bail!(ErrorKind::Compression("gzip support not compiled in".into()))
}

const XERIAL_MAGIC: &[u8] = b"\x82SNAPPY\0";
const XERIAL_VERSION: i32 = 1;
const XERIAL_COMPATIBLE_VERSION: i32 = 1;

#[cfg(feature = "snappy")]
fn compress_snappy_xerial(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2 + 32);
    out.extend_from_slice(XERIAL_MAGIC);
    let mut header = [0u8; 8];
    BigEndian::write_i32(&mut header[0..4], XERIAL_VERSION);
    BigEndian::write_i32(&mut header[4..8], XERIAL_COMPATIBLE_VERSION);
    out.extend_from_slice(&header);

    let block = snap::Encoder::new()
        .compress_vec(data)
        .map_err(|err| ErrorKind::Compression(format!("snappy encode failed: {}", err)))?;

    let mut len_buf = [0u8; 4];
    BigEndian::write_i32(&mut len_buf, block.len() as i32);
    out.extend_from_slice(&len_buf);
    out.extend_from_slice(&block);

    Ok(out)
}

#[cfg(not(feature = "snappy"))]
fn compress_snappy_xerial(_data: &[u8]) -> Result<Vec<u8>> {
    bail!(ErrorKind::Compression("snappy support not compiled in".into()))
}

#[cfg(feature = "snappy")]
fn decompress_snappy(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() >= XERIAL_MAGIC.len() && &data[..XERIAL_MAGIC.len()] == XERIAL_MAGIC {
        decompress_snappy_xerial(data)
    } else {
        snap::Decoder::new()
            .decompress_vec(data)
            .map_err(|err| ErrorKind::Compression(format!("snappy decode failed: {}", err)).into())
    }
}

#[cfg(feature = "snappy")]
fn decompress_snappy_xerial(data: &[u8]) -> Result<Vec<u8>> {
    let mut pos = XERIAL_MAGIC.len() + 8; // skip magic + version + compatible version
    let mut out = Vec::new();
    let mut decoder = snap::Decoder::new();

    while pos + 4 <= data.len() {
        let block_len = BigEndian::read_i32(&data[pos..pos + 4]) as usize;
        pos += 4;

        if pos + block_len > data.len() {
            // Tail-truncated block; tolerate as a clean end of stream rather than failing,
            // mirroring the message-set tail-tolerance rule.
            break;
        }

        let chunk = decoder
            .decompress_vec(&data[pos..pos + block_len])
            .map_err(|err| ErrorKind::Compression(format!("snappy decode failed: {}", err)))?;
        out.extend_from_slice(&chunk);
        pos += block_len;
    }

    Ok(out)
}

#[cfg(not(feature = "snappy"))]
fn decompress_snappy(_data: &[u8]) -> Result<Vec<u8>> {
    bail!(ErrorKind::Compression("snappy support not compiled in".into()))
}

const LZ4_FRAME_MAGIC: u32 = 0x184D_2204;
const LZ4_BLOCK_MAX_SIZE_CODE: u8 = 6; // 4MiB, matching the block-independence default

#[cfg(feature = "lz4")]
fn compress_lz4_frame(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2 + 32);
    let mut magic_buf = [0u8; 4];
    LittleEndian::write_u32(&mut magic_buf, LZ4_FRAME_MAGIC);
    out.extend_from_slice(&magic_buf);

    let flg: u8 = 0b0100_0000; // version 01, block independence set, no content checksum
    let bd: u8 = LZ4_BLOCK_MAX_SIZE_CODE << 4;
    out.push(flg);
    out.push(bd);

    let mut hasher = XxHash32::with_seed(0);
    hasher.write(&[flg, bd]);
    let hc = ((hasher.finish() >> 8) & 0xff) as u8;
    out.push(hc);

    let compressed = lz4_compress::compress(data);
    let mut size_buf = [0u8; 4];
    LittleEndian::write_u32(&mut size_buf, compressed.len() as u32);
    out.extend_from_slice(&size_buf);
    out.extend_from_slice(&compressed);

    out.extend_from_slice(&[0u8; 4]); // end mark

    Ok(out)
}

#[cfg(not(feature = "lz4"))]
fn compress_lz4_frame(_data: &[u8]) -> Result<Vec<u8>> {
    bail!(ErrorKind::Compression("lz4 support not compiled in".into()))
}

#[cfg(feature = "lz4")]
fn decompress_lz4_frame(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 7 {
        bail!(ErrorKind::Compression("lz4 frame too short".into()));
    }

    let magic = LittleEndian::read_u32(&data[0..4]);
    if magic != LZ4_FRAME_MAGIC {
        bail!(ErrorKind::Compression(format!(
            "not an LZ4 frame (bad magic {:#x})",
            magic
        )));
    }

    let mut pos = 7; // magic(4) + flg(1) + bd(1) + hc(1)
    let mut out = Vec::new();

    loop {
        if pos + 4 > data.len() {
            break;
        }
        let raw_size = LittleEndian::read_u32(&data[pos..pos + 4]);
        pos += 4;

        if raw_size == 0 {
            break; // end mark
        }

        let uncompressed = (raw_size & 0x8000_0000) != 0;
        let block_size = (raw_size & 0x7FFF_FFFF) as usize;

        if pos + block_size > data.len() {
            break; // tail-truncated block; stop cleanly
        }

        let block = &data[pos..pos + block_size];
        if uncompressed {
            out.extend_from_slice(block);
        } else {
            let decoded = lz4_compress::decompress(block)
                .map_err(|err| ErrorKind::Compression(format!("lz4 decode failed: {:?}", err)))?;
            out.extend_from_slice(&decoded);
        }
        pos += block_size;
    }

    Ok(out)
}

#[cfg(not(feature = "lz4"))]
fn decompress_lz4_frame(_data: &[u8]) -> Result<Vec<u8>> {
    bail!(ErrorKind::Compression("lz4 support not compiled in".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let data = b"hello kafka";
        assert_eq!(compress(Compression::None, data).unwrap(), data.to_vec());
        assert_eq!(
            decompress(Compression::None, data, 0).unwrap(),
            data.to_vec()
        );
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn gzip_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".to_vec();
        let packed = compress(Compression::Gzip, &data).unwrap();
        assert_eq!(decompress(Compression::Gzip, &packed, 0).unwrap(), data);
    }

    #[cfg(feature = "snappy")]
    #[test]
    fn snappy_xerial_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".to_vec();
        let packed = compress(Compression::Snappy, &data).unwrap();
        assert!(&packed[..8] == XERIAL_MAGIC);
        assert_eq!(decompress(Compression::Snappy, &packed, 0).unwrap(), data);
    }

    #[cfg(feature = "snappy")]
    #[test]
    fn snappy_raw_block_also_decodes() {
        let data = b"raw block snappy".to_vec();
        let raw = snap::Encoder::new().compress_vec(&data).unwrap();
        assert_eq!(decompress(Compression::Snappy, &raw, 0).unwrap(), data);
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn lz4_frame_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".to_vec();
        let packed = compress(Compression::Lz4, &data).unwrap();
        assert_eq!(decompress(Compression::Lz4, &packed, 0).unwrap(), data);
    }

    #[test]
    fn inflate_cap_rejects_oversized_output() {
        let data = b"hello kafka".to_vec();
        let err = decompress(Compression::None, &data, 1).unwrap_err();
        assert!(format!("{}", err).contains("exceeds configured cap"));
    }
}
