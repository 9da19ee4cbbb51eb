//! On-disk chunk framing: u32 length (compression byte + data), one
//! compression byte, compressed tag bytes, zero padding to the sector end.

use crate::SECTOR_BYTES;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::warn;
use std::io::{Read, Write};
use strata_common::{Result, StrataError};

/// gzip; never written, only read from old files
pub const COMPRESSION_GZIP: u8 = 1;
/// zlib deflate
pub const COMPRESSION_ZLIB: u8 = 2;

/// Bytes taken by the length and compression fields.
pub const FRAME_OVERHEAD: usize = 5;

/// Number of sectors needed to hold `len` framed bytes.
pub fn sectors_for(len: usize) -> usize {
    len.div_ceil(SECTOR_BYTES as usize)
}

/// Compresses `data` with zlib and frames it. Padding is left to the caller.
pub fn encode(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    let mut framed = Vec::with_capacity(compressed.len() + FRAME_OVERHEAD);
    framed.write_u32::<BigEndian>(compressed.len() as u32 + 1)?;
    framed.write_u8(COMPRESSION_ZLIB)?;
    framed.extend_from_slice(&compressed);
    Ok(framed)
}

/// Reads one framed payload, which may span at most `capacity` bytes, and
/// returns the decompressed tag bytes.
pub fn decode<R: Read>(reader: &mut R, capacity: usize) -> Result<Vec<u8>> {
    let length = reader
        .read_u32::<BigEndian>()
        .map_err(StrataError::from_decode)? as usize;
    if length == 0 {
        return Err(StrataError::format("Chunk payload has zero length"));
    }
    if length + 4 > capacity {
        return Err(StrataError::format(format!(
            "Chunk of length {} exceeds its {} allocated bytes",
            length, capacity
        )));
    }

    let compression = reader.read_u8().map_err(StrataError::from_decode)?;
    let mut compressed = vec![0u8; length - 1];
    reader
        .read_exact(&mut compressed)
        .map_err(StrataError::from_decode)?;

    let mut buffer = Vec::new();
    match compression {
        COMPRESSION_ZLIB => {
            ZlibDecoder::new(compressed.as_slice())
                .read_to_end(&mut buffer)
                .map_err(StrataError::from_decode)?;
        }
        COMPRESSION_GZIP => {
            warn!("Decompressing chunk with legacy gzip compression");
            GzDecoder::new(compressed.as_slice())
                .read_to_end(&mut buffer)
                .map_err(StrataError::from_decode)?;
        }
        other => {
            return Err(StrataError::format(format!(
                "Unsupported compression scheme of type {}",
                other
            )))
        }
    }
    Ok(buffer)
}
