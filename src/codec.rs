//! Compression codec.
//!
//! `encode` first runs a cheap order-1 predictability probe before ever
//! invoking the real compressor: if the byte stream doesn't look
//! compressible, skip straight to a raw copy instead of paying for a doomed
//! DEFLATE pass. Otherwise attempt DEFLATE; if it runs out of room or the
//! encoded size doesn't beat the raw size, fall back to raw anyway. Every
//! path this function can take ends in data the matching `decode` call can
//! reverse: either verbatim bytes, or a complete DEFLATE stream.

use crate::error::{HoardError, Result};
use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use std::io::Read;

/// Below this hit ratio, the order-1 probe gives up before attempting
/// DEFLATE at all.
pub const PREDICTABILITY_THRESHOLD: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Raw,
    Zlib,
}

/// Walk `data` keeping a table of the byte that last followed each context
/// byte, and return the hit ratio: how often the next byte matched what the
/// table predicted. A high ratio means the stream has exploitable local
/// structure; a low one means it's likely already dense (random or
/// pre-compressed), not worth running DEFLATE over.
fn predictability_ratio(data: &[u8]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let mut prediction = [None::<u8>; 256];
    let mut hits = 0u64;
    let total = (data.len() - 1) as u64;
    for i in 1..data.len() {
        let ctx = data[i - 1] as usize;
        let actual = data[i];
        if prediction[ctx] == Some(actual) {
            hits += 1;
        }
        prediction[ctx] = Some(actual);
    }
    hits as f64 / total as f64
}

/// Compress `data` at `level` (0-9, DEFLATE's native range), falling back to
/// a raw copy whenever compression isn't worthwhile. The returned `Vec` is
/// always complete and ready to persist — no further sizing is needed by
/// the caller.
pub fn encode(level: u32, data: &[u8]) -> (Encoding, Vec<u8>) {
    if predictability_ratio(data) < PREDICTABILITY_THRESHOLD {
        return (Encoding::Raw, data.to_vec());
    }

    let mut encoder = ZlibEncoder::new(data, Compression::new(level.min(9)));
    let mut compressed = Vec::with_capacity(data.len());
    match encoder.read_to_end(&mut compressed) {
        Ok(_) if compressed.len() < data.len() => (Encoding::Zlib, compressed),
        _ => (Encoding::Raw, data.to_vec()),
    }
}

/// Inflate a complete stream produced by [`encode`] with `Encoding::Zlib`,
/// or return the input as-is for `Encoding::Raw`. `raw_length` is used only
/// to pre-size the output buffer; decoding still proceeds to EOF either way.
pub fn decode(encoding: Encoding, data: &[u8], raw_length: usize) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Raw => Ok(data.to_vec()),
        Encoding::Zlib => {
            let mut decoder = ZlibDecoder::new(data);
            let mut out = Vec::with_capacity(raw_length);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| HoardError::NotDecodable(format!("zlib inflate failed: {e}")))?;
            Ok(out)
        }
    }
}
