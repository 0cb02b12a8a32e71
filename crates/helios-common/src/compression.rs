// compression.rs — store-or-LZW compression envelope
//
// Wraps a byte buffer as [tag:8][length:32 LE][payload]. Tag 0 means the
// payload is the input stored raw; tags 9..=14 name the LZW code width
// that produced the payload. The encoder keeps whichever candidate is
// smallest and falls back to storing raw unless some candidate is
// strictly smaller than the input.
//
// The mode is an explicit parameter on every call; there is no process
// wide compression level.

use log::debug;

use crate::lzw::{self, MAX_CODE_WIDTH, MIN_CODE_WIDTH};

/// Envelope tag for an uncompressed payload.
pub const TAG_STORED: u8 = 0;

/// Tag byte + 32-bit length.
pub const ENVELOPE_HEADER_SIZE: usize = 5;

/// Code width tried by [`CompressMode::Medium`].
const MEDIUM_WIDTH: u8 = 12;

/// Decompression pre-sizes its output at 2.5x the payload, the observed
/// typical ratio. An under-estimate only costs reallocation.
const EXPANSION_HINT_NUM: usize = 5;
const EXPANSION_HINT_DEN: usize = 2;

/// How hard to look for a smaller encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressMode {
    /// Always store raw.
    None,
    /// Try a single mid-range code width.
    Medium,
    /// Try every supported code width, keep the smallest.
    #[default]
    Best,
}

impl CompressMode {
    fn candidate_widths(self) -> &'static [u8] {
        match self {
            CompressMode::None => &[],
            CompressMode::Medium => &[MEDIUM_WIDTH],
            CompressMode::Best => &[9, 10, 11, 12, 13, 14],
        }
    }
}

// ============================================================
// Compress
// ============================================================

/// Tries the mode's candidate code widths and returns `(tag, payload)`
/// for the smallest one, or `(TAG_STORED, empty)` if nothing beat the
/// input size. Each attempt aborts as soon as it reaches the best size
/// found so far.
pub fn compress_best(input: &[u8], mode: CompressMode) -> (u8, Vec<u8>) {
    let mut best: Option<(u8, Vec<u8>)> = None;

    for &width in mode.candidate_widths() {
        let budget = best.as_ref().map_or(input.len(), |(_, b)| b.len());
        if let Some(encoded) = lzw::encode(input, width, budget) {
            if encoded.len() < budget {
                best = Some((width, encoded));
            }
        }
    }

    match best {
        Some((width, payload)) if payload.len() < input.len() => {
            debug!(
                "compress_best: width {} won, {} -> {} bytes",
                width,
                input.len(),
                payload.len()
            );
            (width, payload)
        }
        _ => (TAG_STORED, Vec::new()),
    }
}

/// Builds the full envelope for `input`.
pub fn compress_to_buffer(input: &[u8], mode: CompressMode) -> Vec<u8> {
    let (tag, payload) = compress_best(input, mode);

    let body: &[u8] = if tag == TAG_STORED { input } else { &payload };
    let mut out = Vec::with_capacity(ENVELOPE_HEADER_SIZE + body.len());
    out.push(tag);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

// ============================================================
// Decompress
// ============================================================

/// Parses an envelope and recovers the original bytes.
pub fn decompress_to_buffer(envelope: &[u8]) -> Result<Vec<u8>, String> {
    if envelope.len() < ENVELOPE_HEADER_SIZE {
        return Err(format!(
            "envelope truncated: {} bytes, need at least {}",
            envelope.len(),
            ENVELOPE_HEADER_SIZE
        ));
    }
    let tag = envelope[0];
    let length = u32::from_le_bytes([envelope[1], envelope[2], envelope[3], envelope[4]]) as usize;
    let payload = &envelope[ENVELOPE_HEADER_SIZE..];
    if payload.len() != length {
        return Err(format!(
            "envelope length mismatch: header says {}, payload is {}",
            length,
            payload.len()
        ));
    }

    match tag {
        TAG_STORED => Ok(payload.to_vec()),
        MIN_CODE_WIDTH..=MAX_CODE_WIDTH => {
            let hint = length * EXPANSION_HINT_NUM / EXPANSION_HINT_DEN;
            lzw::decode(payload, tag, hint)
        }
        other => Err(format!("unknown envelope tag {}", other)),
    }
}

// ============================================================
// Unit tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn roundtrip(input: &[u8], mode: CompressMode) {
        let envelope = compress_to_buffer(input, mode);
        let decoded = decompress_to_buffer(&envelope).unwrap();
        assert_eq!(decoded, input, "mode {:?}", mode);
    }

    #[test]
    fn test_empty_buffer() {
        for mode in [CompressMode::None, CompressMode::Medium, CompressMode::Best] {
            let envelope = compress_to_buffer(&[], mode);
            assert_eq!(envelope, vec![TAG_STORED, 0, 0, 0, 0]);
            assert_eq!(decompress_to_buffer(&envelope).unwrap(), Vec::<u8>::new());
        }
    }

    #[test]
    fn test_zero_block_compresses() {
        // 1000 zero bytes: tag != 0 and strictly smaller than storing raw.
        let input = vec![0u8; 1000];
        let envelope = compress_to_buffer(&input, CompressMode::Best);
        assert_ne!(envelope[0], TAG_STORED);
        assert!(envelope.len() < ENVELOPE_HEADER_SIZE + input.len());
        assert_eq!(decompress_to_buffer(&envelope).unwrap(), input);
    }

    #[test]
    fn test_incompressible_stores_raw() {
        let mut rng = StdRng::seed_from_u64(0x10C0);
        let input: Vec<u8> = (0..512).map(|_| rng.gen_range(0..=255u8)).collect();
        let envelope = compress_to_buffer(&input, CompressMode::Best);
        assert_eq!(envelope[0], TAG_STORED);
        assert_eq!(envelope.len(), ENVELOPE_HEADER_SIZE + input.len());
        assert_eq!(decompress_to_buffer(&envelope).unwrap(), input);
    }

    #[test]
    fn test_mode_none_always_stores() {
        let input = vec![0u8; 4096]; // trivially compressible
        let envelope = compress_to_buffer(&input, CompressMode::None);
        assert_eq!(envelope[0], TAG_STORED);
        assert_eq!(envelope.len(), ENVELOPE_HEADER_SIZE + input.len());
    }

    #[test]
    fn test_mode_medium_uses_width_12() {
        let input = vec![7u8; 4096];
        let envelope = compress_to_buffer(&input, CompressMode::Medium);
        assert_eq!(envelope[0], 12);
        assert_eq!(decompress_to_buffer(&envelope).unwrap(), input);
    }

    #[test]
    fn test_roundtrip_mixed_content() {
        let mut rng = StdRng::seed_from_u64(0xE0F);
        for mode in [CompressMode::None, CompressMode::Medium, CompressMode::Best] {
            for _ in 0..6 {
                let len = rng.gen_range(0..5000);
                // A mix of runs and noise.
                let input: Vec<u8> = (0..len)
                    .map(|i| {
                        if i % 100 < 60 {
                            0xAA
                        } else {
                            rng.gen_range(0..=255u8)
                        }
                    })
                    .collect();
                roundtrip(&input, mode);
            }
        }
    }

    #[test]
    fn test_best_not_larger_than_medium() {
        let input: Vec<u8> = (0u32..8192).map(|i| (i % 13) as u8).collect();
        let best = compress_to_buffer(&input, CompressMode::Best);
        let medium = compress_to_buffer(&input, CompressMode::Medium);
        assert!(best.len() <= medium.len());
    }

    #[test]
    fn test_malformed_envelopes_rejected() {
        assert!(decompress_to_buffer(&[]).is_err());
        assert!(decompress_to_buffer(&[0, 1, 0, 0]).is_err()); // short header

        // Length field disagrees with the payload.
        assert!(decompress_to_buffer(&[0, 5, 0, 0, 0, 1, 2]).is_err());

        // Tag outside 0 and 9..=14.
        let err = decompress_to_buffer(&[3, 1, 0, 0, 0, 0xFF]).unwrap_err();
        assert!(err.contains("unknown envelope tag"), "{}", err);
    }
}
