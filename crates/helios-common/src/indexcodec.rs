// indexcodec.rs — variable-width delta codec for 32-bit index streams
//
// Mesh index buffers cluster into locally increasing runs, so successive
// values differ by small amounts. The codec stores the first value raw and
// every later value as a signed delta, packed into runs of a fixed bit
// width. Widths start at 3 and grow by one per run; a run closes at the
// first delta that no longer fits its width.
//
// Wire format, MSB-first throughout:
//   [count:32][seed:32] { [run_length:24] [delta:W] x run_length } x N
// with W = 3, 4, 5, ... per successive run.

use crate::bitstream::{BitReader, BitWriter};

// ============================================================
// Constants
// ============================================================

/// Width of the first run. Deltas of 0..=3 and -1..=-4 fit here.
const MIN_DELTA_WIDTH: u32 = 3;

/// Widest run. A delta outside the 31-bit signed range is not encodable.
const MAX_DELTA_WIDTH: u32 = 31;

/// The run-length field is 24 bits; a longer run is split rather than
/// letting the written count silently truncate.
const MAX_RUN_LENGTH: usize = (1 << 24) - 1;

// ============================================================
// Bit-width rule
// ============================================================

/// Bits needed to store `v` as a signed two's-complement value, sign bit
/// included. Single source of truth for the scan and write passes.
#[inline]
fn bits_for_signed(v: i32) -> u32 {
    let magnitude = if v < 0 { !v } else { v } as u32;
    (32 - magnitude.leading_zeros()) + 1
}

#[inline]
fn delta(from: u32, to: u32) -> i32 {
    to.wrapping_sub(from) as i32
}

// ============================================================
// Encode
// ============================================================

/// Compresses `indices` into a delta-coded bit stream. Fails only if some
/// delta cannot be represented in 31 signed bits, or the input needs more
/// runs than the width ladder provides.
pub fn encode_indices(indices: &[u32]) -> Result<Vec<u8>, String> {
    let mut out = BitWriter::with_capacity(8 + indices.len() / 2);
    out.write_bits(indices.len() as u32, 32);
    if indices.is_empty() {
        return Ok(out.into_bytes());
    }

    out.write_bits(indices[0], 32);
    let mut last = indices[0];
    let mut cursor = 1usize;

    let mut width = MIN_DELTA_WIDTH;
    while cursor < indices.len() {
        if width > MAX_DELTA_WIDTH {
            return Err(format!(
                "index stream not encodable: delta at {} exceeds {} signed bits",
                cursor, MAX_DELTA_WIDTH
            ));
        }

        // Scan pass: count deltas that fit this width. The run length has
        // to be written before the deltas, so the span is walked twice.
        let mut run_last = last;
        let mut run_len = 0usize;
        while cursor + run_len < indices.len() && run_len < MAX_RUN_LENGTH {
            let next = indices[cursor + run_len];
            if bits_for_signed(delta(run_last, next)) > width {
                break;
            }
            run_last = next;
            run_len += 1;
        }

        out.write_bits(run_len as u32, 24);

        // Write pass: emit the same span, truncated to exactly W bits.
        // The scan guaranteed the truncated bits sign-extend back.
        let mask = (1u32 << width) - 1;
        for &next in &indices[cursor..cursor + run_len] {
            let d = delta(last, next);
            out.write_bits((d as u32) & mask, width);
            last = next;
        }
        cursor += run_len;
        width += 1;
    }

    Ok(out.into_bytes())
}

// ============================================================
// Decode
// ============================================================

/// Inverts [`encode_indices`]. Short reads and impossible run lengths are
/// malformed-stream errors; output already produced is not rolled back.
pub fn decode_indices(data: &[u8]) -> Result<Vec<u32>, String> {
    let mut input = BitReader::new(data);
    let count = input
        .read_bits(32)
        .ok_or_else(|| "short read on index count".to_string())? as usize;
    if count == 0 {
        return Ok(Vec::new());
    }

    let seed = input
        .read_bits(32)
        .ok_or_else(|| "short read on seed value".to_string())?;
    let mut out = Vec::with_capacity(count);
    out.push(seed);
    let mut last = seed;

    let mut width = MIN_DELTA_WIDTH;
    while out.len() < count {
        if width > MAX_DELTA_WIDTH {
            return Err("malformed index stream: width ladder exhausted".to_string());
        }
        let run_len = input
            .read_bits(24)
            .ok_or_else(|| "short read on run length".to_string())? as usize;
        if out.len() + run_len > count {
            return Err(format!(
                "malformed index stream: run of {} overshoots count {}",
                run_len, count
            ));
        }
        for _ in 0..run_len {
            let raw = input
                .read_bits(width)
                .ok_or_else(|| "short read on delta".to_string())?;
            // Sign-extend from W bits: shift to the top, arithmetic shift back.
            let d = ((raw << (32 - width)) as i32) >> (32 - width);
            last = last.wrapping_add(d as u32);
            out.push(last);
        }
        width += 1;
    }

    Ok(out)
}

// ============================================================
// Unit tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn roundtrip(indices: &[u32]) {
        let encoded = encode_indices(indices).unwrap();
        let decoded = decode_indices(&encoded).unwrap();
        assert_eq!(decoded, indices);
    }

    #[test]
    fn test_bits_for_signed() {
        assert_eq!(bits_for_signed(0), 1);
        assert_eq!(bits_for_signed(-1), 1);
        assert_eq!(bits_for_signed(1), 2);
        assert_eq!(bits_for_signed(-2), 2);
        assert_eq!(bits_for_signed(3), 3); // [-4, 3] at 3 bits
        assert_eq!(bits_for_signed(-4), 3);
        assert_eq!(bits_for_signed(4), 4);
        assert_eq!(bits_for_signed(i32::MAX), 32);
        assert_eq!(bits_for_signed(i32::MIN), 32);
        assert_eq!(bits_for_signed(i32::MAX >> 1), 31);
        assert_eq!(bits_for_signed(i32::MIN >> 1), 31);
    }

    #[test]
    fn test_empty_and_single() {
        roundtrip(&[]);
        roundtrip(&[0]);
        roundtrip(&[u32::MAX]);

        // Empty stream is just the 32-bit count.
        let encoded = encode_indices(&[]).unwrap();
        assert_eq!(encoded, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_constant_run_layout() {
        // [5,5,5,5]: count=4, seed=5, one W=3 run of three zero deltas.
        let encoded = encode_indices(&[5, 5, 5, 5]).unwrap();
        let mut r = BitReader::new(&encoded);
        assert_eq!(r.read_bits(32), Some(4));
        assert_eq!(r.read_bits(32), Some(5));
        assert_eq!(r.read_bits(24), Some(3));
        for _ in 0..3 {
            assert_eq!(r.read_bits(3), Some(0));
        }
        assert!(r.remaining_bits() < 8); // nothing but byte padding left

        roundtrip(&[5, 5, 5, 5]);
    }

    #[test]
    fn test_run_boundary_on_large_delta() {
        // 1,1 fit at W=3; 99998 does not, forcing a run boundary.
        let indices = [0u32, 1, 2, 100_000];
        let encoded = encode_indices(&indices).unwrap();

        let mut r = BitReader::new(&encoded);
        assert_eq!(r.read_bits(32), Some(4));
        assert_eq!(r.read_bits(32), Some(0));
        assert_eq!(r.read_bits(24), Some(2)); // W=3 run: deltas 1, 1
        assert_eq!(r.read_bits(3), Some(1));
        assert_eq!(r.read_bits(3), Some(1));
        // Widths 4..=17 are too narrow for 99998 (needs 18 signed bits),
        // so each contributes an empty run.
        for _ in 4..18 {
            assert_eq!(r.read_bits(24), Some(0));
        }
        assert_eq!(r.read_bits(24), Some(1));
        assert_eq!(r.read_bits(18), Some(99_998));

        roundtrip(&indices);
    }

    #[test]
    fn test_negative_deltas() {
        roundtrip(&[100, 99, 98, 50, 1000, 3, 3, 3]);
        roundtrip(&[u32::MAX, 0, u32::MAX]); // wraps to deltas of +-1
    }

    #[test]
    fn test_unencodable_delta_fails() {
        // 0 -> 0x8000_0000 is a delta of i32::MIN, which needs 32 signed
        // bits; the ladder tops out at 31.
        let err = encode_indices(&[0, 0x8000_0000]).unwrap_err();
        assert!(err.contains("not encodable"), "{}", err);
    }

    #[test]
    fn test_widths_strictly_increase_and_fit() {
        // Walk the encoded stream run by run, checking the monotonic width
        // ladder and that every delta honors its run's bit budget.
        let mut rng = StdRng::seed_from_u64(0x1DE7);
        let mut indices = vec![rng.gen_range(0..1000u32)];
        for _ in 0..5000 {
            let prev = *indices.last().unwrap();
            let step = rng.gen_range(-2000i64..=2000) as i32;
            indices.push(prev.wrapping_add(step as u32) & 0x3FFF_FFFF);
        }

        let encoded = encode_indices(&indices).unwrap();
        let mut r = BitReader::new(&encoded);
        let count = r.read_bits(32).unwrap() as usize;
        let _seed = r.read_bits(32).unwrap();

        let mut produced = 1usize;
        let mut width = MIN_DELTA_WIDTH;
        let mut last_width = 0;
        while produced < count {
            assert!(width > last_width);
            assert!(width <= MAX_DELTA_WIDTH);
            let run = r.read_bits(24).unwrap() as usize;
            for _ in 0..run {
                let raw = r.read_bits(width).unwrap();
                let d = ((raw << (32 - width)) as i32) >> (32 - width);
                assert!(bits_for_signed(d) <= width, "delta {} at width {}", d, width);
            }
            produced += run;
            last_width = width;
            width += 1;
        }

        assert_eq!(decode_indices(&encoded).unwrap(), indices);
    }

    #[test]
    fn test_random_corpora_roundtrip() {
        let mut rng = StdRng::seed_from_u64(0xC0DEC);

        // Non-decreasing arrays with small steps (the intended workload).
        for _ in 0..20 {
            let len = rng.gen_range(0..400);
            let mut v = Vec::with_capacity(len);
            let mut cur = rng.gen_range(0..10_000u32);
            for _ in 0..len {
                cur += rng.gen_range(0..64);
                v.push(cur);
            }
            roundtrip(&v);
        }

        // Randomly-ordered arrays, kept inside the 31-bit-delta envelope.
        for _ in 0..20 {
            let len = rng.gen_range(0..400);
            let v: Vec<u32> = (0..len).map(|_| rng.gen_range(0..0x4000_0000)).collect();
            roundtrip(&v);
        }
    }

    #[test]
    fn test_triangle_strip_shape() {
        // Typical mesh index pattern: triangles sharing vertices.
        let mut indices = Vec::new();
        for tri in 0u32..300 {
            indices.extend_from_slice(&[tri, tri + 1, tri + 2]);
        }
        roundtrip(&indices);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_indices(&[]).is_err());
        assert!(decode_indices(&[0, 0, 0]).is_err()); // short count
        assert!(decode_indices(&[0, 0, 0, 9]).is_err()); // count without seed

        // Claimed count of 2 but no run data after the seed.
        let mut w = BitWriter::new();
        w.write_bits(2, 32);
        w.write_bits(7, 32);
        assert!(decode_indices(w.as_bytes()).is_err());

        // Run overshooting the count.
        let mut w = BitWriter::new();
        w.write_bits(2, 32);
        w.write_bits(7, 32);
        w.write_bits(500, 24);
        let err = decode_indices(w.as_bytes()).unwrap_err();
        assert!(err.contains("overshoots"), "{}", err);
    }
}
