// lzw.rs — fixed-width LZW codec over a 256-symbol alphabet
//
// The compression envelope's kernel. Codes are a fixed `width` bits
// (9..=14 in practice): 0..=255 are literals, 256.. grow as the dictionary
// fills. No clear codes — once the dictionary is full, encoding continues
// against the frozen dictionary. Streams are self-terminating: trailing
// byte padding is at most 7 bits, so with widths >= 9 the pad can never
// form a spurious code.

use std::collections::HashMap;

use crate::bitstream::{BitReader, BitWriter};

/// Literal byte codes occupy 0..=255.
pub const ALPHABET_SIZE: u32 = 256;

/// Narrowest usable code width. Must exceed 8 both to fit the alphabet
/// plus at least one dictionary code and to keep byte padding unreadable.
pub const MIN_CODE_WIDTH: u8 = 9;

/// Widest supported code width (16K dictionary entries).
pub const MAX_CODE_WIDTH: u8 = 14;

// ============================================================
// Encode
// ============================================================

/// LZW-encodes `input` at a fixed code width. Gives up and returns `None`
/// as soon as the output reaches `max_output` bytes, so callers comparing
/// candidates can abort encodings that cannot beat the best so far.
pub fn encode(input: &[u8], width: u8, max_output: usize) -> Option<Vec<u8>> {
    debug_assert!((MIN_CODE_WIDTH..=MAX_CODE_WIDTH).contains(&width));
    let width = width as u32;
    let max_code = (1u32 << width) - 1;

    let mut out = BitWriter::with_capacity(input.len() / 2);
    let mut dict: HashMap<(u32, u8), u32> = HashMap::new();
    let mut next_code = ALPHABET_SIZE;
    let mut current: Option<u32> = None;

    for &b in input {
        match current {
            None => current = Some(b as u32),
            Some(prefix) => {
                if let Some(&code) = dict.get(&(prefix, b)) {
                    current = Some(code);
                } else {
                    out.write_bits(prefix, width);
                    if out.byte_len() >= max_output {
                        return None;
                    }
                    if next_code <= max_code {
                        dict.insert((prefix, b), next_code);
                        next_code += 1;
                    }
                    current = Some(b as u32);
                }
            }
        }
    }

    if let Some(prefix) = current {
        out.write_bits(prefix, width);
        if out.byte_len() >= max_output {
            return None;
        }
    }

    Some(out.into_bytes())
}

// ============================================================
// Decode
// ============================================================

/// Inverts [`encode`]. `capacity_hint` pre-sizes the output vector; an
/// under-estimate only costs reallocation. Unknown codes are
/// malformed-stream errors.
pub fn decode(input: &[u8], width: u8, capacity_hint: usize) -> Result<Vec<u8>, String> {
    if !(MIN_CODE_WIDTH..=MAX_CODE_WIDTH).contains(&width) {
        return Err(format!("unsupported LZW code width {}", width));
    }
    let width = width as u32;
    let max_code = (1u32 << width) - 1;

    let mut dict: Vec<Vec<u8>> = (0..ALPHABET_SIZE).map(|b| vec![b as u8]).collect();
    let mut out = Vec::with_capacity(capacity_hint);
    let mut reader = BitReader::new(input);
    let mut prev: Option<u32> = None;

    while reader.remaining_bits() >= width as usize {
        // Infallible given the loop guard.
        let code = reader.read_bits(width).unwrap();

        let entry: Vec<u8> = if (code as usize) < dict.len() {
            dict[code as usize].clone()
        } else if code as usize == dict.len() && prev.is_some() {
            // KwKwK: the code being defined by this very step.
            let p = &dict[prev.unwrap() as usize];
            let mut e = p.clone();
            e.push(p[0]);
            e
        } else {
            return Err(format!("malformed LZW stream: unknown code {}", code));
        };

        if let Some(p) = prev {
            if dict.len() as u32 <= max_code {
                let mut grown = dict[p as usize].clone();
                grown.push(entry[0]);
                dict.push(grown);
            }
        }

        out.extend_from_slice(&entry);
        prev = Some(code);
    }

    Ok(out)
}

// ============================================================
// Unit tests
// ============================================================
