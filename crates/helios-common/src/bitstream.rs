// bitstream.rs — packed bit buffer with bit-granular writes and reads
//
// Single packing convention for the whole crate: MSB-first. The first bit
// written lands in the high bit of byte 0. Because byte writes go through
// the same bit cursor, writing 24 bits and writing 3 bytes produce the
// same stream, which the index codec's run-length field relies on.

// ============================================================
// BitWriter
// ============================================================

/// Append-only bit sink backed by a growable byte vector.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-sizes the backing vector for roughly `byte_hint` bytes of output.
    pub fn with_capacity(byte_hint: usize) -> Self {
        Self {
            data: Vec::with_capacity(byte_hint),
            bit_len: 0,
        }
    }

    /// Appends the low `count` bits of `value`, MSB-first. `count` must be
    /// at most 32; bits of `value` above `count` are ignored.
    pub fn write_bits(&mut self, value: u32, count: u32) {
        debug_assert!(count <= 32);
        let mut remaining = count as usize;
        while remaining > 0 {
            let bit_off = self.bit_len & 7;
            if bit_off == 0 {
                self.data.push(0);
            }
            let avail = 8 - bit_off;
            let take = avail.min(remaining);
            let shift = remaining - take;
            let mask = ((1u16 << take) - 1) as u8;
            let chunk = ((value >> shift) as u8) & mask;
            let last = self.data.last_mut().unwrap();
            *last |= chunk << (avail - take);
            self.bit_len += take;
            remaining -= take;
        }
    }

    /// Appends whole bytes through the bit cursor (8 bits each).
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.bit_len & 7 == 0 {
            // Cursor is byte aligned, copy directly.
            self.data.extend_from_slice(bytes);
            self.bit_len += bytes.len() * 8;
        } else {
            for &b in bytes {
                self.write_bits(b as u32, 8);
            }
        }
    }

    /// Discards all written bits.
    pub fn clear(&mut self) {
        self.data.clear();
        self.bit_len = 0;
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Length in bytes, counting a trailing partial byte as a full one.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

// ============================================================
// BitReader
// ============================================================

/// Cursor-based reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Reads `count` bits (at most 32), MSB-first. Returns `None` without
    /// advancing the cursor if fewer than `count` bits remain.
    pub fn read_bits(&mut self, count: u32) -> Option<u32> {
        debug_assert!(count <= 32);
        let mut remaining = count as usize;
        if self.bit_pos + remaining > self.data.len() * 8 {
            return None;
        }
        let mut out = 0u32;
        while remaining > 0 {
            let byte = self.data[self.bit_pos >> 3];
            let bit_off = self.bit_pos & 7;
            let avail = 8 - bit_off;
            let take = avail.min(remaining);
            let mask = ((1u16 << take) - 1) as u8;
            let chunk = (byte >> (avail - take)) & mask;
            out = (out << take) | chunk as u32;
            self.bit_pos += take;
            remaining -= take;
        }
        Some(out)
    }

    /// Fills `out` with whole bytes read through the bit cursor.
    /// Returns false without advancing if not enough bits remain.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> bool {
        if self.bit_pos + out.len() * 8 > self.data.len() * 8 {
            return false;
        }
        for slot in out.iter_mut() {
            // Cannot fail after the length check above.
            *slot = self.read_bits(8).unwrap() as u8;
        }
        true
    }

    pub fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.bit_pos
    }

    pub fn bit_pos(&self) -> usize {
        self.bit_pos
    }
}

// ============================================================
// Unit tests
// ============================================================
