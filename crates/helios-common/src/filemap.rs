// filemap.rs — sliding-window memory-mapped file buffer
//
// Presents a file of arbitrary size as a randomly-addressable byte array
// while holding only one fixed-size OS mapping at a time. Out-of-range
// accesses remap the window; the base is snapped to half-window boundaries
// so the requested offset lands near the middle of the fresh window and
// nearby accesses in either direction stay on the fast path.
//
// Remapping is a cache fill, so every accessor that can touch the window
// takes &mut self. Read/write degrade gracefully: a failed OS map or EOF
// shows up as a truncated byte count, not an error.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use bitflags::bitflags;
use log::{debug, warn};
use memmap2::{Mmap, MmapMut, MmapOptions};

// ============================================================
// Constants
// ============================================================

/// Assumed OS page size. 4K is the common case; the window granularity
/// below only needs to be a multiple of the real page size, and of the
/// 64K mapping-offset granularity on Windows.
pub const PAGE_SIZE: u64 = 4096;

/// Window sizes are rounded up to this many bytes (page size x 32).
pub const WINDOW_GRANULARITY: u64 = PAGE_SIZE * 32;

bitflags! {
    /// Access mode requested at open time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileAccess: u32 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
    }
}

// ============================================================
// Window state
// ============================================================

enum Mapping {
    Ro(Mmap),
    Rw(MmapMut),
}

impl Mapping {
    fn len(&self) -> usize {
        match self {
            Mapping::Ro(m) => m.len(),
            Mapping::Rw(m) => m.len(),
        }
    }
}

struct Window {
    /// File offset of the first mapped byte. Always half-window aligned
    /// (or zero for files that fit in one window).
    base: u64,
    map: Mapping,
}

// ============================================================
// FileMap
// ============================================================

/// A file exposed as a byte array behind a sliding mapped window.
///
/// Holds exactly one OS mapping at a time; the previous mapping is
/// released before a new one is established. Not `Sync` — callers needing
/// concurrent access serialize externally or open separate instances.
pub struct FileMap {
    file: File,
    access: FileAccess,
    /// Recorded at open; files that grow afterwards are not supported.
    file_size: u64,
    window_size: u64,
    window: Option<Window>,
}

impl FileMap {
    /// Opens `path` and prepares a window of at least `window_hint` bytes,
    /// rounded up to [`WINDOW_GRANULARITY`]. A hint of 0 is bumped to 1 so
    /// it rounds up to exactly one granule. The mapping itself is deferred
    /// until the first access.
    pub fn open<P: AsRef<Path>>(
        path: P,
        access: FileAccess,
        window_hint: u64,
    ) -> io::Result<FileMap> {
        let file = OpenOptions::new()
            .read(true)
            .write(access.contains(FileAccess::WRITE))
            .open(path)?;
        let file_size = file.metadata()?.len();

        let hint = window_hint.max(1);
        let window_size = hint.div_ceil(WINDOW_GRANULARITY) * WINDOW_GRANULARITY;

        Ok(FileMap {
            file,
            access,
            file_size,
            window_size,
            window: None,
        })
    }

    /// File size recorded at open time.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Window size after rounding.
    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    /// Base offset of the current mapping, if one exists.
    pub fn window_base(&self) -> Option<u64> {
        self.window.as_ref().map(|w| w.base)
    }

    pub fn is_mapped(&self) -> bool {
        self.window.is_some()
    }

    /// Releases the active mapping (flushing a writable one) and returns
    /// to the "not mapped" state. The next access remaps.
    pub fn reset(&mut self) {
        self.drop_window();
    }

    // ============================================================
    // Read / Write
    // ============================================================

    /// Copies bytes starting at `file_offset` into `buf`, remapping the
    /// window as needed. Returns the number of bytes copied, which is
    /// less than `buf.len()` at EOF or if a mapping fails. Never reads
    /// past the file size recorded at open.
    pub fn read_bytes(&mut self, buf: &mut [u8], mut file_offset: u64) -> usize {
        let mut copied = 0usize;
        while copied < buf.len() && file_offset < self.file_size {
            let (start, avail) = match self.window_for(file_offset) {
                Some(w) => w,
                None => break,
            };
            if avail == 0 {
                break;
            }
            let want = (buf.len() - copied)
                .min(avail)
                .min((self.file_size - file_offset) as usize);
            let window = self.window.as_ref().unwrap();
            let src = match &window.map {
                Mapping::Ro(m) => &m[start..start + want],
                Mapping::Rw(m) => &m[start..start + want],
            };
            buf[copied..copied + want].copy_from_slice(src);
            copied += want;
            file_offset += want as u64;
        }
        copied
    }

    /// Copies `buf` into the file starting at `file_offset`. Returns the
    /// number of bytes written; 0 immediately if the map was opened
    /// without [`FileAccess::WRITE`]. Truncates at EOF like `read_bytes`.
    pub fn write_bytes(&mut self, buf: &[u8], mut file_offset: u64) -> usize {
        if !self.access.contains(FileAccess::WRITE) {
            return 0;
        }
        let mut written = 0usize;
        while written < buf.len() && file_offset < self.file_size {
            let (start, avail) = match self.window_for(file_offset) {
                Some(w) => w,
                None => break,
            };
            if avail == 0 {
                break;
            }
            let want = (buf.len() - written)
                .min(avail)
                .min((self.file_size - file_offset) as usize);
            let window = self.window.as_mut().unwrap();
            let dst = match &mut window.map {
                Mapping::Rw(m) => &mut m[start..start + want],
                // Unreachable: WRITE access always maps read-write.
                Mapping::Ro(_) => break,
            };
            dst.copy_from_slice(&buf[written..written + want]);
            written += want;
            file_offset += want as u64;
        }
        written
    }

    // ============================================================
    // Window policy
    // ============================================================

    /// Ensures a mapping covering `file_offset` and returns
    /// `(start, remaining)` — the offset of `file_offset` inside the
    /// mapping and the contiguous bytes available from there. A zero
    /// remaining count signals EOF. Returns `None` if the OS mapping
    /// call fails (callers treat this as a clean stop).
    fn window_for(&mut self, file_offset: u64) -> Option<(usize, usize)> {
        let base = self.align_down(file_offset);

        let hit = matches!(&self.window, Some(w) if w.base == base);
        if !hit {
            self.drop_window();

            if base >= self.file_size {
                return Some((0, 0));
            }
            let len = self.window_size.min(self.file_size - base) as usize;
            let map = match self.map_range(base, len) {
                Ok(m) => m,
                Err(e) => {
                    warn!("filemap: mapping {} bytes at {} failed: {}", len, base, e);
                    return None;
                }
            };
            debug!("filemap: window now [{}, {})", base, base + len as u64);
            self.window = Some(Window { base, map });
        }

        let window = self.window.as_ref().unwrap();
        let start = (file_offset - window.base) as usize;
        let remaining = window.map.len().saturating_sub(start);
        Some((start, remaining))
    }

    fn map_range(&self, base: u64, len: usize) -> io::Result<Mapping> {
        let mut opts = MmapOptions::new();
        opts.offset(base).len(len);
        // Safety: the mapping is private to this FileMap and the file
        // stays open for the mapping's lifetime.
        if self.access.contains(FileAccess::WRITE) {
            Ok(Mapping::Rw(unsafe { opts.map_mut(&self.file)? }))
        } else {
            Ok(Mapping::Ro(unsafe { opts.map(&self.file)? }))
        }
    }

    fn drop_window(&mut self) {
        if let Some(w) = self.window.take() {
            if let Mapping::Rw(m) = &w.map {
                if let Err(e) = m.flush() {
                    warn!("filemap: flush before unmap failed: {}", e);
                }
            }
        }
    }

    /// Base offset for the window that should serve `file_offset`. Files
    /// that fit in one window, and offsets in the first half-window,
    /// always use base 0. Otherwise snap so the offset lands near the
    /// middle of the window.
    fn align_down(&self, file_offset: u64) -> u64 {
        let half = self.window_size / 2;
        if file_offset < half || self.file_size <= self.window_size {
            return 0;
        }
        ((file_offset + self.window_size / 4) & !(half - 1)) - half
    }
}

impl Drop for FileMap {
    fn drop(&mut self) {
        self.drop_window();
    }
}

// ============================================================
// Unit tests
// ============================================================
