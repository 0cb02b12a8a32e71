// lib.rs — helios-common: engine support modules
//
// Shared plumbing for the Helios engine tools: a bit-granular stream, a
// sliding-window memory-mapped file buffer, a delta codec for mesh index
// streams, and a store-or-LZW compression envelope.

pub mod bitstream;
pub mod compression;
pub mod filemap;
pub mod indexcodec;
pub mod lzw;
