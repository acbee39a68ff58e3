//! Pyramidal TIFF support.
//!
//! Writes tiled, multi-page TIFF files where each page is one level of a
//! resolution pyramid, and reads their directories back for validation.
//! Writing goes through the `tiff` crate's encoder; the reader is a small
//! IFD walker that only decodes the tile layout.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian,
//!   MM = big-endian) in the header. The encoder writes the host's order,
//!   so the reader accepts both.
//!
//! - **IFD (Image File Directory)**: Metadata and pointers to the tile data of
//!   one page. Pages are chained through each IFD's next-offset field.
//!
//! - **Inline vs offset values**: Values of up to 4 bytes are stored inline
//!   in the IFD entry, larger ones at an offset pointed to by the entry.

mod parser;
mod tags;
mod writer;

pub use parser::{read_directories, ByteOrder, TiffHeader, TileDirectory, TIFF_HEADER_SIZE};
pub use tags::Compression;
pub use writer::{PageOptions, PyramidTiffWriter, TILE_ALIGNMENT};
