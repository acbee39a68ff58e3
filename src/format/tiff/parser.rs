//! TIFF header and directory parsing.
//!
//! Reads back the page structure of a classic TIFF file: byte order, the
//! chain of Image File Directories, and the tile layout of each page. Used
//! to check pyramids after they are written.
//!
//! # TIFF Header Structure (8 bytes)
//!
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! # IFD Structure
//!
//! ```text
//! 2 bytes        entry count N
//! N x 12 bytes   entries (tag, type, count, value-or-offset)
//! 4 bytes        offset of the next IFD (0 = last)
//! ```

use std::collections::HashSet;

use crate::error::TiffError;

use super::tags::{Compression, FieldType, TiffTag};

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

const IFD_ENTRY_SIZE: usize = 12;

/// Endianness declared by the first two header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// `II`
    Little,
    /// `MM`
    Big,
}

impl ByteOrder {
    fn u16(self, b: &[u8]) -> u16 {
        let raw = [b[0], b[1]];
        match self {
            ByteOrder::Little => u16::from_le_bytes(raw),
            ByteOrder::Big => u16::from_be_bytes(raw),
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        let raw = [b[0], b[1], b[2], b[3]];
        match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        }
    }
}

/// Byte order and first directory of a classic TIFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse the 8-byte header of a file of `file_size` bytes.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        let Some(header) = bytes.get(..TIFF_HEADER_SIZE) else {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        };

        let byte_order = match &header[..2] {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => return Err(TiffError::InvalidMagic(u16::from_le_bytes([header[0], header[1]]))),
        };
        // BigTIFF (43) is never produced here
        let version = byte_order.u16(&header[2..4]);
        if version != 42 {
            return Err(TiffError::InvalidVersion(version));
        }

        let first_ifd_offset = byte_order.u32(&header[4..8]) as u64;
        if first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }
        Ok(TiffHeader {
            byte_order,
            first_ifd_offset,
        })
    }
}

// =============================================================================
// Directories
// =============================================================================

/// Tile layout of one page, as read from its IFD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileDirectory {
    /// Page width in pixels
    pub width: u32,

    /// Page height in pixels
    pub height: u32,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Compression code (raw value, may be unknown)
    pub compression: u16,

    /// File offset of each tile
    pub tile_offsets: Vec<u64>,

    /// Byte length of each tile
    pub tile_byte_counts: Vec<u64>,
}

impl TileDirectory {
    /// Number of tiles the page's dimensions call for.
    pub fn expected_tiles(&self) -> u64 {
        if self.tile_width == 0 || self.tile_height == 0 {
            return 0;
        }
        self.width.div_ceil(self.tile_width) as u64 * self.height.div_ceil(self.tile_height) as u64
    }

    /// Parsed compression scheme, if known.
    pub fn compression_scheme(&self) -> Option<Compression> {
        Compression::from_u16(self.compression)
    }
}

/// Read every page directory of a tiled TIFF held in memory.
///
/// Pages are returned in file order. Untiled pages fail with
/// [`TiffError::MissingTag`].
pub fn read_directories(bytes: &[u8]) -> Result<Vec<TileDirectory>, TiffError> {
    let file_size = bytes.len() as u64;
    let header = TiffHeader::parse(bytes, file_size)?;
    let order = header.byte_order;

    let mut directories = Vec::new();
    let mut visited = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 {
        // A repeated offset would loop forever
        if !visited.insert(offset) {
            return Err(TiffError::InvalidIfdOffset(offset));
        }

        let start = offset as usize;
        let count_end = start + 2;
        if count_end as u64 > file_size {
            return Err(TiffError::InvalidIfdOffset(offset));
        }
        let entry_count = order.u16(&bytes[start..count_end]) as usize;

        let entries_end = count_end + entry_count * IFD_ENTRY_SIZE;
        let next_end = entries_end + 4;
        if next_end as u64 > file_size {
            return Err(TiffError::FileTooSmall {
                required: next_end as u64,
                actual: file_size,
            });
        }

        let mut fields = RawFields::default();
        for i in 0..entry_count {
            let entry = &bytes[count_end + i * IFD_ENTRY_SIZE..count_end + (i + 1) * IFD_ENTRY_SIZE];
            let Some(tag) = TiffTag::from_u16(order.u16(&entry[0..2])) else {
                continue;
            };
            let Some(field_type) = FieldType::from_u16(order.u16(&entry[2..4])) else {
                continue;
            };
            let count = order.u32(&entry[4..8]) as u64;
            let values = read_values(bytes, order, field_type, count, &entry[8..12])?;
            fields.set(tag, values);
        }

        directories.push(fields.into_directory()?);
        offset = order.u32(&bytes[entries_end..next_end]) as u64;
    }

    Ok(directories)
}

/// Decode the numeric values of one entry.
fn read_values(
    bytes: &[u8],
    order: ByteOrder,
    field_type: FieldType,
    count: u64,
    value_field: &[u8],
) -> Result<Vec<u64>, TiffError> {
    let size = field_type.size_in_bytes();
    let total = size as u64 * count;

    let data: &[u8] = if field_type.fits_inline(count) {
        &value_field[..total as usize]
    } else {
        let offset = order.u32(value_field) as u64;
        let end = offset
            .checked_add(total)
            .ok_or(TiffError::InvalidIfdOffset(offset))?;
        if end > bytes.len() as u64 {
            return Err(TiffError::FileTooSmall {
                required: end,
                actual: bytes.len() as u64,
            });
        }
        &bytes[offset as usize..end as usize]
    };

    let values = data
        .chunks_exact(size)
        .map(|chunk| match field_type {
            FieldType::Short => order.u16(chunk) as u64,
            FieldType::Long => order.u32(chunk) as u64,
        })
        .collect();
    Ok(values)
}

/// Tag values collected while walking one IFD.
#[derive(Default)]
struct RawFields {
    width: Option<u64>,
    height: Option<u64>,
    tile_width: Option<u64>,
    tile_height: Option<u64>,
    compression: Option<u64>,
    tile_offsets: Option<Vec<u64>>,
    tile_byte_counts: Option<Vec<u64>>,
}

impl RawFields {
    fn set(&mut self, tag: TiffTag, values: Vec<u64>) {
        let first = values.first().copied();
        match tag {
            TiffTag::ImageWidth => self.width = first,
            TiffTag::ImageLength => self.height = first,
            TiffTag::TileWidth => self.tile_width = first,
            TiffTag::TileLength => self.tile_height = first,
            TiffTag::Compression => self.compression = first,
            TiffTag::TileOffsets => self.tile_offsets = Some(values),
            TiffTag::TileByteCounts => self.tile_byte_counts = Some(values),
            _ => {}
        }
    }

    fn into_directory(self) -> Result<TileDirectory, TiffError> {
        Ok(TileDirectory {
            width: self.width.ok_or(TiffError::MissingTag("ImageWidth"))? as u32,
            height: self.height.ok_or(TiffError::MissingTag("ImageLength"))? as u32,
            tile_width: self.tile_width.ok_or(TiffError::MissingTag("TileWidth"))? as u32,
            tile_height: self.tile_height.ok_or(TiffError::MissingTag("TileLength"))? as u32,
            compression: self.compression.unwrap_or(1) as u16,
            tile_offsets: self.tile_offsets.ok_or(TiffError::MissingTag("TileOffsets"))?,
            tile_byte_counts: self
                .tile_byte_counts
                .ok_or(TiffError::MissingTag("TileByteCounts"))?,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
