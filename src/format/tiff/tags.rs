//! Tag, field type and compression codes the directory reader understands.

/// Value types of the entries the reader decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Short,
    Long,
}

impl FieldType {
    /// Bytes a classic IFD entry can hold inline.
    pub const INLINE_THRESHOLD: usize = 4;

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            _ => None,
        }
    }

    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Short => 2,
            FieldType::Long => 4,
        }
    }

    /// Whether `count` values fit in the entry's value field.
    pub fn fits_inline(self, count: u64) -> bool {
        self.size_in_bytes() as u64 * count <= Self::INLINE_THRESHOLD as u64
    }
}

/// Tags a pyramid page is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffTag {
    ImageWidth,
    ImageLength,
    Compression,
    TileWidth,
    TileLength,
    TileOffsets,
    TileByteCounts,
}

impl TiffTag {
    /// Returns `None` for tags the reader skips.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            256 => Some(TiffTag::ImageWidth),
            257 => Some(TiffTag::ImageLength),
            259 => Some(TiffTag::Compression),
            322 => Some(TiffTag::TileWidth),
            323 => Some(TiffTag::TileLength),
            324 => Some(TiffTag::TileOffsets),
            325 => Some(TiffTag::TileByteCounts),
            _ => None,
        }
    }
}

/// TIFF compression scheme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    /// No compression
    None = 1,

    /// LZW compression
    Lzw = 5,

    /// JPEG compression (one standalone stream per tile)
    Jpeg = 7,

    /// Deflate/zlib compression
    Deflate = 8,
}

impl Compression {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            5 => Some(Compression::Lzw),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::Deflate),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether the pyramid writer can produce this scheme.
    #[inline]
    pub const fn is_writable(self) -> bool {
        matches!(self, Compression::None | Compression::Jpeg)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Lzw => "LZW",
            Compression::Jpeg => "JPEG",
            Compression::Deflate => "Deflate",
        }
    }
}
