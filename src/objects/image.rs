/// Pixel layout of decoded image data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ImageKind {
    /// 1 bit per pixel, MSB first, rows padded to whole bytes; 1 is white.
    #[serde(rename = "grayscale_1bpp")]
    Grayscale1Bpp = 1,
    /// 8-bit RGB triplets.
    #[serde(rename = "rgb_24bpp")]
    Rgb24Bpp = 2,
    /// 8-bit straight-alpha RGBA.
    #[serde(rename = "rgba_32bpp")]
    Rgba32Bpp = 3,
}

impl ImageKind {
    /// Bytes needed for one row of `width` pixels.
    pub fn row_bytes(self, width: u32) -> usize {
        let w = width as usize;
        match self {
            Self::Grayscale1Bpp => w.div_ceil(8),
            Self::Rgb24Bpp => w * 3,
            Self::Rgba32Bpp => w * 4,
        }
    }
}

/// Decoded image pixels.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub kind: ImageKind,
    /// Packed rows.
    pub data: Vec<u8>,
}

/// 1-bit stencil mask.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MaskData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Packed rows, MSB first; a set bit is transparent.
    pub data: Vec<u8>,
    /// Placement matrix, used by `paintImageMaskXObjectGroup`.
    #[serde(default)]
    pub transform: Option<[f64; 6]>,
    /// Flip the meaning of set bits.
    #[serde(default)]
    pub inverse_decode: bool,
}
