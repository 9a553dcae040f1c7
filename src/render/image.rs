use crate::foundation::error::{PaintError, PaintResult};
use crate::objects::{ImageData, ImageKind, MaskData};

/// Per-channel 256-entry lookup tables set by the `TR` graphics-state key.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TransferMaps {
    /// Red remap.
    pub r: Option<Vec<u8>>,
    /// Green remap.
    pub g: Option<Vec<u8>>,
    /// Blue remap.
    pub b: Option<Vec<u8>>,
    /// Alpha remap.
    pub a: Option<Vec<u8>>,
}

impl TransferMaps {
    /// Same table for red, green and blue.
    pub fn gray(map: Vec<u8>) -> Self {
        Self {
            r: Some(map.clone()),
            g: Some(map.clone()),
            b: Some(map),
            a: None,
        }
    }

    /// `true` when no channel is remapped.
    pub fn is_identity(&self) -> bool {
        [&self.r, &self.g, &self.b, &self.a]
            .iter()
            .all(|m| m.as_ref().is_none_or(|m| m.len() < 256))
    }

    fn apply(&self, px: &mut [u8]) {
        for (c, map) in [&self.r, &self.g, &self.b, &self.a].into_iter().enumerate() {
            if let Some(map) = map.as_ref().filter(|m| m.len() >= 256) {
                px[c] = map[usize::from(px[c])];
            }
        }
    }
}

fn premultiply(px: &mut [u8]) {
    let a = u16::from(px[3]);
    if a == 255 {
        return;
    }
    for c in &mut px[..3] {
        *c = ((u16::from(*c) * a + 127) / 255) as u8;
    }
}

fn check_len(have: usize, need: usize, what: &str) -> PaintResult<()> {
    if have < need {
        return Err(PaintError::malformed(format!(
            "{what} data too short: {have} bytes, need {need}"
        )));
    }
    Ok(())
}

/// Unpack decoded image rows into premultiplied RGBA8 `out` (`width * height * 4` bytes).
///
/// Rows are converted `chunk_rows` at a time through a bounded scratch buffer.
pub(crate) fn unpack_image(
    img: &ImageData,
    transfer: Option<&TransferMaps>,
    chunk_rows: usize,
    out: &mut [u8],
) -> PaintResult<()> {
    let width = img.width as usize;
    let height = img.height as usize;
    let row_bytes = img.kind.row_bytes(img.width);
    check_len(img.data.len(), row_bytes * height, "image")?;
    if out.len() != width * height * 4 {
        return Err(PaintError::backend("image target has the wrong size"));
    }
    let transfer = transfer.filter(|t| !t.is_identity());

    // 1 bit images only ever produce two colors; remap them once.
    let (mut white, mut black) = ([255u8, 255, 255, 255], [0u8, 0, 0, 255]);
    if let Some(t) = transfer {
        t.apply(&mut white);
        t.apply(&mut black);
        premultiply(&mut white);
        premultiply(&mut black);
    }

    let chunk_rows = chunk_rows.max(1);
    let mut chunk = vec![0u8; chunk_rows.min(height.max(1)) * width * 4];
    for row0 in (0..height).step_by(chunk_rows) {
        let rows = chunk_rows.min(height - row0);
        let buf = &mut chunk[..rows * width * 4];
        for r in 0..rows {
            let src = &img.data[(row0 + r) * row_bytes..(row0 + r + 1) * row_bytes];
            let dst = &mut buf[r * width * 4..(r + 1) * width * 4];
            match img.kind {
                ImageKind::Grayscale1Bpp => {
                    for (x, px) in dst.chunks_exact_mut(4).enumerate() {
                        let bit = src[x >> 3] & (0x80 >> (x & 7));
                        px.copy_from_slice(if bit != 0 { &white } else { &black });
                    }
                }
                ImageKind::Rgb24Bpp => {
                    for (px, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(3)) {
                        px.copy_from_slice(&[s[0], s[1], s[2], 255]);
                        if let Some(t) = transfer {
                            t.apply(px);
                            premultiply(px);
                        }
                    }
                }
                ImageKind::Rgba32Bpp => {
                    for (px, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                        px.copy_from_slice(s);
                        if let Some(t) = transfer {
                            t.apply(px);
                        }
                        premultiply(px);
                    }
                }
            }
        }
        out[row0 * width * 4..(row0 + rows) * width * 4].copy_from_slice(buf);
    }
    Ok(())
}

/// Expand a 1-bit stencil into one coverage byte per pixel (255 = paint).
pub(crate) fn unpack_mask(mask: &MaskData, chunk_rows: usize) -> PaintResult<Vec<u8>> {
    let width = mask.width as usize;
    let height = mask.height as usize;
    let row_bytes = width.div_ceil(8);
    check_len(mask.data.len(), row_bytes * height, "image mask")?;

    let (set, clear) = if mask.inverse_decode {
        (255u8, 0u8)
    } else {
        (0u8, 255u8)
    };
    let mut out = vec![0u8; width * height];
    for row0 in (0..height).step_by(chunk_rows.max(1)) {
        let rows = chunk_rows.max(1).min(height - row0);
        for y in row0..row0 + rows {
            let src = &mask.data[y * row_bytes..(y + 1) * row_bytes];
            for (x, dst) in out[y * width..(y + 1) * width].iter_mut().enumerate() {
                let bit = src[x >> 3] & (0x80 >> (x & 7));
                *dst = if bit != 0 { set } else { clear };
            }
        }
    }
    Ok(out)
}

/// Size after one halving step.
pub(crate) fn half_size(width: u32, height: u32, halve_x: bool, halve_y: bool) -> (u32, u32) {
    let w = if halve_x { width.div_ceil(2) } else { width };
    let h = if halve_y { height.div_ceil(2) } else { height };
    (w.max(1), h.max(1))
}

/// Box-filter `src` into `dst`, halving the axes that `dst` is smaller on.
pub(crate) fn downscale_half(
    src: &[u8],
    src_w: u32,
    src_h: u32,
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
) -> PaintResult<()> {
    if src.len() != (src_w * src_h * 4) as usize || dst.len() != (dst_w * dst_h * 4) as usize {
        return Err(PaintError::backend("downscale buffers have the wrong size"));
    }
    let fx = if dst_w < src_w { 2 } else { 1 };
    let fy = if dst_h < src_h { 2 } else { 1 };
    let (sw, sh) = (src_w as usize, src_h as usize);
    for y in 0..dst_h as usize {
        for x in 0..dst_w as usize {
            let mut acc = [0u32; 4];
            let mut n = 0u32;
            for sy in (y * fy)..((y * fy + fy).min(sh)) {
                for sx in (x * fx)..((x * fx + fx).min(sw)) {
                    let i = (sy * sw + sx) * 4;
                    for c in 0..4 {
                        acc[c] += u32::from(src[i + c]);
                    }
                    n += 1;
                }
            }
            let o = (y * dst_w as usize + x) * 4;
            for c in 0..4 {
                dst[o + c] = ((acc[c] + n / 2) / n.max(1)) as u8;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/image.rs"]
mod tests;
