use crate::foundation::core::{Affine, Point};
use crate::foundation::error::{PaintError, PaintResult};
use crate::foundation::math::{add_sat_u8, mul_div255_u8};
use crate::oplist::SmaskSubtype;

/// Separable and non-separable blend modes of the `BM` graphics-state key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BlendMode {
    /// Source over.
    #[default]
    Normal,
    /// Multiply.
    Multiply,
    /// Screen.
    Screen,
    /// Overlay.
    Overlay,
    /// Darken.
    Darken,
    /// Lighten.
    Lighten,
    /// Color dodge.
    ColorDodge,
    /// Color burn.
    ColorBurn,
    /// Hard light.
    HardLight,
    /// Soft light.
    SoftLight,
    /// Difference.
    Difference,
    /// Exclusion.
    Exclusion,
    /// Hue of the source, saturation and luminosity of the backdrop.
    Hue,
    /// Saturation of the source.
    Saturation,
    /// Hue and saturation of the source.
    Color,
    /// Luminosity of the source.
    Luminosity,
}

impl BlendMode {
    /// Parse a blend mode name (`"Multiply"`, `"multiply"`, `"source-over"`, `"color-dodge"`).
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Some(match key.as_str() {
            "normal" | "compatible" | "sourceover" => Self::Normal,
            "multiply" => Self::Multiply,
            "screen" => Self::Screen,
            "overlay" => Self::Overlay,
            "darken" => Self::Darken,
            "lighten" => Self::Lighten,
            "colordodge" => Self::ColorDodge,
            "colorburn" => Self::ColorBurn,
            "hardlight" => Self::HardLight,
            "softlight" => Self::SoftLight,
            "difference" => Self::Difference,
            "exclusion" => Self::Exclusion,
            "hue" => Self::Hue,
            "saturation" => Self::Saturation,
            "color" => Self::Color,
            "luminosity" => Self::Luminosity,
            _ => return None,
        })
    }
}

fn check_lengths(dst: &[u8], src: &[u8], what: &str) -> PaintResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(PaintError::backend(format!(
            "{what} expects equal-length rgba8 buffers"
        )));
    }
    Ok(())
}

/// Premultiplied source-over of `src` onto `dst`.
pub(crate) fn premul_over_in_place(dst: &mut [u8], src: &[u8]) -> PaintResult<()> {
    check_lengths(dst, src, "premul_over_in_place")?;
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = u16::from(s[3]);
        if sa == 0 {
            continue;
        }
        if sa == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255u16 - sa;
        d[3] = add_sat_u8(s[3], mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            let dc = mul_div255_u8(u16::from(d[c]), inv);
            d[c] = add_sat_u8(s[c], dc);
        }
    }
    Ok(())
}

/// Composite `src` onto `dst` with `blend` at `opacity`.
pub(crate) fn composite_over_rgba8_premul(
    dst: &mut [u8],
    src: &[u8],
    opacity: f32,
    blend: BlendMode,
) -> PaintResult<()> {
    check_lengths(dst, src, "composite_over_rgba8_premul")?;

    // Dispatch once per composite; each branch monomorphizes its own kernel.
    match blend {
        BlendMode::Normal if opacity >= 1.0 => premul_over_in_place(dst, src),
        BlendMode::Normal => blend_separable(dst, src, opacity, |s, _| s),
        BlendMode::Multiply => blend_separable(dst, src, opacity, |s, d| s * d),
        BlendMode::Screen => blend_separable(dst, src, opacity, |s, d| s + d - s * d),
        BlendMode::Overlay => blend_separable(dst, src, opacity, |s, d| hard_light(d, s)),
        BlendMode::Darken => blend_separable(dst, src, opacity, |s, d| s.min(d)),
        BlendMode::Lighten => blend_separable(dst, src, opacity, |s, d| s.max(d)),
        BlendMode::ColorDodge => blend_separable(dst, src, opacity, |s, d| {
            if d <= 0.0 {
                0.0
            } else if s >= 1.0 {
                1.0
            } else {
                (d / (1.0 - s)).min(1.0)
            }
        }),
        BlendMode::ColorBurn => blend_separable(dst, src, opacity, |s, d| {
            if d >= 1.0 {
                1.0
            } else if s <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - d) / s).min(1.0)
            }
        }),
        BlendMode::HardLight => blend_separable(dst, src, opacity, hard_light),
        BlendMode::SoftLight => blend_separable(dst, src, opacity, |s, d| {
            if s <= 0.5 {
                d - (1.0 - 2.0 * s) * d * (1.0 - d)
            } else {
                let g = if d <= 0.25 {
                    ((16.0 * d - 12.0) * d + 4.0) * d
                } else {
                    d.sqrt()
                };
                d + (2.0 * s - 1.0) * (g - d)
            }
        }),
        BlendMode::Difference => blend_separable(dst, src, opacity, |s, d| (d - s).abs()),
        BlendMode::Exclusion => blend_separable(dst, src, opacity, |s, d| d + s - 2.0 * d * s),
        BlendMode::Hue => blend_rgb(dst, src, opacity, |s, d| {
            set_lum(set_sat(s, sat(d)), lum(d))
        }),
        BlendMode::Saturation => blend_rgb(dst, src, opacity, |s, d| {
            set_lum(set_sat(d, sat(s)), lum(d))
        }),
        BlendMode::Color => blend_rgb(dst, src, opacity, |s, d| set_lum(s, lum(d))),
        BlendMode::Luminosity => blend_rgb(dst, src, opacity, |s, d| set_lum(d, lum(s))),
    }
}

fn hard_light(s: f32, d: f32) -> f32 {
    if s <= 0.5 {
        2.0 * s * d
    } else {
        1.0 - 2.0 * (1.0 - s) * (1.0 - d)
    }
}

#[inline(always)]
fn blend_separable<F>(dst: &mut [u8], src: &[u8], opacity: f32, f: F) -> PaintResult<()>
where
    F: Fn(f32, f32) -> f32,
{
    blend_rgb(dst, src, opacity, |s, d| {
        [f(s[0], d[0]), f(s[1], d[1]), f(s[2], d[2])]
    })
}

#[inline(always)]
fn blend_rgb<F>(dst: &mut [u8], src: &[u8], opacity: f32, blend_fn: F) -> PaintResult<()>
where
    F: Fn([f32; 3], [f32; 3]) -> [f32; 3],
{
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return Ok(());
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        // out_a = sa + da * (1 - sa)
        // out_p = sp * (1 - da) + dp * (1 - sa) + B(sc, dc) * sa * da
        let sa = (f32::from(s[3]) / 255.0) * opacity;
        let da = f32::from(d[3]) / 255.0;
        let sp = [0, 1, 2].map(|c| (f32::from(s[c]) / 255.0) * opacity);
        let dp = [0, 1, 2].map(|c| f32::from(d[c]) / 255.0);

        let sc = sp.map(|v| if sa > 0.0 { (v / sa).clamp(0.0, 1.0) } else { 0.0 });
        let dc = dp.map(|v| if da > 0.0 { (v / da).clamp(0.0, 1.0) } else { 0.0 });
        let b = blend_fn(sc, dc).map(|v| v.clamp(0.0, 1.0));

        for c in 0..3 {
            let out = (sp[c] * (1.0 - da) + dp[c] * (1.0 - sa) + b[c] * sa * da).clamp(0.0, 1.0);
            d[c] = (out * 255.0).round() as u8;
        }
        let out_a = (sa + da * (1.0 - sa)).clamp(0.0, 1.0);
        d[3] = (out_a * 255.0).round() as u8;
    }

    Ok(())
}

fn lum(c: [f32; 3]) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn clip_color(c: [f32; 3]) -> [f32; 3] {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    let mut out = c;
    if n < 0.0 && l - n > f32::EPSILON {
        out = out.map(|v| l + (v - l) * l / (l - n));
    }
    if x > 1.0 && x - l > f32::EPSILON {
        out = out.map(|v| l + (v - l) * (1.0 - l) / (x - l));
    }
    out
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(c);
    clip_color(c.map(|v| v + d))
}

fn sat(c: [f32; 3]) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn set_sat(c: [f32; 3], s: f32) -> [f32; 3] {
    let mut idx = [0usize, 1, 2];
    idx.sort_by(|&a, &b| c[a].total_cmp(&c[b]));
    let [min, mid, max] = idx;
    let mut out = [0.0; 3];
    if c[max] > c[min] {
        out[mid] = (c[mid] - c[min]) * s / (c[max] - c[min]);
        out[max] = s;
    }
    out
}

/// Parameters of one soft-mask composition.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SoftMaskParams<'a> {
    pub(crate) subtype: SmaskSubtype,
    pub(crate) backdrop: Option<[u8; 3]>,
    pub(crate) transfer: Option<&'a [u8]>,
    pub(crate) chunk_pixels: usize,
}

/// Mask pixels and where they sit relative to the layer being masked.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MaskPixels<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Layer pixel space to mask pixel space.
    pub(crate) layer_to_mask: Affine,
}

impl<'a> MaskPixels<'a> {
    /// Mask covering exactly the layer it is applied to.
    pub(crate) fn aligned(data: &'a [u8], width: u32) -> Self {
        let width = width.max(1);
        Self {
            data,
            width,
            height: (data.len() / 4 / width as usize) as u32,
            layer_to_mask: Affine::IDENTITY,
        }
    }

    /// Premultiplied mask pixel under layer pixel `(x, y)`; transparent outside the mask.
    fn sample(&self, x: usize, y: usize, identity: bool) -> [u8; 4] {
        let (mx, my) = if identity {
            (x as f64, y as f64)
        } else {
            let p = self.layer_to_mask * Point::new(x as f64 + 0.5, y as f64 + 0.5);
            (p.x.floor(), p.y.floor())
        };
        if !(mx >= 0.0 && my >= 0.0 && mx < f64::from(self.width) && my < f64::from(self.height)) {
            return [0; 4];
        }
        let i = (my as usize * self.width as usize + mx as usize) * 4;
        match self.data.get(i..i + 4) {
            Some(px) => [px[0], px[1], px[2], px[3]],
            None => [0; 4],
        }
    }
}

/// Multiply every pixel of `layer` by the coverage derived from `mask`.
///
/// `layer` is premultiplied RGBA8 of `width` pixels per row. Layer pixels that fall outside the
/// mask see a transparent mask pixel, so the backdrop decides their coverage. The layer is
/// processed in row chunks of roughly `chunk_pixels` pixels.
pub(crate) fn compose_soft_mask(
    layer: &mut [u8],
    width: u32,
    mask: MaskPixels<'_>,
    params: SoftMaskParams<'_>,
) -> PaintResult<()> {
    let mask_len = mask.width as usize * mask.height as usize * 4;
    if !layer.len().is_multiple_of(4) || mask.data.len() < mask_len {
        return Err(PaintError::backend(
            "compose_soft_mask expects rgba8 buffers matching their sizes",
        ));
    }
    let width = (width as usize).max(1);
    let height = layer.len() / 4 / width;
    if height == 0 {
        return Ok(());
    }
    let identity = mask.layer_to_mask == Affine::IDENTITY;
    let chunk_rows = height.min(params.chunk_pixels.max(1).div_ceil(width)).max(1);
    let transfer = params.transfer.filter(|t| t.len() >= 256);

    for (chunk, rows) in layer.chunks_mut(chunk_rows * width * 4).enumerate() {
        let row0 = chunk * chunk_rows;
        for (i, l) in rows.chunks_exact_mut(4).enumerate() {
            let (x, y) = (i % width, row0 + i / width);
            let m = mask.sample(x, y, identity);
            let [r, g, b, a] = mask_pixel(&m, params.backdrop);
            let coverage = match params.subtype {
                SmaskSubtype::Luminosity => {
                    let y = u32::from(r) * 77 + u32::from(g) * 152 + u32::from(b) * 28;
                    let y = (y >> 8) as u8;
                    transfer.map_or(y, |t| t[usize::from(y)])
                }
                SmaskSubtype::Alpha => transfer.map_or(a, |t| t[usize::from(a)]),
            };
            if coverage == 255 {
                continue;
            }
            let w = u16::from(coverage);
            for c in l.iter_mut() {
                *c = mul_div255_u8(u16::from(*c), w);
            }
        }
    }
    Ok(())
}

/// Straight-alpha mask pixel with the backdrop composited under it.
fn mask_pixel(m: &[u8], backdrop: Option<[u8; 3]>) -> [u8; 4] {
    let a = m[3];
    let unpremul = |c: u8| -> u8 {
        if a == 0 {
            0
        } else {
            ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8
        }
    };
    let straight = [unpremul(m[0]), unpremul(m[1]), unpremul(m[2])];
    let Some(bd) = backdrop else {
        return [straight[0], straight[1], straight[2], a];
    };
    if a == 0 {
        return [bd[0], bd[1], bd[2], a];
    }
    if a == 255 {
        return [straight[0], straight[1], straight[2], a];
    }
    let inv = 255 - u32::from(a);
    let mix = |c: u8, b: u8| ((u32::from(c) * u32::from(a) + u32::from(b) * inv) >> 8) as u8;
    [
        mix(straight[0], bd[0]),
        mix(straight[1], bd[1]),
        mix(straight[2], bd[2]),
        a,
    ]
}

/// Multiply premultiplied pixels by an 8-bit coverage channel.
pub(crate) fn apply_coverage(dst: &mut [u8], coverage: &[u8]) {
    for (d, &m) in dst.chunks_exact_mut(4).zip(coverage) {
        if m == 255 {
            continue;
        }
        let w = u16::from(m);
        for c in d.iter_mut() {
            *c = mul_div255_u8(u16::from(*c), w);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
