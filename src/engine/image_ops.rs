use std::sync::Arc;

use crate::engine::GraphicsEngine;
use crate::engine::dispatch::ImageMapEntry;
use crate::foundation::core::{Affine, Rect, affine_from_array};
use crate::foundation::error::PaintResult;
use crate::foundation::math::{mul_div255_u8, transform_rect_bbox};
use crate::objects::{ImageData, MaskData};
use crate::render::composite::{BlendMode, apply_coverage};
use crate::render::image::{downscale_half, half_size, unpack_image, unpack_mask};
use crate::render::raster::{DrawParams, Extend, ImagePaint, Quality, Shape, Source};

const INLINE_IMAGE: &str = "inlineImage";
const MASK_CANVAS: &str = "maskCanvas";

/// Image pixels (row 0 on top) to the unit square of user space.
fn image_to_unit(width: u32, height: u32) -> Affine {
    Affine::translate((0.0, 1.0))
        * Affine::scale_non_uniform(1.0 / f64::from(width.max(1)), -1.0 / f64::from(height.max(1)))
}

/// Nearest-neighbour for magnified images and stencil canvases, bilinear otherwise.
fn sample_quality(m: Affine, purpose: &str) -> Quality {
    let [a, b, c, d, _, _] = m.as_coeffs();
    if purpose == MASK_CANVAS || (a.hypot(b) >= 1.0 && c.hypot(d) >= 1.0) {
        Quality::Low
    } else {
        Quality::Medium
    }
}

fn pixmap_rect(pixmap: &vello_cpu::Pixmap) -> Rect {
    Rect::new(0.0, 0.0, f64::from(pixmap.width()), f64::from(pixmap.height()))
}

impl GraphicsEngine {
    pub(crate) fn paint_image(&mut self, img: &ImageData) -> PaintResult<()> {
        if !self.content_visible {
            return Ok(());
        }
        let m = self.from_page() * self.current.ctm * image_to_unit(img.width, img.height);
        let pixels = self.unpack_image_pixels(img)?;
        self.draw_image(pixels, INLINE_IMAGE, m, true)
    }

    /// Paint sub-rectangles of one image, each under its own transform.
    pub(crate) fn paint_image_group(
        &mut self,
        img: &ImageData,
        map: &[ImageMapEntry],
    ) -> PaintResult<()> {
        if !self.content_visible || map.is_empty() {
            return Ok(());
        }
        let pixels = self.unpack_image_pixels(img)?;
        let pixmap = self.painter.lend(INLINE_IMAGE, pixels);
        let base = self.from_page() * self.current.ctm;
        for entry in map {
            let m = base
                * affine_from_array(entry.transform)
                * Affine::translate((0.0, 1.0))
                * Affine::scale_non_uniform(1.0 / entry.w, -1.0 / entry.h)
                * Affine::translate((-entry.x, -entry.y));
            let rect = Rect::new(entry.x, entry.y, entry.x + entry.w, entry.y + entry.h);
            self.draw_lent(&pixmap, rect, m, sample_quality(m, INLINE_IMAGE));
        }
        Ok(())
    }

    /// Paint one image at every `(x, y)` pair of `positions`, scaled by `sx`/`sy`.
    pub(crate) fn paint_image_repeat(
        &mut self,
        img: &ImageData,
        sx: f64,
        sy: f64,
        positions: &[f64],
    ) -> PaintResult<()> {
        let (w, h) = (f64::from(img.width), f64::from(img.height));
        let map: Vec<ImageMapEntry> = positions
            .chunks_exact(2)
            .map(|p| ImageMapEntry {
                transform: [sx, 0.0, 0.0, sy, p[0], p[1]],
                x: 0.0,
                y: 0.0,
                w,
                h,
            })
            .collect();
        self.paint_image_group(img, &map)
    }

    pub(crate) fn paint_image_mask(&mut self, mask: &MaskData) -> PaintResult<()> {
        if !self.content_visible {
            return Ok(());
        }
        let m = self.from_page() * self.current.ctm * image_to_unit(mask.width, mask.height);
        match self.mask_canvas(mask, m)? {
            Some(canvas) => self.draw_image(canvas, MASK_CANVAS, m, true),
            None => Ok(()),
        }
    }

    /// Paint several stencil masks, each placed by its own transform.
    pub(crate) fn paint_image_mask_group(&mut self, masks: &[Arc<MaskData>]) -> PaintResult<()> {
        if !self.content_visible {
            return Ok(());
        }
        for mask in masks {
            let placement = mask.transform.map_or(Affine::IDENTITY, affine_from_array);
            let m = self.from_page()
                * self.current.ctm
                * placement
                * image_to_unit(mask.width, mask.height);
            if let Some(canvas) = self.mask_canvas(mask, m)? {
                self.draw_image(canvas, MASK_CANVAS, m, false)?;
            }
        }
        Ok(())
    }

    /// Paint one stencil mask at every position; the colored mask is built once.
    pub(crate) fn paint_image_mask_repeat(
        &mut self,
        mask: &MaskData,
        [sx, kx, ky, sy]: [f64; 4],
        positions: &[f64],
    ) -> PaintResult<()> {
        if !self.content_visible || positions.len() < 2 {
            return Ok(());
        }
        let base = self.from_page() * self.current.ctm;
        let unit = image_to_unit(mask.width, mask.height);
        let place = |px: f64, py: f64| base * Affine::new([sx, kx, ky, sy, px, py]) * unit;
        let Some(canvas) = self.mask_canvas(mask, place(positions[0], positions[1]))? else {
            return Ok(());
        };
        let rect = pixmap_rect(&canvas);
        let pixmap = self.painter.lend(MASK_CANVAS, canvas);
        for p in positions.chunks_exact(2) {
            let m = place(p[0], p[1]);
            self.draw_lent(&pixmap, rect, m, Quality::Low);
        }
        Ok(())
    }

    fn unpack_image_pixels(&mut self, img: &ImageData) -> PaintResult<vello_cpu::Pixmap> {
        let mut pixmap = self.painter.acquire(INLINE_IMAGE, img.width, img.height)?;
        let transfer = self.current.transfer.clone();
        if let Err(err) = unpack_image(
            img,
            transfer.as_deref(),
            self.opts.image_chunk_rows,
            pixmap.data_as_u8_slice_mut(),
        ) {
            self.painter.release(INLINE_IMAGE, pixmap);
            return Err(err);
        }
        Ok(pixmap)
    }

    /// Color a stencil mask with the fill paint; `m` maps mask pixels to target pixels.
    ///
    /// `None` when the fill paints nothing.
    fn mask_canvas(
        &mut self,
        mask: &MaskData,
        m: Affine,
    ) -> PaintResult<Option<vello_cpu::Pixmap>> {
        let coverage = unpack_mask(mask, self.opts.image_chunk_rows)?;
        let rect = Rect::new(0.0, 0.0, f64::from(mask.width), f64::from(mask.height));
        let brush = self.current.fill.clone();
        let Some((source, clip)) = self.resolve_paint(&brush, transform_rect_bbox(m, rect))? else {
            return Ok(None);
        };
        let canvas = match source {
            Source::Solid(color) => {
                let px = color.premul().to_array();
                let mut canvas = self.painter.acquire(MASK_CANVAS, mask.width, mask.height)?;
                for (dst, &c) in canvas.data_as_u8_slice_mut().chunks_exact_mut(4).zip(&coverage) {
                    for (d, s) in dst.iter_mut().zip(px) {
                        *d = mul_div255_u8(u16::from(s), u16::from(c));
                    }
                }
                canvas
            }
            Source::Image(paint) => {
                if m.determinant().abs() < 1e-12 {
                    return Ok(None);
                }
                let to_page = self.top()?.target.to_page * m;
                let paint = ImagePaint {
                    transform: m.inverse() * paint.transform,
                    ..paint
                };
                let clips: Vec<_> = clip.into_iter().collect();
                let mut canvas = self.painter.render_offscreen(
                    MASK_CANVAS,
                    mask.width,
                    mask.height,
                    to_page,
                    Shape::Rect(rect),
                    Source::Image(paint),
                    DrawParams {
                        transform: Affine::IDENTITY,
                        alpha: 1.0,
                        blend: BlendMode::Normal,
                        clips: &clips,
                    },
                )?;
                apply_coverage(canvas.data_as_u8_slice_mut(), &coverage);
                canvas
            }
        };
        Ok(Some(canvas))
    }

    /// Draw a pooled pixmap whose pixels map to target pixels through `m`.
    ///
    /// With `prescale`, heavily minified images are box-filtered down by halves first so the
    /// backend never samples across more than two source pixels per output pixel.
    fn draw_image(
        &mut self,
        mut pixmap: vello_cpu::Pixmap,
        purpose: &str,
        m: Affine,
        prescale: bool,
    ) -> PaintResult<()> {
        if m.determinant().abs() < 1e-12 || !m.is_finite() {
            self.painter.release(purpose, pixmap);
            return Ok(());
        }
        let (w, h) = (u32::from(pixmap.width()), u32::from(pixmap.height()));
        let (mut pw, mut ph) = (w, h);
        let mut held = purpose.to_owned();
        if prescale {
            let [a, b, c, d, _, _] = m.inverse().as_coeffs();
            let mut width_scale = a.hypot(b).max(1.0);
            let mut height_scale = c.hypot(d).max(1.0);
            let mut slot = "prescale1";
            while (width_scale > 2.0 && pw > 1) || (height_scale > 2.0 && ph > 1) {
                let halve_x = width_scale > 2.0 && pw > 1;
                let halve_y = height_scale > 2.0 && ph > 1;
                let (nw, nh) = half_size(pw, ph, halve_x, halve_y);
                if halve_x {
                    width_scale /= f64::from(pw) / f64::from(nw);
                }
                if halve_y {
                    height_scale /= f64::from(ph) / f64::from(nh);
                }
                let mut next = self.painter.acquire(slot, nw, nh)?;
                let res = downscale_half(
                    pixmap.data_as_u8_slice(),
                    pw,
                    ph,
                    next.data_as_u8_slice_mut(),
                    nw,
                    nh,
                );
                self.painter.release(&held, pixmap);
                if let Err(err) = res {
                    self.painter.release(slot, next);
                    return Err(err);
                }
                pixmap = next;
                held = slot.to_owned();
                (pw, ph) = (nw, nh);
                slot = if slot == "prescale1" { "prescale2" } else { "prescale1" };
            }
        }
        let m = m * Affine::scale_non_uniform(f64::from(w) / f64::from(pw), f64::from(h) / f64::from(ph));
        let rect = pixmap_rect(&pixmap);
        let quality = sample_quality(m, purpose);
        let pixmap = self.painter.lend(held, pixmap);
        self.draw_lent(&pixmap, rect, m, quality);
        Ok(())
    }

    fn draw_lent(
        &mut self,
        pixmap: &Arc<vello_cpu::Pixmap>,
        rect: Rect,
        m: Affine,
        quality: Quality,
    ) {
        let alpha = self.current.fill_alpha;
        let source = Source::Image(ImagePaint {
            pixmap: pixmap.clone(),
            transform: m,
            extend: Extend::Pad,
            quality,
        });
        self.paint(Shape::Rect(rect), source, m, alpha, None);
    }
}
