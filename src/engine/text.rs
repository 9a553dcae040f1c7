use std::sync::Arc;

use kurbo::Shape as _;

use crate::engine::GraphicsEngine;
use crate::engine::path::MIN_WIDTH_FACTOR;
use crate::engine::state::{
    TEXT_ADD_TO_PATH, TEXT_FILL, TEXT_FILL_STROKE, TEXT_FILL_STROKE_MASK, TEXT_INVISIBLE,
    TEXT_STROKE,
};
use crate::foundation::core::{Affine, BezPath};
use crate::foundation::error::PaintResult;
use crate::foundation::math::transform_rect_bbox;
use crate::objects::{FontObject, TextItem};
use crate::render::raster::{ClipPath, FillRule, Shape, Source};

impl GraphicsEngine {
    pub(crate) fn begin_text(&mut self) {
        let t = &mut self.current.text;
        t.text_matrix = Affine::IDENTITY;
        t.line_matrix = Affine::IDENTITY;
        t.text_matrix_scale = 1.0;
        t.x = 0.0;
        t.line_x = 0.0;
        t.y = 0.0;
        t.line_y = 0.0;
    }

    /// Apply glyph outlines collected in clip rendering modes.
    pub(crate) fn end_text(&mut self) {
        if let Some(path) = self.pending_text_clip.take() {
            self.current.clips.push(Arc::new(ClipPath {
                path,
                rule: FillRule::NonZero,
            }));
        }
    }

    pub(crate) fn set_font(&mut self, id: &str, size: f64) -> PaintResult<()> {
        let font = self.objects.font(id)?;
        let fm = font.font_matrix;
        if fm[0] == 0.0 || fm[3] == 0.0 {
            tracing::warn!(font = id, "invalid font matrix");
        }
        let t = &mut self.current.text;
        (t.font_size, t.font_direction) = if size < 0.0 { (-size, -1.0) } else { (size, 1.0) };
        t.font_matrix = font.matrix();
        t.font = Some(font);
        Ok(())
    }

    pub(crate) fn set_text_matrix(&mut self, m: Affine) {
        let t = &mut self.current.text;
        let [a, b, ..] = m.as_coeffs();
        t.text_matrix = m;
        t.line_matrix = m;
        t.text_matrix_scale = a.hypot(b);
        t.x = 0.0;
        t.line_x = 0.0;
        t.y = 0.0;
        t.line_y = 0.0;
    }

    pub(crate) fn move_text(&mut self, x: f64, y: f64) {
        let t = &mut self.current.text;
        t.line_x += x;
        t.x = t.line_x;
        t.line_y += y;
        t.y = t.line_y;
    }

    pub(crate) fn next_line(&mut self) {
        let leading = self.current.text.leading;
        self.move_text(0.0, leading);
    }

    /// Paint a text run and advance the text position past it.
    pub(crate) fn show_text(&mut self, items: &[TextItem]) -> PaintResult<()> {
        let Some(font) = self.current.text.font.clone() else {
            tracing::warn!("text shown before a font was set");
            return Ok(());
        };
        if font.is_type3() {
            self.show_type3_text(&font, items);
            return Ok(());
        }
        let t = &self.current.text;
        let size = t.font_size;
        if size == 0.0 {
            return Ok(());
        }
        let dir = t.font_direction;
        let hscale = t.hscale * dir;
        let fm = t.font_matrix.as_coeffs();
        let was = size * fm[0];
        let vertical = font.vertical;
        let spacing_dir = if vertical { 1.0 } else { -1.0 };
        let (char_spacing, word_spacing) = (t.char_spacing, t.word_spacing);
        let mode = t.render_mode & TEXT_FILL_STROKE_MASK;
        let add_to_path = t.render_mode & TEXT_ADD_TO_PATH != 0;
        let run = self.current.ctm
            * t.text_matrix
            * Affine::translate((t.x, t.y + t.rise))
            * Affine::scale_non_uniform(hscale, if dir > 0.0 { -1.0 } else { 1.0 });
        let glyph_space = t.font_matrix * Affine::scale_non_uniform(size, -size);

        let uniform = fm[1] == 0.0 && fm[2] == 0.0 && fm[0] == fm[3] && fm[0] > 0.0;
        let native = (mode == TEXT_FILL
            && !add_to_path
            && self.current.fill.pattern.is_none()
            && uniform)
            .then(|| font.native())
            .flatten();
        if add_to_path {
            self.pending_text_clip.get_or_insert_with(BezPath::new);
        }

        let mut outline = BezPath::new();
        let mut placed: Vec<vello_cpu::Glyph> = Vec::new();
        let mut x = 0.0;
        for item in items {
            let glyph = match item {
                TextItem::Adjust(adj) => {
                    x += spacing_dir * adj * size / 1000.0;
                    continue;
                }
                TextItem::Glyph(g) => g,
            };
            let spacing = if glyph.is_space { word_spacing } else { 0.0 } + char_spacing;
            let mut width = glyph.width;
            let (gx, gy) = if vertical {
                let vm = glyph.vmetric.or(font.default_vmetrics);
                let vx = -glyph.vmetric.map_or(width * 0.5, |m| m[1]) * was;
                let vy = vm.map_or(0.0, |m| m[2]) * was;
                if let Some(m) = vm {
                    width = -m[0];
                }
                (vx, x + vy)
            } else {
                (x, 0.0)
            };

            if self.content_visible && (glyph.is_in_font || font.missing_file) {
                if native.is_some() {
                    placed.push(vello_cpu::Glyph {
                        id: glyph.id,
                        x: (gx + fm[4]) as f32,
                        y: (gy + fm[5]) as f32,
                    });
                } else if let Some(program) = font.outlines.get(&glyph.id) {
                    let mut path = program.to_path();
                    path.apply_affine(Affine::translate((gx, gy)) * glyph_space);
                    for el in path.elements() {
                        outline.push(*el);
                    }
                } else {
                    tracing::trace!(glyph = glyph.id, font = %font.name, "no outline for glyph");
                }
            }

            x += if vertical {
                width * was - spacing * dir
            } else {
                width * was + spacing * dir
            };
        }
        if vertical {
            self.current.text.y -= x;
        } else {
            self.current.text.x += x * hscale;
        }

        let transform = self.from_page() * run;
        if let Some(data) = native
            && !placed.is_empty()
        {
            let color = self.current.fill.color;
            let alpha = self.current.fill_alpha;
            let shape = Shape::Glyphs {
                font: data,
                size: (size * fm[0] * 1000.0) as f32,
                glyphs: &placed,
            };
            self.paint(shape, Source::Solid(color), transform, alpha, None);
        }
        if outline.elements().is_empty() {
            return Ok(());
        }
        self.paint_text_outline(&outline, transform, mode)?;
        if add_to_path {
            outline.apply_affine(run);
            if let Some(clip) = self.pending_text_clip.as_mut() {
                for el in outline.elements() {
                    clip.push(*el);
                }
            }
        }
        Ok(())
    }

    fn paint_text_outline(&mut self, outline: &BezPath, transform: Affine, mode: u8) -> PaintResult<()> {
        if mode == TEXT_INVISIBLE {
            return Ok(());
        }
        let area = transform_rect_bbox(transform, outline.bounding_box());
        if matches!(mode, TEXT_FILL | TEXT_FILL_STROKE) {
            let brush = self.current.fill.clone();
            if let Some((source, clip)) = self.resolve_paint(&brush, area)? {
                let alpha = self.current.fill_alpha;
                self.paint(Shape::Fill(outline, FillRule::NonZero), source, transform, alpha, clip);
            }
        }
        if matches!(mode, TEXT_STROKE | TEXT_FILL_STROKE) {
            let scale = self.current.text.text_matrix_scale;
            let lw = self.current.line_width;
            let width = if scale == 0.0 || lw == 0.0 {
                self.single_pixel_width(transform).abs() * MIN_WIDTH_FACTOR
            } else {
                lw / scale
            };
            let brush = self.current.stroke.clone();
            if let Some((source, clip)) = self.resolve_paint(&brush, area)? {
                let style = self.current.stroke_style(width);
                let alpha = self.current.stroke_alpha;
                self.paint(Shape::Stroke(outline, &style), source, transform, alpha, clip);
            }
        }
        Ok(())
    }

    /// Run each glyph's procedure under the glyph's placement.
    fn show_type3_text(&mut self, font: &Arc<FontObject>, items: &[TextItem]) {
        let t = &self.current.text;
        let size = t.font_size;
        if t.render_mode == TEXT_INVISIBLE || size == 0.0 {
            return;
        }
        let dir = t.font_direction;
        let hscale = t.hscale * dir;
        let fm = t.font_matrix;
        let [fa, _, _, _, fe, _] = fm.as_coeffs();
        let spacing_dir = if font.vertical { 1.0 } else { -1.0 };
        let (char_spacing, word_spacing) = (t.char_spacing, t.word_spacing);
        let origin = self.current.ctm
            * t.text_matrix
            * Affine::translate((t.x, t.y))
            * Affine::scale_non_uniform(hscale, dir);

        let mut advance = 0.0;
        for item in items {
            let glyph = match item {
                TextItem::Adjust(adj) => {
                    let shift = spacing_dir * adj * size / 1000.0;
                    advance += shift;
                    self.current.text.x += shift * hscale;
                    continue;
                }
                TextItem::Glyph(g) => g,
            };
            let spacing = if glyph.is_space { word_spacing } else { 0.0 } + char_spacing;
            let Some(procedure) = glyph
                .operator_list_id
                .as_deref()
                .and_then(|key| font.char_procs.get(key))
            else {
                tracing::warn!(glyph = ?glyph.operator_list_id, font = %font.name, "Type3 glyph is not available");
                continue;
            };
            if self.content_visible {
                self.save();
                self.current.ctm =
                    origin * Affine::translate((advance, 0.0)) * Affine::scale(size) * fm;
                self.execute_nested(procedure);
                self.restore();
            }
            let width = (glyph.width * fa + fe) * size + spacing;
            advance += width;
            self.current.text.x += width * hscale;
        }
    }
}
