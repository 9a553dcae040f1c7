use std::sync::Arc;

use crate::engine::state::{GraphicsState, SmaskEntry};
use crate::engine::{GraphicsEngine, Level, LevelKind};
use crate::foundation::core::{Affine, Rect, affine_from_array};
use crate::foundation::error::{PaintError, PaintResult};
use crate::foundation::math::{intersect, transform_rect_bbox};
use crate::oplist::{Arg, GroupInfo};
use crate::render::composite::{BlendMode, MaskPixels, SoftMaskParams, compose_soft_mask};
use crate::render::raster::{ClipPath, DrawParams, Extend, ImagePaint, Quality, Shape, Source};
use crate::render::target::RasterTarget;

fn gstate_num(key: &str, value: &Arg) -> PaintResult<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PaintError::malformed(format!("graphics state {key}: expected a number")))
}

impl GraphicsEngine {
    /// `setGState`: apply `[key, value]` pairs of an ExtGState dictionary.
    pub(crate) fn set_gstate(&mut self, pairs: &[Arg]) -> PaintResult<()> {
        for pair in pairs {
            let Some([key, value]) = pair.as_array() else {
                return Err(PaintError::malformed("graphics state entry is not a [key, value] pair"));
            };
            let Some(key) = key.as_name() else {
                return Err(PaintError::malformed("graphics state key is not a name"));
            };
            match key {
                "LW" => self.current.line_width = gstate_num(key, value)?,
                "LC" => self.current.line_cap = gstate_num(key, value)? as u8,
                "LJ" => self.current.line_join = gstate_num(key, value)? as u8,
                "ML" => self.current.miter_limit = gstate_num(key, value)?,
                "D" => {
                    let Some([dashes, phase]) = value.as_array() else {
                        return Err(PaintError::malformed("graphics state D: expected [dashes, phase]"));
                    };
                    let dashes: Vec<f64> = dashes
                        .as_array()
                        .unwrap_or_default()
                        .iter()
                        .filter_map(Arg::as_f64)
                        .collect();
                    self.current.dash =
                        (!dashes.is_empty()).then(|| (dashes, phase.as_f64().unwrap_or(0.0)));
                }
                "RI" | "FL" => {}
                "Font" => {
                    let Some([id, size]) = value.as_array() else {
                        return Err(PaintError::malformed("graphics state Font: expected [id, size]"));
                    };
                    let id = id
                        .as_name()
                        .ok_or_else(|| PaintError::malformed("graphics state Font: bad id"))?;
                    self.set_font(id, gstate_num(key, size)?)?;
                }
                "CA" => self.current.stroke_alpha = gstate_num(key, value)?.clamp(0.0, 1.0) as f32,
                "ca" => self.current.fill_alpha = gstate_num(key, value)?.clamp(0.0, 1.0) as f32,
                "BM" => {
                    let name = value.as_name().unwrap_or_default();
                    self.current.blend = BlendMode::from_name(name).unwrap_or_else(|| {
                        tracing::warn!(mode = name, "unsupported blend mode");
                        BlendMode::Normal
                    });
                }
                "TR" => match value {
                    Arg::Transfer { transfer } => self.current.transfer = Some(transfer.clone()),
                    Arg::Null | Arg::Bool(false) => self.current.transfer = None,
                    _ => tracing::warn!("ignoring malformed transfer function"),
                },
                "SMask" => self.set_smask(!matches!(value, Arg::Null | Arg::Bool(false))),
                other => tracing::warn!(key = other, "unsupported graphics state key"),
            }
        }
        Ok(())
    }

    /// Switch soft masks: the active one is ended or suspended, the last rendered one starts.
    fn set_smask(&mut self, enable: bool) {
        if let Some(active) = self.current.active_smask {
            if self.stack.last().and_then(|s| s.active_smask) == Some(active) {
                self.suspend_smask_group();
            } else {
                self.end_smask_group();
            }
        }
        self.current.active_smask = if enable { self.temp_smask } else { None };
        if self.current.active_smask.is_some() {
            self.begin_smask_group();
        }
        self.temp_smask = None;
    }

    /// Open a layer covering the current target; painting goes there until the mask ends.
    pub(crate) fn begin_smask_group(&mut self) {
        let Some(id) = self.current.active_smask else {
            return;
        };
        if !self.smasks.contains_key(&id) {
            tracing::warn!(id, "soft mask is gone");
            self.current.active_smask = None;
            return;
        }
        let Some((w, h, to_page)) = self
            .levels
            .last()
            .map(|l| (l.target.width, l.target.height, l.target.to_page))
        else {
            self.current.active_smask = None;
            return;
        };
        if let Err(err) = self.flush_top() {
            tracing::warn!(error = %err, "flush failed");
        }
        let target = match RasterTarget::acquire(
            self.painter.pool(),
            self.painter.task(),
            format!("smaskGroupAt{}", self.group_level),
            u32::from(w),
            u32::from(h),
            to_page,
        ) {
            Ok(t) => t,
            Err(err) => {
                tracing::warn!(error = %err, "soft mask layer unavailable, mask dropped");
                self.current.active_smask = None;
                return;
            }
        };
        self.levels.push(Level {
            target,
            kind: LevelKind::Smask {
                id,
                blend: self.current.blend,
            },
        });
        self.current.blend = BlendMode::Normal;
        self.group_level += 1;
    }

    pub(crate) fn end_smask_group(&mut self) {
        if let Some(blend) = self.close_smask_layer(false) {
            self.current.blend = blend;
        }
        self.current.active_smask = None;
    }

    /// Composite what was painted under the active mask, keep the cleared layer for later.
    pub(crate) fn suspend_smask_group(&mut self) {
        self.close_smask_layer(true);
    }

    pub(crate) fn resume_smask_group(&mut self, id: u64) {
        let Some(level) = self.suspended.remove(&id) else {
            tracing::warn!(id, "no suspended soft mask layer to resume");
            return;
        };
        if let Err(err) = self.flush_top() {
            tracing::warn!(error = %err, "flush failed");
        }
        self.levels.push(level);
        self.group_level += 1;
    }

    /// Pop the active mask's layer, mask it and draw it onto the level below.
    ///
    /// Returns the blend mode the layer was opened under.
    fn close_smask_layer(&mut self, suspend: bool) -> Option<BlendMode> {
        let id = self.current.active_smask?;
        let blend = match self.levels.last().map(|l| l.kind) {
            Some(LevelKind::Smask { id: top, blend }) if top == id => blend,
            _ => {
                tracing::warn!(id, "active soft mask has no open layer");
                return None;
            }
        };
        if let Err(err) = self.flush_top() {
            tracing::warn!(error = %err, "flush failed");
        }
        let mut layer = self.levels.pop()?;
        self.group_level = self.group_level.saturating_sub(1);

        if let Some(entry) = self.smasks.get(&id) {
            let params = SoftMaskParams {
                subtype: entry.info.subtype,
                backdrop: entry.info.backdrop,
                transfer: entry.info.transfer_map.as_deref(),
                chunk_pixels: self.opts.mask_chunk_pixels,
            };
            let width = u32::from(layer.target.width);
            let mask = MaskPixels {
                data: entry.mask.data_as_u8_slice(),
                width: u32::from(entry.mask.width()),
                height: u32::from(entry.mask.height()),
                layer_to_mask: entry.to_page.inverse() * layer.target.to_page,
            };
            if let Err(err) = layer
                .target
                .write(|dst| compose_soft_mask(dst, width, mask, params))
            {
                tracing::warn!(error = %err, "soft mask composition failed");
            }
        }

        let (w, h, to_page) = (layer.target.width, layer.target.height, layer.target.to_page);
        let kind = layer.kind;
        let Some((purpose, pixmap)) = layer.target.into_pooled() else {
            return Some(blend);
        };
        let transform = self.from_page() * to_page;
        let pixmap = self.painter.lend(purpose.clone(), pixmap);
        self.composite_onto_top(pixmap, transform, Quality::Low, 1.0, blend, &[]);

        if suspend {
            if let Err(err) = self.flush_top() {
                tracing::warn!(error = %err, "flush failed");
            }
            match RasterTarget::acquire(
                self.painter.pool(),
                self.painter.task(),
                purpose,
                u32::from(w),
                u32::from(h),
                to_page,
            ) {
                Ok(target) => {
                    self.suspended.insert(id, Level { target, kind });
                    self.current.resume_smask = Some(id);
                }
                Err(err) => tracing::warn!(error = %err, "cannot keep suspended soft mask layer"),
            }
        }
        Some(blend)
    }

    /// Open an offscreen transparency group sized to its bounds on the current target.
    pub(crate) fn begin_group(&mut self, group: &GroupInfo) -> PaintResult<()> {
        if !self.content_visible {
            return Ok(());
        }
        if !group.isolated {
            tracing::info!("non-isolated group rendered as isolated");
        }
        if group.knockout {
            tracing::warn!("knockout group rendered as non-knockout");
        }
        let matrix = group.matrix.map_or(Affine::IDENTITY, affine_from_array);
        let [x0, y0, x1, y1] = group.bbox;
        let parent = self.top()?.target.rect();
        let parent_to_page = self.top()?.target.to_page;
        let device = transform_rect_bbox(
            self.from_page() * self.current.ctm * matrix,
            Rect::new(x0, y0, x1, y1).abs(),
        );
        let bounds = intersect(device, parent).unwrap_or(Rect::ZERO);
        let (offset_x, offset_y) = (bounds.x0.floor(), bounds.y0.floor());
        let mut drawn_w = (bounds.x1.ceil() - offset_x).max(1.0);
        let mut drawn_h = (bounds.y1.ceil() - offset_y).max(1.0);
        let max = f64::from(self.opts.max_group_size.max(1));
        let (mut scale_x, mut scale_y) = (1.0, 1.0);
        if drawn_w > max {
            scale_x = drawn_w / max;
            drawn_w = max;
        }
        if drawn_h > max {
            scale_y = drawn_h / max;
            drawn_h = max;
        }

        let mut purpose = format!("groupAt{}", self.group_level);
        if group.smask.is_some() {
            purpose.push_str(&format!("_smask_{}", self.next_smask_slot()));
        }
        self.flush_top()?;
        let to_page = parent_to_page
            * Affine::translate((offset_x, offset_y))
            * Affine::scale_non_uniform(scale_x, scale_y);
        let target = RasterTarget::acquire(
            self.painter.pool(),
            self.painter.task(),
            purpose,
            drawn_w as u32,
            drawn_h as u32,
            to_page,
        )?;
        tracing::trace!(
            level = self.group_level,
            width = drawn_w,
            height = drawn_h,
            smask = group.smask.is_some(),
            "begin group"
        );

        self.save();
        self.levels.push(Level {
            target,
            kind: LevelKind::Group {
                scale: (scale_x, scale_y),
                smask: group.smask.is_some(),
            },
        });
        let state = &mut self.current;
        state.clips.clear();
        state.blend = BlendMode::Normal;
        state.fill_alpha = 1.0;
        state.stroke_alpha = 1.0;
        state.active_smask = None;
        self.group_level += 1;
        Ok(())
    }

    /// Close the innermost group: keep it as a soft mask or composite it onto its parent.
    pub(crate) fn end_group(&mut self, group: &GroupInfo) -> PaintResult<()> {
        if !self.content_visible {
            return Ok(());
        }
        let (scale, smask) = match self.levels.last().map(|l| l.kind) {
            Some(LevelKind::Group { scale, smask }) => (scale, smask),
            _ => {
                tracing::warn!("endGroup without an open group");
                return Ok(());
            }
        };
        self.group_level = self.group_level.saturating_sub(1);
        let flushed = self.flush_top();
        let Some(level) = self.levels.pop() else {
            return Ok(());
        };
        let to_page = level.target.to_page;
        let Some((purpose, pixmap)) = level.target.into_pooled() else {
            self.restore();
            return flushed;
        };

        if smask {
            let id = self.next_smask;
            self.next_smask += 1;
            self.smasks.insert(
                id,
                SmaskEntry {
                    mask: pixmap,
                    purpose,
                    to_page,
                    info: group.smask.clone().unwrap_or_default(),
                },
            );
            self.temp_smask = Some(id);
            self.restore();
        } else {
            self.restore();
            let transform = self.from_page() * to_page;
            let quality = if scale == (1.0, 1.0) {
                Quality::Low
            } else {
                Quality::Medium
            };
            let pixmap = self.painter.lend(purpose, pixmap);
            let clips = self.current.clips.to_vec();
            let (alpha, blend) = (self.current.fill_alpha, self.current.blend);
            self.composite_onto_top(pixmap, transform, quality, alpha, blend, &clips);
        }
        flushed
    }

    /// Draw a finished offscreen level onto the top target.
    fn composite_onto_top(
        &mut self,
        pixmap: Arc<vello_cpu::Pixmap>,
        transform: Affine,
        quality: Quality,
        alpha: f32,
        blend: BlendMode,
        clips: &[Arc<ClipPath>],
    ) {
        let rect = Rect::new(0.0, 0.0, f64::from(pixmap.width()), f64::from(pixmap.height()));
        let Some(level) = self.levels.last_mut() else {
            return;
        };
        let source = Source::Image(ImagePaint {
            pixmap,
            transform,
            extend: Extend::Pad,
            quality,
        });
        let params = DrawParams {
            transform,
            alpha,
            blend,
            clips,
        };
        if let Err(err) = self.painter.draw(&mut level.target, Shape::Rect(rect), source, params) {
            tracing::warn!(error = %err, "group composite dropped");
        }
    }

    pub(crate) fn begin_annotations(&mut self) {
        self.save();
        self.current.ctm = self.base_transform;
    }

    /// Fresh graphics state for one annotation appearance, clipped to its rectangle.
    pub(crate) fn begin_annotation(
        &mut self,
        rect: Option<Rect>,
        transform: Option<Affine>,
        matrix: Option<Affine>,
    ) {
        self.save();
        let clips = std::mem::take(&mut self.current.clips);
        self.current = GraphicsState::new(self.current.ctm);
        self.current.clips = clips;
        if let Some(r) = rect {
            self.clip_user_rect(r.x0, r.y0, r.width(), r.height());
        }
        self.consume_path();
        if let Some(t) = transform {
            self.current.ctm *= t;
        }
        if let Some(m) = matrix {
            self.current.ctm *= m;
        }
    }

    /// Enter a form XObject: its matrix becomes part of the base transform for patterns.
    pub(crate) fn paint_form_begin(&mut self, matrix: Option<Affine>, bbox: Option<Rect>) {
        if !self.content_visible {
            return;
        }
        self.save();
        self.base_transform_stack.push(self.base_transform);
        if let Some(m) = matrix {
            self.current.ctm *= m;
        }
        self.base_transform = self.current.ctm;
        if let Some(b) = bbox {
            self.clip_user_rect(b.x0, b.y0, b.width(), b.height());
        }
    }

    pub(crate) fn paint_form_end(&mut self) {
        if !self.content_visible {
            return;
        }
        self.restore();
        if let Some(base) = self.base_transform_stack.pop() {
            self.base_transform = base;
        }
    }

    pub(crate) fn begin_marked_content(&mut self, props: Option<&Arg>) {
        let visible = match (props, self.optional_content.as_deref()) {
            (Some(Arg::OptionalContent { optional_content }), Some(config)) => {
                config.is_visible(optional_content)
            }
            _ => true,
        };
        self.marked.push(visible);
        self.update_visibility();
    }

    pub(crate) fn end_marked_content(&mut self) {
        self.marked.pop();
        self.update_visibility();
    }
}
