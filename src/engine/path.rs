use std::sync::Arc;

use kurbo::{PathEl, Shape as _};

use crate::engine::GraphicsEngine;
use crate::foundation::core::{Affine, BezPath, Point, Rect};
use crate::foundation::error::{PaintError, PaintResult};
use crate::foundation::math::transform_rect_bbox;
use crate::oplist::OpCode;
use crate::render::raster::{ClipPath, FillRule, Shape};

/// Pattern strokes never go below this fraction of a device pixel.
pub(crate) const MIN_WIDTH_FACTOR: f64 = 0.65;

impl GraphicsEngine {
    /// A single path-construction operator with its coordinates.
    pub(crate) fn path_op(&mut self, op: OpCode, coords: &[f64]) -> PaintResult<()> {
        let used = self.segment(op, coords)?;
        if used != coords.len() {
            tracing::warn!(%op, extra = coords.len() - used, "ignoring extra path coordinates");
        }
        Ok(())
    }

    /// `constructPath(ops, coords)`: a batch of segments sharing one coordinate array.
    pub(crate) fn construct_path(&mut self, ops: &[f64], coords: &[f64]) -> PaintResult<()> {
        let mut j = 0;
        for &code in ops {
            let op = OpCode::from_code(code as u8)
                .ok_or_else(|| PaintError::malformed(format!("unknown path operator {code}")))?;
            j += self.segment(op, &coords[j.min(coords.len())..])?;
        }
        Ok(())
    }

    /// Append one segment in page device space; returns how many coordinates it used.
    fn segment(&mut self, op: OpCode, c: &[f64]) -> PaintResult<usize> {
        let need = match op {
            OpCode::MoveTo | OpCode::LineTo => 2,
            OpCode::CurveTo => 6,
            OpCode::CurveTo2 | OpCode::CurveTo3 | OpCode::Rectangle => 4,
            OpCode::ClosePath => 0,
            _ => return Err(PaintError::malformed(format!("{op} is not a path operator"))),
        };
        if c.len() < need {
            return Err(PaintError::malformed(format!(
                "{op}: expected {need} coordinates, got {}",
                c.len()
            )));
        }
        let m = self.current.ctm;
        let dev = |x: f64, y: f64| m * Point::new(x, y);
        match op {
            OpCode::Rectangle => {
                let (x, y, w, h) = (c[0], c[1], c[2], c[3]);
                self.path.move_to(dev(x, y));
                if w == 0.0 || h == 0.0 {
                    self.path.line_to(dev(x + w, y + h));
                } else {
                    self.path.line_to(dev(x + w, y));
                    self.path.line_to(dev(x + w, y + h));
                    self.path.line_to(dev(x, y + h));
                }
                self.path.close_path();
                self.current_point = Point::new(x, y);
            }
            OpCode::MoveTo => {
                self.path.move_to(dev(c[0], c[1]));
                self.current_point = Point::new(c[0], c[1]);
            }
            OpCode::LineTo => {
                let p = dev(c[0], c[1]);
                self.ensure_subpath(p);
                self.path.line_to(p);
                self.current_point = Point::new(c[0], c[1]);
            }
            OpCode::CurveTo => {
                let p1 = dev(c[0], c[1]);
                self.ensure_subpath(p1);
                self.path.curve_to(p1, dev(c[2], c[3]), dev(c[4], c[5]));
                self.current_point = Point::new(c[4], c[5]);
            }
            OpCode::CurveTo2 => {
                let p0 = m * self.current_point;
                self.ensure_subpath(p0);
                self.path.curve_to(p0, dev(c[0], c[1]), dev(c[2], c[3]));
                self.current_point = Point::new(c[2], c[3]);
            }
            OpCode::CurveTo3 => {
                let p1 = dev(c[0], c[1]);
                let p3 = dev(c[2], c[3]);
                self.ensure_subpath(p1);
                self.path.curve_to(p1, p3, p3);
                self.current_point = Point::new(c[2], c[3]);
            }
            _ => self.close_path(),
        }
        Ok(need)
    }

    /// Start a subpath at `p` when there is none to continue.
    fn ensure_subpath(&mut self, p: Point) {
        match self.path.elements().last() {
            None => self.path.move_to(p),
            Some(PathEl::ClosePath) => {
                let start = subpath_start(&self.path).unwrap_or(p);
                self.path.move_to(start);
            }
            Some(_) => {}
        }
    }

    pub(crate) fn close_path(&mut self) {
        if !matches!(self.path.elements().last(), None | Some(PathEl::ClosePath)) {
            self.path.close_path();
        }
    }

    /// Apply a pending clip, then start a new path.
    pub(crate) fn consume_path(&mut self) {
        let path = std::mem::take(&mut self.path);
        if let Some(rule) = self.pending_clip.take() {
            self.current.clips.push(Arc::new(ClipPath { path, rule }));
        }
    }

    /// Intersect the clip with a user-space rectangle.
    pub(crate) fn clip_user_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let r = Rect::new(x, y, x + w, y + h);
        let mut path = r.to_path(0.1);
        path.apply_affine(self.current.ctm);
        self.current.clips.push(Arc::new(ClipPath {
            path,
            rule: FillRule::NonZero,
        }));
    }

    /// Current path bounds in target pixels.
    fn path_area(&self) -> Rect {
        transform_rect_bbox(self.from_page(), self.path.bounding_box())
    }

    pub(crate) fn fill(&mut self, rule: FillRule, consume: bool) -> PaintResult<()> {
        if self.content_visible && !self.path.elements().is_empty() {
            let brush = self.current.fill.clone();
            let area = self.path_area();
            if let Some((source, clip)) = self.resolve_paint(&brush, area)? {
                let path = self.path.clone();
                let transform = self.from_page();
                let alpha = self.current.fill_alpha;
                self.paint(Shape::Fill(&path, rule), source, transform, alpha, clip);
            }
        }
        if consume {
            self.consume_path();
        }
        Ok(())
    }

    pub(crate) fn stroke(&mut self, consume: bool) -> PaintResult<()> {
        if self.content_visible && !self.path.elements().is_empty() {
            self.stroke_current_path()?;
        }
        if consume {
            self.consume_path();
        }
        Ok(())
    }

    fn stroke_current_path(&mut self) -> PaintResult<()> {
        let brush = self.current.stroke.clone();
        let from_page = self.from_page();
        let device = from_page * self.current.ctm;
        let area = self.top()?.target.rect();
        let Some((source, clip)) = self.resolve_paint(&brush, area)? else {
            return Ok(());
        };
        let alpha = self.current.stroke_alpha;
        let spw = self.single_pixel_width(device);
        let lw = self.current.line_width;

        if brush.pattern.is_none() && spw < 0.0 && -spw >= lw {
            // Anisotropic pixels: stroke the device path with a whole-pixel width.
            let mut path = self.path.clone();
            path.apply_affine(from_page);
            let style = self
                .current
                .stroke_style(self.combined_scale.round().max(1.0));
            self.paint(Shape::Stroke(&path, &style), source, Affine::IDENTITY, alpha, clip);
            return Ok(());
        }

        let width = if brush.pattern.is_some() {
            (spw * MIN_WIDTH_FACTOR).max(lw)
        } else {
            spw.max(lw)
        };
        let ctm = self.current.ctm;
        if ctm.determinant().abs() < 1e-12 {
            return Ok(());
        }
        let mut path = self.path.clone();
        path.apply_affine(ctm.inverse());
        let style = self.current.stroke_style(width);
        self.paint(Shape::Stroke(&path, &style), source, device, alpha, clip);
        Ok(())
    }

    pub(crate) fn fill_stroke(&mut self, rule: FillRule) -> PaintResult<()> {
        self.fill(rule, false)?;
        self.stroke(false)?;
        self.consume_path();
        Ok(())
    }

    /// Width of one device pixel in user units for transform `m`.
    ///
    /// Negative when the pixel is non-square and more than one unit tall; the magnitude is
    /// then the device-space width to use instead.
    pub(crate) fn single_pixel_width(&self, m: Affine) -> f64 {
        let [a, b, c, d, _, _] = m.as_coeffs();
        let abs_det = (a * d - c * b).abs();
        let sq1 = a * a + c * c;
        let sq2 = b * b + d * d;
        let pixel_height = sq1.max(sq2).sqrt() / abs_det;
        if sq1 != sq2 && self.combined_scale * pixel_height > 1.0 {
            -(self.combined_scale * pixel_height)
        } else if abs_det > f64::EPSILON {
            pixel_height
        } else {
            1.0
        }
    }

    pub(crate) fn paint_solid_color_image_mask(&mut self) -> PaintResult<()> {
        if !self.content_visible {
            return Ok(());
        }
        let brush = self.current.fill.clone();
        let transform = self.from_page() * self.current.ctm;
        let unit = Rect::new(0.0, 0.0, 1.0, 1.0);
        if let Some((source, clip)) = self.resolve_paint(&brush, transform_rect_bbox(transform, unit))? {
            let alpha = self.current.fill_alpha;
            self.paint(Shape::Rect(unit), source, transform, alpha, clip);
        }
        Ok(())
    }
}

fn subpath_start(path: &BezPath) -> Option<Point> {
    path.elements().iter().rev().find_map(|el| match el {
        PathEl::MoveTo(p) => Some(*p),
        _ => None,
    })
}
