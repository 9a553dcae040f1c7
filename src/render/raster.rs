use std::sync::Arc;

use crate::foundation::core::{Affine, BezPath, Rect, Rgba8, lock};
use crate::foundation::error::{PaintError, PaintResult};
use crate::render::composite::{BlendMode, composite_over_rgba8_premul};
use crate::render::pool::{SharedPool, TaskId};
use crate::render::target::RasterTarget;

/// Winding rule for fills and clips.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl FillRule {
    fn to_cpu(self) -> vello_cpu::peniko::Fill {
        match self {
            Self::NonZero => vello_cpu::peniko::Fill::NonZero,
            Self::EvenOdd => vello_cpu::peniko::Fill::EvenOdd,
        }
    }
}

/// Clip region in page device space.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ClipPath {
    pub(crate) path: BezPath,
    pub(crate) rule: FillRule,
}

/// How image paints are sampled outside their bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Extend {
    Pad,
    Repeat,
}

/// Image resampling quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Quality {
    Low,
    Medium,
}

/// A pixmap used as paint; `transform` maps image pixels to target pixels.
#[derive(Clone)]
pub(crate) struct ImagePaint {
    pub(crate) pixmap: Arc<vello_cpu::Pixmap>,
    pub(crate) transform: Affine,
    pub(crate) extend: Extend,
    pub(crate) quality: Quality,
}

impl ImagePaint {
    fn to_cpu(&self) -> vello_cpu::Image {
        let extend = match self.extend {
            Extend::Pad => vello_cpu::peniko::Extend::Pad,
            Extend::Repeat => vello_cpu::peniko::Extend::Repeat,
        };
        let quality = match self.quality {
            Quality::Low => vello_cpu::peniko::ImageQuality::Low,
            Quality::Medium => vello_cpu::peniko::ImageQuality::Medium,
        };
        vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(self.pixmap.clone()),
            sampler: vello_cpu::peniko::ImageSampler::default()
                .with_extend(extend)
                .with_quality(quality),
        }
    }
}

pub(crate) enum Source {
    Solid(Rgba8),
    Image(ImagePaint),
}

/// Stroke parameters in user space.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct StrokeStyle {
    pub(crate) width: f64,
    pub(crate) cap: u8,
    pub(crate) join: u8,
    pub(crate) miter_limit: f64,
    pub(crate) dash: Option<(Vec<f64>, f64)>,
}

impl StrokeStyle {
    fn to_cpu(&self) -> vello_cpu::kurbo::Stroke {
        use vello_cpu::kurbo::{Cap, Join};
        let cap = match self.cap {
            1 => Cap::Round,
            2 => Cap::Square,
            _ => Cap::Butt,
        };
        let join = match self.join {
            1 => Join::Round,
            2 => Join::Bevel,
            _ => Join::Miter,
        };
        let mut stroke = vello_cpu::kurbo::Stroke::new(self.width)
            .with_caps(cap)
            .with_join(join)
            .with_miter_limit(self.miter_limit);
        if let Some((dashes, phase)) = &self.dash
            && !dashes.is_empty()
            && dashes.iter().any(|d| *d > 0.0)
        {
            stroke = stroke.with_dashes(*phase, dashes.iter().copied());
        }
        stroke
    }
}

pub(crate) enum Shape<'a> {
    Fill(&'a BezPath, FillRule),
    Stroke(&'a BezPath, &'a StrokeStyle),
    Rect(Rect),
    Glyphs {
        font: &'a vello_cpu::peniko::FontData,
        size: f32,
        glyphs: &'a [vello_cpu::Glyph],
    },
}

/// Per-paint parameters; `transform` maps shape space to target pixels.
pub(crate) struct DrawParams<'a> {
    pub(crate) transform: Affine,
    pub(crate) alpha: f32,
    pub(crate) blend: BlendMode,
    pub(crate) clips: &'a [Arc<ClipPath>],
}

/// Batches paints for the top target into a vello_cpu context and composites them on flush.
///
/// Source-over paints accumulate until the next flush; any other blend mode flushes around
/// itself so the blend kernel sees exactly one paint.
pub(crate) struct Painter {
    ctx: Option<vello_cpu::RenderContext>,
    aux: Option<vello_cpu::RenderContext>,
    dirty: bool,
    lent: Vec<(String, Arc<vello_cpu::Pixmap>)>,
    pool: SharedPool,
    task: TaskId,
}

impl Painter {
    pub(crate) fn new(pool: SharedPool, task: TaskId) -> Self {
        Self {
            ctx: None,
            aux: None,
            dirty: false,
            lent: Vec::new(),
            pool,
            task,
        }
    }

    pub(crate) fn pool(&self) -> &SharedPool {
        &self.pool
    }

    pub(crate) fn task(&self) -> TaskId {
        self.task
    }

    /// Pooled pixmap handed to the backend; it returns to the pool after the next flush.
    pub(crate) fn lend(
        &mut self,
        purpose: impl Into<String>,
        pixmap: vello_cpu::Pixmap,
    ) -> Arc<vello_cpu::Pixmap> {
        let arc = Arc::new(pixmap);
        self.lent.push((purpose.into(), arc.clone()));
        arc
    }

    pub(crate) fn acquire(
        &self,
        purpose: &str,
        width: u32,
        height: u32,
    ) -> PaintResult<vello_cpu::Pixmap> {
        lock(&self.pool).acquire(self.task, purpose, width, height)
    }

    pub(crate) fn release(&self, purpose: &str, pixmap: vello_cpu::Pixmap) {
        lock(&self.pool).release(self.task, purpose, pixmap);
    }

    pub(crate) fn draw(
        &mut self,
        target: &mut RasterTarget,
        shape: Shape<'_>,
        source: Source,
        params: DrawParams<'_>,
    ) -> PaintResult<()> {
        if params.alpha <= 0.0 {
            return Ok(());
        }
        if params.transform.determinant().abs() < 1e-12 || !params.transform.is_finite() {
            return Err(PaintError::backend("paint transform is not invertible"));
        }
        let blended = params.blend != BlendMode::Normal;
        if blended {
            self.flush(target)?;
        }

        let (w, h) = (target.width, target.height);
        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
            Some(_) if self.dirty => {
                return Err(PaintError::backend("target changed without a flush"));
            }
            _ => vello_cpu::RenderContext::new(w, h),
        };
        encode(&mut ctx, target.from_page(), &shape, &source, &params);
        self.ctx = Some(ctx);
        self.dirty = true;

        if blended {
            self.flush_with(target, params.blend)?;
        }
        Ok(())
    }

    /// Composite pending paints onto `target`.
    pub(crate) fn flush(&mut self, target: &mut RasterTarget) -> PaintResult<()> {
        self.flush_with(target, BlendMode::Normal)
    }

    fn flush_with(&mut self, target: &mut RasterTarget, blend: BlendMode) -> PaintResult<()> {
        if !self.dirty {
            return Ok(());
        }
        self.dirty = false;
        let Some(ctx) = self.ctx.as_mut() else {
            return Ok(());
        };
        ctx.flush();
        let mut scratch = lock(&self.pool).acquire(
            self.task,
            "scratch",
            u32::from(ctx.width()),
            u32::from(ctx.height()),
        )?;
        ctx.render_to_pixmap(&mut scratch);
        ctx.reset();
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(0, 0, 0, 0));

        let res = target.write(|dst| {
            composite_over_rgba8_premul(dst, scratch.data_as_u8_slice(), 1.0, blend)
        });
        lock(&self.pool).release(self.task, "scratch", scratch);
        self.reclaim();
        res
    }

    /// Drop pending paints without compositing them.
    pub(crate) fn discard(&mut self) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.reset();
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(0, 0, 0, 0));
        }
        self.dirty = false;
        self.reclaim();
    }

    fn reclaim(&mut self) {
        let mut pool = lock(&self.pool);
        for (purpose, arc) in self.lent.drain(..) {
            match Arc::try_unwrap(arc) {
                Ok(p) => pool.release(self.task, &purpose, p),
                Err(_) => pool.forget(self.task),
            }
        }
    }

    /// Render `shape` alone into a fresh pooled pixmap of `width` x `height`.
    ///
    /// `to_page` places the pixmap in page device space so clips map correctly.
    pub(crate) fn render_offscreen(
        &mut self,
        purpose: &str,
        width: u32,
        height: u32,
        to_page: Affine,
        shape: Shape<'_>,
        source: Source,
        params: DrawParams<'_>,
    ) -> PaintResult<vello_cpu::Pixmap> {
        let mut out = self.acquire(purpose, width, height)?;
        let (w, h) = (out.width(), out.height());
        let mut aux = match self.aux.take() {
            Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
            _ => vello_cpu::RenderContext::new(w, h),
        };
        aux.reset();
        encode(&mut aux, to_page.inverse(), &shape, &source, &params);
        aux.flush();
        aux.render_to_pixmap(&mut out);
        aux.reset();
        aux.set_paint(vello_cpu::peniko::Color::from_rgba8(0, 0, 0, 0));
        self.aux = Some(aux);
        Ok(out)
    }
}

fn encode(
    ctx: &mut vello_cpu::RenderContext,
    from_page: Affine,
    shape: &Shape<'_>,
    source: &Source,
    params: &DrawParams<'_>,
) {
    ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    for clip in params.clips {
        let mut path = clip.path.clone();
        path.apply_affine(from_page);
        ctx.set_fill_rule(clip.rule.to_cpu());
        ctx.push_clip_layer(&bezpath_to_cpu(&path));
    }
    let opacity = params.alpha.clamp(0.0, 1.0);
    if opacity < 1.0 {
        ctx.push_opacity_layer(opacity);
    }

    ctx.set_transform(affine_to_cpu(params.transform));
    match source {
        Source::Solid(c) => {
            ctx.set_paint(c.to_color(1.0));
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        }
        Source::Image(img) => {
            ctx.set_paint(img.to_cpu());
            ctx.set_paint_transform(affine_to_cpu(params.transform.inverse() * img.transform));
        }
    }
    match shape {
        Shape::Fill(path, rule) => {
            ctx.set_fill_rule(rule.to_cpu());
            ctx.fill_path(&bezpath_to_cpu(path));
        }
        Shape::Stroke(path, style) => {
            ctx.set_stroke(style.to_cpu());
            ctx.stroke_path(&bezpath_to_cpu(path));
        }
        Shape::Rect(r) => {
            ctx.set_fill_rule(vello_cpu::peniko::Fill::NonZero);
            ctx.fill_rect(&rect_to_cpu(*r));
        }
        Shape::Glyphs { font, size, glyphs } => {
            ctx.glyph_run(font)
                .font_size(*size)
                .fill_glyphs(glyphs.iter().copied());
        }
    }

    if opacity < 1.0 {
        ctx.pop_layer();
    }
    for _ in params.clips {
        ctx.pop_layer();
    }
}

pub(crate) fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

pub(crate) fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

pub(crate) fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
