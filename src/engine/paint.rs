use std::sync::Arc;

use kurbo::Shape as _;

use crate::engine::GraphicsEngine;
use crate::engine::state::PaintStyle;
use crate::foundation::core::{Affine, Rect, affine_from_array};
use crate::foundation::error::PaintResult;
use crate::foundation::math::{intersect, singular_values};
use crate::pattern::axial::{self, GradientRamp};
use crate::pattern::mesh::{self, MeshLayout};
use crate::pattern::tiling::TileLayout;
use crate::pattern::{AxialRadialIr, MeshIr, PatternRef, ShadingIr, TilingIr, TilingPaintType};
use crate::render::raster::{ClipPath, Extend, FillRule, ImagePaint, Quality, Shape, Source};
use crate::render::target::RasterTarget;

/// A paint source plus the extra clip it must be drawn under.
pub(crate) type ResolvedPaint = (Source, Option<Arc<ClipPath>>);

fn bbox_clip(bbox: Option<[f64; 4]>, to_page: Affine) -> Option<Arc<ClipPath>> {
    let [x0, y0, x1, y1] = bbox?;
    let mut path = Rect::new(x0, y0, x1, y1).to_path(0.1);
    path.apply_affine(to_page);
    Some(Arc::new(ClipPath {
        path,
        rule: FillRule::NonZero,
    }))
}

impl GraphicsEngine {
    /// Turn a fill or stroke style into something paintable over `area` (target pixels).
    ///
    /// `None` means the paint draws nothing.
    pub(crate) fn resolve_paint(
        &mut self,
        style: &PaintStyle,
        area: Rect,
    ) -> PaintResult<Option<ResolvedPaint>> {
        let Some(pattern) = &style.pattern else {
            return Ok(Some((Source::Solid(style.color), None)));
        };
        match pattern {
            PatternRef::Shading { id, matrix } => {
                let shading = self.objects.shading(id)?;
                let matrix = matrix.map_or(Affine::IDENTITY, affine_from_array);
                let to_target = self.from_page() * self.base_transform * matrix;
                let clip_space = self.base_transform;
                match shading.as_ref() {
                    ShadingIr::RadialAxial(ir) => Ok(self
                        .gradient_tile(id, ir, to_target, area)?
                        .map(|s| (s, bbox_clip(ir.bbox, clip_space)))),
                    ShadingIr::Mesh(ir) => {
                        let base = singular_values(self.from_page() * self.base_transform);
                        let m = singular_values(matrix);
                        let scale = [base[0] * m[0], base[1] * m[1]];
                        let source = self.mesh_source(id, ir, to_target, scale, true)?;
                        Ok(Some((source, bbox_clip(ir.bbox, clip_space))))
                    }
                    ShadingIr::Dummy => Ok(None),
                }
            }
            PatternRef::Tiling(ir) => Ok(self.tiling_source(ir, style)?.map(|s| (s, None))),
        }
    }

    /// `shadingFill`: paint a shading over the whole target under the current transform.
    pub(crate) fn shading_fill(&mut self, id: &str) -> PaintResult<()> {
        if !self.content_visible {
            return Ok(());
        }
        let shading = self.objects.shading(id)?;
        let to_target = self.from_page() * self.current.ctm;
        if to_target.determinant().abs() < 1e-12 {
            return Ok(());
        }
        let area = self.top()?.target.rect();
        let ctm = self.current.ctm;
        let resolved = match shading.as_ref() {
            ShadingIr::RadialAxial(ir) => self
                .gradient_tile(id, ir, to_target, area)?
                .map(|s| (s, bbox_clip(ir.bbox, ctm))),
            ShadingIr::Mesh(ir) => {
                let scale = singular_values(to_target);
                let source = self.mesh_source(id, ir, to_target, scale, false)?;
                Some((source, bbox_clip(ir.bbox, ctm)))
            }
            ShadingIr::Dummy => None,
        };
        if let Some((source, clip)) = resolved {
            let alpha = self.current.fill_alpha;
            self.paint(Shape::Rect(area), source, Affine::IDENTITY, alpha, clip);
        }
        Ok(())
    }

    /// Rasterize a gradient into a pixel-aligned tile covering `area`.
    fn gradient_tile(
        &mut self,
        id: &str,
        ir: &AxialRadialIr,
        to_target: Affine,
        area: Rect,
    ) -> PaintResult<Option<Source>> {
        if to_target.determinant().abs() < 1e-12 {
            return Ok(None);
        }
        let Some(r) = intersect(area, self.top()?.target.rect()) else {
            return Ok(None);
        };
        let (x0, y0) = (r.x0.floor(), r.y0.floor());
        let w = (r.x1.ceil() - x0).max(1.0) as u32;
        let h = (r.y1.ceil() - y0).max(1.0) as u32;
        let ramp = self
            .ramps
            .entry(id.to_owned())
            .or_insert_with(|| Arc::new(GradientRamp::new(&ir.stops)))
            .clone();

        let mut tile = self.painter.acquire("pattern", w, h)?;
        let tile_to_shading = to_target.inverse() * Affine::translate((x0, y0));
        axial::rasterize(ir, &ramp, tile_to_shading, tile.data_as_u8_slice_mut(), w);
        let pixmap = self.painter.lend("pattern", tile);
        Ok(Some(Source::Image(ImagePaint {
            pixmap,
            transform: Affine::translate((x0, y0)),
            extend: Extend::Pad,
            quality: Quality::Low,
        })))
    }

    /// Mesh tile for shading `id` at `scale`, rasterized once per render.
    fn mesh_source(
        &mut self,
        id: &str,
        ir: &MeshIr,
        to_target: Affine,
        scale: [f64; 2],
        background: bool,
    ) -> PaintResult<Source> {
        let layout = MeshLayout::new(ir.bounds, scale, self.opts.max_pattern_size);
        let key = (
            id.to_owned(),
            scale[0].to_bits(),
            scale[1].to_bits(),
            background,
        );
        let pixmap = match self.meshes.get(&key) {
            Some(p) => p.clone(),
            None => {
                let mut tile =
                    self.painter
                        .acquire("mesh", layout.padded_width, layout.padded_height)?;
                mesh::rasterize(ir, &layout, background, tile.data_as_u8_slice_mut());
                let arc = Arc::new(tile);
                self.meshes.insert(key, arc.clone());
                arc
            }
        };
        Ok(Source::Image(ImagePaint {
            pixmap,
            transform: to_target * layout.tile_to_shading(),
            extend: Extend::Pad,
            quality: Quality::Medium,
        }))
    }

    /// Render one tiling cell with a nested engine and repeat it.
    fn tiling_source(&mut self, ir: &TilingIr, style: &PaintStyle) -> PaintResult<Option<Source>> {
        let matrix = ir.matrix.map_or(Affine::IDENTITY, affine_from_array);
        let to_target = self.from_page() * self.base_transform * matrix;
        if to_target.determinant().abs() < 1e-12 {
            return Ok(None);
        }
        let m = singular_values(matrix);
        let b = singular_values(self.from_page() * self.base_transform);
        let rect = self.top()?.target.rect();
        let layout = TileLayout::new(
            ir,
            [m[0] * b[0], m[1] * b[1]],
            (rect.width() as u32, rect.height() as u32),
            self.opts.max_pattern_size,
        );

        let target = RasterTarget::acquire(
            self.painter.pool(),
            self.painter.task(),
            "pattern",
            layout.dim_x.size,
            layout.dim_y.size,
            Affine::IDENTITY,
        )?;
        let mut cell = self.nested(target, layout.cell_transform());
        cell.group_level = self.group_level;
        match ir.paint_type {
            TilingPaintType::Colored => {
                cell.current.fill = PaintStyle::solid(self.current.fill.color);
                cell.current.stroke = PaintStyle::solid(self.current.stroke.color);
            }
            TilingPaintType::Uncolored => {
                let color = ir.color.unwrap_or(style.color);
                cell.current.fill = PaintStyle::solid(color);
                cell.current.stroke = PaintStyle::solid(color);
            }
        }
        let bbox = layout.bbox;
        cell.clip_user_rect(bbox.x0, bbox.y0, bbox.width(), bbox.height());
        cell.execute_nested(&ir.operator_list);
        let Some((purpose, tile)) = cell.into_root()?.into_pooled() else {
            return Ok(None);
        };
        let pixmap = self.painter.lend(purpose, tile);
        Ok(Some(Source::Image(ImagePaint {
            pixmap,
            transform: to_target * layout.placement(),
            extend: Extend::Repeat,
            quality: Quality::Medium,
        })))
    }
}
