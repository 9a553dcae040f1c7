use crate::foundation::core::{Affine, Rect};
use crate::pattern::TilingIr;

/// Pixel size of one tile axis and the pattern-to-pixel scale that produces it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TileDim {
    pub(crate) size: u32,
    pub(crate) scale: f64,
}

/// Size a tile axis for `step` pattern units at `scale` device pixels per unit.
///
/// The size is capped at the larger of `max_pattern` and the real output size; below the cap
/// the scale is snapped so the step maps onto whole pixels.
pub(crate) fn size_and_scale(step: f64, real_output: u32, scale: f64, max_pattern: u32) -> TileDim {
    let step = step.abs();
    let max_size = max_pattern.max(real_output);
    let size = (step * scale).ceil();
    if !size.is_finite() || size < 1.0 {
        return TileDim { size: 1, scale };
    }
    if size >= f64::from(max_size) {
        TileDim {
            size: max_size,
            scale,
        }
    } else {
        TileDim {
            size: size as u32,
            scale: size / step,
        }
    }
}

/// Geometry of one rendered tiling cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TileLayout {
    pub(crate) x0: f64,
    pub(crate) y0: f64,
    pub(crate) bbox: Rect,
    pub(crate) dim_x: TileDim,
    pub(crate) dim_y: TileDim,
}

impl TileLayout {
    pub(crate) fn new(
        ir: &TilingIr,
        combined_scale: [f64; 2],
        output: (u32, u32),
        max_pattern: u32,
    ) -> Self {
        let [x0, y0, x1, y1] = ir.bbox;
        Self {
            x0,
            y0,
            bbox: Rect::new(x0, y0, x1, y1),
            dim_x: size_and_scale(ir.xstep, output.0, combined_scale[0], max_pattern),
            dim_y: size_and_scale(ir.ystep, output.1, combined_scale[1], max_pattern),
        }
    }

    /// Pattern space to tile pixels; the cell content is executed under this transform.
    pub(crate) fn cell_transform(&self) -> Affine {
        Affine::scale_non_uniform(self.dim_x.scale, self.dim_y.scale)
            * Affine::translate((-self.x0, -self.y0))
    }

    /// Tile pixels back to pattern space.
    pub(crate) fn placement(&self) -> Affine {
        Affine::translate((self.x0, self.y0))
            * Affine::scale_non_uniform(1.0 / self.dim_x.scale, 1.0 / self.dim_y.scale)
    }
}
