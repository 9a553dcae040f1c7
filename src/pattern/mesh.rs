use crate::foundation::core::Affine;
use crate::pattern::{FigureKind, MeshFigure, MeshIr};

/// Oversampling applied to the device scale when sizing the mesh tile.
pub(crate) const EXPECTED_SCALE: f64 = 1.1;
/// Transparent margin around the drawn mesh so padded sampling stays transparent.
pub(crate) const BORDER_SIZE: u32 = 2;

/// Size and placement of a rasterized mesh tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct MeshLayout {
    /// Tile size including the border.
    pub(crate) padded_width: u32,
    pub(crate) padded_height: u32,
    /// Drawn area, excluding the border.
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) offset_x: f64,
    pub(crate) offset_y: f64,
    pub(crate) scale_x: f64,
    pub(crate) scale_y: f64,
}

impl MeshLayout {
    /// Layout for `bounds` at the combined device `scale`, capped at `max_size` per axis.
    pub(crate) fn new(bounds: [f64; 4], scale: [f64; 2], max_size: u32) -> Self {
        let offset_x = bounds[0].floor();
        let offset_y = bounds[1].floor();
        let bounds_w = (bounds[2].ceil() - offset_x).max(1.0);
        let bounds_h = (bounds[3].ceil() - offset_y).max(1.0);
        let cap = f64::from(max_size.max(1));
        let width = (bounds_w * scale[0] * EXPECTED_SCALE).abs().ceil().clamp(1.0, cap);
        let height = (bounds_h * scale[1] * EXPECTED_SCALE).abs().ceil().clamp(1.0, cap);
        Self {
            padded_width: width as u32 + BORDER_SIZE * 2,
            padded_height: height as u32 + BORDER_SIZE * 2,
            width: width as u32,
            height: height as u32,
            offset_x,
            offset_y,
            scale_x: bounds_w / width,
            scale_y: bounds_h / height,
        }
    }

    /// Tile pixels (with border) to shading space.
    pub(crate) fn tile_to_shading(&self) -> Affine {
        let b = f64::from(BORDER_SIZE);
        Affine::translate((
            self.offset_x - b * self.scale_x,
            self.offset_y - b * self.scale_y,
        )) * Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }
}

struct Frame<'a> {
    ir: &'a MeshIr,
    bytes: &'a mut [u8],
    stride: usize,
    width: i64,
    height: i64,
    // shading space -> drawn area
    off: [f64; 2],
    scale: [f64; 2],
    origin: i64,
}

/// Rasterize every figure into a padded premultiplied tile of `layout`'s size.
///
/// The background, when given, fills the drawn area first.
pub(crate) fn rasterize(ir: &MeshIr, layout: &MeshLayout, background: bool, out: &mut [u8]) {
    let stride = layout.padded_width as usize * 4;
    let b = BORDER_SIZE as usize;
    if background && let Some(bg) = ir.background {
        for y in 0..layout.height as usize {
            let row = (y + b) * stride;
            for x in 0..layout.width as usize {
                let i = row + (x + b) * 4;
                out[i..i + 4].copy_from_slice(&[bg[0], bg[1], bg[2], 255]);
            }
        }
    }
    let mut frame = Frame {
        ir,
        bytes: out,
        stride,
        width: i64::from(layout.width),
        height: i64::from(layout.height),
        off: [-layout.offset_x, -layout.offset_y],
        scale: [1.0 / layout.scale_x, 1.0 / layout.scale_y],
        origin: i64::from(BORDER_SIZE),
    };
    for figure in &ir.figures {
        draw_figure(&mut frame, figure);
    }
}

fn draw_figure(f: &mut Frame<'_>, figure: &MeshFigure) {
    let ps = &figure.coords;
    let cs = &figure.colors;
    match figure.kind {
        FigureKind::Triangles => {
            for (p, c) in ps.chunks_exact(3).zip(cs.chunks_exact(3)) {
                draw_triangle(f, [p[0], p[1], p[2]], [c[0], c[1], c[2]]);
            }
        }
        FigureKind::Lattice => {
            let per_row = figure.vertices_per_row as usize;
            if per_row < 2 {
                tracing::warn!(per_row, "lattice mesh figure needs at least two vertices per row");
                return;
            }
            let rows = (ps.len() / per_row).saturating_sub(1);
            let cols = per_row - 1;
            for i in 0..rows {
                let mut q = i * per_row;
                for _ in 0..cols {
                    let (a, b, c, d) = (q, q + 1, q + per_row, q + per_row + 1);
                    if d < ps.len() && d < cs.len() {
                        draw_triangle(f, [ps[a], ps[b], ps[c]], [cs[a], cs[b], cs[c]]);
                        draw_triangle(f, [ps[d], ps[b], ps[c]], [cs[d], cs[b], cs[c]]);
                    }
                    q += 1;
                }
            }
        }
    }
}

fn draw_triangle(f: &mut Frame<'_>, p: [u32; 3], c: [u32; 3]) {
    let coord = |i: u32| f.ir.coords.get(i as usize).copied();
    let color = |i: u32| f.ir.colors.get(i as usize).map(|c| c.map(f64::from));
    let (Some(mut v), Some(mut col)) = (
        p.iter().map(|&i| coord(i)).collect::<Option<Vec<_>>>(),
        c.iter().map(|&i| color(i)).collect::<Option<Vec<_>>>(),
    ) else {
        tracing::warn!("mesh triangle references a missing vertex or color");
        return;
    };

    // Sort by y.
    if v[0][1] > v[1][1] {
        v.swap(0, 1);
        col.swap(0, 1);
    }
    if v[1][1] > v[2][1] {
        v.swap(1, 2);
        col.swap(1, 2);
    }
    if v[0][1] > v[1][1] {
        v.swap(0, 1);
        col.swap(0, 1);
    }
    let tx = |q: [f64; 2]| {
        (
            (q[0] + f.off[0]) * f.scale[0],
            (q[1] + f.off[1]) * f.scale[1],
        )
    };
    let (x1, y1) = tx(v[0]);
    let (x2, y2) = tx(v[1]);
    let (x3, y3) = tx(v[2]);
    if ![x1, y1, x2, y2, x3, y3].iter().all(|c| c.is_finite()) {
        tracing::warn!("skipping mesh triangle with non-finite coordinates");
        return;
    }
    if y1 >= y3 {
        return;
    }
    let (c1, c2, c3) = (col[0], col[1], col[2]);
    let lerp3 = |a: [f64; 3], b: [f64; 3], k: f64| [0, 1, 2].map(|i| a[i] - (a[i] - b[i]) * k);

    let min_y = (y1.round() as i64).max(0);
    let max_y = (y3.round() as i64).min(f.height - 1);
    for y in min_y..=max_y {
        let yf = y as f64;
        let (xa, ca) = if yf < y2 {
            let k = if yf < y1 {
                0.0
            } else if y1 == y2 {
                1.0
            } else {
                (y1 - yf) / (y1 - y2)
            };
            (x1 - (x1 - x2) * k, lerp3(c1, c2, k))
        } else {
            let k = if yf > y3 {
                1.0
            } else if y2 == y3 {
                0.0
            } else {
                (y2 - yf) / (y2 - y3)
            };
            (x2 - (x2 - x3) * k, lerp3(c2, c3, k))
        };
        let k = if yf < y1 {
            0.0
        } else if yf > y3 {
            1.0
        } else {
            (y1 - yf) / (y1 - y3)
        };
        let xb = x1 - (x1 - x3) * k;
        let cb = lerp3(c1, c3, k);

        let x_start = (xa.min(xb).round() as i64).max(0);
        let x_end = (xa.max(xb).round() as i64).min(f.width - 1);
        let row = (y + f.origin) as usize * f.stride;
        for x in x_start..=x_end {
            let k = if xa == xb {
                0.0
            } else {
                ((xa - x as f64) / (xa - xb)).clamp(0.0, 1.0)
            };
            let rgb = lerp3(ca, cb, k);
            let i = row + (x + f.origin) as usize * 4;
            f.bytes[i] = rgb[0] as u8;
            f.bytes[i + 1] = rgb[1] as u8;
            f.bytes[i + 2] = rgb[2] as u8;
            f.bytes[i + 3] = 255;
        }
    }
}
