use crate::foundation::core::{Affine, Point, Rgba8};
use crate::pattern::{AxialRadialIr, ColorStopIr, GradientKind};

const RAMP_SIZE: usize = 256;

/// Premultiplied color lookup table sampled from a gradient's stops.
pub(crate) struct GradientRamp {
    lut: Vec<[u8; 4]>,
}

impl GradientRamp {
    pub(crate) fn new(stops: &[ColorStopIr]) -> Self {
        let mut lut = vec![[0u8; 4]; RAMP_SIZE];
        if stops.is_empty() {
            return Self { lut };
        }
        for (i, slot) in lut.iter_mut().enumerate() {
            let t = i as f64 / (RAMP_SIZE - 1) as f64;
            let c = match stops.iter().position(|s| s.offset >= t) {
                None => stops[stops.len() - 1].color,
                Some(0) => stops[0].color,
                Some(k) => {
                    let (a, b) = (stops[k - 1], stops[k]);
                    let span = b.offset - a.offset;
                    let f = if span <= f64::EPSILON {
                        1.0
                    } else {
                        (t - a.offset) / span
                    };
                    let lerp = |x: u8, y: u8| {
                        (f64::from(x) + (f64::from(y) - f64::from(x)) * f).round() as u8
                    };
                    Rgba8 {
                        r: lerp(a.color.r, b.color.r),
                        g: lerp(a.color.g, b.color.g),
                        b: lerp(a.color.b, b.color.b),
                        a: lerp(a.color.a, b.color.a),
                    }
                }
            };
            *slot = c.premul().to_array();
        }
        Self { lut }
    }

    fn sample(&self, t: f64) -> [u8; 4] {
        let i = (t.clamp(0.0, 1.0) * (RAMP_SIZE - 1) as f64).round() as usize;
        self.lut[i.min(RAMP_SIZE - 1)]
    }
}

/// Gradient parameter at shading-space point `p`; `None` where the gradient is undefined.
fn param_at(ir: &AxialRadialIr, p: Point) -> Option<f64> {
    let (x0, y0) = (ir.p0[0], ir.p0[1]);
    let (x1, y1) = (ir.p1[0], ir.p1[1]);
    match ir.kind {
        GradientKind::Axial => {
            let (dx, dy) = (x1 - x0, y1 - y0);
            let len2 = dx * dx + dy * dy;
            if len2 <= f64::EPSILON {
                return None;
            }
            Some(((p.x - x0) * dx + (p.y - y0) * dy) / len2)
        }
        GradientKind::Radial => {
            // Largest t with r(t) >= 0 and |p - c(t)| = r(t).
            let (cdx, cdy) = (x1 - x0, y1 - y0);
            let dr = ir.r1 - ir.r0;
            let (pdx, pdy) = (p.x - x0, p.y - y0);
            let a = cdx * cdx + cdy * cdy - dr * dr;
            let b = pdx * cdx + pdy * cdy + ir.r0 * dr;
            let c = pdx * pdx + pdy * pdy - ir.r0 * ir.r0;
            let radius_ok = |t: f64| ir.r0 + t * dr >= 0.0;
            if a.abs() < 1e-9 {
                if b.abs() < 1e-12 {
                    return None;
                }
                let t = c / (2.0 * b);
                return radius_ok(t).then_some(t);
            }
            let disc = b * b - a * c;
            if disc < 0.0 {
                return None;
            }
            let sq = disc.sqrt();
            let (t1, t2) = ((b + sq) / a, (b - sq) / a);
            let (hi, lo) = if t1 > t2 { (t1, t2) } else { (t2, t1) };
            if radius_ok(hi) {
                Some(hi)
            } else if radius_ok(lo) {
                Some(lo)
            } else {
                None
            }
        }
    }
}

/// Rasterize the gradient into a premultiplied tile `width` pixels wide.
///
/// `tile_to_shading` maps tile pixel coordinates into shading space. Parameters beyond
/// `[0, 1]` pad with the end colors; undefined points stay transparent.
pub(crate) fn rasterize(
    ir: &AxialRadialIr,
    ramp: &GradientRamp,
    tile_to_shading: Affine,
    out: &mut [u8],
    width: u32,
) {
    let w = width.max(1) as usize;
    for (i, px) in out.chunks_exact_mut(4).enumerate() {
        let (x, y) = ((i % w) as f64 + 0.5, (i / w) as f64 + 0.5);
        match param_at(ir, tile_to_shading * Point::new(x, y)) {
            Some(t) => px.copy_from_slice(&ramp.sample(t)),
            None => px.fill(0),
        }
    }
}
