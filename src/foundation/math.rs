use kurbo::{Affine, Rect};

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

pub(crate) fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

/// Scale factors along the principal axes of the linear part of `m`.
///
/// Degenerate axes fall back to `1.0` so callers can divide by the result.
pub(crate) fn singular_values(m: Affine) -> [f64; 2] {
    let [a, b, c, d, _, _] = m.as_coeffs();
    let first = a * a + b * b;
    let second = a * c + b * d;
    let third = c * c + d * d;
    let mean = (first + third) / 2.0;
    let disc = (mean * mean - (first * third - second * second)).max(0.0).sqrt();
    let sx = (mean + disc).sqrt();
    let sy = (mean - disc).max(0.0).sqrt();
    [or_one(sx), or_one(sy)]
}

fn or_one(v: f64) -> f64 {
    if v.is_finite() && v != 0.0 { v } else { 1.0 }
}

/// Intersection of two rects, `None` when they do not overlap.
pub(crate) fn intersect(a: Rect, b: Rect) -> Option<Rect> {
    let r = a.intersect(b);
    if r.width() <= 0.0 || r.height() <= 0.0 {
        None
    } else {
        Some(r)
    }
}

/// Axis-aligned bounds of `r` after mapping through `m`.
pub(crate) fn transform_rect_bbox(m: Affine, r: Rect) -> Rect {
    m.transform_rect_bbox(r)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
