use crate::foundation::core::{Affine, Canvas, Point, Rect};
use crate::foundation::error::{PaintError, PaintResult};

/// Parameters used to build a [`Viewport`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ViewportOpts {
    /// Page box `[x0, y0, x1, y1]` in user units.
    pub view_box: [f64; 4],
    /// Output pixels per user unit.
    pub scale: f64,
    /// Clockwise rotation in degrees; must be a multiple of 90.
    pub rotation: i32,
    /// Horizontal offset in output pixels.
    pub offset_x: f64,
    /// Vertical offset in output pixels.
    pub offset_y: f64,
    /// Keep the user-space y axis pointing down.
    pub dont_flip: bool,
}

impl Default for ViewportOpts {
    fn default() -> Self {
        Self {
            view_box: [0.0, 0.0, 612.0, 792.0],
            scale: 1.0,
            rotation: 0,
            offset_x: 0.0,
            offset_y: 0.0,
            dont_flip: false,
        }
    }
}

impl ViewportOpts {
    /// Defaults for the given page box.
    pub fn new(view_box: [f64; 4]) -> Self {
        Self {
            view_box,
            ..Self::default()
        }
    }

    /// Set the scale.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the rotation in degrees.
    pub fn with_rotation(mut self, rotation: i32) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the output offset.
    pub fn with_offset(mut self, x: f64, y: f64) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    /// Keep user-space y pointing down.
    pub fn with_dont_flip(mut self, dont_flip: bool) -> Self {
        self.dont_flip = dont_flip;
        self
    }

    /// Build the viewport.
    pub fn build(self) -> PaintResult<Viewport> {
        Viewport::new(self)
    }
}

/// Mapping from page user space to output pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Parameters this viewport was built from.
    pub opts: ViewportOpts,
    /// User space to output pixels.
    pub transform: Affine,
    /// Output width in (fractional) pixels.
    pub width: f64,
    /// Output height in (fractional) pixels.
    pub height: f64,
}

impl Viewport {
    /// Build a viewport; fails for rotations that are not a multiple of 90 or a non-positive scale.
    pub fn new(opts: ViewportOpts) -> PaintResult<Self> {
        if !(opts.scale.is_finite() && opts.scale > 0.0) {
            return Err(PaintError::validation(format!(
                "viewport scale must be positive, got {}",
                opts.scale
            )));
        }
        let vb = opts.view_box;
        let scale = opts.scale;
        let center_x = (vb[2] + vb[0]) / 2.0;
        let center_y = (vb[3] + vb[1]) / 2.0;

        let (a, b, mut c, mut d) = match opts.rotation.rem_euclid(360) {
            0 => (1.0, 0.0, 0.0, -1.0),
            90 => (0.0, 1.0, 1.0, 0.0),
            180 => (-1.0, 0.0, 0.0, 1.0),
            270 => (0.0, -1.0, -1.0, 0.0),
            other => {
                return Err(PaintError::validation(format!(
                    "page rotation must be a multiple of 90 degrees, got {other}"
                )));
            }
        };
        if opts.dont_flip {
            c = -c;
            d = -d;
        }

        let (offset_canvas_x, offset_canvas_y, width, height) = if a == 0.0 {
            (
                (center_y - vb[1]).abs() * scale + opts.offset_x,
                (center_x - vb[0]).abs() * scale + opts.offset_y,
                (vb[3] - vb[1]).abs() * scale,
                (vb[2] - vb[0]).abs() * scale,
            )
        } else {
            (
                (center_x - vb[0]).abs() * scale + opts.offset_x,
                (center_y - vb[1]).abs() * scale + opts.offset_y,
                (vb[2] - vb[0]).abs() * scale,
                (vb[3] - vb[1]).abs() * scale,
            )
        };

        let transform = Affine::new([
            a * scale,
            b * scale,
            c * scale,
            d * scale,
            offset_canvas_x - a * scale * center_x - c * scale * center_y,
            offset_canvas_y - b * scale * center_x - d * scale * center_y,
        ]);
        Ok(Self {
            opts,
            transform,
            width,
            height,
        })
    }

    /// Pixel size of a surface that holds this viewport.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width.ceil().max(1.0) as u32,
            height: self.height.ceil().max(1.0) as u32,
        }
    }

    /// Same page with other scale/rotation/offset/flip parameters.
    pub fn clone_with(&self, f: impl FnOnce(ViewportOpts) -> ViewportOpts) -> PaintResult<Self> {
        Self::new(f(self.opts))
    }

    /// User space point to output pixels.
    pub fn to_viewport_point(&self, p: Point) -> Point {
        self.transform * p
    }

    /// Output pixels to user space; `None` for a degenerate transform.
    pub fn to_page_point(&self, p: Point) -> Option<Point> {
        if self.transform.determinant().abs() < f64::EPSILON {
            return None;
        }
        Some(self.transform.inverse() * p)
    }

    /// User-space rectangle to its output-pixel bounds.
    pub fn to_viewport_rect(&self, r: Rect) -> Rect {
        self.transform.transform_rect_bbox(r)
    }
}
