use std::sync::Arc;

use crate::foundation::core::Rgba8;
use crate::oplist::OperatorList;

pub(crate) mod axial;
pub(crate) mod mesh;
pub(crate) mod tiling;

/// Axial or radial gradient geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientKind {
    /// Linear gradient from `p0` to `p1`.
    Axial,
    /// Two-point conical gradient between circles `(p0, r0)` and `(p1, r1)`.
    Radial,
}

/// One color stop of a gradient ramp.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorStopIr {
    /// Position in `[0, 1]`.
    pub offset: f64,
    /// Stop color.
    pub color: Rgba8,
}

/// Gradient shading in shading space.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AxialRadialIr {
    /// Axial or radial.
    pub kind: GradientKind,
    /// Optional clip box in shading space.
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
    /// Stops with non-decreasing offsets.
    pub stops: Vec<ColorStopIr>,
    /// Start point (or start circle center).
    pub p0: [f64; 2],
    /// End point (or end circle center).
    pub p1: [f64; 2],
    /// Start radius.
    #[serde(default)]
    pub r0: f64,
    /// End radius.
    #[serde(default)]
    pub r1: f64,
}

/// How a mesh figure lists its vertices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FigureKind {
    /// Independent triangles, three vertices each.
    Triangles,
    /// Grid of `vertices_per_row` columns, two triangles per cell.
    Lattice,
}

/// A group of mesh triangles.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeshFigure {
    /// Vertex layout.
    pub kind: FigureKind,
    /// Indices into [`MeshIr::coords`].
    pub coords: Vec<u32>,
    /// Indices into [`MeshIr::colors`].
    pub colors: Vec<u32>,
    /// Row width for lattice figures.
    #[serde(default)]
    pub vertices_per_row: u32,
}

/// Gouraud-shaded triangle mesh.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeshIr {
    /// Vertex positions in shading space.
    pub coords: Vec<[f64; 2]>,
    /// Vertex colors.
    pub colors: Vec<[u8; 3]>,
    /// Triangle groups.
    pub figures: Vec<MeshFigure>,
    /// Bounds of all vertices `[x0, y0, x1, y1]`.
    pub bounds: [f64; 4],
    /// Optional clip box in shading space.
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
    /// Color filled behind the mesh when used as a pattern.
    #[serde(default)]
    pub background: Option<[u8; 3]>,
}

/// Shading description stored in the object cache.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ShadingIr {
    /// Axial or radial gradient.
    RadialAxial(AxialRadialIr),
    /// Triangle mesh.
    Mesh(MeshIr),
    /// Unsupported shading; paints nothing.
    Dummy,
}

/// Whether a tiling cell carries its own colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TilingPaintType {
    /// The cell sets its own colors.
    Colored,
    /// The cell is a stencil painted with [`TilingIr::color`].
    Uncolored,
}

/// Tiling pattern: an operator list painted once per cell.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TilingIr {
    /// Paint color of uncolored patterns.
    #[serde(default)]
    pub color: Option<Rgba8>,
    /// Cell content.
    pub operator_list: Arc<OperatorList>,
    /// Pattern space to default space.
    #[serde(default)]
    pub matrix: Option<[f64; 6]>,
    /// Cell bounds in pattern space.
    pub bbox: [f64; 4],
    /// Horizontal cell spacing.
    pub xstep: f64,
    /// Vertical cell spacing.
    pub ystep: f64,
    /// Colored or uncolored.
    pub paint_type: TilingPaintType,
    /// Spacing adjustment hint (1-3); cells are always placed at exact steps.
    #[serde(default = "default_tiling_type")]
    pub tiling_type: u8,
}

fn default_tiling_type() -> u8 {
    1
}

/// Pattern selected as fill or stroke paint.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternRef {
    /// Shading pattern resolved through the object cache.
    Shading {
        /// Shading object id.
        id: String,
        /// Pattern matrix.
        #[serde(default)]
        matrix: Option<[f64; 6]>,
    },
    /// Tiling pattern carried inline.
    Tiling(Arc<TilingIr>),
}

impl PartialEq for PatternRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Shading { id: a, matrix: ma },
                Self::Shading { id: b, matrix: mb },
            ) => a == b && ma == mb,
            (Self::Tiling(a), Self::Tiling(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
