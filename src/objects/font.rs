use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::foundation::core::{Affine, BezPath, Point};
use crate::oplist::OperatorList;

/// One drawing command of a compiled glyph outline, in glyph units (y up).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum GlyphCmd {
    /// Push the current outline transform.
    Save,
    /// Pop the outline transform.
    Restore,
    /// Concatenate a matrix onto the outline transform.
    Transform {
        /// Matrix coefficients.
        m: [f64; 6],
    },
    /// Start a subpath.
    MoveTo {
        /// X.
        x: f64,
        /// Y.
        y: f64,
    },
    /// Straight segment.
    LineTo {
        /// X.
        x: f64,
        /// Y.
        y: f64,
    },
    /// Quadratic segment.
    QuadTo {
        /// Control x.
        x1: f64,
        /// Control y.
        y1: f64,
        /// End x.
        x: f64,
        /// End y.
        y: f64,
    },
    /// Cubic segment.
    CurveTo {
        /// First control x.
        x1: f64,
        /// First control y.
        y1: f64,
        /// Second control x.
        x2: f64,
        /// Second control y.
        y2: f64,
        /// End x.
        x: f64,
        /// End y.
        y: f64,
    },
    /// Close the current subpath.
    ClosePath,
}

/// Compiled outline of one glyph, used when the font cannot be rasterized natively.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GlyphProgram {
    /// Commands in execution order.
    pub cmds: Vec<GlyphCmd>,
}

impl GlyphProgram {
    /// Interpret the program into a path in glyph units.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let mut tr = Affine::IDENTITY;
        let mut stack: Vec<Affine> = Vec::new();
        for cmd in &self.cmds {
            match *cmd {
                GlyphCmd::Save => stack.push(tr),
                GlyphCmd::Restore => tr = stack.pop().unwrap_or(Affine::IDENTITY),
                GlyphCmd::Transform { m } => tr *= Affine::new(m),
                GlyphCmd::MoveTo { x, y } => path.move_to(tr * Point::new(x, y)),
                GlyphCmd::LineTo { x, y } => path.line_to(tr * Point::new(x, y)),
                GlyphCmd::QuadTo { x1, y1, x, y } => {
                    path.quad_to(tr * Point::new(x1, y1), tr * Point::new(x, y));
                }
                GlyphCmd::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => path.curve_to(
                    tr * Point::new(x1, y1),
                    tr * Point::new(x2, y2),
                    tr * Point::new(x, y),
                ),
                GlyphCmd::ClosePath => path.close_path(),
            }
        }
        path
    }
}

/// A positioned glyph inside a text-showing run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Glyph {
    /// Glyph id in the font program.
    pub id: u32,
    /// Key into [`FontObject::char_procs`] for Type-3 fonts.
    #[serde(default)]
    pub operator_list_id: Option<String>,
    /// Advance width in glyph units (thousandths of the font size for most fonts).
    pub width: f64,
    /// Word spacing applies to this glyph.
    #[serde(default)]
    pub is_space: bool,
    /// Vertical metrics `[w1y, vx, vy]` for vertical writing.
    #[serde(default)]
    pub vmetric: Option<[f64; 3]>,
    /// `false` when the glyph is missing from the font and nothing should be drawn.
    #[serde(default = "default_true")]
    pub is_in_font: bool,
}

fn default_true() -> bool {
    true
}

/// Element of a `showText` run: a glyph or a spacing adjustment in thousandths of an em.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum TextItem {
    /// Horizontal (or vertical) position adjustment.
    Adjust(f64),
    /// Glyph to paint.
    Glyph(Glyph),
}

fn default_font_matrix() -> [f64; 6] {
    [0.001, 0.0, 0.0, 0.001, 0.0, 0.0]
}

/// Font descriptor shared across the document.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct FontObject {
    /// Font name, for diagnostics.
    pub name: String,
    /// Font program bytes (TrueType/OpenType) usable by the native glyph path.
    #[serde(default)]
    pub data: Option<Arc<Vec<u8>>>,
    /// Glyph space to text space.
    #[serde(default = "default_font_matrix")]
    pub font_matrix: [f64; 6],
    /// Vertical writing mode.
    #[serde(default)]
    pub vertical: bool,
    /// Fallback vertical metrics.
    #[serde(default)]
    pub default_vmetrics: Option<[f64; 3]>,
    /// Font file could not be loaded; glyphs fall back to outlines only.
    #[serde(default)]
    pub missing_file: bool,
    /// Type-3 glyph procedures.
    #[serde(default)]
    pub char_procs: HashMap<String, Arc<OperatorList>>,
    /// Compiled outlines keyed by glyph id.
    #[serde(default)]
    pub outlines: HashMap<u32, Arc<GlyphProgram>>,
    #[serde(skip)]
    native: OnceLock<Option<vello_cpu::peniko::FontData>>,
}

impl std::fmt::Debug for FontObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontObject")
            .field("name", &self.name)
            .field("has_data", &self.data.is_some())
            .field("vertical", &self.vertical)
            .field("char_procs", &self.char_procs.len())
            .field("outlines", &self.outlines.len())
            .finish_non_exhaustive()
    }
}

impl Default for FontObject {
    fn default() -> Self {
        Self::new("")
    }
}

impl FontObject {
    /// Font with no program data, outlines or glyph procedures yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
            font_matrix: default_font_matrix(),
            vertical: false,
            default_vmetrics: None,
            missing_file: false,
            char_procs: HashMap::new(),
            outlines: HashMap::new(),
            native: OnceLock::new(),
        }
    }

    /// Attach font program bytes for native glyph rendering.
    pub fn with_data(mut self, bytes: Vec<u8>) -> Self {
        self.data = Some(Arc::new(bytes));
        self
    }

    /// Add a compiled outline for glyph `id`.
    pub fn with_outline(mut self, id: u32, program: GlyphProgram) -> Self {
        self.outlines.insert(id, Arc::new(program));
        self
    }

    /// Add a Type-3 glyph procedure.
    pub fn with_char_proc(mut self, key: impl Into<String>, list: OperatorList) -> Self {
        self.char_procs.insert(key.into(), Arc::new(list));
        self
    }

    /// Override the glyph-space matrix.
    pub fn with_font_matrix(mut self, m: [f64; 6]) -> Self {
        self.font_matrix = m;
        self
    }

    /// Font whose glyphs are mini operator lists.
    pub fn is_type3(&self) -> bool {
        !self.char_procs.is_empty()
    }

    /// Glyph-space to text-space matrix.
    pub fn matrix(&self) -> Affine {
        Affine::new(self.font_matrix)
    }

    pub(crate) fn native(&self) -> Option<&vello_cpu::peniko::FontData> {
        self.native
            .get_or_init(|| {
                if self.missing_file {
                    return None;
                }
                self.data.as_ref().map(|bytes| {
                    vello_cpu::peniko::FontData::new(
                        vello_cpu::peniko::Blob::from(bytes.as_ref().clone()),
                        0,
                    )
                })
            })
            .as_ref()
    }
}
