use std::collections::BTreeMap;
use std::sync::Arc;

use crate::content::OcDescriptor;
use crate::foundation::core::{Affine, Rect};
use crate::foundation::error::{PaintError, PaintResult};
use crate::objects::{ImageData, MaskData, TextItem};
use crate::oplist::OpCode;
use crate::pattern::PatternRef;
use crate::render::image::TransferMaps;

/// One operator argument.
///
/// Plain JSON values map onto the scalar variants; the structured variants are recognised by
/// their single key (`{"glyphs": [...]}`, `{"image": {...}}`, ...).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Arg {
    /// Absent/`null` argument.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Number.
    Num(f64),
    /// Name or object identifier.
    Name(String),
    /// Nested list (matrices, dash arrays, path segments, dependency ids).
    Array(Vec<Arg>),
    /// Text-showing run.
    Glyphs {
        /// Glyphs and spacing adjustments.
        glyphs: Vec<TextItem>,
    },
    /// Inline image.
    Image {
        /// Decoded pixels.
        image: Arc<ImageData>,
    },
    /// 1-bit stencil mask.
    Mask {
        /// Mask bits.
        mask: Arc<MaskData>,
    },
    /// Several stencil masks painted with their own transforms.
    Masks {
        /// Masks in paint order.
        masks: Vec<Arc<MaskData>>,
    },
    /// Transparency group description.
    Group {
        /// Group parameters.
        group: GroupInfo,
    },
    /// Pattern selection for `setFillColorN`/`setStrokeColorN`.
    Pattern {
        /// Referenced pattern.
        pattern: PatternRef,
    },
    /// Optional-content properties for `beginMarkedContentProps`.
    OptionalContent {
        /// Visibility descriptor.
        optional_content: OcDescriptor,
    },
    /// Transfer functions for the `TR` graphics-state key.
    Transfer {
        /// Per-channel lookup tables.
        transfer: Arc<TransferMaps>,
    },
    /// Any other dictionary.
    Dict(BTreeMap<String, Arg>),
}

impl Arg {
    /// Numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Num(v) => Some(*v),
            _ => None,
        }
    }

    /// String value, if this is a name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Elements, if this is an array.
    pub fn as_array(&self) -> Option<&[Arg]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// `true` for `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Self::Num(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Self::Name(v.to_owned())
    }
}

impl From<Vec<f64>> for Arg {
    fn from(v: Vec<f64>) -> Self {
        Self::Array(v.into_iter().map(Self::Num).collect())
    }
}

/// Soft-mask subtype of a transparency group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SmaskSubtype {
    /// Mask alpha drives coverage.
    #[default]
    Alpha,
    /// Mask luminosity drives coverage.
    Luminosity,
}

/// Soft-mask parameters carried by a group that renders a mask.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SmaskInfo {
    /// How the mask is read.
    pub subtype: SmaskSubtype,
    /// Color composited under transparent mask pixels.
    pub backdrop: Option<[u8; 3]>,
    /// 256-entry remap applied to the mask value.
    pub transfer_map: Option<Vec<u8>>,
}

/// Transparency-group parameters for `beginGroup`/`endGroup`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GroupInfo {
    /// Group bounds in group space.
    pub bbox: [f64; 4],
    /// Group matrix.
    #[serde(default)]
    pub matrix: Option<[f64; 6]>,
    /// Isolated groups start from a transparent backdrop.
    #[serde(default = "default_true")]
    pub isolated: bool,
    /// Knockout groups (rendered as non-knockout).
    #[serde(default)]
    pub knockout: bool,
    /// Present when the group renders a soft mask.
    #[serde(default)]
    pub smask: Option<SmaskInfo>,
}

fn default_true() -> bool {
    true
}

/// Typed access to an operator's arguments that reports shape mismatches as malformed entries.
pub(crate) struct ArgReader<'a> {
    op: OpCode,
    args: &'a [Arg],
}

impl<'a> ArgReader<'a> {
    pub(crate) fn new(op: OpCode, args: &'a [Arg]) -> Self {
        Self { op, args }
    }

    fn bad(&self, i: usize, want: &str) -> PaintError {
        PaintError::malformed(format!("{}: expected {want} at argument {i}", self.op))
    }

    pub(crate) fn get(&self, i: usize) -> Option<&'a Arg> {
        self.args.get(i)
    }

    pub(crate) fn num(&self, i: usize) -> PaintResult<f64> {
        self.args
            .get(i)
            .and_then(Arg::as_f64)
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.bad(i, "number"))
    }

    pub(crate) fn num_or(&self, i: usize, default: f64) -> PaintResult<f64> {
        match self.args.get(i) {
            None | Some(Arg::Null) => Ok(default),
            Some(_) => self.num(i),
        }
    }

    pub(crate) fn nums<const N: usize>(&self, start: usize) -> PaintResult<[f64; N]> {
        let mut out = [0.0; N];
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = self.num(start + k)?;
        }
        Ok(out)
    }

    /// Every argument as a number.
    pub(crate) fn nums_vec(&self) -> PaintResult<Vec<f64>> {
        (0..self.args.len()).map(|i| self.num(i)).collect()
    }

    pub(crate) fn name(&self, i: usize) -> PaintResult<&'a str> {
        self.args
            .get(i)
            .and_then(Arg::as_name)
            .ok_or_else(|| self.bad(i, "name"))
    }

    pub(crate) fn array(&self, i: usize) -> PaintResult<&'a [Arg]> {
        self.args
            .get(i)
            .and_then(Arg::as_array)
            .ok_or_else(|| self.bad(i, "array"))
    }

    pub(crate) fn num_array(&self, i: usize) -> PaintResult<Vec<f64>> {
        self.array(i)?
            .iter()
            .map(|a| a.as_f64().ok_or_else(|| self.bad(i, "array of numbers")))
            .collect()
    }

    /// Six numbers starting at `start`, or a six-element array at `start`.
    pub(crate) fn matrix(&self, start: usize) -> PaintResult<Affine> {
        if let Some(Arg::Array(items)) = self.args.get(start) {
            return matrix_from_args(items).ok_or_else(|| self.bad(start, "matrix"));
        }
        Ok(Affine::new(self.nums::<6>(start)?))
    }

    pub(crate) fn opt_matrix(&self, i: usize) -> PaintResult<Option<Affine>> {
        match self.args.get(i) {
            None | Some(Arg::Null) => Ok(None),
            Some(Arg::Array(items)) => matrix_from_args(items)
                .map(Some)
                .ok_or_else(|| self.bad(i, "matrix")),
            Some(_) => Err(self.bad(i, "matrix")),
        }
    }

    /// `[x0, y0, x1, y1]` array, normalized.
    pub(crate) fn opt_rect(&self, i: usize) -> PaintResult<Option<Rect>> {
        match self.args.get(i) {
            None | Some(Arg::Null) => Ok(None),
            Some(Arg::Array(items)) if items.len() == 4 => {
                let mut v = [0.0; 4];
                for (slot, a) in v.iter_mut().zip(items) {
                    *slot = a.as_f64().ok_or_else(|| self.bad(i, "rectangle"))?;
                }
                Ok(Some(Rect::new(v[0], v[1], v[2], v[3]).abs()))
            }
            Some(_) => Err(self.bad(i, "rectangle")),
        }
    }

    pub(crate) fn glyphs(&self, i: usize) -> PaintResult<&'a [TextItem]> {
        match self.args.get(i) {
            Some(Arg::Glyphs { glyphs }) => Ok(glyphs),
            _ => Err(self.bad(i, "glyph run")),
        }
    }

    pub(crate) fn image(&self, i: usize) -> PaintResult<&'a Arc<ImageData>> {
        match self.args.get(i) {
            Some(Arg::Image { image }) => Ok(image),
            _ => Err(self.bad(i, "image")),
        }
    }

    pub(crate) fn mask(&self, i: usize) -> PaintResult<&'a Arc<MaskData>> {
        match self.args.get(i) {
            Some(Arg::Mask { mask }) => Ok(mask),
            _ => Err(self.bad(i, "image mask")),
        }
    }

    pub(crate) fn masks(&self, i: usize) -> PaintResult<&'a [Arc<MaskData>]> {
        match self.args.get(i) {
            Some(Arg::Masks { masks }) => Ok(masks),
            _ => Err(self.bad(i, "image mask list")),
        }
    }

    pub(crate) fn group(&self, i: usize) -> PaintResult<&'a GroupInfo> {
        match self.args.get(i) {
            Some(Arg::Group { group }) => Ok(group),
            _ => Err(self.bad(i, "group")),
        }
    }
}

pub(crate) fn matrix_from_args(items: &[Arg]) -> Option<Affine> {
    if items.len() != 6 {
        return None;
    }
    let mut m = [0.0; 6];
    for (slot, a) in m.iter_mut().zip(items) {
        *slot = a.as_f64()?;
    }
    Some(Affine::new(m))
}

#[cfg(test)]
#[path = "../../tests/unit/oplist/args.rs"]
mod tests;
