use std::sync::Arc;

use smallvec::SmallVec;

use crate::foundation::core::{Affine, Rgba8};
use crate::objects::FontObject;
use crate::oplist::SmaskInfo;
use crate::pattern::PatternRef;
use crate::render::composite::BlendMode;
use crate::render::image::TransferMaps;
use crate::render::raster::{ClipPath, StrokeStyle};

pub(crate) const TEXT_FILL: u8 = 0;
pub(crate) const TEXT_STROKE: u8 = 1;
pub(crate) const TEXT_FILL_STROKE: u8 = 2;
pub(crate) const TEXT_INVISIBLE: u8 = 3;
pub(crate) const TEXT_FILL_STROKE_MASK: u8 = 3;
pub(crate) const TEXT_ADD_TO_PATH: u8 = 4;

/// Fill or stroke paint: a solid color, optionally overridden by a pattern.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PaintStyle {
    pub(crate) color: Rgba8,
    pub(crate) pattern: Option<PatternRef>,
}

impl Default for PaintStyle {
    fn default() -> Self {
        Self {
            color: Rgba8::BLACK,
            pattern: None,
        }
    }
}

impl PaintStyle {
    pub(crate) fn solid(color: Rgba8) -> Self {
        Self {
            color,
            pattern: None,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct TextState {
    pub(crate) font: Option<Arc<FontObject>>,
    pub(crate) font_size: f64,
    pub(crate) font_direction: f64,
    pub(crate) font_matrix: Affine,
    pub(crate) text_matrix: Affine,
    pub(crate) line_matrix: Affine,
    pub(crate) text_matrix_scale: f64,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) line_x: f64,
    pub(crate) line_y: f64,
    pub(crate) char_spacing: f64,
    pub(crate) word_spacing: f64,
    pub(crate) hscale: f64,
    pub(crate) leading: f64,
    pub(crate) rise: f64,
    pub(crate) render_mode: u8,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 0.0,
            font_direction: 1.0,
            font_matrix: Affine::new([0.001, 0.0, 0.0, 0.001, 0.0, 0.0]),
            text_matrix: Affine::IDENTITY,
            line_matrix: Affine::IDENTITY,
            text_matrix_scale: 1.0,
            x: 0.0,
            y: 0.0,
            line_x: 0.0,
            line_y: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            hscale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: TEXT_FILL,
        }
    }
}

impl PartialEq for TextState {
    fn eq(&self, other: &Self) -> bool {
        let same_font = match (&self.font, &other.font) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_font
            && self.font_size == other.font_size
            && self.font_direction == other.font_direction
            && self.font_matrix == other.font_matrix
            && self.text_matrix == other.text_matrix
            && self.line_matrix == other.line_matrix
            && self.text_matrix_scale == other.text_matrix_scale
            && self.x == other.x
            && self.y == other.y
            && self.line_x == other.line_x
            && self.line_y == other.line_y
            && self.char_spacing == other.char_spacing
            && self.word_spacing == other.word_spacing
            && self.hscale == other.hscale
            && self.leading == other.leading
            && self.rise == other.rise
            && self.render_mode == other.render_mode
    }
}

/// Everything `save` copies and `restore` brings back.
///
/// The value is cloned whole on `save`; clips and paint objects are `Arc`ed so the copy stays
/// cheap.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct GraphicsState {
    /// User space to page device space.
    pub(crate) ctm: Affine,
    pub(crate) fill: PaintStyle,
    pub(crate) stroke: PaintStyle,
    pub(crate) fill_alpha: f32,
    pub(crate) stroke_alpha: f32,
    pub(crate) line_width: f64,
    pub(crate) line_cap: u8,
    pub(crate) line_join: u8,
    pub(crate) miter_limit: f64,
    pub(crate) dash: Option<(Vec<f64>, f64)>,
    pub(crate) blend: BlendMode,
    pub(crate) transfer: Option<Arc<TransferMaps>>,
    /// Intersected clip regions, page device space.
    pub(crate) clips: SmallVec<[Arc<ClipPath>; 4]>,
    /// Soft mask in effect, by arena id.
    pub(crate) active_smask: Option<u64>,
    /// Suspended soft mask to bring back when this state is restored.
    pub(crate) resume_smask: Option<u64>,
    pub(crate) text: TextState,
}

impl GraphicsState {
    pub(crate) fn new(ctm: Affine) -> Self {
        Self {
            ctm,
            fill: PaintStyle::default(),
            stroke: PaintStyle::default(),
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            line_cap: 0,
            line_join: 0,
            miter_limit: 10.0,
            dash: None,
            blend: BlendMode::Normal,
            transfer: None,
            clips: SmallVec::new(),
            active_smask: None,
            resume_smask: None,
            text: TextState::default(),
        }
    }

    pub(crate) fn stroke_style(&self, width: f64) -> StrokeStyle {
        StrokeStyle {
            width,
            cap: self.line_cap,
            join: self.line_join,
            miter_limit: self.miter_limit,
            dash: self.dash.clone(),
        }
    }
}

/// A rendered soft mask waiting to be applied, and where it sits in page device space.
pub(crate) struct SmaskEntry {
    pub(crate) mask: vello_cpu::Pixmap,
    pub(crate) purpose: String,
    pub(crate) to_page: Affine,
    pub(crate) info: SmaskInfo,
}
