//! pagepaint rasterizes document pages from a streamed operator list.
//!
//! The public API is session-oriented:
//!
//! - Create a [`DocumentSession`] and a [`PageContext`] per page
//! - Resolve fonts, images and shadings into the shared [`ObjectCache`]s
//! - Start a [`RenderTask`] against a [`HostSurface`] and drive it with a [`Scheduler`]
//!
//! Operator lists may keep growing while a render is in flight; the task picks up new chunks
//! on its next continuation and blocks on dependencies that have not been resolved yet.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Optional content (layers) and marked-content visibility.
pub mod content;
/// Graphics state and the operator-list execution engine.
pub mod engine;
/// Shared object cache and the objects it stores.
pub mod objects;
/// Operator codes, arguments and append-only operator lists.
pub mod oplist;
/// Shading and tiling pattern descriptions.
pub mod pattern;
/// Raster targets, pooling and pixel kernels.
pub mod render;
/// JSON page scripts used by the CLI and by fixtures.
pub mod script;
/// Document sessions, render tasks and scheduling.
pub mod task;
/// Page viewport geometry.
pub mod viewport;

pub use crate::foundation::core::{Affine, BezPath, Canvas, Point, Rect, Rgba8, Rgba8Premul};
pub use crate::foundation::error::{NotResolved, PaintError, PaintResult, RenderCancelled};

pub use crate::content::{OcDescriptor, OptionalContentConfig, VisibilityExpr};
pub use crate::engine::{EngineOpts, EnginePhase, ExecOutcome, GraphicsEngine};
pub use crate::objects::{
    FontObject, Glyph, GlyphCmd, GlyphProgram, ImageData, ImageKind, MaskData, ObjectCache,
    ObjectScopes, SharedObject, TextItem,
};
pub use crate::oplist::{Arg, GroupInfo, OpCode, OperatorList, OperatorListChunk, OperatorListStream};
pub use crate::pattern::{
    AxialRadialIr, ColorStopIr, FigureKind, GradientKind, MeshFigure, MeshIr, PatternRef, ShadingIr,
    TilingIr, TilingPaintType,
};
pub use crate::render::image::TransferMaps;
pub use crate::render::pool::{PoolOpts, PoolStats, TaskId};
pub use crate::render::surface::HostSurface;
pub use crate::script::PageScript;
pub use crate::task::render_task::{RenderCompletion, RenderHandle, RenderTask, StepOutcome};
pub use crate::task::scheduler::{
    Continuation, FrameScheduler, ImmediateScheduler, Scheduler, scheduler_for,
};
pub use crate::task::session::{DocumentSession, Intent, PageContext, RenderParams, SessionOpts};
pub use crate::viewport::{Viewport, ViewportOpts};
