/// Convenience result type used across pagepaint.
pub type PaintResult<T> = Result<T, PaintError>;

/// Outcome reported when a host cancels a render.
///
/// Kept distinct from [`PaintError`] variants that describe genuine failures so hosts can tell
/// "I stopped this" apart from "this is broken".
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("rendering cancelled: {reason}")]
pub struct RenderCancelled {
    /// Host supplied reason.
    pub reason: String,
}

impl RenderCancelled {
    /// Build a cancellation with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A shared object was read before its producer resolved it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("object '{id}' is not resolved yet")]
pub struct NotResolved {
    /// Identifier that was looked up.
    pub id: String,
}

/// Top-level error taxonomy used by rendering APIs.
#[derive(thiserror::Error, Debug)]
pub enum PaintError {
    /// Invalid caller-provided data (viewport, surface size, options).
    #[error("validation error: {0}")]
    Validation(String),

    /// An operator-list entry with an unknown code or the wrong argument shape.
    #[error("malformed operator error: {0}")]
    Malformed(String),

    /// The raster backend rejected a paint.
    #[error("backend error: {0}")]
    Backend(String),

    /// A second render was attached to a surface that is still rendering.
    #[error("concurrent render error: {0}")]
    ConcurrentRender(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// A render finished with an error recorded by its task.
    #[error("render error: {0}")]
    Render(String),

    /// A shared object was not available yet.
    #[error(transparent)]
    NotResolved(#[from] NotResolved),

    /// The render was cancelled by the host.
    #[error(transparent)]
    Cancelled(#[from] RenderCancelled),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PaintError {
    /// Build a [`PaintError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PaintError::Malformed`] value.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Build a [`PaintError::Backend`] value.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Build a [`PaintError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`PaintError::ConcurrentRender`] value.
    pub fn concurrent_render(msg: impl Into<String>) -> Self {
        Self::ConcurrentRender(msg.into())
    }

    /// `true` when the error reports a host cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
