//! CPU raster layer: the host surface, pooled offscreen targets, pixel kernels and the
//! vello_cpu glue the engine paints through.

pub(crate) mod composite;
/// Image unpacking and transfer functions.
pub mod image;
/// Reusable offscreen raster targets.
pub mod pool;
pub(crate) mod raster;
/// Host-owned pixel surfaces.
pub mod surface;
pub(crate) mod target;

pub use composite::BlendMode;
