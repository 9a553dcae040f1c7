use crate::foundation::core::{Affine, Rect, lock};
use crate::foundation::error::PaintResult;
use crate::render::pool::{SharedPool, TaskId};
use crate::render::surface::HostSurface;

pub(crate) enum TargetPixels {
    Host(HostSurface),
    Pooled {
        purpose: String,
        pixmap: vello_cpu::Pixmap,
    },
}

/// One level of the target stack: the host surface or an offscreen group/mask/pattern buffer.
///
/// `to_page` maps target pixels to page device space; clips and paths are kept in page device
/// space and mapped through `from_page()` when painted.
pub(crate) struct RasterTarget {
    pub(crate) pixels: TargetPixels,
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) to_page: Affine,
}

impl RasterTarget {
    pub(crate) fn host(surface: HostSurface) -> PaintResult<Self> {
        let (width, height) = crate::foundation::core::Canvas {
            width: surface.width(),
            height: surface.height(),
        }
        .to_u16()?;
        Ok(Self {
            pixels: TargetPixels::Host(surface),
            width,
            height,
            to_page: Affine::IDENTITY,
        })
    }

    pub(crate) fn acquire(
        pool: &SharedPool,
        task: TaskId,
        purpose: impl Into<String>,
        width: u32,
        height: u32,
        to_page: Affine,
    ) -> PaintResult<Self> {
        let purpose = purpose.into();
        let pixmap = lock(pool).acquire(task, &purpose, width, height)?;
        Ok(Self {
            width: pixmap.width(),
            height: pixmap.height(),
            pixels: TargetPixels::Pooled { purpose, pixmap },
            to_page,
        })
    }

    pub(crate) fn from_page(&self) -> Affine {
        self.to_page.inverse()
    }

    /// Target rect in its own pixels.
    pub(crate) fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }

    pub(crate) fn is_host(&self) -> bool {
        matches!(self.pixels, TargetPixels::Host(_))
    }

    pub(crate) fn write<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        match &mut self.pixels {
            TargetPixels::Host(s) => s.with_pixels(|p| f(p.data_as_u8_slice_mut())),
            TargetPixels::Pooled { pixmap, .. } => f(pixmap.data_as_u8_slice_mut()),
        }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        match &self.pixels {
            TargetPixels::Host(s) => s.read_pixels(|p| f(p.data_as_u8_slice())),
            TargetPixels::Pooled { pixmap, .. } => f(pixmap.data_as_u8_slice()),
        }
    }

    /// Hand the pixels back to the pool; the host surface is left alone.
    pub(crate) fn release(self, pool: &SharedPool, task: TaskId) {
        if let TargetPixels::Pooled { purpose, pixmap } = self.pixels {
            lock(pool).release(task, &purpose, pixmap);
        }
    }

    /// Take the pooled pixmap out of the target.
    pub(crate) fn into_pooled(self) -> Option<(String, vello_cpu::Pixmap)> {
        match self.pixels {
            TargetPixels::Pooled { purpose, pixmap } => Some((purpose, pixmap)),
            TargetPixels::Host(_) => None,
        }
    }
}
