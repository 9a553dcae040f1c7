use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::foundation::core::{Canvas, Rgba8Premul, lock};
use crate::foundation::error::{PaintError, PaintResult};

struct SurfaceInner {
    width: u16,
    height: u16,
    pixels: Mutex<vello_cpu::Pixmap>,
    busy: AtomicBool,
    writes: AtomicU64,
}

/// Pixel surface owned by the host; render tasks paint into it.
///
/// Cloning shares the same pixels. At most one render task may be attached at a time.
#[derive(Clone)]
pub struct HostSurface {
    inner: Arc<SurfaceInner>,
}

impl std::fmt::Debug for HostSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSurface")
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("busy", &self.is_busy())
            .finish()
    }
}

impl HostSurface {
    /// Transparent surface of the given size.
    pub fn new(width: u32, height: u32) -> PaintResult<Self> {
        if width == 0 || height == 0 {
            return Err(PaintError::validation("surface width/height must be > 0"));
        }
        let (w, h) = Canvas { width, height }.to_u16()?;
        Ok(Self {
            inner: Arc::new(SurfaceInner {
                width: w,
                height: h,
                pixels: Mutex::new(vello_cpu::Pixmap::new(w, h)),
                busy: AtomicBool::new(false),
                writes: AtomicU64::new(0),
            }),
        })
    }

    /// Surface sized for a canvas.
    pub fn for_canvas(canvas: Canvas) -> PaintResult<Self> {
        Self::new(canvas.width, canvas.height)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        u32::from(self.inner.width)
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        u32::from(self.inner.height)
    }

    /// `true` while a render task is attached.
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Number of times a render wrote pixels into this surface.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::Acquire)
    }

    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8Premul> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let pixels = lock(&self.inner.pixels);
        let idx = (y as usize * self.width() as usize + x as usize) * 4;
        let px = pixels.data_as_u8_slice().get(idx..idx + 4)?;
        Some(Rgba8Premul {
            r: px[0],
            g: px[1],
            b: px[2],
            a: px[3],
        })
    }

    /// Copy of the premultiplied RGBA8 pixels.
    pub fn snapshot(&self) -> Vec<u8> {
        lock(&self.inner.pixels).data_as_u8_slice().to_vec()
    }

    /// Copy of the pixels converted to straight alpha (PNG ready).
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        let mut out = self.snapshot();
        for px in out.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            if a == 0 || a == 255 {
                continue;
            }
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        out
    }

    /// Mark the surface as rendering; fails if another task already holds it.
    pub(crate) fn try_claim(&self) -> PaintResult<SurfaceClaim> {
        if self
            .inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PaintError::concurrent_render(
                "cannot use the same surface during multiple render operations; \
                 wait for the previous render to complete or cancel it",
            ));
        }
        Ok(SurfaceClaim {
            surface: self.clone(),
        })
    }

    /// Mutate the pixels; counts as one write.
    pub(crate) fn with_pixels<R>(&self, f: impl FnOnce(&mut vello_cpu::Pixmap) -> R) -> R {
        let mut pixels = lock(&self.inner.pixels);
        self.inner.writes.fetch_add(1, Ordering::AcqRel);
        f(&mut pixels)
    }

    /// Read the pixels without counting a write.
    pub(crate) fn read_pixels<R>(&self, f: impl FnOnce(&vello_cpu::Pixmap) -> R) -> R {
        f(&lock(&self.inner.pixels))
    }
}

/// Exclusive use of a [`HostSurface`]; dropping it frees the surface for the next render.
pub(crate) struct SurfaceClaim {
    surface: HostSurface,
}

impl SurfaceClaim {
    pub(crate) fn surface(&self) -> &HostSurface {
        &self.surface
    }
}

impl Drop for SurfaceClaim {
    fn drop(&mut self) {
        self.surface.inner.busy.store(false, Ordering::Release);
    }
}
