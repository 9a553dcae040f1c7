use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::foundation::error::{PaintError, PaintResult};

/// Pool configuration for cached raster targets.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PoolOpts {
    /// Maximum bytes retained across all purposes.
    pub max_pool_bytes: usize,
    /// Maximum number of retained targets per purpose.
    pub max_per_purpose: usize,
}

impl Default for PoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 256 * 1024 * 1024,
            max_per_purpose: 8,
        }
    }
}

impl PoolOpts {
    /// Set the retained byte cap.
    pub fn with_max_pool_bytes(mut self, bytes: usize) -> Self {
        self.max_pool_bytes = bytes;
        self
    }

    /// Set the per-purpose cap.
    pub fn with_max_per_purpose(mut self, n: usize) -> Self {
        self.max_per_purpose = n;
        self
    }
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Targets currently retained for reuse.
    pub retained_targets: usize,
    /// Bytes currently retained for reuse.
    pub retained_bytes: usize,
    /// Fresh allocations made.
    pub alloc_targets: u64,
    /// Bytes of fresh allocations.
    pub alloc_bytes: u64,
    /// Acquisitions served from retained targets.
    pub reused_targets: u64,
    /// Releases that were dropped because a cap was hit.
    pub dropped_on_release: u64,
}

/// Identifies the render task that owns acquired targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(4)
}

/// Reusable off-screen pixmaps keyed by purpose (`"groupAt0"`, `"pattern"`, `"maskCanvas"`, ...).
///
/// A purpose may hold several targets; acquiring resizes and clears whichever one is popped.
/// Every acquisition is charged to a [`TaskId`] until it is released.
pub struct RasterTargetPool {
    opts: PoolOpts,
    stats: PoolStats,

    // Op-level lookups only, never per pixel.
    buckets: HashMap<String, Vec<vello_cpu::Pixmap>>,
    outstanding: HashMap<TaskId, usize>,
}

/// Pool shared by every task of a document.
pub(crate) type SharedPool = Arc<Mutex<RasterTargetPool>>;

impl RasterTargetPool {
    pub(crate) fn new(opts: PoolOpts) -> Self {
        Self {
            opts,
            stats: PoolStats::default(),
            buckets: HashMap::new(),
            outstanding: HashMap::new(),
        }
    }

    pub(crate) fn shared(opts: PoolOpts) -> SharedPool {
        Arc::new(Mutex::new(Self::new(opts)))
    }

    pub(crate) fn stats(&self) -> PoolStats {
        self.stats.clone()
    }

    /// Targets acquired by `task` and not yet released.
    pub(crate) fn outstanding(&self, task: TaskId) -> usize {
        self.outstanding.get(&task).copied().unwrap_or(0)
    }

    pub(crate) fn acquire(
        &mut self,
        task: TaskId,
        purpose: &str,
        width: u32,
        height: u32,
    ) -> PaintResult<vello_cpu::Pixmap> {
        let w: u16 = width
            .max(1)
            .try_into()
            .map_err(|_| PaintError::backend(format!("target width exceeds u16: {width}")))?;
        let h: u16 = height
            .max(1)
            .try_into()
            .map_err(|_| PaintError::backend(format!("target height exceeds u16: {height}")))?;

        *self.outstanding.entry(task).or_insert(0) += 1;

        if let Some(mut p) = self.buckets.get_mut(purpose).and_then(Vec::pop) {
            let old = byte_len(u32::from(p.width()), u32::from(p.height()));
            self.stats.retained_targets = self.stats.retained_targets.saturating_sub(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(old);
            self.stats.reused_targets = self.stats.reused_targets.saturating_add(1);
            if p.width() != w || p.height() != h {
                p.resize(w, h);
            }
            p.data_as_u8_slice_mut().fill(0);
            return Ok(p);
        }

        self.stats.alloc_targets = self.stats.alloc_targets.saturating_add(1);
        self.stats.alloc_bytes = self
            .stats
            .alloc_bytes
            .saturating_add(byte_len(u32::from(w), u32::from(h)) as u64);
        Ok(vello_cpu::Pixmap::new(w, h))
    }

    pub(crate) fn release(&mut self, task: TaskId, purpose: &str, pixmap: vello_cpu::Pixmap) {
        self.forget(task);

        if self.opts.max_pool_bytes == 0 || self.opts.max_per_purpose == 0 {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bytes = byte_len(u32::from(pixmap.width()), u32::from(pixmap.height()));
        if self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bucket = self.buckets.entry(purpose.to_owned()).or_default();
        if bucket.len() >= self.opts.max_per_purpose {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        bucket.push(pixmap);
        self.stats.retained_targets = self.stats.retained_targets.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }

    /// Stop charging one target to `task` without returning its pixels.
    pub(crate) fn forget(&mut self, task: TaskId) {
        if let Some(n) = self.outstanding.get_mut(&task) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.outstanding.remove(&task);
            }
        }
    }

    /// Drop every retained target.
    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
        self.stats.retained_targets = 0;
        self.stats.retained_bytes = 0;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/pool.rs"]
mod tests;
