//! The graphics engine: executes operator-list entries against a stack of raster targets.
//!
//! One engine drives one page render. Entries run strictly in order; execution stops early
//! when a dependency is not resolved yet ([`ExecOutcome::Blocked`]), when the time budget of a
//! slice runs out ([`ExecOutcome::Yield`]) or when the host cancels.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::content::{MarkedContentStack, OptionalContentConfig};
use crate::foundation::core::{Affine, BezPath, Point, Rgba8};
use crate::foundation::error::{PaintError, PaintResult};
use crate::objects::ObjectScopes;
use crate::oplist::{Arg, OpCode, OperatorList};
use crate::pattern::axial::GradientRamp;
use crate::render::composite::{BlendMode, premul_over_in_place};
use crate::render::pool::{SharedPool, TaskId};
use crate::render::raster::{ClipPath, DrawParams, FillRule, Painter, Shape, Source};
use crate::render::surface::HostSurface;
use crate::render::target::RasterTarget;
use crate::viewport::Viewport;

mod dispatch;
mod group;
mod image_ops;
mod paint;
mod path;
pub(crate) mod state;
mod text;

use state::{GraphicsState, SmaskEntry};

/// Tunables of the engine.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineOpts {
    /// Wall-clock budget of one execution slice, in milliseconds.
    pub execution_time_ms: u64,
    /// Entries executed between clock checks.
    pub execution_steps: usize,
    /// Largest offscreen group dimension; bigger groups are rendered downscaled.
    pub max_group_size: u32,
    /// Largest pattern tile dimension.
    pub max_pattern_size: u32,
    /// Image rows unpacked per chunk.
    pub image_chunk_rows: usize,
    /// Pixels processed per soft-mask chunk.
    pub mask_chunk_pixels: usize,
    /// Deepest tiling-cell or Type-3 glyph nesting that is still rendered.
    pub max_nesting_depth: usize,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            execution_time_ms: 15,
            execution_steps: 10,
            max_group_size: 4096,
            max_pattern_size: 3000,
            image_chunk_rows: 16,
            mask_chunk_pixels: 1 << 20,
            max_nesting_depth: 8,
        }
    }
}

impl EngineOpts {
    /// Set the slice time budget.
    pub fn with_execution_time_ms(mut self, ms: u64) -> Self {
        self.execution_time_ms = ms;
        self
    }

    /// Set how many entries run between clock checks.
    pub fn with_execution_steps(mut self, steps: usize) -> Self {
        self.execution_steps = steps;
        self
    }

    /// Set the group size cap.
    pub fn with_max_group_size(mut self, px: u32) -> Self {
        self.max_group_size = px.max(1);
        self
    }

    /// Set the pattern tile cap.
    pub fn with_max_pattern_size(mut self, px: u32) -> Self {
        self.max_pattern_size = px.max(1);
        self
    }

    /// Set the image unpack chunk height.
    pub fn with_image_chunk_rows(mut self, rows: usize) -> Self {
        self.image_chunk_rows = rows.max(1);
        self
    }

    /// Slice budget as a duration.
    pub fn execution_time(&self) -> Duration {
        Duration::from_millis(self.execution_time_ms)
    }
}

/// Lifecycle phase of a [`GraphicsEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnginePhase {
    /// Not begun.
    Idle,
    /// Executing or ready to execute more entries.
    Running,
    /// Waiting for a shared object.
    Blocked,
    /// Finalized after the last entry.
    Finished,
    /// Terminated early.
    Cancelled,
}

/// Result of one [`GraphicsEngine::execute`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Every available entry ran; holds the list length.
    Done(usize),
    /// The slice budget ran out; resume at the index.
    Yield(usize),
    /// Entry `index` needs `id`; resume at `index` once it resolves.
    Blocked {
        /// Entry to resume at.
        index: usize,
        /// Unresolved object id.
        id: String,
    },
    /// The cancel flag was seen before entry `.0`.
    Cancelled(usize),
}

/// What a level of the target stack is composited back as.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum LevelKind {
    Root,
    Group { scale: (f64, f64), smask: bool },
    Smask { id: u64, blend: BlendMode },
}

pub(crate) struct Level {
    pub(crate) target: RasterTarget,
    pub(crate) kind: LevelKind,
}

/// Everything one engine needs from the session that created it.
pub(crate) struct EngineEnv {
    pub(crate) opts: EngineOpts,
    pub(crate) objects: ObjectScopes,
    pub(crate) pool: SharedPool,
    pub(crate) task: TaskId,
    pub(crate) optional_content: Option<Arc<OptionalContentConfig>>,
    pub(crate) cancel: Arc<AtomicBool>,
    pub(crate) smask_counter: Arc<AtomicU64>,
}

/// How `begin` sets up the page.
pub(crate) struct BeginParams<'a> {
    pub(crate) viewport: &'a Viewport,
    pub(crate) transform: Option<Affine>,
    pub(crate) background: Option<Rgba8>,
    pub(crate) transparency: bool,
}

/// Executes operator lists against a host surface.
pub struct GraphicsEngine {
    opts: EngineOpts,
    objects: ObjectScopes,
    painter: Painter,
    optional_content: Option<Arc<OptionalContentConfig>>,
    cancel: Arc<AtomicBool>,
    smask_counter: Arc<AtomicU64>,
    phase: EnginePhase,
    depth: usize,

    host: Option<HostSurface>,
    composite_root: bool,
    levels: Vec<Level>,

    current: GraphicsState,
    stack: Vec<GraphicsState>,
    base_transform: Affine,
    base_transform_stack: Vec<Affine>,
    combined_scale: f64,

    // Page device space.
    path: BezPath,
    // User space.
    current_point: Point,
    pending_clip: Option<FillRule>,
    pending_text_clip: Option<BezPath>,

    marked: MarkedContentStack,
    content_visible: bool,
    group_level: usize,

    smasks: HashMap<u64, SmaskEntry>,
    next_smask: u64,
    temp_smask: Option<u64>,
    suspended: HashMap<u64, Level>,

    ramps: HashMap<String, Arc<GradientRamp>>,
    meshes: HashMap<(String, u64, u64, bool), Arc<vello_cpu::Pixmap>>,
}

impl std::fmt::Debug for GraphicsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsEngine")
            .field("phase", &self.phase)
            .field("task", &self.painter.task())
            .field("state_depth", &self.stack.len())
            .field("group_level", &self.group_level)
            .field("levels", &self.levels.len())
            .finish_non_exhaustive()
    }
}

impl GraphicsEngine {
    pub(crate) fn new(env: EngineEnv) -> Self {
        Self {
            opts: env.opts,
            objects: env.objects,
            painter: Painter::new(env.pool, env.task),
            optional_content: env.optional_content,
            cancel: env.cancel,
            smask_counter: env.smask_counter,
            phase: EnginePhase::Idle,
            depth: 0,
            host: None,
            composite_root: false,
            levels: Vec::new(),
            current: GraphicsState::new(Affine::IDENTITY),
            stack: Vec::new(),
            base_transform: Affine::IDENTITY,
            base_transform_stack: Vec::new(),
            combined_scale: 1.0,
            path: BezPath::new(),
            current_point: Point::ZERO,
            pending_clip: None,
            pending_text_clip: None,
            marked: MarkedContentStack::default(),
            content_visible: true,
            group_level: 0,
            smasks: HashMap::new(),
            next_smask: 0,
            temp_smask: None,
            suspended: HashMap::new(),
            ramps: HashMap::new(),
            meshes: HashMap::new(),
        }
    }

    /// Engine for a tiling cell or other offscreen sub-render into `target`.
    pub(crate) fn nested(&self, target: RasterTarget, base: Affine) -> Self {
        let mut child = Self::new(EngineEnv {
            opts: self.opts.clone(),
            objects: self.objects.clone(),
            pool: self.painter.pool().clone(),
            task: self.painter.task(),
            optional_content: self.optional_content.clone(),
            cancel: self.cancel.clone(),
            smask_counter: self.smask_counter.clone(),
        });
        child.depth = self.depth + 1;
        child.levels.push(Level {
            target,
            kind: LevelKind::Root,
        });
        child.current = GraphicsState::new(base);
        child.base_transform = base;
        child.combined_scale = base.as_coeffs()[0].hypot(base.as_coeffs()[2]);
        child.phase = EnginePhase::Running;
        child
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Number of saved graphics states.
    pub fn state_depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of open transparency groups and soft-mask layers.
    pub fn group_level(&self) -> usize {
        self.group_level
    }

    /// Fill the background and establish the base transform.
    #[tracing::instrument(skip_all, fields(task = %self.painter.task()))]
    pub(crate) fn begin(&mut self, surface: HostSurface, params: BeginParams<'_>) -> PaintResult<()> {
        if self.phase != EnginePhase::Idle {
            return Err(PaintError::validation("engine was already started"));
        }
        let mut host = RasterTarget::host(surface.clone())?;
        let bg = params.background.unwrap_or(Rgba8::WHITE).premul().to_array();
        host.write(|px| {
            for p in px.chunks_exact_mut(4) {
                p.copy_from_slice(&bg);
            }
        });

        if params.transparency {
            let root = RasterTarget::acquire(
                self.painter.pool(),
                self.painter.task(),
                "transparent",
                u32::from(host.width),
                u32::from(host.height),
                Affine::IDENTITY,
            )?;
            self.levels.push(Level {
                target: root,
                kind: LevelKind::Root,
            });
            self.composite_root = true;
        } else {
            self.levels.push(Level {
                target: host,
                kind: LevelKind::Root,
            });
        }
        self.host = Some(surface);

        let base = params.transform.unwrap_or(Affine::IDENTITY) * params.viewport.transform;
        self.base_transform = base;
        self.combined_scale = base.as_coeffs()[0].hypot(base.as_coeffs()[2]);
        self.current = GraphicsState::new(base);
        self.phase = EnginePhase::Running;
        tracing::debug!(
            width = params.viewport.width,
            height = params.viewport.height,
            transparency = params.transparency,
            "begin drawing"
        );
        Ok(())
    }

    /// Run entries of `list` from `from` until done, blocked, out of budget or cancelled.
    ///
    /// With a `budget`, the clock is checked every `execution_steps` entries once more than
    /// that many remain.
    pub(crate) fn execute(
        &mut self,
        list: &OperatorList,
        from: usize,
        budget: Option<Duration>,
    ) -> ExecOutcome {
        let len = list.len();
        let mut i = from.min(len);
        if matches!(self.phase, EnginePhase::Blocked) {
            self.phase = EnginePhase::Running;
        }
        if i == len {
            return ExecOutcome::Done(len);
        }
        let chunked = budget.is_some() && len - i > self.opts.execution_steps;
        let deadline = budget.map(|b| Instant::now() + b);
        let mut steps = 0usize;

        let outcome = loop {
            if self.cancel.load(Ordering::Acquire) {
                self.phase = EnginePhase::Cancelled;
                break ExecOutcome::Cancelled(i);
            }
            let Some((code, args)) = list.entry(i) else {
                break ExecOutcome::Done(len);
            };
            match self.run_entry(code, args) {
                Ok(()) => {}
                Err(PaintError::NotResolved(nr)) => {
                    self.phase = EnginePhase::Blocked;
                    tracing::debug!(index = i, id = %nr.id, "blocked on shared object");
                    break ExecOutcome::Blocked { index: i, id: nr.id };
                }
                Err(err) => {
                    tracing::warn!(index = i, code, error = %err, "skipping operator");
                }
            }
            i += 1;
            if i == len {
                break ExecOutcome::Done(len);
            }
            if chunked {
                steps += 1;
                if steps > self.opts.execution_steps {
                    if deadline.is_some_and(|d| Instant::now() > d) {
                        tracing::debug!(index = i, "execution slice exhausted");
                        break ExecOutcome::Yield(i);
                    }
                    steps = 0;
                }
            }
        };

        if !matches!(outcome, ExecOutcome::Cancelled(_)) {
            self.flush_if_host();
        }
        outcome
    }

    /// Execute a dependency check or dispatch one entry.
    fn run_entry(&mut self, code: u8, args: &[Arg]) -> PaintResult<()> {
        let op = OpCode::from_code(code)
            .ok_or_else(|| PaintError::malformed(format!("unknown operator code {code}")))?;
        if op == OpCode::Dependency {
            for id in args.iter().filter_map(Arg::as_name) {
                if !self.objects.has(id) {
                    return Err(crate::foundation::error::NotResolved { id: id.to_owned() }.into());
                }
            }
            return Ok(());
        }
        self.dispatch(op, args)
    }

    /// Run a whole nested list (Type-3 glyph, tiling cell) without budget or blocking.
    pub(crate) fn execute_nested(&mut self, list: &OperatorList) {
        if self.depth > self.opts.max_nesting_depth {
            tracing::warn!(depth = self.depth, "nested operator list too deep, skipped");
            return;
        }
        self.depth += 1;
        for i in 0..list.len() {
            if self.cancel.load(Ordering::Acquire) {
                break;
            }
            let Some((code, args)) = list.entry(i) else {
                break;
            };
            if let Err(err) = self.run_entry(code, args) {
                tracing::warn!(index = i, code, error = %err, "skipping nested operator");
            }
        }
        self.depth -= 1;
    }

    /// Close every open state and mask, composite the page and release pooled targets.
    #[tracing::instrument(skip_all, fields(task = %self.painter.task()))]
    pub(crate) fn finish(&mut self) -> PaintResult<()> {
        self.consume_path();
        while !self.stack.is_empty() || self.current.active_smask.is_some() {
            self.restore();
        }
        while self.levels.len() > 1 {
            if let Some(level) = self.levels.pop() {
                tracing::warn!(kind = ?level.kind, "group left open at end of page");
                self.painter.discard();
                level.target.release(self.painter.pool(), self.painter.task());
            }
        }
        let res = self.finish_root();
        self.release_all();
        self.phase = EnginePhase::Finished;
        res
    }

    fn finish_root(&mut self) -> PaintResult<()> {
        let Some(mut root) = self.levels.pop() else {
            return Ok(());
        };
        let res = self.painter.flush(&mut root.target);
        if self.composite_root
            && let Some(host) = &self.host
        {
            root.target.read(|src| {
                host.with_pixels(|dst| premul_over_in_place(dst.data_as_u8_slice_mut(), src))
            })?;
        }
        root.target.release(self.painter.pool(), self.painter.task());
        res
    }

    /// Stop without painting anything more and hand every pooled target back.
    pub(crate) fn abort(&mut self) {
        self.painter.discard();
        for level in self.levels.drain(..) {
            level.target.release(self.painter.pool(), self.painter.task());
        }
        self.release_all();
        self.phase = EnginePhase::Cancelled;
    }

    /// Flush pending paints and return the root target; used for nested renders.
    pub(crate) fn into_root(mut self) -> PaintResult<RasterTarget> {
        self.consume_path();
        while !self.stack.is_empty() || self.current.active_smask.is_some() {
            self.restore();
        }
        while self.levels.len() > 1 {
            if let Some(level) = self.levels.pop() {
                self.painter.discard();
                level.target.release(self.painter.pool(), self.painter.task());
            }
        }
        let mut root = self
            .levels
            .pop()
            .ok_or_else(|| PaintError::backend("nested render has no target"))?;
        let res = self.painter.flush(&mut root.target);
        self.release_all();
        self.phase = EnginePhase::Finished;
        match res {
            Ok(()) => Ok(root.target),
            Err(e) => {
                root.target.release(self.painter.pool(), self.painter.task());
                Err(e)
            }
        }
    }

    fn release_all(&mut self) {
        self.painter.discard();
        let pool = self.painter.pool().clone();
        let task = self.painter.task();
        for (_, level) in self.suspended.drain() {
            level.target.release(&pool, task);
        }
        for (_, entry) in self.smasks.drain() {
            lock_release(&pool, task, &entry.purpose, entry.mask);
        }
        self.temp_smask = None;
        for (_, mesh) in self.meshes.drain() {
            match Arc::try_unwrap(mesh) {
                Ok(p) => lock_release(&pool, task, "mesh", p),
                Err(_) => crate::foundation::core::lock(&pool).forget(task),
            }
        }
        self.ramps.clear();
    }

    fn flush_if_host(&mut self) {
        if let Some(level) = self.levels.last_mut()
            && level.target.is_host()
            && let Err(err) = self.painter.flush(&mut level.target)
        {
            tracing::warn!(error = %err, "flush failed");
        }
    }

    fn top(&self) -> PaintResult<&Level> {
        self.levels
            .last()
            .ok_or_else(|| PaintError::validation("engine has no raster target; call begin first"))
    }

    /// Page device space to current target pixels.
    pub(crate) fn from_page(&self) -> Affine {
        self.levels
            .last()
            .map_or(Affine::IDENTITY, |l| l.target.from_page())
    }

    /// Paint onto the top target with the current blend mode.
    ///
    /// Backend failures are logged and the single paint is dropped.
    pub(crate) fn paint(
        &mut self,
        shape: Shape<'_>,
        source: Source,
        transform: Affine,
        alpha: f32,
        extra_clip: Option<Arc<ClipPath>>,
    ) {
        let Some(level) = self.levels.last_mut() else {
            return;
        };
        let extended;
        let clips: &[Arc<ClipPath>] = match extra_clip {
            Some(c) => {
                extended = self
                    .current
                    .clips
                    .iter()
                    .cloned()
                    .chain(std::iter::once(c))
                    .collect::<Vec<_>>();
                &extended
            }
            None => &self.current.clips,
        };
        let params = DrawParams {
            transform,
            alpha,
            blend: self.current.blend,
            clips,
        };
        if let Err(err) = self.painter.draw(&mut level.target, shape, source, params) {
            tracing::warn!(error = %err, "paint dropped");
        }
    }

    fn flush_top(&mut self) -> PaintResult<()> {
        match self.levels.last_mut() {
            Some(level) => self.painter.flush(&mut level.target),
            None => Ok(()),
        }
    }

    pub(crate) fn save(&mut self) {
        let mut next = self.current.clone();
        next.resume_smask = None;
        self.stack.push(std::mem::replace(&mut self.current, next));
    }

    pub(crate) fn restore(&mut self) {
        let below = self.stack.last().and_then(|s| s.active_smask);
        if let Some(id) = self.current.active_smask
            && below != Some(id)
        {
            self.end_smask_group();
        }
        if let Some(id) = self.current.resume_smask.take() {
            self.resume_smask_group(id);
        }
        match self.stack.pop() {
            Some(prev) => {
                self.current = prev;
                self.pending_clip = None;
            }
            None => self.current.active_smask = None,
        }
        self.collect_smasks();
    }

    /// Return soft masks no state can reach anymore to the pool.
    fn collect_smasks(&mut self) {
        let mut live: Vec<u64> = self
            .stack
            .iter()
            .chain(std::iter::once(&self.current))
            .flat_map(|s| [s.active_smask, s.resume_smask])
            .flatten()
            .collect();
        live.extend(self.temp_smask);
        live.extend(self.suspended.keys().copied());
        let dead: Vec<u64> = self
            .smasks
            .keys()
            .copied()
            .filter(|id| !live.contains(id))
            .collect();
        for id in dead {
            if let Some(entry) = self.smasks.remove(&id) {
                lock_release(self.painter.pool(), self.painter.task(), &entry.purpose, entry.mask);
            }
        }
    }

    pub(crate) fn update_visibility(&mut self) {
        self.content_visible = self.marked.all_visible();
    }

    pub(crate) fn next_smask_slot(&self) -> u64 {
        self.smask_counter.fetch_add(1, Ordering::Relaxed) % 2
    }
}

fn lock_release(pool: &SharedPool, task: TaskId, purpose: &str, pixmap: vello_cpu::Pixmap) {
    crate::foundation::core::lock(pool).release(task, purpose, pixmap);
}

#[cfg(test)]
#[path = "../../tests/unit/engine/engine.rs"]
mod tests;
