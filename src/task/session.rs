use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::content::OptionalContentConfig;
use crate::engine::EngineOpts;
use crate::foundation::core::{Affine, Rgba8, lock};
use crate::foundation::error::{PaintError, PaintResult};
use crate::objects::{ObjectCache, ObjectScopes, SharedObject};
use crate::oplist::OperatorListStream;
use crate::render::pool::{PoolOpts, PoolStats, RasterTargetPool, SharedPool, TaskId};
use crate::render::surface::HostSurface;
use crate::task::render_task::RenderTask;
use crate::viewport::Viewport;

/// Overrides the slice budget of [`EngineOpts`].
pub const ENV_EXECUTION_TIME_MS: &str = "PAGEPAINT_EXECUTION_TIME_MS";
/// Overrides the retained byte cap of [`PoolOpts`].
pub const ENV_MAX_POOL_BYTES: &str = "PAGEPAINT_MAX_POOL_BYTES";

/// What a render is for; picks the slice budget and the default scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Interactive display: time-sliced, continued once per frame.
    #[default]
    Display,
    /// Printing: runs without a slice budget.
    Print,
}

impl std::str::FromStr for Intent {
    type Err = PaintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "display" => Ok(Self::Display),
            "print" => Ok(Self::Print),
            other => Err(PaintError::validation(format!(
                "unknown intent '{other}' (expected display or print)"
            ))),
        }
    }
}

/// Session configuration.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionOpts {
    /// Engine tunables used by every render of the session.
    pub engine: EngineOpts,
    /// Raster target pool caps.
    pub pool: PoolOpts,
}

impl SessionOpts {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parse options from JSON; missing fields keep their defaults.
    pub fn from_json(text: &str) -> PaintResult<Self> {
        serde_json::from_str(text).map_err(|e| PaintError::serde(e.to_string()))
    }

    /// Apply `PAGEPAINT_*` environment variables on top of these options.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(ms) = env_number(ENV_EXECUTION_TIME_MS) {
            self.engine.execution_time_ms = ms;
        }
        if let Some(bytes) = env_number(ENV_MAX_POOL_BYTES) {
            self.pool.max_pool_bytes = bytes;
        }
        self
    }

    /// Replace the engine options.
    pub fn with_engine(mut self, engine: EngineOpts) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the pool options.
    pub fn with_pool(mut self, pool: PoolOpts) -> Self {
        self.pool = pool;
        self
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

/// Parameters of one page render.
#[derive(Clone, Debug)]
pub struct RenderParams {
    /// Page geometry; fixes the base transform.
    pub viewport: Viewport,
    /// Display or print.
    pub intent: Intent,
    /// Extra transform applied before the viewport transform.
    pub transform: Option<Affine>,
    /// Page background; white when unset.
    pub background: Option<Rgba8>,
    /// Render onto a transparent intermediate and composite it onto the host at the end.
    pub transparency: bool,
    /// Layer visibility; everything is visible when unset.
    pub optional_content: Option<Arc<OptionalContentConfig>>,
}

impl RenderParams {
    /// Display render of `viewport` with default settings.
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            intent: Intent::Display,
            transform: None,
            background: None,
            transparency: false,
            optional_content: None,
        }
    }

    /// Set the intent.
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = intent;
        self
    }

    /// Set the caller transform.
    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Rgba8) -> Self {
        self.background = Some(color);
        self
    }

    /// Render through a transparent intermediate target.
    pub fn with_transparency(mut self, transparency: bool) -> Self {
        self.transparency = transparency;
        self
    }

    /// Set the optional content configuration.
    pub fn with_optional_content(mut self, config: Arc<OptionalContentConfig>) -> Self {
        self.optional_content = Some(config);
        self
    }
}

/// A render attached to a session; stopped when the session is torn down.
pub(crate) trait SessionTask: Send + Sync {
    fn session_closed(&self);
}

pub(crate) struct SessionShared {
    pub(crate) opts: SessionOpts,
    pub(crate) common: Arc<ObjectCache>,
    pub(crate) pool: SharedPool,
    pub(crate) smask_counter: Arc<AtomicU64>,
    next_task: AtomicU64,
    pages: Mutex<HashMap<usize, Arc<ObjectCache>>>,
    tasks: Mutex<Vec<Weak<dyn SessionTask>>>,
}

impl SessionShared {
    pub(crate) fn next_task_id(&self) -> TaskId {
        TaskId(self.next_task.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn attach_task(&self, task: Weak<dyn SessionTask>) {
        let mut tasks = lock(&self.tasks);
        tasks.retain(|t| t.strong_count() > 0);
        tasks.push(task);
    }
}

/// One open document: the document-wide object cache, the raster target pool and the
/// counters every page render of the document shares.
///
/// Cloning shares the same session.
#[derive(Clone)]
pub struct DocumentSession {
    shared: Arc<SessionShared>,
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("opts", &self.shared.opts)
            .field("common_objects", &self.shared.common.len())
            .field("pages", &lock(&self.shared.pages).len())
            .finish_non_exhaustive()
    }
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::new(SessionOpts::default())
    }
}

impl DocumentSession {
    /// Open a session.
    pub fn new(opts: SessionOpts) -> Self {
        let pool = RasterTargetPool::shared(opts.pool);
        Self {
            shared: Arc::new(SessionShared {
                opts,
                common: Arc::new(ObjectCache::new()),
                pool,
                smask_counter: Arc::new(AtomicU64::new(0)),
                next_task: AtomicU64::new(1),
                pages: Mutex::new(HashMap::new()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Options the session was opened with.
    pub fn opts(&self) -> &SessionOpts {
        &self.shared.opts
    }

    /// Document-wide object cache (fonts and `g_` ids).
    pub fn common_objects(&self) -> &Arc<ObjectCache> {
        &self.shared.common
    }

    /// Context of page `index`; every call for the same index shares one page cache.
    pub fn page(&self, index: usize) -> PageContext {
        let page = lock(&self.shared.pages)
            .entry(index)
            .or_insert_with(|| Arc::new(ObjectCache::new()))
            .clone();
        PageContext {
            index,
            objects: ObjectScopes::new(self.shared.common.clone(), page),
            session: self.shared.clone(),
        }
    }

    /// Drop the page cache of `index`; contexts already handed out keep their own handle.
    pub fn close_page(&self, index: usize) {
        if let Some(cache) = lock(&self.shared.pages).remove(&index) {
            cache.clear();
        }
    }

    /// Pool counters.
    pub fn pool_stats(&self) -> PoolStats {
        lock(&self.shared.pool).stats()
    }

    /// Pooled targets still held by `task`.
    pub fn outstanding_targets(&self, task: TaskId) -> usize {
        lock(&self.shared.pool).outstanding(task)
    }

    /// Cancel every render still attached, clear every cache and drop all retained raster
    /// targets.
    ///
    /// A render blocked in [`RenderTask::run`] wakes up and returns [`PaintError::Cancelled`].
    #[tracing::instrument(skip_all)]
    pub fn teardown(&self) {
        let tasks = std::mem::take(&mut *lock(&self.shared.tasks));
        let live: Vec<_> = tasks.iter().filter_map(Weak::upgrade).collect();
        for task in &live {
            task.session_closed();
        }
        if !live.is_empty() {
            tracing::debug!(tasks = live.len(), "cancelled renders on teardown");
        }
        self.shared.common.clear();
        for (_, cache) in lock(&self.shared.pages).drain() {
            cache.clear();
        }
        lock(&self.shared.pool).clear();
        tracing::debug!("document session torn down");
    }
}

/// One page of a [`DocumentSession`].
#[derive(Clone)]
pub struct PageContext {
    index: usize,
    objects: ObjectScopes,
    session: Arc<SessionShared>,
}

impl std::fmt::Debug for PageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageContext")
            .field("index", &self.index)
            .field("objects", &self.objects)
            .finish_non_exhaustive()
    }
}

impl PageContext {
    /// Page index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Caches this page reads from.
    pub fn objects(&self) -> &ObjectScopes {
        &self.objects
    }

    /// Resolve a shared object into the cache responsible for `id`.
    ///
    /// Returns `false` if `id` was already resolved; the first value stays.
    pub fn resolve(&self, id: &str, value: SharedObject) -> bool {
        let font = matches!(value, SharedObject::Font(_)).then(|| value.clone());
        let fresh = self.objects.resolve(id, value);
        if fresh && let Some(font) = font {
            // Fonts are document wide: wake renders of every page waiting on this id.
            let pages: Vec<_> = lock(&self.session.pages).values().cloned().collect();
            for cache in pages {
                cache.notify_pending(id, &font);
            }
        }
        fresh
    }

    /// Start rendering `list` into `surface`.
    ///
    /// Fails with [`PaintError::ConcurrentRender`] while another task still renders into
    /// `surface`.
    pub fn render(
        &self,
        surface: &HostSurface,
        list: OperatorListStream,
        params: RenderParams,
    ) -> PaintResult<RenderTask> {
        RenderTask::start(&self.session, self.objects.clone(), surface, list, params)
    }

    /// Clear the page cache.
    pub fn cleanup(&self) {
        self.objects.page.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/task/session.rs"]
mod tests;
