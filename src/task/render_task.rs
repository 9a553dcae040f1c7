use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::engine::{BeginParams, EngineEnv, EnginePhase, ExecOutcome, GraphicsEngine};
use crate::foundation::core::lock;
use crate::foundation::error::{PaintError, PaintResult, RenderCancelled};
use crate::objects::ObjectScopes;
use crate::oplist::{OperatorListListener, OperatorListStream};
use crate::render::pool::TaskId;
use crate::render::surface::{HostSurface, SurfaceClaim};
use crate::task::scheduler::{Continuation, Scheduler};
use crate::task::session::{Intent, RenderParams, SessionShared, SessionTask};

/// How a render ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderCompletion {
    /// Every entry ran and the page was composited.
    Finished,
    /// The host cancelled the render.
    Cancelled(RenderCancelled),
    /// Finalizing the page failed.
    Errored(String),
}

impl RenderCompletion {
    /// `Ok` for [`RenderCompletion::Finished`]; cancellation maps to [`PaintError::Cancelled`].
    pub fn into_result(self) -> PaintResult<()> {
        match self {
            Self::Finished => Ok(()),
            Self::Cancelled(c) => Err(c.into()),
            Self::Errored(msg) => Err(PaintError::Render(msg)),
        }
    }

    /// `true` for a host cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Result of one [`RenderTask::step`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The slice budget ran out; call `step` again on the next continuation.
    Yielded,
    /// Waiting for shared object `id`.
    Blocked {
        /// Unresolved object id.
        id: String,
    },
    /// Every delivered entry ran; more chunks are expected.
    AwaitingOperators,
    /// The render completed (successfully or with an error).
    Finished,
    /// The render was cancelled.
    Cancelled,
}

/// State shared between a task, its handles and the notifications that wake it.
struct TaskShared {
    cancel: Arc<AtomicBool>,
    reason: Mutex<Option<String>>,
    completion: Mutex<Option<RenderCompletion>>,
    generation: Mutex<u64>,
    wakeup: Condvar,
}

impl TaskShared {
    fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            cancel,
            reason: Mutex::new(None),
            completion: Mutex::new(None),
            generation: Mutex::new(0),
            wakeup: Condvar::new(),
        }
    }

    fn wake(&self) {
        *lock(&self.generation) += 1;
        self.wakeup.notify_all();
    }

    fn request_cancel(&self, reason: String) {
        lock(&self.reason).get_or_insert(reason);
        self.cancel.store(true, Ordering::Release);
        self.wake();
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn reason(&self) -> String {
        lock(&self.reason)
            .clone()
            .unwrap_or_else(|| "cancelled".to_owned())
    }

    fn completion(&self) -> Option<RenderCompletion> {
        lock(&self.completion).clone()
    }

    /// First completion wins.
    fn settle(&self, completion: RenderCompletion) {
        {
            let mut slot = lock(&self.completion);
            if slot.is_some() {
                return;
            }
            *slot = Some(completion);
        }
        self.wake();
    }

    /// Block until `ready` holds or the task is cancelled.
    fn wait_until(&self, ready: impl Fn() -> bool) {
        let mut guard = lock(&self.generation);
        while !ready() && !self.cancel_requested() {
            guard = self
                .wakeup
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl OperatorListListener for TaskShared {
    fn operator_list_changed(&self) {
        self.wake();
    }
}

impl SessionTask for TaskShared {
    fn session_closed(&self) {
        if self.completion().is_none() {
            self.request_cancel("document session torn down".to_owned());
        }
    }
}

/// Host-side view of a running render: cancel it or wait for it to settle.
#[derive(Clone)]
pub struct RenderHandle {
    task: TaskId,
    shared: Arc<TaskShared>,
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandle")
            .field("task", &self.task)
            .field("completion", &self.completion())
            .finish()
    }
}

impl RenderHandle {
    /// Task this handle belongs to.
    pub fn task_id(&self) -> TaskId {
        self.task
    }

    /// Ask the task to stop; it settles as cancelled at its next step boundary.
    ///
    /// The first reason given wins. Has no effect once the render has settled.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self.shared.completion().is_none() {
            self.shared.request_cancel(reason.into());
        }
    }

    /// Completion, once settled.
    pub fn completion(&self) -> Option<RenderCompletion> {
        self.shared.completion()
    }

    /// `true` once the render finished, was cancelled or errored.
    pub fn is_settled(&self) -> bool {
        self.completion().is_some()
    }

    /// Block until the render settles.
    pub fn wait(&self) -> RenderCompletion {
        let mut guard = lock(&self.shared.generation);
        loop {
            if let Some(done) = self.shared.completion() {
                return done;
            }
            guard = self
                .shared
                .wakeup
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the render settles or `timeout` passes.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<RenderCompletion> {
        let deadline = Instant::now() + timeout;
        let mut guard = lock(&self.shared.generation);
        loop {
            if let Some(done) = self.shared.completion() {
                return Some(done);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            guard = self
                .shared
                .wakeup
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// One page render attached to a host surface.
///
/// The task owns the engine and executes the operator list in slices. Drive it with
/// [`RenderTask::step`] from a host loop, or with [`RenderTask::run`] and a [`Scheduler`].
/// Dropping an unsettled task cancels it.
pub struct RenderTask {
    id: TaskId,
    intent: Intent,
    budget: Option<Duration>,
    engine: GraphicsEngine,
    stream: OperatorListStream,
    objects: ObjectScopes,
    next: usize,
    subscribed: HashSet<String>,
    shared: Arc<TaskShared>,
    claim: Option<SurfaceClaim>,
}

impl std::fmt::Debug for RenderTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTask")
            .field("id", &self.id)
            .field("intent", &self.intent)
            .field("next", &self.next)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl RenderTask {
    /// Claim `surface`, paint the background and attach to `stream`.
    #[tracing::instrument(skip_all, fields(intent = ?params.intent))]
    pub(crate) fn start(
        session: &Arc<SessionShared>,
        objects: ObjectScopes,
        surface: &HostSurface,
        stream: OperatorListStream,
        params: RenderParams,
    ) -> PaintResult<Self> {
        let claim = surface.try_claim()?;
        let id = session.next_task_id();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut engine = GraphicsEngine::new(EngineEnv {
            opts: session.opts.engine.clone(),
            objects: objects.clone(),
            pool: session.pool.clone(),
            task: id,
            optional_content: params.optional_content.clone(),
            cancel: cancel.clone(),
            smask_counter: session.smask_counter.clone(),
        });
        let begun = engine.begin(
            claim.surface().clone(),
            BeginParams {
                viewport: &params.viewport,
                transform: params.transform,
                background: params.background,
                transparency: params.transparency,
            },
        );
        if let Err(err) = begun {
            engine.abort();
            return Err(err);
        }

        let shared = Arc::new(TaskShared::new(cancel));
        let listener: Arc<dyn OperatorListListener> = shared.clone();
        stream.attach(Arc::downgrade(&listener));
        let attached: Arc<dyn SessionTask> = shared.clone();
        session.attach_task(Arc::downgrade(&attached));

        let budget = match params.intent {
            Intent::Display => Some(session.opts.engine.execution_time()),
            Intent::Print => None,
        };
        tracing::debug!(task = %id, "render task started");
        Ok(Self {
            id,
            intent: params.intent,
            budget,
            engine,
            stream,
            objects,
            next: 0,
            subscribed: HashSet::new(),
            shared,
            claim: Some(claim),
        })
    }

    /// Pool owner id of this render.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Display or print.
    pub fn intent(&self) -> Intent {
        self.intent
    }

    /// Index of the next entry to execute.
    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Engine lifecycle phase.
    pub fn phase(&self) -> EnginePhase {
        self.engine.phase()
    }

    /// Handle for cancelling and awaiting this render from elsewhere.
    pub fn handle(&self) -> RenderHandle {
        RenderHandle {
            task: self.id,
            shared: self.shared.clone(),
        }
    }

    /// Completion, once settled.
    pub fn completion(&self) -> Option<RenderCompletion> {
        self.shared.completion()
    }

    /// Cancel now: release every target and settle as cancelled.
    pub fn cancel(&mut self, reason: impl Into<String>) {
        if self.completion().is_some() {
            return;
        }
        self.shared.request_cancel(reason.into());
        self.finalize_cancelled();
    }

    /// Run one slice of the operator list.
    #[tracing::instrument(level = "debug", skip_all, fields(task = %self.id, from = self.next))]
    pub fn step(&mut self) -> StepOutcome {
        if let Some(done) = self.completion() {
            return match done {
                RenderCompletion::Cancelled(_) => StepOutcome::Cancelled,
                _ => StepOutcome::Finished,
            };
        }
        if self.shared.cancel_requested() {
            self.finalize_cancelled();
            return StepOutcome::Cancelled;
        }

        let (outcome, complete) = {
            let list = self.stream.read();
            (self.engine.execute(&list, self.next, self.budget), list.last_chunk)
        };
        match outcome {
            ExecOutcome::Done(len) => {
                self.next = len;
                if complete {
                    self.finalize();
                    StepOutcome::Finished
                } else {
                    StepOutcome::AwaitingOperators
                }
            }
            ExecOutcome::Yield(index) => {
                self.next = index;
                StepOutcome::Yielded
            }
            ExecOutcome::Blocked { index, id } => {
                self.next = index;
                self.subscribe(&id);
                StepOutcome::Blocked { id }
            }
            ExecOutcome::Cancelled(index) => {
                self.next = index;
                self.finalize_cancelled();
                StepOutcome::Cancelled
            }
        }
    }

    /// Drive the render until it settles, waiting on `scheduler` between slices.
    ///
    /// Blocks the calling thread while waiting for shared objects or more operators; another
    /// thread must resolve them, append chunks or cancel.
    #[tracing::instrument(skip_all, fields(task = %self.id))]
    pub fn run(&mut self, scheduler: &mut dyn Scheduler) -> PaintResult<()> {
        loop {
            match self.step() {
                StepOutcome::Finished | StepOutcome::Cancelled => break,
                StepOutcome::Yielded => scheduler.schedule(Continuation::Yielded),
                StepOutcome::Blocked { id } => {
                    let objects = self.objects.clone();
                    self.shared.wait_until(|| objects.has(&id));
                    scheduler.schedule(Continuation::Woken);
                }
                StepOutcome::AwaitingOperators => {
                    let (stream, next) = (self.stream.clone(), self.next);
                    self.shared
                        .wait_until(|| stream.is_complete() || stream.len() > next);
                    scheduler.schedule(Continuation::Woken);
                }
            }
        }
        self.completion()
            .ok_or_else(|| PaintError::Render("render task stopped without settling".to_owned()))?
            .into_result()
    }

    fn subscribe(&mut self, id: &str) {
        if !self.subscribed.insert(id.to_owned()) {
            return;
        }
        let shared = Arc::downgrade(&self.shared);
        self.objects.on_resolved(id, move || {
            if let Some(shared) = shared.upgrade() {
                shared.wake();
            }
        });
    }

    fn finalize(&mut self) {
        let res = self.engine.finish();
        self.claim = None;
        let completion = match res {
            Ok(()) => {
                tracing::debug!(task = %self.id, entries = self.next, "render finished");
                RenderCompletion::Finished
            }
            Err(err) => {
                tracing::warn!(task = %self.id, error = %err, "render failed to finish");
                RenderCompletion::Errored(err.to_string())
            }
        };
        self.shared.settle(completion);
    }

    fn finalize_cancelled(&mut self) {
        self.engine.abort();
        self.claim = None;
        let reason = self.shared.reason();
        tracing::debug!(task = %self.id, %reason, "render cancelled");
        self.shared
            .settle(RenderCompletion::Cancelled(RenderCancelled::new(reason)));
    }
}

impl Drop for RenderTask {
    fn drop(&mut self) {
        if self.completion().is_none() {
            self.shared.request_cancel("render task dropped".to_owned());
            self.finalize_cancelled();
        }
    }
}
