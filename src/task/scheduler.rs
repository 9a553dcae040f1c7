use std::time::{Duration, Instant};

use crate::task::session::Intent;

/// Why a render task hands control back to its scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Continuation {
    /// The slice budget ran out with entries left to run.
    Yielded,
    /// A blocking dependency resolved or more operators arrived.
    Woken,
}

/// Decides when a render task runs its next slice.
///
/// [`RenderTask::run`](crate::RenderTask::run) calls `schedule` between slices and resumes
/// execution once it returns.
pub trait Scheduler: Send {
    /// Block until the task may continue.
    fn schedule(&mut self, continuation: Continuation);
}

/// Continues as soon as possible; the scheduler used for printing.
#[derive(Debug, Default)]
pub struct ImmediateScheduler {
    continuations: u64,
}

impl ImmediateScheduler {
    /// New scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Continuations handed out so far.
    pub fn continuations(&self) -> u64 {
        self.continuations
    }
}

impl Scheduler for ImmediateScheduler {
    fn schedule(&mut self, _continuation: Continuation) {
        self.continuations += 1;
    }
}

/// Continues on the next frame boundary; the scheduler used for interactive display.
#[derive(Debug)]
pub struct FrameScheduler {
    interval: Duration,
    next_frame: Option<Instant>,
    frames: u64,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

impl FrameScheduler {
    /// Roughly 60 frames per second.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(16);

    /// Scheduler ticking every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_frame: None,
            frames: 0,
        }
    }

    /// Frames waited for so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Scheduler for FrameScheduler {
    fn schedule(&mut self, continuation: Continuation) {
        let now = Instant::now();
        let frame = match self.next_frame {
            Some(at) if at > now => at,
            // Missed frames are skipped, not replayed.
            _ => now + self.interval,
        };
        tracing::trace!(?continuation, wait_us = (frame - now).as_micros() as u64, "waiting for frame");
        std::thread::sleep(frame - now);
        self.next_frame = Some(frame + self.interval);
        self.frames += 1;
    }
}

/// Default scheduler for `intent`.
pub fn scheduler_for(intent: Intent) -> Box<dyn Scheduler> {
    match intent {
        Intent::Display => Box::new(FrameScheduler::default()),
        Intent::Print => Box::new(ImmediateScheduler::new()),
    }
}
