/// Driving one page render: slices, blocking and completion.
pub mod render_task;
/// When a render task's next slice runs.
pub mod scheduler;
/// Document-wide state shared by every page render.
pub mod session;
