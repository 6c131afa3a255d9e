//! # System Interaction Layer
//!
//! Abstractions over the operating system, kept apart from the core logic.
//!
//! ## Modules
//!
//! - **`executor`**: spawns external commands through the configured shell (or
//!   directly, for pipelines), streaming and capturing their output.
//! - **`signals`**: the interrupt worker that turns Ctrl+C into cancellation
//!   while file watchers are running.
//! - **`watcher`**: polling file watchers that report writes back to the thread
//!   owning the script runtime.

pub mod executor;
pub mod signals;
pub mod watcher;
