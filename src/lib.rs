//! Novel Engine: scene traversal and dialogue playback for visual novels.
//!
//! Walks authored node graphs one node at a time, asks the host to show
//! backgrounds, characters and choices, and paces dialogue with a
//! typewriter reveal and an optional auto-advance timer.

pub mod core;
pub mod schema;

pub use crate::core::host::{EventBuffer, HostEvent};
pub use crate::core::runner::{RunnerError, RunnerStatus, SceneRunner, SceneRunnerBuilder};
