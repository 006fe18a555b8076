//! Playback engine: timers, the typewriter, auto-advance and the scene runner.

pub mod auto_advance;
pub mod clock;
pub mod host;
pub mod input;
pub mod library;
pub mod runner;
pub mod settings;
pub mod typewriter;
