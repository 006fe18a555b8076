//! Authored, read-only story data: scenes, nodes and characters.

pub mod character;
pub mod node;
pub mod scene;
