use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype wrapper for character IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub u32);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A speaking character. Dialogue nodes refer to characters by id;
/// many lines share the same character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    /// Sprite used when the character enters the stage without an override.
    #[serde(default)]
    pub default_sprite: Option<String>,
}

impl Character {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id: CharacterId(id),
            name: name.to_string(),
            default_sprite: None,
        }
    }

    pub fn with_sprite(mut self, sprite: &str) -> Self {
        self.default_sprite = Some(sprite.to_string());
        self
    }
}
