use serde::{Deserialize, Serialize};
use std::fmt;

use super::character::CharacterId;
use super::scene::SceneId;

/// Newtype wrapper for node IDs. Unique within a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a node does when traversal reaches it.
///
/// The set is closed: the runner matches on it exhaustively, so a new
/// kind does not compile until every dispatcher handles it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Scene entry marker. No effect, one output.
    Start,
    /// A spoken line, revealed by the typewriter.
    Dialogue {
        #[serde(default)]
        speaker: Option<CharacterId>,
        text: String,
        /// Sprite to switch the speaker to while this line is shown.
        #[serde(default)]
        sprite: Option<String>,
    },
    /// A player choice. One output per label, in the same order.
    Branch { choices: Vec<String> },
    Background { image: String },
    Bgm { track: String },
    Sfx { clip: String },
    /// Shows or hides a character on stage.
    Character {
        character: CharacterId,
        show: bool,
        #[serde(default)]
        sprite: Option<String>,
    },
    DialogueBox { visible: bool },
    /// Terminal node. `None` hands control to the host's own transition.
    End {
        #[serde(default)]
        next_scene: Option<SceneId>,
    },
}

/// How many outputs a node kind must declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    One,
    /// One output per branch choice.
    Choices(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Self::None => count == 0,
            Self::One => count == 1,
            Self::Choices(n) => *n > 0 && count == *n,
        }
    }

    pub fn expected(&self) -> usize {
        match self {
            Self::None => 0,
            Self::One => 1,
            Self::Choices(n) => *n,
        }
    }
}

impl NodeKind {
    /// Short name used in logs and lint reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Dialogue { .. } => "dialogue",
            Self::Branch { .. } => "branch",
            Self::Background { .. } => "background",
            Self::Bgm { .. } => "bgm",
            Self::Sfx { .. } => "sfx",
            Self::Character { .. } => "character",
            Self::DialogueBox { .. } => "dialogue_box",
            Self::End { .. } => "end",
        }
    }

    /// Effect-only kinds never wait for the player; traversal moves
    /// straight on to their single output.
    pub fn is_effect(&self) -> bool {
        match self {
            Self::Start
            | Self::Background { .. }
            | Self::Bgm { .. }
            | Self::Sfx { .. }
            | Self::Character { .. }
            | Self::DialogueBox { .. } => true,
            Self::Dialogue { .. } | Self::Branch { .. } | Self::End { .. } => false,
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::End { .. } => Arity::None,
            Self::Branch { choices } => Arity::Choices(choices.len()),
            _ => Arity::One,
        }
    }
}

/// One unit of authored narrative content or effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub outputs: Vec<NodeId>,
}

impl Node {
    pub fn new(id: u32, kind: NodeKind, outputs: &[u32]) -> Self {
        Self {
            id: NodeId(id),
            kind,
            outputs: outputs.iter().map(|o| NodeId(*o)).collect(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::End { .. })
    }
}
