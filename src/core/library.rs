/// Registries of authored data: the cast and the scene graphs.
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

use crate::schema::character::{Character, CharacterId};
use crate::schema::node::{NodeId, NodeKind};
use crate::schema::scene::{Scene, SceneError, SceneId};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("scene {0} is defined more than once")]
    DuplicateScene(SceneId),
    #[error("character {0} is defined more than once")]
    DuplicateCharacter(CharacterId),
    #[error("node {node} in scene {scene} names unknown character {character}")]
    UnknownCharacter {
        scene: SceneId,
        node: NodeId,
        character: CharacterId,
    },
    #[error("end node {node} in scene {scene} leads to unknown scene {next}")]
    UnknownNextScene {
        scene: SceneId,
        node: NodeId,
        next: SceneId,
    },
}

/// The cast, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct CharacterRegistry {
    characters: FxHashMap<CharacterId, Character>,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, character: Character) -> Result<(), LibraryError> {
        if self.characters.contains_key(&character.id) {
            return Err(LibraryError::DuplicateCharacter(character.id));
        }
        self.characters.insert(character.id, character);
        Ok(())
    }

    pub fn get(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Load characters from a RON file containing a list of definitions.
    pub fn load_from_ron(&mut self, path: &Path) -> Result<(), LibraryError> {
        let contents = std::fs::read_to_string(path)?;
        self.parse_ron(&contents)
    }

    pub fn parse_ron(&mut self, input: &str) -> Result<(), LibraryError> {
        let characters: Vec<Character> = ron::from_str(input)?;
        for character in characters {
            self.register(character)?;
        }
        Ok(())
    }
}

/// Every scene the story can reach. Scenes are shared with the runner
/// while they are current.
#[derive(Debug, Clone, Default)]
pub struct SceneLibrary {
    scenes: FxHashMap<SceneId, Rc<Scene>>,
}

impl SceneLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scene after checking its structure.
    pub fn insert(&mut self, scene: Scene) -> Result<(), LibraryError> {
        scene.validate()?;
        if self.scenes.contains_key(&scene.id) {
            return Err(LibraryError::DuplicateScene(scene.id));
        }
        self.scenes.insert(scene.id, Rc::new(scene));
        Ok(())
    }

    pub fn get(&self, id: SceneId) -> Option<Rc<Scene>> {
        self.scenes.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Scene ids in ascending order.
    pub fn ids(&self) -> Vec<SceneId> {
        let mut ids: Vec<SceneId> = self.scenes.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Total node count across all scenes.
    pub fn node_count(&self) -> usize {
        self.scenes.values().map(|s| s.len()).sum()
    }

    pub fn load_from_ron(&mut self, path: &Path) -> Result<(), LibraryError> {
        let scene = Scene::load_from_ron(path)?;
        self.insert(scene)
    }

    /// Load every `.ron` file in `dir` as a scene.
    pub fn load_dir(&mut self, dir: &Path) -> Result<(), LibraryError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                paths.push(path);
            }
        }
        paths.sort();
        for path in paths {
            self.load_from_ron(&path)?;
        }
        Ok(())
    }

    /// Check links that cross scene boundaries: speakers and staged
    /// characters must exist, and end nodes must lead to known scenes.
    pub fn validate_links(&self, characters: &CharacterRegistry) -> Result<(), LibraryError> {
        match self.link_issues(characters).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn link_issues(&self, characters: &CharacterRegistry) -> Vec<LibraryError> {
        let mut issues = Vec::new();
        for id in self.ids() {
            let Some(scene) = self.scenes.get(&id) else {
                continue;
            };
            for node in scene.nodes() {
                let character = match &node.kind {
                    NodeKind::Dialogue {
                        speaker: Some(c), ..
                    } => Some(*c),
                    NodeKind::Character { character, .. } => Some(*character),
                    NodeKind::End {
                        next_scene: Some(next),
                    } => {
                        if !self.scenes.contains_key(next) {
                            issues.push(LibraryError::UnknownNextScene {
                                scene: id,
                                node: node.id,
                                next: *next,
                            });
                        }
                        None
                    }
                    _ => None,
                };
                if let Some(character) = character {
                    if characters.get(character).is_none() {
                        issues.push(LibraryError::UnknownCharacter {
                            scene: id,
                            node: node.id,
                            character,
                        });
                    }
                }
            }
        }
        issues
    }

    /// A node that starts a chain which never waits for the player:
    /// effect nodes and scene hops leading back to a node already passed.
    /// Playback would halt there with an effect cycle.
    pub fn effect_cycle(&self) -> Option<(SceneId, NodeId)> {
        for id in self.ids() {
            let Some(scene) = self.scenes.get(&id) else {
                continue;
            };
            for node in scene.nodes() {
                if let Some(found) = self.cycle_from(id, node.id) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn cycle_from(&self, scene: SceneId, node: NodeId) -> Option<(SceneId, NodeId)> {
        let mut seen = FxHashSet::default();
        let mut at = (scene, node);
        loop {
            if !seen.insert(at) {
                return Some(at);
            }
            let node = self.scenes.get(&at.0)?.node(at.1)?;
            at = match &node.kind {
                NodeKind::End {
                    next_scene: Some(next),
                } => (*next, self.scenes.get(next)?.start()?.id),
                kind if kind.is_effect() => (at.0, *node.outputs.first()?),
                _ => return None,
            };
        }
    }
}
