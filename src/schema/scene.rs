/// Scenes: ordered node graphs with a designated start node.
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use super::node::{Arity, Node, NodeId, NodeKind};

/// Newtype wrapper for scene IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub u32);

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene {0} has no nodes")]
    Empty(SceneId),
    #[error("scene {scene} declares node {node} more than once")]
    DuplicateNode { scene: SceneId, node: NodeId },
    #[error("node {node} in scene {scene} references missing node {target}")]
    DanglingReference {
        scene: SceneId,
        node: NodeId,
        target: NodeId,
    },
    #[error("{kind} node {node} in scene {scene} has {found} outputs, expected {expected}")]
    OutputArity {
        scene: SceneId,
        node: NodeId,
        kind: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("branch node {node} in scene {scene} offers no choices")]
    EmptyBranch { scene: SceneId, node: NodeId },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// An immutable graph of nodes. The first node is the start node.
#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    pub id: SceneId,
    pub name: String,
    nodes: Vec<Node>,
    #[serde(skip)]
    index: FxHashMap<NodeId, usize>,
}

// Authored scene files carry only the node list; the id index is built
// on load.
#[derive(Debug, Deserialize)]
#[serde(rename = "Scene")]
struct RonScene {
    id: SceneId,
    #[serde(default)]
    name: String,
    nodes: Vec<Node>,
}

impl Scene {
    /// Build a scene. No validation happens here; see [`Scene::validate`].
    ///
    /// If ids repeat, lookups resolve to the first node with that id.
    pub fn new(id: SceneId, name: &str, nodes: Vec<Node>) -> Self {
        let mut index = FxHashMap::default();
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.id).or_insert(i);
        }
        Self {
            id,
            name: name.to_string(),
            nodes,
            index,
        }
    }

    /// Load a scene from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<Scene, SceneError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a scene from a RON string.
    pub fn parse_ron(input: &str) -> Result<Scene, SceneError> {
        let raw: RonScene = ron::from_str(input)?;
        Ok(Scene::new(raw.id, &raw.name, raw.nodes))
    }

    pub fn start(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fail on the first structural problem.
    pub fn validate(&self) -> Result<(), SceneError> {
        match self.issues().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every structural problem in the scene, in node order.
    pub fn issues(&self) -> Vec<SceneError> {
        let mut issues = Vec::new();
        if self.nodes.is_empty() {
            issues.push(SceneError::Empty(self.id));
            return issues;
        }

        let mut seen = FxHashSet::default();
        for node in &self.nodes {
            if !seen.insert(node.id) {
                issues.push(SceneError::DuplicateNode {
                    scene: self.id,
                    node: node.id,
                });
            }

            let arity = node.kind.arity();
            if let NodeKind::Branch { choices } = &node.kind {
                if choices.is_empty() {
                    issues.push(SceneError::EmptyBranch {
                        scene: self.id,
                        node: node.id,
                    });
                }
            }
            // A choiceless branch is already reported above.
            if !arity.accepts(node.outputs.len()) && arity != Arity::Choices(0) {
                issues.push(SceneError::OutputArity {
                    scene: self.id,
                    node: node.id,
                    kind: node.kind.name(),
                    expected: arity.expected(),
                    found: node.outputs.len(),
                });
            }

            for target in &node.outputs {
                if !self.index.contains_key(target) {
                    issues.push(SceneError::DanglingReference {
                        scene: self.id,
                        node: node.id,
                        target: *target,
                    });
                }
            }
        }
        issues
    }

    /// Nodes reachable from the start node by following outputs.
    pub fn reachable(&self) -> FxHashSet<NodeId> {
        let mut visited = FxHashSet::default();
        let mut stack: Vec<NodeId> = self.start().map(|n| n.id).into_iter().collect();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = self.node(id) {
                stack.extend(node.outputs.iter().copied());
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::character::CharacterId;

    fn line(text: &str) -> NodeKind {
        NodeKind::Dialogue {
            speaker: Some(CharacterId(1)),
            text: text.to_string(),
            sprite: None,
        }
    }

    fn end() -> NodeKind {
        NodeKind::End { next_scene: None }
    }

    #[test]
    fn lookup_by_id() {
        let scene = Scene::new(
            SceneId(1),
            "intro",
            vec![Node::new(10, line("Hi"), &[20]), Node::new(20, end(), &[])],
        );
        assert_eq!(scene.start().map(|n| n.id), Some(NodeId(10)));
        assert_eq!(scene.node(NodeId(20)).map(|n| n.is_terminal()), Some(true));
        assert!(scene.node(NodeId(30)).is_none());
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn empty_scene_rejected() {
        let scene = Scene::new(SceneId(3), "", Vec::new());
        assert!(matches!(scene.validate(), Err(SceneError::Empty(SceneId(3)))));
    }

    #[test]
    fn dangling_reference_reported() {
        let scene = Scene::new(
            SceneId(1),
            "broken",
            vec![Node::new(0, line("Hi"), &[7]), Node::new(1, end(), &[])],
        );
        let issues = scene.issues();
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            issues[0],
            SceneError::DanglingReference {
                node: NodeId(0),
                target: NodeId(7),
                ..
            }
        ));
    }

    #[test]
    fn arity_mismatches_reported() {
        let scene = Scene::new(
            SceneId(1),
            "arity",
            vec![
                Node::new(0, NodeKind::Start, &[1, 2]),
                Node::new(
                    1,
                    NodeKind::Branch {
                        choices: vec!["Yes".to_string(), "No".to_string()],
                    },
                    &[2],
                ),
                Node::new(2, end(), &[0]),
            ],
        );
        let issues = scene.issues();
        let arity_nodes: Vec<NodeId> = issues
            .iter()
            .filter_map(|e| match e {
                SceneError::OutputArity { node, .. } => Some(*node),
                _ => None,
            })
            .collect();
        assert_eq!(arity_nodes, vec![NodeId(0), NodeId(1), NodeId(2)]);
    }

    #[test]
    fn duplicate_and_empty_branch_reported() {
        let scene = Scene::new(
            SceneId(2),
            "dupes",
            vec![
                Node::new(0, NodeKind::Branch { choices: vec![] }, &[]),
                Node::new(0, end(), &[]),
            ],
        );
        let issues = scene.issues();
        assert!(issues
            .iter()
            .any(|e| matches!(e, SceneError::EmptyBranch { node: NodeId(0), .. })));
        assert!(issues
            .iter()
            .any(|e| matches!(e, SceneError::DuplicateNode { node: NodeId(0), .. })));
    }

    #[test]
    fn reachable_skips_orphans() {
        let scene = Scene::new(
            SceneId(1),
            "orphans",
            vec![
                Node::new(0, NodeKind::Start, &[1]),
                Node::new(1, end(), &[]),
                Node::new(2, line("never said"), &[1]),
            ],
        );
        let reachable = scene.reachable();
        assert!(reachable.contains(&NodeId(0)));
        assert!(reachable.contains(&NodeId(1)));
        assert!(!reachable.contains(&NodeId(2)));
    }

    #[test]
    fn parse_scene_ron() {
        let scene = Scene::parse_ron(
            r#"Scene(
                id: 4,
                name: "Rooftop",
                nodes: [
                    (id: 0, kind: Start, outputs: [1]),
                    (id: 1, kind: Background(image: "rooftop_dusk"), outputs: [2]),
                    (id: 2, kind: End(next_scene: Some(5))),
                ],
            )"#,
        )
        .unwrap();
        assert_eq!(scene.id, SceneId(4));
        assert_eq!(scene.name, "Rooftop");
        assert_eq!(scene.len(), 3);
        assert!(matches!(
            scene.node(NodeId(2)).map(|n| &n.kind),
            Some(NodeKind::End {
                next_scene: Some(SceneId(5))
            })
        ));
        assert!(scene.validate().is_ok());
    }
}
