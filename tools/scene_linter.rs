/// Scene Linter: checks a story directory for broken graphs and links.
///
/// Usage: scene_linter <story_dir>

use novel_engine::core::library::{CharacterRegistry, LibraryError, SceneLibrary};
use novel_engine::core::settings::PlaybackSettings;
use novel_engine::schema::node::NodeKind;
use novel_engine::schema::scene::{Scene, SceneId};
use std::collections::HashSet;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: scene_linter <story_dir>");
        process::exit(0);
    }

    let story_dir = Path::new(&args[1]);
    if !story_dir.is_dir() {
        eprintln!("ERROR: Path '{}' is not a directory", story_dir.display());
        process::exit(1);
    }

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut characters = CharacterRegistry::new();
    let characters_path = story_dir.join("characters.ron");
    if characters_path.exists() {
        if let Err(e) = characters.load_from_ron(&characters_path) {
            errors.push(format!("{}: {}", characters_path.display(), e));
        }
    } else {
        warnings.push("no characters.ron; every dialogue line will fail".to_string());
    }
    println!("Loaded {} characters", characters.len());

    let settings_path = story_dir.join("settings.ron");
    if settings_path.exists() {
        if let Err(e) = PlaybackSettings::load_from_ron(&settings_path) {
            errors.push(format!("{}: {}", settings_path.display(), e));
        }
    }

    let mut library = SceneLibrary::new();
    let mut parsed: HashSet<SceneId> = HashSet::new();
    for path in scene_files(&story_dir.join("scenes")) {
        let scene = match Scene::load_from_ron(&path) {
            Ok(scene) => scene,
            Err(e) => {
                errors.push(format!("{}: {}", path.display(), e));
                continue;
            }
        };
        println!("  Loaded: {} (scene {}, {} nodes)", path.display(), scene.id, scene.len());
        parsed.insert(scene.id);
        lint_scene(&scene, &mut errors, &mut warnings);
        let issues = scene.issues();
        if !issues.is_empty() {
            for issue in issues {
                errors.push(format!("{}: {}", path.display(), issue));
            }
            continue;
        }
        if let Err(e) = library.insert(scene) {
            errors.push(format!("{}: {}", path.display(), e));
        }
    }

    if library.is_empty() {
        errors.push("no playable scenes found".to_string());
    }
    for issue in library.link_issues(&characters) {
        // A scene that failed its own checks already has errors above.
        if let LibraryError::UnknownNextScene { next, .. } = &issue {
            if parsed.contains(next) {
                continue;
            }
        }
        errors.push(issue.to_string());
    }
    if let Some((scene, node)) = library.effect_cycle() {
        errors.push(format!(
            "scene {}: node {} starts a chain of effects and scene changes that never waits",
            scene, node
        ));
    }

    println!("\n=== Scene Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} scenes, {} errors, {} warnings",
        library.len(),
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn scene_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut paths = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                paths.push(path);
            }
        }
    }
    paths.sort();
    paths
}

/// Problems the structural checks let through but playback would trip on.
fn lint_scene(scene: &Scene, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let reachable = scene.reachable();
    for node in scene.nodes() {
        if !reachable.contains(&node.id) {
            warnings.push(format!(
                "scene {}: node {} ({}) is unreachable",
                scene.id,
                node.id,
                node.kind.name()
            ));
        }
        match &node.kind {
            NodeKind::Dialogue { speaker: None, .. } => {
                errors.push(format!(
                    "scene {}: dialogue node {} has no speaker",
                    scene.id, node.id
                ));
            }
            NodeKind::Dialogue { text, .. } if text.trim().is_empty() => {
                warnings.push(format!(
                    "scene {}: dialogue node {} has empty text",
                    scene.id, node.id
                ));
            }
            NodeKind::Branch { choices } => {
                for (i, label) in choices.iter().enumerate() {
                    if label.trim().is_empty() {
                        warnings.push(format!(
                            "scene {}: branch node {} choice {} has an empty label",
                            scene.id, node.id, i
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(start) = scene.start() {
        if !matches!(start.kind, NodeKind::Start) {
            warnings.push(format!(
                "scene {}: first node {} is {}, not Start",
                scene.id,
                start.id,
                start.kind.name()
            ));
        }
    }
}
