//! WASM bindings for novel-engine: powers the in-browser demo player.

use std::time::Duration;
use wasm_bindgen::prelude::*;

use novel_engine::core::input::InputOutcome;
use novel_engine::core::library::{CharacterRegistry, SceneLibrary};
use novel_engine::core::settings::PlaybackSettings;
use novel_engine::schema::scene::Scene;
use novel_engine::{EventBuffer, RunnerStatus, SceneRunner};

// ---------------------------------------------------------------------------
// Embedded demo story, compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const CHARACTERS: &str = include_str!("../../story_data/demo/characters.ron");
    pub const SETTINGS: &str = include_str!("../../story_data/demo/settings.ron");
    pub const SCENES: &[&str] = &[
        include_str!("../../story_data/demo/scenes/01_rooftop.ron"),
        include_str!("../../story_data/demo/scenes/02_street.ron"),
    ];
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct Snapshot {
    status: &'static str,
    scene: Option<u32>,
    node: Option<u32>,
    kind: Option<&'static str>,
    speaker: Option<String>,
    visible_text: String,
    typing: bool,
    input_allowed: bool,
    auto_advance: bool,
    choices: Vec<String>,
}

fn status_label(status: RunnerStatus) -> &'static str {
    match status {
        RunnerStatus::Idle => "idle",
        RunnerStatus::Running => "running",
        RunnerStatus::Complete => "complete",
        RunnerStatus::Halted => "halted",
    }
}

fn outcome_label(outcome: InputOutcome) -> &'static str {
    match outcome {
        InputOutcome::Skipped => "skipped",
        InputOutcome::Advanced => "advanced",
        InputOutcome::AutoToggled(_) => "auto_toggled",
        InputOutcome::BoxToggled(_) => "box_toggled",
        InputOutcome::Ignored => "ignored",
    }
}

fn build_runner(host: &EventBuffer) -> Result<SceneRunner, JsError> {
    let mut characters = CharacterRegistry::new();
    characters
        .parse_ron(data::CHARACTERS)
        .map_err(|e| JsError::new(&format!("Character parse error: {e}")))?;

    let mut scenes = SceneLibrary::new();
    for source in data::SCENES {
        let scene =
            Scene::parse_ron(source).map_err(|e| JsError::new(&format!("Scene parse error: {e}")))?;
        scenes
            .insert(scene)
            .map_err(|e| JsError::new(&format!("Scene error: {e}")))?;
    }

    let settings = PlaybackSettings::parse_ron(data::SETTINGS)
        .map_err(|e| JsError::new(&format!("Settings parse error: {e}")))?;

    SceneRunner::builder()
        .with_characters(characters)
        .with_scenes(scenes)
        .with_settings(settings)
        .host(host.clone())
        .build()
        .map_err(|e| JsError::new(&format!("Runner build error: {e}")))
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// The demo story, driven by the page's animation frame. Every host call
/// is buffered and handed to JavaScript by [`NovelPlayer::drain_events`].
#[wasm_bindgen]
pub struct NovelPlayer {
    runner: SceneRunner,
    host: EventBuffer,
}

#[wasm_bindgen]
impl NovelPlayer {
    /// Load the embedded story and enter its first scene.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<NovelPlayer, JsError> {
        let host = EventBuffer::new();
        let mut runner = build_runner(&host)?;
        runner
            .start()
            .map_err(|e| JsError::new(&format!("Start error: {e}")))?;
        Ok(NovelPlayer { runner, host })
    }

    /// Advance time by `dt_ms` milliseconds.
    pub fn update(&mut self, dt_ms: f64) -> Result<(), JsError> {
        let dt = Duration::try_from_secs_f64(dt_ms.max(0.0) / 1000.0)
            .map_err(|e| JsError::new(&format!("Invalid frame time: {e}")))?;
        self.runner
            .update(dt)
            .map_err(|e| JsError::new(&format!("Playback error: {e}")))
    }

    /// Skip the reveal, or move on. Returns what happened.
    pub fn proceed(&mut self) -> Result<String, JsError> {
        let outcome = self
            .runner
            .proceed()
            .map_err(|e| JsError::new(&format!("Playback error: {e}")))?;
        Ok(outcome_label(outcome).to_string())
    }

    pub fn choose(&mut self, index: usize) -> Result<(), JsError> {
        self.runner
            .choose(index)
            .map_err(|e| JsError::new(&format!("Choice error: {e}")))
    }

    pub fn toggle_auto(&mut self) -> bool {
        self.runner.toggle_auto()
    }

    pub fn toggle_dialogue_box(&mut self) -> bool {
        self.runner.toggle_dialogue_box()
    }

    pub fn set_text_speed(&mut self, speed: f32) {
        self.runner.set_text_speed(speed);
    }

    pub fn set_auto_speed(&mut self, speed: f32) {
        self.runner.set_auto_speed(speed);
    }

    /// Host events since the last call, as a JSON array.
    ///
    /// Example element:
    /// ```json
    /// { "type": "log_line", "speaker": "Aoi", "sprite": null, "text": "..." }
    /// ```
    pub fn drain_events(&mut self) -> Result<String, JsError> {
        serde_json::to_string(&self.host.drain())
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Current playback state as JSON.
    pub fn snapshot(&self) -> Result<String, JsError> {
        let node = self.runner.current_node();
        let snapshot = Snapshot {
            status: status_label(self.runner.status()),
            scene: self.runner.scene_id().map(|s| s.0),
            node: node.map(|n| n.id.0),
            kind: node.map(|n| n.kind.name()),
            speaker: self.runner.speaker().map(str::to_string),
            visible_text: self.runner.visible_text().to_string(),
            typing: self.runner.is_typing(),
            input_allowed: self.runner.input_allowed(),
            auto_advance: self.runner.auto_enabled(),
            choices: self.runner.pending_choices().map(<[String]>::to_vec).unwrap_or_default(),
        };
        serde_json::to_string(&snapshot)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Start the story over with a fresh runner.
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.host.drain();
        let mut runner = build_runner(&self.host)?;
        runner
            .start()
            .map_err(|e| JsError::new(&format!("Start error: {e}")))?;
        self.runner = runner;
        Ok(())
    }
}
