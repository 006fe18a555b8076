/// Scene traversal: walks the node graph, asks the host for effects and
/// drives the typewriter and auto-advance timers.
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::core::auto_advance::AutoAdvance;
use crate::core::clock::{ManualClock, PlaybackClock, TimerEvent};
use crate::core::host::{
    ChoicePresenter, DialogueDisplay, DialogueLog, NullHost, Presentation, SceneCompleteHandler,
};
use crate::core::input::{InputAction, InputGate, InputOutcome};
use crate::core::library::{CharacterRegistry, LibraryError, SceneLibrary};
use crate::core::settings::{PlaybackSettings, SettingsError};
use crate::core::typewriter::{char_delay, TickOutcome, Typewriter};
use crate::schema::character::CharacterId;
use crate::schema::node::{Node, NodeId, NodeKind};
use crate::schema::scene::{Scene, SceneId};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("node {node} references missing node {target}")]
    DanglingReference { node: NodeId, target: NodeId },
    #[error("invalid choice {choice:?} at node {node} ({available} options)")]
    InvalidChoice {
        node: NodeId,
        choice: Option<usize>,
        available: usize,
    },
    #[error("dialogue node {0} has no speaking character")]
    MissingSpeaker(NodeId),
    #[error("dialogue node {node} names unknown character {character}")]
    UnknownCharacter { node: NodeId, character: CharacterId },
    #[error("unknown scene: {0}")]
    UnknownScene(SceneId),
    #[error("scene {0} has no nodes")]
    EmptyScene(SceneId),
    #[error("{kind} node {node} has {found} outputs, expected exactly one")]
    OutputArity {
        node: NodeId,
        kind: &'static str,
        found: usize,
    },
    #[error("effect nodes in scene {0} loop without reaching dialogue, branch or end")]
    EffectCycle(SceneId),
    #[error("no scene is loaded")]
    NoScene,
    #[error("traversal is not running ({0:?})")]
    NotRunning(RunnerStatus),
    #[error("library error: {0}")]
    Library(#[from] LibraryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl RunnerError {
    /// Fatal errors mean the story data is malformed. They halt traversal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InvalidChoice { .. } | Self::NotRunning(_) | Self::NoScene
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    /// No scene loaded yet.
    Idle,
    Running,
    /// Reached an end node without a following scene.
    Complete,
    /// Stopped by a fatal error.
    Halted,
}

enum Flow {
    Continue,
    Wait,
    Enter(SceneId),
}

/// The scene traversal state machine.
///
/// Owns the current node pointer, the input gate, and both playback
/// records. Single-threaded: the host drives time through [`update`].
///
/// [`update`]: SceneRunner::update
pub struct SceneRunner<C: PlaybackClock = ManualClock> {
    clock: C,
    scenes: SceneLibrary,
    characters: CharacterRegistry,
    start_scene: Option<SceneId>,
    presentation: Box<dyn Presentation>,
    display: Box<dyn DialogueDisplay>,
    choices: Box<dyn ChoicePresenter>,
    log: Box<dyn DialogueLog>,
    completion: Box<dyn SceneCompleteHandler>,
    scene: Option<Rc<Scene>>,
    current: Option<NodeId>,
    status: RunnerStatus,
    gate: InputGate,
    typewriter: Typewriter,
    auto: AutoAdvance,
    text_speed: f32,
    text_unit: Duration,
    // Characters on stage and the sprite each is wearing.
    stage: FxHashMap<CharacterId, Option<String>>,
    speaker: Option<String>,
    box_visible: bool,
    // Set while the player has hidden the box: the gate state to restore.
    hidden_gate: Option<bool>,
}

impl SceneRunner<ManualClock> {
    pub fn builder() -> SceneRunnerBuilder<ManualClock> {
        SceneRunnerBuilder::new(ManualClock::new())
    }
}

impl<C: PlaybackClock> SceneRunner<C> {
    /// Load the configured start scene, or the lowest scene id.
    pub fn start(&mut self) -> Result<(), RunnerError> {
        let id = self
            .start_scene
            .or_else(|| self.scenes.ids().first().copied())
            .ok_or(RunnerError::NoScene)?;
        self.load_scene_by_id(id)
    }

    pub fn load_scene_by_id(&mut self, id: SceneId) -> Result<(), RunnerError> {
        let scene = self.scenes.get(id).ok_or(RunnerError::UnknownScene(id))?;
        self.load_scene(scene)
    }

    /// Make `scene` current and process its start node. Outstanding
    /// timers from the previous scene are cancelled first.
    #[instrument(skip_all, fields(scene = %scene.id))]
    pub fn load_scene(&mut self, scene: Rc<Scene>) -> Result<(), RunnerError> {
        let start = self.enter_scene(&scene)?;
        self.run_from(scene, start)
    }

    /// Move to the next node. `choice` selects the output of a branch
    /// node and is ignored elsewhere.
    ///
    /// An invalid choice leaves traversal where it is. Malformed graph
    /// errors halt it.
    pub fn advance(&mut self, choice: Option<usize>) -> Result<(), RunnerError> {
        self.ensure_running()?;
        let scene = self.scene.clone().ok_or(RunnerError::NoScene)?;
        let current = self.current.ok_or(RunnerError::NoScene)?;
        let node = scene.node(current).ok_or(RunnerError::NoScene)?;
        let next = self.resolve_next(&scene, node, choice)?;
        self.leave_current();
        self.run_from(scene, next)
    }

    /// Pick a branch option.
    pub fn choose(&mut self, index: usize) -> Result<(), RunnerError> {
        if !self.awaiting_choice() {
            return Err(RunnerError::InvalidChoice {
                node: self.current.ok_or(RunnerError::NoScene)?,
                choice: Some(index),
                available: 0,
            });
        }
        self.advance(Some(index))
    }

    /// The player's "next" key: finish the line if it is still typing,
    /// otherwise move on if the gate allows it.
    pub fn proceed(&mut self) -> Result<InputOutcome, RunnerError> {
        if self.skip_reveal() {
            return Ok(InputOutcome::Skipped);
        }
        if !self.gate.is_open() || self.status != RunnerStatus::Running {
            debug!(node = ?self.current, "proceed ignored, input gate closed");
            return Ok(InputOutcome::Ignored);
        }
        self.advance(None)?;
        Ok(InputOutcome::Advanced)
    }

    /// Show the rest of the current line now. Does nothing, and returns
    /// false, when no line is typing.
    pub fn skip_reveal(&mut self) -> bool {
        if !self.typewriter.skip_reveal(&mut self.clock) {
            return false;
        }
        self.display.show_dialogue_text(self.typewriter.visible_text());
        true
    }

    pub fn handle_input(&mut self, action: InputAction) -> Result<InputOutcome, RunnerError> {
        match action {
            InputAction::Proceed => self.proceed(),
            InputAction::Choose(index) => {
                if !self.awaiting_choice() {
                    return Ok(InputOutcome::Ignored);
                }
                self.choose(index)?;
                Ok(InputOutcome::Advanced)
            }
            InputAction::ToggleAuto => Ok(InputOutcome::AutoToggled(self.toggle_auto())),
            InputAction::ToggleDialogueBox => {
                Ok(InputOutcome::BoxToggled(self.toggle_dialogue_box()))
            }
        }
    }

    /// Turn auto-advance on or off. Turning it on while a finished line is
    /// showing starts the pause right away.
    pub fn set_auto_advance(&mut self, enabled: bool) {
        info!(enabled, "auto-advance toggled");
        self.auto.set_enabled(enabled, &mut self.clock);
        if enabled {
            self.start_auto();
        }
    }

    /// Returns the new state.
    pub fn toggle_auto(&mut self) -> bool {
        let enabled = !self.auto.is_enabled();
        self.set_auto_advance(enabled);
        enabled
    }

    /// The player hides or shows the dialogue box. Proceeding is blocked
    /// while it is hidden. Returns whether the box is now shown.
    pub fn toggle_dialogue_box(&mut self) -> bool {
        match self.hidden_gate.take() {
            None => {
                self.hidden_gate = Some(self.gate.is_open());
                self.gate.close();
                self.display.set_dialogue_box_visible(false);
                false
            }
            Some(was_open) => {
                if was_open {
                    self.gate.open();
                }
                self.display.set_dialogue_box_visible(self.box_visible);
                self.display
                    .show_speaker_name(self.speaker.as_deref().unwrap_or(""));
                self.display.show_dialogue_text(self.typewriter.visible_text());
                true
            }
        }
    }

    pub fn set_text_speed(&mut self, speed: f32) {
        self.text_speed = speed.clamp(0.0, 1.0);
        self.typewriter
            .set_delay(char_delay(self.text_speed, self.text_unit));
    }

    pub fn set_auto_speed(&mut self, speed: f32) {
        self.auto.set_speed(speed);
    }

    /// Move time forward by `dt`, firing every timer that comes due on
    /// the way, in deadline order.
    pub fn update(&mut self, dt: Duration) -> Result<(), RunnerError> {
        let target = self.clock.now().saturating_add(dt);
        while let Some(deadline) = self.clock.next_deadline() {
            if deadline > target {
                break;
            }
            self.clock.advance_to(deadline);
            while let Some(event) = self.clock.pop_due() {
                self.on_timer(event)?;
            }
        }
        self.clock.advance_to(target);
        Ok(())
    }

    pub fn status(&self) -> RunnerStatus {
        self.status
    }

    pub fn scene_id(&self) -> Option<SceneId> {
        self.scene.as_ref().map(|s| s.id)
    }

    pub fn current_node_id(&self) -> Option<NodeId> {
        self.current
    }

    pub fn current_node(&self) -> Option<&Node> {
        let scene = self.scene.as_ref()?;
        scene.node(self.current?)
    }

    /// Labels of the branch being shown, if any.
    pub fn pending_choices(&self) -> Option<&[String]> {
        if self.status != RunnerStatus::Running {
            return None;
        }
        match self.current_node().map(|n| &n.kind) {
            Some(NodeKind::Branch { choices }) => Some(choices.as_slice()),
            _ => None,
        }
    }

    pub fn awaiting_choice(&self) -> bool {
        self.pending_choices().is_some()
    }

    pub fn input_allowed(&self) -> bool {
        self.gate.is_open()
    }

    /// Skipping is allowed whenever a line is typing, gate or not.
    pub fn can_skip(&self) -> bool {
        self.typewriter.is_typing()
    }

    pub fn is_typing(&self) -> bool {
        self.typewriter.is_typing()
    }

    pub fn visible_text(&self) -> &str {
        self.typewriter.visible_text()
    }

    pub fn speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }

    pub fn auto_enabled(&self) -> bool {
        self.auto.is_enabled()
    }

    pub fn auto_pending(&self) -> bool {
        self.auto.is_pending()
    }

    pub fn text_speed(&self) -> f32 {
        self.text_speed
    }

    pub fn auto_speed(&self) -> f32 {
        self.auto.speed()
    }

    pub fn on_stage(&self, character: CharacterId) -> bool {
        self.stage.contains_key(&character)
    }

    pub fn stage_sprite(&self, character: CharacterId) -> Option<&str> {
        self.stage.get(&character).and_then(|s| s.as_deref())
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn scenes(&self) -> &SceneLibrary {
        &self.scenes
    }

    pub fn characters(&self) -> &CharacterRegistry {
        &self.characters
    }

    fn ensure_running(&self) -> Result<(), RunnerError> {
        match self.status {
            RunnerStatus::Running => Ok(()),
            status => Err(RunnerError::NotRunning(status)),
        }
    }

    fn enter_scene(&mut self, scene: &Rc<Scene>) -> Result<NodeId, RunnerError> {
        self.typewriter.stop(&mut self.clock);
        self.auto.cancel(&mut self.clock);
        self.scene = Some(Rc::clone(scene));
        self.current = None;
        self.close_gate();
        let Some(start) = scene.start() else {
            return Err(self.halt(RunnerError::EmptyScene(scene.id)));
        };
        info!(scene = %scene.id, name = %scene.name, "entering scene");
        self.status = RunnerStatus::Running;
        Ok(start.id)
    }

    // Effect nodes chain without waiting. The loop stops at a node that
    // waits for the player or the host, or halts if it never finds one.
    fn run_from(&mut self, scene: Rc<Scene>, start: NodeId) -> Result<(), RunnerError> {
        let mut scene = scene;
        let mut next = start;
        let limit = self.scenes.node_count() + scene.len() + 1;
        let mut steps = 0usize;

        loop {
            steps += 1;
            if steps > limit {
                return Err(self.halt(RunnerError::EffectCycle(scene.id)));
            }
            let Some(node) = scene.node(next) else {
                let source = self.current.unwrap_or(next);
                return Err(self.halt(RunnerError::DanglingReference {
                    node: source,
                    target: next,
                }));
            };

            self.current = Some(node.id);
            self.close_gate();
            debug!(scene = %scene.id, node = %node.id, kind = node.kind.name(), "dispatching node");

            match self.dispatch(&scene, node)? {
                Flow::Wait => return Ok(()),
                Flow::Continue => next = self.resolve_next(&scene, node, None)?,
                Flow::Enter(id) => {
                    let Some(following) = self.scenes.get(id) else {
                        return Err(self.halt(RunnerError::UnknownScene(id)));
                    };
                    next = self.enter_scene(&following)?;
                    scene = following;
                }
            }
        }
    }

    fn resolve_next(
        &mut self,
        scene: &Scene,
        node: &Node,
        choice: Option<usize>,
    ) -> Result<NodeId, RunnerError> {
        let target = match &node.kind {
            NodeKind::Branch { .. } => match choice.and_then(|i| node.outputs.get(i)) {
                Some(target) => *target,
                None => {
                    warn!(node = %node.id, ?choice, "invalid branch choice");
                    return Err(RunnerError::InvalidChoice {
                        node: node.id,
                        choice,
                        available: node.outputs.len(),
                    });
                }
            },
            _ => match node.outputs.as_slice() {
                [only] => *only,
                outputs => {
                    return Err(self.halt(RunnerError::OutputArity {
                        node: node.id,
                        kind: node.kind.name(),
                        found: outputs.len(),
                    }))
                }
            },
        };

        if scene.node(target).is_none() {
            return Err(self.halt(RunnerError::DanglingReference {
                node: node.id,
                target,
            }));
        }
        Ok(target)
    }

    fn dispatch(&mut self, scene: &Scene, node: &Node) -> Result<Flow, RunnerError> {
        match &node.kind {
            NodeKind::Start => Ok(Flow::Continue),
            NodeKind::Background { image } => {
                self.presentation.set_background(image);
                Ok(Flow::Continue)
            }
            NodeKind::Bgm { track } => {
                self.presentation.set_bgm(track);
                Ok(Flow::Continue)
            }
            NodeKind::Sfx { clip } => {
                self.presentation.play_sfx(clip);
                Ok(Flow::Continue)
            }
            NodeKind::Character {
                character,
                show,
                sprite,
            } => {
                self.stage_character(*character, *show, sprite.as_deref());
                Ok(Flow::Continue)
            }
            NodeKind::DialogueBox { visible } => {
                self.set_dialogue_box(*visible);
                Ok(Flow::Continue)
            }
            NodeKind::Dialogue {
                speaker,
                text,
                sprite,
            } => {
                self.enter_dialogue(node.id, *speaker, text, sprite.as_deref())?;
                Ok(Flow::Wait)
            }
            NodeKind::Branch { choices } => {
                self.choices.present_choices(choices);
                Ok(Flow::Wait)
            }
            NodeKind::End {
                next_scene: Some(next),
            } => Ok(Flow::Enter(*next)),
            NodeKind::End { next_scene: None } => {
                info!(scene = %scene.id, "scene complete");
                self.status = RunnerStatus::Complete;
                self.completion.on_scene_complete(scene.id);
                Ok(Flow::Wait)
            }
        }
    }

    fn stage_character(&mut self, character: CharacterId, show: bool, sprite: Option<&str>) {
        self.presentation.update_character(character, show);
        if !show {
            self.stage.remove(&character);
            return;
        }
        let sprite = sprite.map(str::to_string).or_else(|| {
            self.characters
                .get(character)
                .and_then(|c| c.default_sprite.clone())
        });
        if let Some(sprite) = &sprite {
            self.presentation.set_sprite(character, sprite);
        }
        self.stage.insert(character, sprite);
    }

    // Authored box toggles always start from an empty box. While the
    // player has the box hidden, the new state waits for their toggle.
    fn set_dialogue_box(&mut self, visible: bool) {
        self.typewriter.clear(&mut self.clock);
        self.speaker = None;
        self.display.show_speaker_name("");
        self.display.show_dialogue_text("");
        self.box_visible = visible;
        if self.hidden_gate.is_none() {
            self.display.set_dialogue_box_visible(visible);
        }
    }

    fn enter_dialogue(
        &mut self,
        node: NodeId,
        speaker: Option<CharacterId>,
        text: &str,
        sprite: Option<&str>,
    ) -> Result<(), RunnerError> {
        let Some(speaker) = speaker else {
            return Err(self.halt(RunnerError::MissingSpeaker(node)));
        };
        let Some(name) = self.characters.get(speaker).map(|c| c.name.clone()) else {
            return Err(self.halt(RunnerError::UnknownCharacter {
                node,
                character: speaker,
            }));
        };

        self.open_gate();
        self.display.show_speaker_name(&name);

        let staged = self.stage.get(&speaker).cloned();
        let shown_sprite = match (sprite, &staged) {
            (Some(sprite), Some(_)) => {
                self.presentation.set_sprite(speaker, sprite);
                self.stage.insert(speaker, Some(sprite.to_string()));
                Some(sprite.to_string())
            }
            (Some(sprite), None) => {
                warn!(node = %node, character = %speaker, sprite, "sprite override for a character that is not on stage");
                Some(sprite.to_string())
            }
            (None, Some(current)) => current.clone(),
            (None, None) => None,
        };
        if staged.is_some() {
            self.presentation.highlight_speaker(speaker);
        }

        self.log.log_dialogue_line(&name, shown_sprite.as_deref(), text);
        self.speaker = Some(name);
        self.typewriter.start_reveal(text, &mut self.clock);
        self.display.show_dialogue_text("");
        Ok(())
    }

    fn on_timer(&mut self, event: TimerEvent) -> Result<(), RunnerError> {
        match event {
            TimerEvent::TypewriterTick { generation } => {
                match self.typewriter.tick(generation, &mut self.clock) {
                    TickOutcome::Stale => debug!(generation, "dropping stale typewriter tick"),
                    TickOutcome::Revealed => {
                        self.display.show_dialogue_text(self.typewriter.visible_text())
                    }
                    TickOutcome::Finished => {
                        self.display.show_dialogue_text(self.typewriter.visible_text());
                        self.start_auto();
                    }
                }
                Ok(())
            }
            TimerEvent::AutoAdvance { generation } => {
                // The flag is re-read here: auto-play may have been turned
                // off after this timer came due.
                if !self.auto.fire(generation) {
                    debug!(generation, "dropping stale auto-advance");
                    return Ok(());
                }
                if self.status != RunnerStatus::Running
                    || !self.at_dialogue()
                    || self.typewriter.is_typing()
                {
                    return Ok(());
                }
                debug!(node = ?self.current, "auto-advancing");
                self.advance(None)
            }
        }
    }

    fn start_auto(&mut self) -> bool {
        let at_dialogue = self.status == RunnerStatus::Running && self.at_dialogue();
        self.auto.maybe_start(
            at_dialogue,
            self.typewriter.is_typing(),
            self.typewriter.visible_len(),
            &mut self.clock,
        )
    }

    fn at_dialogue(&self) -> bool {
        matches!(
            self.current_node().map(|n| &n.kind),
            Some(NodeKind::Dialogue { .. })
        )
    }

    fn leave_current(&mut self) {
        self.auto.cancel(&mut self.clock);
        if self.typewriter.is_typing() {
            self.typewriter.stop(&mut self.clock);
        }
    }

    fn open_gate(&mut self) {
        match &mut self.hidden_gate {
            Some(saved) => *saved = true,
            None => self.gate.open(),
        }
    }

    fn close_gate(&mut self) {
        if let Some(saved) = &mut self.hidden_gate {
            *saved = false;
        }
        self.gate.close();
    }

    fn halt(&mut self, err: RunnerError) -> RunnerError {
        error!(error = %err, node = ?self.current, "halting traversal");
        self.typewriter.stop(&mut self.clock);
        self.auto.cancel(&mut self.clock);
        self.close_gate();
        self.status = RunnerStatus::Halted;
        err
    }
}

/// Builder for [`SceneRunner`]. Story data can come from files or be
/// handed over directly.
pub struct SceneRunnerBuilder<C: PlaybackClock> {
    clock: C,
    scenes_dir: Option<PathBuf>,
    characters_path: Option<PathBuf>,
    settings_path: Option<PathBuf>,
    start_scene: Option<SceneId>,
    /// Directly provided scenes (for testing without files).
    scenes: Option<SceneLibrary>,
    /// Directly provided cast (for testing without files).
    characters: Option<CharacterRegistry>,
    /// Directly provided settings. A settings file takes precedence.
    settings: Option<PlaybackSettings>,
    presentation: Option<Box<dyn Presentation>>,
    display: Option<Box<dyn DialogueDisplay>>,
    choices: Option<Box<dyn ChoicePresenter>>,
    log: Option<Box<dyn DialogueLog>>,
    completion: Option<Box<dyn SceneCompleteHandler>>,
}

impl<C: PlaybackClock> SceneRunnerBuilder<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            scenes_dir: None,
            characters_path: None,
            settings_path: None,
            start_scene: None,
            scenes: None,
            characters: None,
            settings: None,
            presentation: None,
            display: None,
            choices: None,
            log: None,
            completion: None,
        }
    }

    /// Swap the time source.
    pub fn clock<D: PlaybackClock>(self, clock: D) -> SceneRunnerBuilder<D> {
        SceneRunnerBuilder {
            clock,
            scenes_dir: self.scenes_dir,
            characters_path: self.characters_path,
            settings_path: self.settings_path,
            start_scene: self.start_scene,
            scenes: self.scenes,
            characters: self.characters,
            settings: self.settings,
            presentation: self.presentation,
            display: self.display,
            choices: self.choices,
            log: self.log,
            completion: self.completion,
        }
    }

    /// Use the standard story layout: `characters.ron`, `settings.ron`
    /// and a `scenes/` directory.
    pub fn story_dir(self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.scenes_dir(dir.join("scenes"))
            .characters_file(dir.join("characters.ron"))
            .settings_file(dir.join("settings.ron"))
    }

    pub fn scenes_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.scenes_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn characters_file(mut self, path: impl AsRef<Path>) -> Self {
        self.characters_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn settings_file(mut self, path: impl AsRef<Path>) -> Self {
        self.settings_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn start_scene(mut self, id: SceneId) -> Self {
        self.start_scene = Some(id);
        self
    }

    pub fn with_scenes(mut self, scenes: SceneLibrary) -> Self {
        self.scenes = Some(scenes);
        self
    }

    pub fn with_characters(mut self, characters: CharacterRegistry) -> Self {
        self.characters = Some(characters);
        self
    }

    pub fn with_settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Use one host for every capability. Each slot gets its own clone.
    pub fn host<H>(self, host: H) -> Self
    where
        H: Presentation
            + DialogueDisplay
            + ChoicePresenter
            + DialogueLog
            + SceneCompleteHandler
            + Clone
            + 'static,
    {
        self.presentation(host.clone())
            .dialogue_display(host.clone())
            .choice_presenter(host.clone())
            .dialogue_log(host.clone())
            .scene_complete(host)
    }

    pub fn presentation(mut self, presentation: impl Presentation + 'static) -> Self {
        self.presentation = Some(Box::new(presentation));
        self
    }

    pub fn dialogue_display(mut self, display: impl DialogueDisplay + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    pub fn choice_presenter(mut self, choices: impl ChoicePresenter + 'static) -> Self {
        self.choices = Some(Box::new(choices));
        self
    }

    pub fn dialogue_log(mut self, log: impl DialogueLog + 'static) -> Self {
        self.log = Some(Box::new(log));
        self
    }

    pub fn scene_complete(mut self, completion: impl SceneCompleteHandler + 'static) -> Self {
        self.completion = Some(Box::new(completion));
        self
    }

    pub fn build(self) -> Result<SceneRunner<C>, RunnerError> {
        let mut scenes = self.scenes.unwrap_or_default();
        let mut characters = self.characters.unwrap_or_default();

        if let Some(ref path) = self.characters_path {
            if path.exists() {
                characters.load_from_ron(path)?;
            }
        }

        if let Some(ref dir) = self.scenes_dir {
            if dir.exists() {
                scenes.load_dir(dir)?;
            }
        }

        let settings = match (&self.settings_path, self.settings) {
            (Some(path), _) if path.exists() => PlaybackSettings::load_from_ron(path)?,
            (_, Some(settings)) => {
                settings.validate()?;
                settings
            }
            _ => PlaybackSettings::default(),
        };

        scenes.validate_links(&characters)?;
        if let Some(id) = self.start_scene {
            if scenes.get(id).is_none() {
                return Err(RunnerError::UnknownScene(id));
            }
        }

        let text_unit = settings.text_unit()?;
        let auto_unit = settings.auto_unit()?;

        Ok(SceneRunner {
            clock: self.clock,
            scenes,
            characters,
            start_scene: self.start_scene,
            presentation: self.presentation.unwrap_or_else(|| Box::new(NullHost)),
            display: self.display.unwrap_or_else(|| Box::new(NullHost)),
            choices: self.choices.unwrap_or_else(|| Box::new(NullHost)),
            log: self.log.unwrap_or_else(|| Box::new(NullHost)),
            completion: self.completion.unwrap_or_else(|| Box::new(NullHost)),
            scene: None,
            current: None,
            status: RunnerStatus::Idle,
            gate: InputGate::default(),
            typewriter: Typewriter::new(char_delay(settings.text_speed, text_unit)),
            auto: AutoAdvance::new(settings.auto_advance, settings.auto_speed, auto_unit),
            text_speed: settings.text_speed,
            text_unit,
            stage: FxHashMap::default(),
            speaker: None,
            box_visible: true,
            hidden_gate: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::character::Character;

    fn one_line_runner() -> SceneRunner {
        let mut cast = CharacterRegistry::new();
        cast.register(Character::new(1, "Aoi")).unwrap();
        let mut scenes = SceneLibrary::new();
        scenes
            .insert(Scene::new(
                SceneId(1),
                "solo",
                vec![
                    Node::new(
                        0,
                        NodeKind::Dialogue {
                            speaker: Some(CharacterId(1)),
                            text: "Hi".to_string(),
                            sprite: None,
                        },
                        &[1],
                    ),
                    Node::new(1, NodeKind::End { next_scene: None }, &[]),
                ],
            ))
            .unwrap();
        SceneRunner::builder()
            .with_characters(cast)
            .with_scenes(scenes)
            .build()
            .unwrap()
    }

    #[test]
    fn fatal_classification() {
        assert!(RunnerError::EffectCycle(SceneId(1)).is_fatal());
        assert!(RunnerError::MissingSpeaker(NodeId(0)).is_fatal());
        assert!(!RunnerError::NoScene.is_fatal());
        assert!(!RunnerError::InvalidChoice {
            node: NodeId(0),
            choice: None,
            available: 2,
        }
        .is_fatal());
    }

    #[test]
    fn starts_idle_and_closed() {
        let runner = one_line_runner();
        assert_eq!(runner.status(), RunnerStatus::Idle);
        assert!(!runner.input_allowed());
        assert!(runner.current_node().is_none());
    }

    #[test]
    fn runs_without_host() {
        let mut runner = one_line_runner();
        runner.start().unwrap();
        runner.update(Duration::from_secs(1)).unwrap();
        assert_eq!(runner.visible_text(), "Hi");
        assert_eq!(runner.proceed().unwrap(), InputOutcome::Advanced);
        assert_eq!(runner.status(), RunnerStatus::Complete);
    }

    #[test]
    fn leaving_a_line_cancels_timers() {
        let mut runner = one_line_runner();
        runner.start().unwrap();
        assert_eq!(runner.clock().pending(), 1);
        runner.skip_reveal();
        assert_eq!(runner.clock().pending(), 0);
    }
}
