/// Host capabilities: everything the runner asks the outside world to do.
///
/// The runner never renders, plays audio or builds UI itself. It calls
/// these traits, and the host decides what each request means.
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

use crate::schema::character::CharacterId;
use crate::schema::scene::SceneId;

/// Stage, background and audio requests.
pub trait Presentation {
    fn set_background(&mut self, image: &str);
    fn set_bgm(&mut self, track: &str);
    fn play_sfx(&mut self, clip: &str);
    fn update_character(&mut self, character: CharacterId, show: bool);
    fn set_sprite(&mut self, character: CharacterId, sprite: &str);
    fn highlight_speaker(&mut self, character: CharacterId);
}

/// The dialogue box.
pub trait DialogueDisplay {
    fn show_speaker_name(&mut self, name: &str);
    /// Called with the whole visible text after every change.
    fn show_dialogue_text(&mut self, text: &str);
    fn set_dialogue_box_visible(&mut self, visible: bool);
}

/// Branch options. The host reports the pick back through
/// `SceneRunner::choose`.
pub trait ChoicePresenter {
    fn present_choices(&mut self, labels: &[String]);
}

/// Backlog of spoken lines. Must not block.
pub trait DialogueLog {
    fn log_dialogue_line(&mut self, speaker: &str, sprite: Option<&str>, text: &str);
}

/// Reached an end node with no following scene.
pub trait SceneCompleteHandler {
    fn on_scene_complete(&mut self, scene: SceneId);
}

/// A single capability call, as recorded by [`EventBuffer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    Background { image: String },
    Bgm { track: String },
    Sfx { clip: String },
    Character { character: CharacterId, show: bool },
    Sprite { character: CharacterId, sprite: String },
    Highlight { character: CharacterId },
    SpeakerName { name: String },
    DialogueText { text: String },
    DialogueBoxVisible { visible: bool },
    Choices { labels: Vec<String> },
    LogLine {
        speaker: String,
        sprite: Option<String>,
        text: String,
    },
    SceneComplete { scene: SceneId },
}

/// Host that records every call in order. Clones share one buffer, so a
/// copy kept by the caller sees everything the runner sent.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
    events: Rc<RefCell<Vec<HostEvent>>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<HostEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn snapshot(&self) -> Vec<HostEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    fn push(&self, event: HostEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl Presentation for EventBuffer {
    fn set_background(&mut self, image: &str) {
        self.push(HostEvent::Background {
            image: image.to_string(),
        });
    }

    fn set_bgm(&mut self, track: &str) {
        self.push(HostEvent::Bgm {
            track: track.to_string(),
        });
    }

    fn play_sfx(&mut self, clip: &str) {
        self.push(HostEvent::Sfx {
            clip: clip.to_string(),
        });
    }

    fn update_character(&mut self, character: CharacterId, show: bool) {
        self.push(HostEvent::Character { character, show });
    }

    fn set_sprite(&mut self, character: CharacterId, sprite: &str) {
        self.push(HostEvent::Sprite {
            character,
            sprite: sprite.to_string(),
        });
    }

    fn highlight_speaker(&mut self, character: CharacterId) {
        self.push(HostEvent::Highlight { character });
    }
}

impl DialogueDisplay for EventBuffer {
    fn show_speaker_name(&mut self, name: &str) {
        self.push(HostEvent::SpeakerName {
            name: name.to_string(),
        });
    }

    fn show_dialogue_text(&mut self, text: &str) {
        self.push(HostEvent::DialogueText {
            text: text.to_string(),
        });
    }

    fn set_dialogue_box_visible(&mut self, visible: bool) {
        self.push(HostEvent::DialogueBoxVisible { visible });
    }
}

impl ChoicePresenter for EventBuffer {
    fn present_choices(&mut self, labels: &[String]) {
        self.push(HostEvent::Choices {
            labels: labels.to_vec(),
        });
    }
}

impl DialogueLog for EventBuffer {
    fn log_dialogue_line(&mut self, speaker: &str, sprite: Option<&str>, text: &str) {
        self.push(HostEvent::LogLine {
            speaker: speaker.to_string(),
            sprite: sprite.map(str::to_string),
            text: text.to_string(),
        });
    }
}

impl SceneCompleteHandler for EventBuffer {
    fn on_scene_complete(&mut self, scene: SceneId) {
        self.push(HostEvent::SceneComplete { scene });
    }
}

/// Host that ignores everything. Default for any capability the builder
/// was not given.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl Presentation for NullHost {
    fn set_background(&mut self, _image: &str) {}
    fn set_bgm(&mut self, _track: &str) {}
    fn play_sfx(&mut self, _clip: &str) {}
    fn update_character(&mut self, _character: CharacterId, _show: bool) {}
    fn set_sprite(&mut self, _character: CharacterId, _sprite: &str) {}
    fn highlight_speaker(&mut self, _character: CharacterId) {}
}

impl DialogueDisplay for NullHost {
    fn show_speaker_name(&mut self, _name: &str) {}
    fn show_dialogue_text(&mut self, _text: &str) {}
    fn set_dialogue_box_visible(&mut self, _visible: bool) {}
}

impl ChoicePresenter for NullHost {
    fn present_choices(&mut self, _labels: &[String]) {}
}

impl DialogueLog for NullHost {
    fn log_dialogue_line(&mut self, _speaker: &str, _sprite: Option<&str>, _text: &str) {}
}

impl SceneCompleteHandler for NullHost {
    fn on_scene_complete(&mut self, _scene: SceneId) {}
}
