/// Dialogue typewriter: reveals a line one character per tick.
use std::time::Duration;

use crate::core::clock::{PlaybackClock, TimerEvent, TimerHandle};

/// Result of handing a tick to the typewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belonged to a reveal that was cancelled or replaced.
    Stale,
    /// One more character is visible; another tick is scheduled.
    Revealed,
    /// The whole line is visible and typing has stopped.
    Finished,
}

/// Per-character delay for a text speed in `[0, 1]`; 1 is instant.
/// Saturates instead of overflowing.
pub fn char_delay(speed: f32, unit: Duration) -> Duration {
    let secs = (1.0 - speed.clamp(0.0, 1.0)) * unit.as_secs_f32();
    Duration::try_from_secs_f32(secs).unwrap_or(Duration::MAX)
}

/// Reveal state for a single dialogue box. At most one reveal is live;
/// starting another cancels the previous tick chain first.
#[derive(Debug)]
pub struct Typewriter {
    target: Vec<char>,
    visible: String,
    progress: usize,
    typing: bool,
    pending: Option<TimerHandle>,
    generation: u64,
    delay: Duration,
}

impl Typewriter {
    pub fn new(delay: Duration) -> Self {
        Self {
            target: Vec::new(),
            visible: String::new(),
            progress: 0,
            typing: false,
            pending: None,
            generation: 0,
            delay,
        }
    }

    /// Applies from the next scheduled tick on.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Begin revealing `text` from an empty box.
    pub fn start_reveal(&mut self, text: &str, clock: &mut dyn PlaybackClock) {
        self.cancel_chain(clock);
        self.target = text.chars().collect();
        self.visible.clear();
        self.progress = 0;
        self.typing = true;
        self.schedule(clock);
    }

    /// Handle a tick event. Appends one character, then either schedules
    /// the next tick or finishes.
    pub fn tick(&mut self, generation: u64, clock: &mut dyn PlaybackClock) -> TickOutcome {
        if !self.typing || generation != self.generation {
            return TickOutcome::Stale;
        }
        self.pending = None;

        if let Some(c) = self.target.get(self.progress) {
            self.visible.push(*c);
            self.progress += 1;
        }

        if self.progress < self.target.len() {
            self.schedule(clock);
            TickOutcome::Revealed
        } else {
            self.typing = false;
            TickOutcome::Finished
        }
    }

    /// Show the full line at once. Returns false, and changes nothing, when
    /// no reveal is in progress.
    pub fn skip_reveal(&mut self, clock: &mut dyn PlaybackClock) -> bool {
        if !self.typing {
            return false;
        }
        self.cancel_chain(clock);
        self.visible = self.target.iter().collect();
        self.progress = self.target.len();
        self.typing = false;
        true
    }

    /// Stop revealing, leaving whatever is visible in place.
    pub fn stop(&mut self, clock: &mut dyn PlaybackClock) {
        self.cancel_chain(clock);
        self.typing = false;
    }

    /// Stop revealing and empty the box.
    pub fn clear(&mut self, clock: &mut dyn PlaybackClock) {
        self.stop(clock);
        self.target.clear();
        self.visible.clear();
        self.progress = 0;
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn visible_text(&self) -> &str {
        &self.visible
    }

    /// Visible length in characters, not bytes.
    pub fn visible_len(&self) -> usize {
        self.progress
    }

    fn schedule(&mut self, clock: &mut dyn PlaybackClock) {
        let event = TimerEvent::TypewriterTick {
            generation: self.generation,
        };
        self.pending = Some(clock.schedule(self.delay, event));
    }

    // Bumping the generation makes any tick that escaped cancellation stale.
    fn cancel_chain(&mut self, clock: &mut dyn PlaybackClock) {
        if let Some(handle) = self.pending.take() {
            clock.cancel(handle);
        }
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    const STEP: Duration = Duration::from_millis(50);

    /// Fire every due tick, feeding them back into the typewriter.
    fn run_due(tw: &mut Typewriter, clock: &mut ManualClock) -> Vec<TickOutcome> {
        let mut outcomes = Vec::new();
        while let Some(TimerEvent::TypewriterTick { generation }) = clock.pop_due() {
            outcomes.push(tw.tick(generation, clock));
        }
        outcomes
    }

    fn step(tw: &mut Typewriter, clock: &mut ManualClock) -> Vec<TickOutcome> {
        let next = clock.now() + STEP;
        clock.advance_to(next);
        run_due(tw, clock)
    }

    #[test]
    fn char_delay_scales_with_speed() {
        let unit = Duration::from_secs(1);
        assert_eq!(char_delay(1.0, unit), Duration::ZERO);
        assert_eq!(char_delay(0.0, unit), unit);
        assert_eq!(char_delay(2.0, unit), Duration::ZERO);
        assert_eq!(char_delay(-1.0, unit), unit);
        assert_eq!(char_delay(0.0, Duration::MAX), Duration::MAX);
    }

    #[test]
    fn reveals_one_char_per_tick() {
        let mut clock = ManualClock::new();
        let mut tw = Typewriter::new(STEP);
        tw.start_reveal("Hey", &mut clock);
        assert!(tw.is_typing());
        assert_eq!(tw.visible_text(), "");

        assert_eq!(step(&mut tw, &mut clock), vec![TickOutcome::Revealed]);
        assert_eq!(tw.visible_text(), "H");
        assert_eq!(step(&mut tw, &mut clock), vec![TickOutcome::Revealed]);
        assert_eq!(tw.visible_text(), "He");
        assert_eq!(step(&mut tw, &mut clock), vec![TickOutcome::Finished]);
        assert_eq!(tw.visible_text(), "Hey");
        assert!(!tw.is_typing());
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn counts_chars_not_bytes() {
        let mut clock = ManualClock::new();
        let mut tw = Typewriter::new(Duration::ZERO);
        tw.start_reveal("héé", &mut clock);
        let outcomes = run_due(&mut tw, &mut clock);
        assert_eq!(outcomes.last(), Some(&TickOutcome::Finished));
        assert_eq!(tw.visible_text(), "héé");
        assert_eq!(tw.visible_len(), 3);
    }

    #[test]
    fn empty_line_finishes_on_first_tick() {
        let mut clock = ManualClock::new();
        let mut tw = Typewriter::new(Duration::ZERO);
        tw.start_reveal("", &mut clock);
        assert!(tw.is_typing());
        assert_eq!(run_due(&mut tw, &mut clock), vec![TickOutcome::Finished]);
        assert!(!tw.is_typing());
    }

    #[test]
    fn skip_shows_everything_and_is_idempotent() {
        let mut clock = ManualClock::new();
        let mut tw = Typewriter::new(STEP);
        tw.start_reveal("Good morning", &mut clock);
        step(&mut tw, &mut clock);

        assert!(tw.skip_reveal(&mut clock));
        assert_eq!(tw.visible_text(), "Good morning");
        assert!(!tw.is_typing());
        assert_eq!(clock.pending(), 0);

        assert!(!tw.skip_reveal(&mut clock));
        assert_eq!(tw.visible_text(), "Good morning");
    }

    #[test]
    fn new_reveal_supersedes_old_chain() {
        let mut clock = ManualClock::new();
        let mut tw = Typewriter::new(STEP);
        tw.start_reveal("abcdef", &mut clock);
        step(&mut tw, &mut clock);
        step(&mut tw, &mut clock);
        assert_eq!(tw.visible_text(), "ab");

        tw.start_reveal("XYZ", &mut clock);
        assert_eq!(tw.visible_text(), "");
        for _ in 0..10 {
            step(&mut tw, &mut clock);
            assert!("XYZ".starts_with(tw.visible_text()));
        }
        assert_eq!(tw.visible_text(), "XYZ");
    }

    #[test]
    fn uncancelled_stale_tick_is_rejected() {
        let mut clock = ManualClock::new();
        let mut tw = Typewriter::new(STEP);
        tw.start_reveal("old", &mut clock);
        let stale_generation = 1;
        tw.start_reveal("new", &mut clock);
        assert_eq!(tw.tick(stale_generation, &mut clock), TickOutcome::Stale);
        assert_eq!(tw.visible_text(), "");
    }

    #[test]
    fn clear_empties_box() {
        let mut clock = ManualClock::new();
        let mut tw = Typewriter::new(STEP);
        tw.start_reveal("line", &mut clock);
        step(&mut tw, &mut clock);
        tw.clear(&mut clock);
        assert_eq!(tw.visible_text(), "");
        assert!(!tw.is_typing());
        assert_eq!(clock.pending(), 0);
    }
}
