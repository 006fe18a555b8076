/// Auto-advance: moves past a finished line after a length-scaled pause.
use std::time::Duration;

use crate::core::clock::{PlaybackClock, TimerEvent, TimerHandle};

/// Shortest pause auto-advance ever waits. Keeps time moving when a line
/// is empty or the unit is zero.
pub const MIN_AUTO_DELAY: Duration = Duration::from_millis(10);

/// Auto-play state. Outlives individual nodes: stays enabled until the
/// player turns it off.
#[derive(Debug)]
pub struct AutoAdvance {
    enabled: bool,
    speed: f32,
    unit: Duration,
    pending: Option<TimerHandle>,
    generation: u64,
}

impl AutoAdvance {
    pub fn new(enabled: bool, speed: f32, unit: Duration) -> Self {
        Self {
            enabled,
            speed: speed.clamp(0.0, 1.0),
            unit,
            pending: None,
            generation: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.clamp(0.0, 1.0);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Pause before advancing past a line of `visible_len` characters,
    /// never shorter than [`MIN_AUTO_DELAY`]. Saturates instead of
    /// overflowing.
    pub fn delay_for(&self, visible_len: usize) -> Duration {
        let secs = (1.1 - self.speed) * visible_len as f32 * self.unit.as_secs_f32();
        Duration::try_from_secs_f32(secs)
            .unwrap_or(Duration::MAX)
            .max(MIN_AUTO_DELAY)
    }

    /// Turning auto-advance off cancels any pending advance.
    pub fn set_enabled(&mut self, enabled: bool, clock: &mut dyn PlaybackClock) {
        self.enabled = enabled;
        if !enabled {
            self.cancel(clock);
        }
    }

    /// Schedule an advance if auto-play is on, the player is looking at a
    /// dialogue line, and that line has finished revealing.
    pub fn maybe_start(
        &mut self,
        at_dialogue: bool,
        typing: bool,
        visible_len: usize,
        clock: &mut dyn PlaybackClock,
    ) -> bool {
        if !self.enabled || !at_dialogue || typing {
            return false;
        }
        self.cancel(clock);
        let event = TimerEvent::AutoAdvance {
            generation: self.generation,
        };
        self.pending = Some(clock.schedule(self.delay_for(visible_len), event));
        true
    }

    /// Cancel the pending advance, if any. Events already in flight are
    /// made stale.
    pub fn cancel(&mut self, clock: &mut dyn PlaybackClock) {
        if let Some(handle) = self.pending.take() {
            clock.cancel(handle);
        }
        self.generation += 1;
    }

    /// Called when an auto-advance timer fires. True only if the timer is
    /// the current one and auto-play is still on at this moment.
    pub fn fire(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.pending = None;
        self.enabled
    }
}
