/// Playback clock: host-driven, cancellable timers.
///
/// Nothing here sleeps. The host moves time forward and the runner pops
/// whatever has come due, so every wait is a scheduled event that can be
/// cancelled before it fires.
use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

/// Handle returned by [`PlaybackClock::schedule`], used to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// What a timer does when it fires.
///
/// Each event carries the generation of the component that scheduled it.
/// A component that has since been restarted or cancelled rejects events
/// from older generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    TypewriterTick { generation: u64 },
    AutoAdvance { generation: u64 },
}

/// Source of delayed, cancellable callbacks.
pub trait PlaybackClock {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Schedule `event` to fire `delay` from now.
    fn schedule(&mut self, delay: Duration, event: TimerEvent) -> TimerHandle;

    /// Cancel a pending timer. Returns false if it already fired, was
    /// already cancelled, or this clock cannot guarantee cancellation.
    fn cancel(&mut self, handle: TimerHandle) -> bool;

    /// Deadline of the earliest live timer.
    fn next_deadline(&mut self) -> Option<Duration>;

    /// Move time forward. Moving backwards is ignored.
    fn advance_to(&mut self, instant: Duration);

    /// Pop the earliest live timer whose deadline has passed. Timers with
    /// equal deadlines come out in the order they were scheduled.
    fn pop_due(&mut self) -> Option<TimerEvent>;
}

/// A clock that only moves when told to.
///
/// Cancelled timers stay in the heap and are skipped when they surface.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Reverse<(Duration, u64)>>,
    live: FxHashMap<u64, TimerEvent>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    fn prune(&mut self) {
        while let Some(Reverse((_, seq))) = self.queue.peek() {
            if self.live.contains_key(seq) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl PlaybackClock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule(&mut self, delay: Duration, event: TimerEvent) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse((self.now.saturating_add(delay), seq)));
        self.live.insert(seq, event);
        TimerHandle(seq)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.live.remove(&handle.0).is_some()
    }

    fn next_deadline(&mut self) -> Option<Duration> {
        self.prune();
        self.queue.peek().map(|Reverse((deadline, _))| *deadline)
    }

    fn advance_to(&mut self, instant: Duration) {
        if instant > self.now {
            self.now = instant;
        }
    }

    fn pop_due(&mut self) -> Option<TimerEvent> {
        self.prune();
        match self.queue.peek() {
            Some(Reverse((deadline, _))) if *deadline <= self.now => {}
            _ => return None,
        }
        let Reverse((_, seq)) = self.queue.pop()?;
        self.live.remove(&seq)
    }
}
