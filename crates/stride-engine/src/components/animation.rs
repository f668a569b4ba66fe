//! Frame-driven animation sequencer.
//!
//! A [`Sequencer`] advances a pointer through an ordered frame sequence on a
//! per-tick cadence. It is typically consumed once per simulated frame:
//! `advance()` returns the frame the sequence is currently on, then moves
//! the pointer according to the playback mode.

use std::collections::HashMap;
use std::sync::Arc;

/// Atlas cell used as the visual frame payload for entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCell {
    pub col: u16,
    pub row: u16,
}

impl FrameCell {
    pub fn new(col: u16, row: u16) -> Self {
        Self { col, row }
    }
}

/// How the index moves once it reaches the end of the sequence.
/// Ping-pong overrides loop; loop overrides play-once-then-hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Playback {
    /// Wrap to the first frame after the limit.
    #[default]
    Loop,
    /// Oscillate between the two bounds, reversing exactly at each.
    PingPong,
    /// Advance to the last frame and hold there.
    Once,
}

type Trigger = Box<dyn FnMut()>;

/// Ordered frame sequence with a tick-gated cursor and index-keyed,
/// edge-triggered callbacks.
pub struct Sequencer<T> {
    frames: Arc<[T]>,
    rate: u32,
    counter: u32,
    index: usize,
    limit: usize,
    mode: Playback,
    stopped: bool,
    returning: bool,
    fired_at: Option<usize>,
    triggers: HashMap<usize, Trigger>,
}

impl<T> Sequencer<T> {
    /// Sequence advancing one index per `advance()` call, looping.
    pub fn new(frames: impl Into<Arc<[T]>>) -> Self {
        Self::with_rate(1, frames)
    }

    /// Sequence advancing one index every `rate` calls (0 and 1 both mean
    /// every call), looping.
    pub fn with_rate(rate: u32, frames: impl Into<Arc<[T]>>) -> Self {
        let frames = frames.into();
        let limit = frames.len();
        Self {
            frames,
            rate,
            counter: 0,
            index: 0,
            limit,
            mode: Playback::Loop,
            stopped: false,
            returning: false,
            fired_at: None,
            triggers: HashMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: Playback) -> Self {
        self.mode = mode;
        self
    }

    /// Current frame without any cursor update.
    pub fn peek(&self) -> Option<&T> {
        self.frames.get(self.index)
    }

    /// Return the frame the sequence is currently on, then move the cursor
    /// according to the playback mode. A stopped sequencer does not move,
    /// but trigger dispatch still applies (edge-triggered, so a held index
    /// fires at most once).
    pub fn advance(&mut self) -> Option<&T> {
        if self.frames.is_empty() || self.limit == 0 {
            return None;
        }
        let reported = self.index;

        if self.fired_at != Some(reported) {
            self.fired_at = None;
        }
        if self.fired_at.is_none() {
            if let Some(trigger) = self.triggers.get_mut(&reported) {
                trigger();
                self.fired_at = Some(reported);
            }
        }

        if !self.stopped {
            self.step();
        }
        self.frames.get(reported)
    }

    fn step(&mut self) {
        match self.mode {
            Playback::PingPong => {
                if self.limit > 1 && self.due() {
                    if self.returning {
                        if self.index > 0 {
                            self.index -= 1;
                        }
                        if self.index == 0 {
                            self.returning = false;
                        }
                    } else {
                        if self.index + 1 < self.limit {
                            self.index += 1;
                        }
                        if self.index + 1 >= self.limit {
                            self.returning = true;
                        }
                    }
                }
            }
            Playback::Loop => {
                if self.due() {
                    self.index += 1;
                }
                if self.index >= self.limit {
                    self.index = 0;
                }
            }
            Playback::Once => {
                if self.index + 1 < self.limit && self.due() {
                    self.index += 1;
                }
            }
        }
    }

    fn due(&mut self) -> bool {
        if self.rate <= 1 {
            return true;
        }
        self.counter += 1;
        self.counter % self.rate == 0
    }

    /// Register a callback fired the first time `advance()` reports the
    /// sequence sitting at `index` since it last sat elsewhere.
    pub fn add_trigger(&mut self, index: usize, trigger: impl FnMut() + 'static) {
        self.triggers.insert(index, Box::new(trigger));
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Move the cursor. Clamped into `[0, limit)`; landing on a bound
    /// re-aims the ping-pong direction away from it.
    pub fn set_index(&mut self, index: usize) {
        self.index = index.min(self.limit.saturating_sub(1));
        if self.index == 0 {
            self.returning = false;
        } else if self.index + 1 >= self.limit {
            self.returning = true;
        }
    }

    /// Jump to the last frame of the sequence.
    pub fn push_to_end(&mut self) {
        self.set_index(self.limit.saturating_sub(1));
    }

    /// Whether the cursor sits on the last frame.
    pub fn has_ended(&self) -> bool {
        self.index + 1 >= self.limit
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Change the advance rate. Zeros both tick counter and index.
    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate;
        self.reset();
    }

    /// Re-target the frame sequence. Zeros both tick counter and index and
    /// resets the limit to the new length.
    pub fn set_frames(&mut self, frames: impl Into<Arc<[T]>>) {
        self.frames = frames.into();
        self.limit = self.frames.len();
        self.reset();
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The position to treat as one past the last frame. Clamped to the
    /// sequence length; the cursor is pulled back inside if needed.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.min(self.frames.len());
        self.index = self.index.min(self.limit.saturating_sub(1));
    }

    pub fn mode(&self) -> Playback {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Playback) {
        self.mode = mode;
    }

    /// Freeze or unfreeze the cursor. A stopped sequencer reports its
    /// current frame without progressing.
    pub fn stop(&mut self, stopped: bool) {
        self.stopped = stopped;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Zero the tick counter and index.
    pub fn reset(&mut self) {
        self.index = 0;
        self.counter = 0;
        self.returning = false;
        self.fired_at = None;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Independent cursor over the same shared frame sequence. Mode, rate
    /// and limit carry over; cursor state starts fresh and triggers are not
    /// copied.
    pub fn duplicate(&self) -> Self {
        Self {
            frames: Arc::clone(&self.frames),
            rate: self.rate,
            counter: 0,
            index: 0,
            limit: self.limit,
            mode: self.mode,
            stopped: self.stopped,
            returning: false,
            fired_at: None,
            triggers: HashMap::new(),
        }
    }
}

impl<T: Clone> Sequencer<T> {
    /// A duplicate running over the frames in reversed order.
    pub fn reversed(&self) -> Self {
        let mut frames: Vec<T> = self.frames.iter().cloned().collect();
        frames.reverse();
        let mut seq = self.duplicate();
        seq.set_frames(frames);
        seq
    }
}
