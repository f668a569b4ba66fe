//! Per-frame input snapshots and recorded-input streams.
//!
//! One immutable snapshot reaches each playable entity per frame. Snapshots
//! are equality-comparable so "just pressed"/"just released" edges can be
//! derived from consecutive frames. A [`Recording`] is the ordered stream a
//! ghost consumes during playback; it serializes to JSON so past runs can
//! be persisted by the host.

use serde::{Deserialize, Serialize};

use crate::api::types::EntityId;

/// Discrete button intents for one simulated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub jump: bool,
    pub suicide: bool,
}

impl InputSnapshot {
    /// The idle snapshot: no buttons down.
    pub const STILL: InputSnapshot = InputSnapshot {
        left: false,
        right: false,
        up: false,
        down: false,
        jump: false,
        suicide: false,
    };

    pub fn any_direction(&self) -> bool {
        self.left || self.right || self.up || self.down
    }

    /// Buttons down now that were up in `prev`.
    pub fn just_pressed(&self, prev: &InputSnapshot) -> InputSnapshot {
        InputSnapshot {
            left: self.left && !prev.left,
            right: self.right && !prev.right,
            up: self.up && !prev.up,
            down: self.down && !prev.down,
            jump: self.jump && !prev.jump,
            suicide: self.suicide && !prev.suicide,
        }
    }

    /// Buttons up now that were down in `prev`.
    pub fn just_released(&self, prev: &InputSnapshot) -> InputSnapshot {
        prev.just_pressed(self)
    }
}

/// Ordered, indexable stream of input snapshots, one per simulated frame
/// the character was alive and non-replaying.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    frames: Vec<InputSnapshot>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: InputSnapshot) {
        self.frames.push(snapshot);
    }

    pub fn get(&self, index: usize) -> Option<InputSnapshot> {
        self.frames.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputSnapshot> {
        self.frames.iter()
    }

    /// Parse a recording from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl FromIterator<InputSnapshot> for Recording {
    fn from_iter<I: IntoIterator<Item = InputSnapshot>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

/// Live input capability. The scheduler polls one snapshot per playable
/// entity per frame; the source is passed into each tick rather than read
/// from ambient state.
pub trait InputSource {
    fn poll(&mut self, id: EntityId) -> InputSnapshot;
}

/// Source that always reports the idle snapshot.
pub struct Idle;

impl InputSource for Idle {
    fn poll(&mut self, _id: EntityId) -> InputSnapshot {
        InputSnapshot::STILL
    }
}

impl<F> InputSource for F
where
    F: FnMut(EntityId) -> InputSnapshot,
{
    fn poll(&mut self, id: EntityId) -> InputSnapshot {
        self(id)
    }
}
