//! Checkpoint/respawn tracking for a playable area.
//!
//! Checkpoints are trigger areas paired with a spawn point. The scheduler
//! feeds the handler the alive players' bounding boxes once per pass, after
//! entity updates; the latest reached spawn point is what a respawn uses.

use glam::Vec2;

use crate::api::types::Rect;

#[derive(Debug, Clone)]
struct Checkpoint {
    spawn: Vec2,
    area: Rect,
    reached: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CheckpointHandler {
    checkpoints: Vec<Checkpoint>,
    latest: Option<Vec2>,
}

impl CheckpointHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a checkpoint: entering `area` captures `spawn`.
    pub fn append(&mut self, spawn: Vec2, area: Rect) {
        self.checkpoints.push(Checkpoint {
            spawn,
            area,
            reached: false,
        });
    }

    /// The most recently captured spawn point, if any checkpoint has been
    /// reached.
    pub fn latest(&self) -> Option<Vec2> {
        self.latest
    }

    pub fn any_reached(&self) -> bool {
        self.latest.is_some()
    }

    /// Forget all capture state, keeping the registered checkpoints.
    pub fn reset(&mut self) {
        self.latest = None;
        for checkpoint in &mut self.checkpoints {
            checkpoint.reached = false;
        }
    }

    /// Drop every registered checkpoint.
    pub fn clear(&mut self) {
        self.checkpoints.clear();
        self.latest = None;
    }

    /// Run once per pass with the alive players' bounding boxes.
    pub(crate) fn update(&mut self, players: &[Rect]) {
        for checkpoint in &mut self.checkpoints {
            if checkpoint.reached {
                continue;
            }
            if players.iter().any(|p| p.overlaps(&checkpoint.area)) {
                checkpoint.reached = true;
                self.latest = Some(checkpoint.spawn);
                log::debug!("checkpoint reached, spawn {:?}", checkpoint.spawn);
            }
        }
    }
}
