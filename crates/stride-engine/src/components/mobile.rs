//! Mobility capability: velocity-free movement primitives.
//!
//! Two strategies move an entity toward a target, both step-bounded by the
//! move-speed scalar. The "dumb" variant applies the candidate step unless
//! the destination is occupied; the "smart" variant resolves each axis
//! separately against solid tiles and registered obstacle entities, with a
//! one-unit lip assist on the X axis. Coordinates are Y-down, so the lip
//! assist slides the entity toward negative Y.

use glam::Vec2;

use crate::api::context::Surroundings;
use crate::api::types::{EntityId, Rect};
use crate::components::entity::Entity;
use crate::core::tiles::Tile;

/// Cardinal facing derived from applied movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
    Up,
    Down,
}

impl Facing {
    /// Dominant direction of a movement delta. `None` for a zero delta.
    pub fn from_delta(delta: Vec2) -> Option<Facing> {
        if delta == Vec2::ZERO {
            return None;
        }
        Some(if delta.x.abs() >= delta.y.abs() {
            if delta.x < 0.0 {
                Facing::Left
            } else {
                Facing::Right
            }
        } else if delta.y < 0.0 {
            Facing::Up
        } else {
            Facing::Down
        })
    }
}

/// Movement state attached to an entity.
#[derive(Debug, Clone)]
pub struct Mobility {
    /// Maximum units moved per frame.
    pub speed: f32,
    /// Suspends movement while the entity stays present and collidable.
    pub frozen: bool,
    pub facing: Facing,
    pub(crate) prev: Vec2,
    obstacles: Vec<EntityId>,
}

impl Mobility {
    pub fn new(speed: f32) -> Self {
        Self {
            speed,
            frozen: false,
            facing: Facing::default(),
            prev: Vec2::ZERO,
            obstacles: Vec::new(),
        }
    }

    /// Declare that constrained movement must treat `id` as blocking.
    /// One-directional: register both directions explicitly when mutual
    /// blocking is wanted.
    pub fn add_obstacle(&mut self, id: EntityId) {
        if !self.obstacles.contains(&id) {
            self.obstacles.push(id);
        }
    }

    pub fn remove_obstacle(&mut self, id: EntityId) {
        self.obstacles.retain(|o| *o != id);
    }

    pub fn obstacles(&self) -> &[EntityId] {
        &self.obstacles
    }

    /// Position at the end of the previous frame.
    pub fn prev(&self) -> Vec2 {
        self.prev
    }
}

/// Candidate next position at most `speed` units from `from` toward
/// `target`, clamped so it never overshoots.
pub fn step_toward(from: Vec2, target: Vec2, speed: f32) -> Vec2 {
    let delta = target - from;
    let dist = delta.length();
    if dist <= speed || dist <= f32::EPSILON {
        target
    } else {
        from + delta * (speed / dist)
    }
}

/// Result of a constrained movement step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    pub moved: bool,
    pub x_blocked: bool,
    pub y_blocked: bool,
}

impl Entity {
    /// Unconstrained step toward `target`: the candidate position applies
    /// unless a solid tile or a registered obstacle occupies it. Returns
    /// whether the entity moved; a blocked caller picks its own fallback
    /// (e.g. [`Entity::retreat`], or skipping the step).
    pub fn dumb_move_toward(&mut self, target: Vec2, view: &Surroundings) -> bool {
        let Some(mobility) = self.mobility.as_ref() else {
            return false;
        };
        if mobility.frozen {
            return false;
        }
        let next = step_toward(self.bounds.pos, target, mobility.speed);
        let candidate = self.bounds.at(next);
        if !self.placement_free(&candidate, view) {
            return false;
        }
        let delta = next - self.bounds.pos;
        self.bounds.pos = next;
        self.note_facing(delta);
        delta != Vec2::ZERO
    }

    /// Constrained step toward `target`, axis-separated: X resolves first,
    /// sliding one unit up when that clears a one-unit lip; Y applies only
    /// after X has been resolved. A blocked axis is reported so callers can
    /// zero their velocity-equivalent for it.
    pub fn smart_move_toward(&mut self, target: Vec2, view: &Surroundings) -> MoveOutcome {
        let Some(mobility) = self.mobility.as_ref() else {
            return MoveOutcome::default();
        };
        if mobility.frozen {
            return MoveOutcome::default();
        }
        let next = step_toward(self.bounds.pos, target, mobility.speed);
        let delta = next - self.bounds.pos;
        let mut outcome = MoveOutcome::default();
        let start = self.bounds.pos;

        if delta.x != 0.0 {
            let shifted = self.bounds.translated(Vec2::new(delta.x, 0.0));
            if self.placement_free(&shifted, view) {
                self.bounds.pos.x += delta.x;
                outcome.moved = true;
            } else {
                let lifted = self.bounds.translated(Vec2::new(delta.x, -1.0));
                if self.placement_free(&lifted, view) {
                    self.bounds.pos = lifted.pos;
                    outcome.moved = true;
                } else {
                    outcome.x_blocked = true;
                }
            }
        }

        if delta.y != 0.0 {
            let shifted = self.bounds.translated(Vec2::new(0.0, delta.y));
            if self.placement_free(&shifted, view) {
                self.bounds.pos.y += delta.y;
                outcome.moved = true;
            } else {
                outcome.y_blocked = true;
            }
        }

        self.note_facing(self.bounds.pos - start);
        outcome
    }

    /// Fall back to the previous frame's position.
    pub fn retreat(&mut self) {
        if let Some(mobility) = self.mobility.as_ref() {
            self.bounds.pos = mobility.prev;
        }
    }

    /// Whether a candidate placement is clear of solid tiles and of every
    /// registered obstacle's settled rectangle.
    pub fn placement_free(&self, candidate: &Rect, view: &Surroundings) -> bool {
        let (x0, y0, x1, y1) = candidate.cell_span();
        for y in y0..y1 {
            for x in x0..x1 {
                if view.tile_at(x, y) == Tile::Solid {
                    return false;
                }
            }
        }
        if let Some(mobility) = self.mobility.as_ref() {
            for id in mobility.obstacles() {
                if let Some(rect) = view.obstacle_rect(*id) {
                    if candidate.overlaps(&rect) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Snapshot the current position as "previous". Called by the
    /// scheduler exactly once per frame, after logic.
    pub(crate) fn snapshot_prev(&mut self) {
        let pos = self.bounds.pos;
        if let Some(mobility) = self.mobility.as_mut() {
            mobility.prev = pos;
        }
    }

    fn note_facing(&mut self, applied: Vec2) {
        if let Some(facing) = Facing::from_delta(applied) {
            if let Some(mobility) = self.mobility.as_mut() {
                mobility.facing = facing;
            }
        }
    }
}
