//! Per-frame context handed to entity behaviors.
//!
//! There is no ambient global state in the simulation: every behavior call
//! receives a [`FrameOps`] carrying the tile lookup, the settled obstacle
//! rectangles for this frame, and the deferred mutation queue. Structural
//! changes (add/discard) requested through it become visible on the
//! following frame, never mid-pass.

use std::collections::HashMap;

use crate::api::types::{EntityId, Rect, SoundCue};
use crate::components::entity::Entity;
use crate::core::tiles::{Tile, TileSource};

/// A structural mutation requested during a pass, applied once the pass
/// has finished iterating.
pub(crate) enum DeferredOp {
    Add { entity: Entity, delay: u32 },
    AddTemp { entity: Entity, life: u32 },
    Discard { id: EntityId, delay: u32 },
    Sound(SoundCue),
}

/// Mutable frame context for behaviors and lifecycle hooks.
pub struct FrameOps<'a> {
    frame: u64,
    tiles: &'a dyn TileSource,
    obstacles: &'a HashMap<EntityId, Rect>,
    queued: &'a mut Vec<DeferredOp>,
}

impl<'a> FrameOps<'a> {
    pub(crate) fn new(
        frame: u64,
        tiles: &'a dyn TileSource,
        obstacles: &'a HashMap<EntityId, Rect>,
        queued: &'a mut Vec<DeferredOp>,
    ) -> Self {
        Self {
            frame,
            tiles,
            obstacles,
            queued,
        }
    }

    /// The frame number of the pass currently running.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Tile classification at a cell. Out-of-bounds classifies as hollow.
    pub fn tile_at(&self, x: i32, y: i32) -> Tile {
        self.tiles.classify(x, y)
    }

    /// The settled bounding box of a live entity, as of the start of this
    /// pass. `None` if the entity is not live.
    pub fn obstacle_rect(&self, id: EntityId) -> Option<Rect> {
        self.obstacles.get(&id).copied()
    }

    /// Enqueue an entity for insertion at the start of the next pass.
    pub fn add(&mut self, entity: Entity) {
        self.add_after(entity, 0);
    }

    /// Enqueue an entity for insertion after `delay` frames.
    pub fn add_after(&mut self, entity: Entity, delay: u32) {
        self.queued.push(DeferredOp::Add { entity, delay });
    }

    /// Enqueue an entity that discards itself after `life` frames.
    pub fn add_temp(&mut self, entity: Entity, life: u32) {
        self.queued.push(DeferredOp::AddTemp { entity, life });
    }

    /// Enqueue an entity for removal at the start of the next pass.
    pub fn discard(&mut self, id: EntityId) {
        self.discard_after(id, 0);
    }

    /// Enqueue an entity for removal after `delay` frames.
    pub fn discard_after(&mut self, id: EntityId, delay: u32) {
        self.queued.push(DeferredOp::Discard { id, delay });
    }

    /// Emit a sound cue, collected by the level and drained by the host.
    pub fn play_sound(&mut self, cue: SoundCue) {
        self.queued.push(DeferredOp::Sound(cue));
    }

    /// Read-only movement view over tiles and settled obstacle rects.
    pub fn surroundings(&self) -> Surroundings<'_> {
        Surroundings {
            tiles: self.tiles,
            obstacles: self.obstacles,
        }
    }
}

/// Read-only subset of the frame context used by movement resolution.
#[derive(Clone, Copy)]
pub struct Surroundings<'a> {
    tiles: &'a dyn TileSource,
    obstacles: &'a HashMap<EntityId, Rect>,
}

impl<'a> Surroundings<'a> {
    /// Build a standalone view. Mainly useful for exercising movement
    /// outside a scheduler pass.
    pub fn new(tiles: &'a dyn TileSource, obstacles: &'a HashMap<EntityId, Rect>) -> Self {
        Self { tiles, obstacles }
    }

    pub fn tile_at(&self, x: i32, y: i32) -> Tile {
        self.tiles.classify(x, y)
    }

    pub fn is_solid(&self, x: i32, y: i32) -> bool {
        self.tiles.classify(x, y) == Tile::Solid
    }

    pub fn obstacle_rect(&self, id: EntityId) -> Option<Rect> {
        self.obstacles.get(&id).copied()
    }
}
