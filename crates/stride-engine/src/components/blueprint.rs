//! Immutable entity templates.
//!
//! A [`Blueprint`] is a value object describing an entity to spawn; the
//! factory builds a fresh instance each time, so templated spawns (death
//! visuals, debris, repeated projectiles) never alias mutable state across
//! copies.

use std::sync::Arc;

use glam::Vec2;

use crate::api::types::Rect;
use crate::components::animation::{FrameCell, Playback, Sequencer};
use crate::components::entity::Entity;

#[derive(Debug, Clone)]
pub struct Blueprint {
    pub size: Vec2,
    pub z_index: i32,
    /// Visual frame cycle for instances; played once through.
    pub frames: Arc<[FrameCell]>,
    pub rate: u32,
    /// Frames an instance lives when spawned as a temporary.
    pub lifetime: u32,
    pub tag: String,
}

impl Blueprint {
    pub fn new(size: Vec2) -> Self {
        Self {
            size,
            z_index: 0,
            frames: Arc::from(Vec::new()),
            rate: 1,
            lifetime: 60,
            tag: String::new(),
        }
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn with_frames(mut self, frames: impl Into<Arc<[FrameCell]>>, rate: u32) -> Self {
        self.frames = frames.into();
        self.rate = rate;
        self
    }

    pub fn with_lifetime(mut self, lifetime: u32) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Fresh instance with its top-left corner at `pos`.
    pub fn instantiate(&self, pos: Vec2) -> Entity {
        let mut entity = Entity::new()
            .with_tag(self.tag.clone())
            .with_bounds(Rect {
                pos,
                size: self.size,
            })
            .with_z_index(self.z_index);
        if !self.frames.is_empty() {
            entity.visual = Some(
                Sequencer::with_rate(self.rate, Arc::clone(&self.frames))
                    .with_mode(Playback::Once),
            );
        }
        entity
    }

    /// Fresh instance centred on `center`.
    pub fn instantiate_centered(&self, center: Vec2) -> Entity {
        self.instantiate(center - self.size / 2.0)
    }
}
