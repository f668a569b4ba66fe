//! The base simulated unit.
//!
//! A single fat struct with optional capability components rather than a
//! subclass hierarchy: mobility and playable state are opt-in, and game
//! behavior is an ordered list of per-frame callbacks. Entities are
//! constructed detached and become live only when the level scheduler
//! promotes them out of its pending-insertion queue.

use glam::Vec2;

use crate::api::context::FrameOps;
use crate::api::types::{EntityId, Rect};
use crate::components::animation::{FrameCell, Sequencer};
use crate::components::hitbox::{self, Hitbox};
use crate::components::mobile::Mobility;
use crate::components::playable::PlayerState;
use crate::core::tiles::{Tile, TileSource};

/// Handle to a registered behavior, usable for later retirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BehaviorId(u64);

/// Per-frame behavior callback.
pub type Behavior = Box<dyn FnMut(&mut Entity, &mut FrameOps)>;

/// Callback fired once per distinct non-hollow tile kind the entity
/// occupies in a frame.
pub type TileBehavior = Box<dyn FnMut(&mut Entity, Tile, &mut FrameOps)>;

/// Lifecycle hook run at promotion (`on_insert`) or removal (`on_dispose`).
pub type LifecycleHook = Box<dyn FnMut(&mut Entity, &mut FrameOps)>;

pub struct Entity {
    pub(crate) id: EntityId,
    pub tag: String,
    /// Axis-aligned bounding box, Y-down world units.
    pub bounds: Rect,
    /// Shape used for precise collision testing.
    pub hitbox: Hitbox,
    /// Iteration-order key for the live list. Changing it on a live entity
    /// takes effect at the next pass's re-sort.
    pub z_index: i32,
    /// Inactive entities stay in the live list (collidable, visible) but do
    /// not run behaviors.
    pub active: bool,
    pub visible: bool,
    pub(crate) present: bool,
    behaviors: Vec<(BehaviorId, Behavior)>,
    tile_behaviors: Vec<(BehaviorId, TileBehavior)>,
    retired: Vec<BehaviorId>,
    next_behavior: u64,
    pub(crate) on_insert: Option<LifecycleHook>,
    pub(crate) on_dispose: Option<LifecycleHook>,
    /// Visual frame cycle. Purely presentational; behavior never couples
    /// to it.
    pub visual: Option<Sequencer<FrameCell>>,
    pub mobility: Option<Mobility>,
    pub player: Option<PlayerState>,
}

impl Entity {
    pub fn new() -> Self {
        Self {
            id: EntityId::UNSET,
            tag: String::new(),
            bounds: Rect::default(),
            hitbox: Hitbox::Rectangle,
            z_index: 0,
            active: true,
            visible: true,
            present: false,
            behaviors: Vec::new(),
            tile_behaviors: Vec::new(),
            retired: Vec::new(),
            next_behavior: 0,
            on_insert: None,
            on_dispose: None,
            visual: None,
            mobility: None,
            player: None,
        }
    }

    // -- Builder pattern --

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_pos(mut self, pos: Vec2) -> Self {
        self.bounds.pos = pos;
        self
    }

    pub fn with_size(mut self, size: Vec2) -> Self {
        self.bounds.size = size;
        self
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn with_hitbox(mut self, hitbox: Hitbox) -> Self {
        self.hitbox = hitbox;
        self
    }

    pub fn with_visual(mut self, visual: Sequencer<FrameCell>) -> Self {
        self.visual = Some(visual);
        self
    }

    pub fn with_mobility(mut self, mobility: Mobility) -> Self {
        self.mobility = Some(mobility);
        self
    }

    pub fn with_player(mut self, player: PlayerState) -> Self {
        self.player = Some(player);
        self
    }

    pub fn with_behavior(mut self, behavior: impl FnMut(&mut Entity, &mut FrameOps) + 'static) -> Self {
        self.add_behavior(behavior);
        self
    }

    pub fn with_insert_hook(
        mut self,
        hook: impl FnMut(&mut Entity, &mut FrameOps) + 'static,
    ) -> Self {
        self.on_insert = Some(Box::new(hook));
        self
    }

    pub fn with_dispose_hook(
        mut self,
        hook: impl FnMut(&mut Entity, &mut FrameOps) + 'static,
    ) -> Self {
        self.on_dispose = Some(Box::new(hook));
        self
    }

    // -- Identity & geometry --

    /// The scheduler-issued badge. `EntityId::UNSET` until enqueued.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Whether the entity currently sits in a level's live list.
    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn center(&self) -> Vec2 {
        self.bounds.center()
    }

    pub fn distance_to(&self, other: &Entity) -> f32 {
        self.center().distance(other.center())
    }

    /// Toggle whether the update pass runs this entity's behaviors.
    pub fn activate(&mut self, active: bool) {
        self.active = active;
    }

    /// Precise collision test against another entity, sampling both
    /// entities' masks at their current visual frame. Never mutates either
    /// side.
    pub fn collides_with(&self, other: &Entity) -> bool {
        hitbox::collides(
            &self.bounds,
            &self.hitbox,
            self.visual_frame(),
            &other.bounds,
            &other.hitbox,
            other.visual_frame(),
        )
    }

    /// Index of the current visual frame; 0 when no visual is attached.
    pub fn visual_frame(&self) -> usize {
        self.visual.as_ref().map_or(0, |v| v.index())
    }

    /// Integer cell span `(x0, y0, x1, y1)` covered by the bounding box,
    /// end-exclusive.
    pub fn occupied_span(&self) -> (i32, i32, i32, i32) {
        self.bounds.cell_span()
    }

    /// Distinct non-hollow tile kinds occupied this frame, in scan order.
    pub(crate) fn occupied_kinds(&self, tiles: &dyn TileSource) -> Vec<Tile> {
        let (x0, y0, x1, y1) = self.occupied_span();
        let mut kinds = Vec::new();
        for y in y0..y1 {
            for x in x0..x1 {
                let kind = tiles.classify(x, y);
                if kind != Tile::Hollow && !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        kinds
    }

    // -- Behaviors --

    /// Register a per-frame behavior. Behaviors run in registration order;
    /// registrations made while a pass is running take effect the
    /// following frame.
    pub fn add_behavior(
        &mut self,
        behavior: impl FnMut(&mut Entity, &mut FrameOps) + 'static,
    ) -> BehaviorId {
        let id = self.issue_behavior_id();
        self.behaviors.push((id, Box::new(behavior)));
        id
    }

    /// Register a tile-intersection behavior, invoked once per distinct
    /// non-hollow tile kind the entity occupies in a frame.
    pub fn add_tile_behavior(
        &mut self,
        behavior: impl FnMut(&mut Entity, Tile, &mut FrameOps) + 'static,
    ) -> BehaviorId {
        let id = self.issue_behavior_id();
        self.tile_behaviors.push((id, Box::new(behavior)));
        id
    }

    /// Queue a behavior for removal. Applied before the next pass runs the
    /// behavior lists, so an in-flight pass still sees its snapshot.
    pub fn retire_behavior(&mut self, id: BehaviorId) {
        self.retired.push(id);
    }

    pub fn has_tile_behaviors(&self) -> bool {
        !self.tile_behaviors.is_empty()
    }

    fn issue_behavior_id(&mut self) -> BehaviorId {
        self.next_behavior += 1;
        BehaviorId(self.next_behavior)
    }

    fn apply_retirements(&mut self) {
        if self.retired.is_empty() {
            return;
        }
        let retired = std::mem::take(&mut self.retired);
        self.behaviors.retain(|(id, _)| !retired.contains(id));
        self.tile_behaviors.retain(|(id, _)| !retired.contains(id));
    }

    /// Run the behavior list snapshotted at entry. Behaviors added during
    /// the run land after the snapshot and execute from the next frame.
    pub(crate) fn run_behaviors(&mut self, ops: &mut FrameOps) {
        self.apply_retirements();
        let mut snapshot = std::mem::take(&mut self.behaviors);
        for (_, behavior) in snapshot.iter_mut() {
            behavior(self, ops);
        }
        let mut added = std::mem::replace(&mut self.behaviors, snapshot);
        self.behaviors.append(&mut added);
    }

    /// Dispatch tile behaviors for one occupied tile kind.
    pub(crate) fn run_tile_behaviors(&mut self, kind: Tile, ops: &mut FrameOps) {
        let mut snapshot = std::mem::take(&mut self.tile_behaviors);
        for (_, behavior) in snapshot.iter_mut() {
            behavior(self, kind, ops);
        }
        let mut added = std::mem::replace(&mut self.tile_behaviors, snapshot);
        self.tile_behaviors.append(&mut added);
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}
