//! The level scheduler: authoritative entity list and per-frame pass.
//!
//! Single-threaded, cooperative, frame-stepped. One external driver calls
//! [`Level::tick`] and the whole pass runs to completion: pending
//! insertions/removals resolve first, the live list re-sorts by z-index
//! when needed, entities update in list order, and the checkpoint handler
//! runs last. Structural mutation during the update iteration always goes
//! through deferred queues, so an in-progress pass never observes a
//! changing collection — the guarantee exact replay depends on.

use std::collections::HashMap;
use std::mem;

use crate::api::context::{DeferredOp, FrameOps};
use crate::api::types::{EntityId, Rect, SoundCue};
use crate::components::entity::Entity;
use crate::components::playable::Vitality;
use crate::core::checkpoint::CheckpointHandler;
use crate::core::tiles::TileSource;
use crate::input::snapshot::{InputSnapshot, InputSource};

struct PendingInsert {
    delay: i32,
    entity: Entity,
}

struct PendingRemove {
    delay: i32,
    id: EntityId,
}

pub struct Level {
    tiles: Box<dyn TileSource>,
    awaiting: Vec<PendingInsert>,
    deleting: Vec<PendingRemove>,
    live: Vec<Entity>,
    players: Vec<EntityId>,
    sound_listeners: Vec<EntityId>,
    checkpoints: CheckpointHandler,
    sounds: Vec<SoundCue>,
    sort_needed: bool,
    replaying: bool,
    next_badge: u32,
    frame: u64,
}

impl Level {
    pub fn new(tiles: impl TileSource + 'static) -> Self {
        Self {
            tiles: Box::new(tiles),
            awaiting: Vec::new(),
            deleting: Vec::new(),
            live: Vec::new(),
            players: Vec::new(),
            sound_listeners: Vec::new(),
            checkpoints: CheckpointHandler::new(),
            sounds: Vec::new(),
            sort_needed: false,
            replaying: false,
            next_badge: 0,
            frame: 0,
        }
    }

    // -- Scheduling --

    /// Enqueue an entity for insertion at the start of the next pass.
    /// Returns the badge the entity will carry once live.
    pub fn add(&mut self, entity: Entity) -> EntityId {
        self.add_after(entity, 0)
    }

    /// Enqueue an entity for insertion after `delay` full frames.
    pub fn add_after(&mut self, entity: Entity, delay: u32) -> EntityId {
        self.enqueue(entity, delay)
    }

    /// Insert `entity` exactly once, the first frame `predicate` reports
    /// true. The polling wrapper discards itself after firing.
    pub fn add_when(
        &mut self,
        mut entity: Entity,
        mut predicate: impl FnMut(&FrameOps) -> bool + 'static,
    ) -> EntityId {
        if entity.id == EntityId::UNSET {
            entity.id = self.issue_badge();
        }
        let id = entity.id;
        let mut payload = Some(entity);
        let wrapper = Entity::new().with_behavior(move |me, ops| {
            if predicate(ops) {
                if let Some(e) = payload.take() {
                    ops.add(e);
                }
                ops.discard(me.id());
            }
        });
        self.add(wrapper);
        id
    }

    /// Enqueue removal at the start of the next pass.
    pub fn discard(&mut self, id: EntityId) {
        self.discard_after(id, 0);
    }

    /// Enqueue removal after `delay` full frames.
    pub fn discard_after(&mut self, id: EntityId, delay: u32) {
        self.deleting.push(PendingRemove {
            delay: delay as i32,
            id,
        });
    }

    /// Discard `id` exactly once, the first frame `predicate` reports true.
    pub fn discard_when(
        &mut self,
        id: EntityId,
        mut predicate: impl FnMut(&FrameOps) -> bool + 'static,
    ) {
        let wrapper = Entity::new().with_behavior(move |me, ops| {
            if predicate(ops) {
                ops.discard(id);
                ops.discard(me.id());
            }
        });
        self.add(wrapper);
    }

    /// Add an entity that lives for `life` frames.
    pub fn temp(&mut self, entity: Entity, life: u32) -> EntityId {
        let id = self.add(entity);
        self.discard_after(id, life);
        id
    }

    /// Add an entity that lives until `predicate` first reports true.
    pub fn temp_when(
        &mut self,
        entity: Entity,
        predicate: impl FnMut(&FrameOps) -> bool + 'static,
    ) -> EntityId {
        let id = self.add(entity);
        self.discard_when(id, predicate);
        id
    }

    /// Run a one-shot action after `delay` frames, via a self-discarding
    /// wrapper entity.
    pub fn run_once_after(
        &mut self,
        action: impl FnOnce(&mut FrameOps) + 'static,
        delay: u32,
    ) -> EntityId {
        let mut action = Some(action);
        let mut remaining = delay as i64;
        let wrapper = Entity::new().with_behavior(move |me, ops| {
            if remaining <= 0 {
                if let Some(action) = action.take() {
                    action(ops);
                }
                ops.discard(me.id());
            } else {
                remaining -= 1;
            }
        });
        self.add(wrapper)
    }

    /// Run a one-shot action the first frame `predicate` reports true,
    /// via a self-discarding wrapper entity.
    pub fn run_once_when(
        &mut self,
        action: impl FnOnce(&mut FrameOps) + 'static,
        mut predicate: impl FnMut(&FrameOps) -> bool + 'static,
    ) -> EntityId {
        let mut action = Some(action);
        let wrapper = Entity::new().with_behavior(move |me, ops| {
            if predicate(ops) {
                if let Some(action) = action.take() {
                    action(ops);
                }
                ops.discard(me.id());
            }
        });
        self.add(wrapper)
    }

    /// Run an action every `freq` frames.
    pub fn run_interval(
        &mut self,
        mut action: impl FnMut(&mut FrameOps) + 'static,
        freq: u32,
    ) -> EntityId {
        let freq = freq.max(1);
        let mut counter: u32 = 0;
        let wrapper = Entity::new().with_behavior(move |_, ops| {
            counter += 1;
            if counter % freq == 0 {
                action(ops);
            }
        });
        self.add(wrapper)
    }

    // -- Queries --

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn tiles(&self) -> &dyn TileSource {
        self.tiles.as_ref()
    }

    /// Whether `id` currently sits in the live list.
    pub fn contains(&self, id: EntityId) -> bool {
        self.live.iter().any(|e| e.id == id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.live.iter().find(|e| e.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.live.iter_mut().find(|e| e.id == id)
    }

    /// Live entities in update order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.live.iter()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Badges of the registered (non-ghost) playable entities.
    pub fn player_ids(&self) -> &[EntityId] {
        &self.players
    }

    pub fn alive_players(&self) -> Vec<EntityId> {
        self.players
            .iter()
            .copied()
            .filter(|id| {
                self.entity(*id)
                    .and_then(|e| e.player.as_ref())
                    .is_some_and(|p| p.is_alive())
            })
            .collect()
    }

    pub fn add_sound_listener(&mut self, id: EntityId) {
        self.sound_listeners.push(id);
    }

    /// Registered sound listeners, or the non-dead players when none are
    /// registered.
    pub fn sound_listeners(&self) -> Vec<EntityId> {
        if !self.sound_listeners.is_empty() {
            return self.sound_listeners.clone();
        }
        self.players
            .iter()
            .copied()
            .filter(|id| {
                self.entity(*id)
                    .and_then(|e| e.player.as_ref())
                    .is_some_and(|p| !p.is_dead())
            })
            .collect()
    }

    /// Take the sound cues emitted since the last drain.
    pub fn drain_sounds(&mut self) -> Vec<SoundCue> {
        mem::take(&mut self.sounds)
    }

    pub fn checkpoints(&self) -> &CheckpointHandler {
        &self.checkpoints
    }

    pub fn checkpoints_mut(&mut self) -> &mut CheckpointHandler {
        &mut self.checkpoints
    }

    /// Whether the whole simulation is replaying a recorded run. While
    /// replaying, non-ghost players consume their own recordings instead
    /// of polling the input source, and nothing new is recorded.
    pub fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    /// Operate on a live entity with a frame context, outside a pass.
    /// Deferred ops requested by `f` land in the pending queues exactly as
    /// they would mid-pass.
    pub fn with_entity<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Entity, &mut FrameOps) -> R,
    ) -> Option<R> {
        let obstacles: HashMap<EntityId, Rect> =
            self.live.iter().map(|e| (e.id, e.bounds)).collect();
        let tiles: &dyn TileSource = self.tiles.as_ref();
        let frame = self.frame;
        let idx = self.live.iter().position(|e| e.id == id)?;
        let mut queued = Vec::new();
        let result = {
            let mut ops = FrameOps::new(frame, tiles, &obstacles, &mut queued);
            f(&mut self.live[idx], &mut ops)
        };
        self.apply_deferred(queued);
        Some(result)
    }

    /// Tear the level down: flush queues, dispose every live entity, clear
    /// players, listeners and checkpoint state.
    pub fn clean(&mut self) {
        self.awaiting.clear();
        self.deleting.clear();
        let ids: Vec<EntityId> = self.live.iter().map(|e| e.id).collect();
        for id in ids {
            self.remove_now(id);
        }
        self.players.clear();
        self.sound_listeners.clear();
        self.sounds.clear();
        self.checkpoints.reset();
    }

    // -- The pass --

    /// Advance the simulation by exactly one frame.
    pub fn tick(&mut self, input: &mut dyn InputSource) {
        self.resolve_queues();

        if self.sort_needed {
            // Stable: insertion order is the tie-break among equal z.
            self.live.sort_by_key(|e| e.z_index);
            self.sort_needed = false;
        }

        let queued = self.update_entities(input);
        self.apply_deferred(queued);

        let player_rects: Vec<Rect> = self
            .players
            .iter()
            .filter_map(|id| self.live.iter().find(|e| e.id == *id))
            .filter(|e| e.player.as_ref().is_some_and(|p| p.is_alive()))
            .map(|e| e.bounds)
            .collect();
        self.checkpoints.update(&player_rects);

        self.frame += 1;
    }

    fn issue_badge(&mut self) -> EntityId {
        self.next_badge += 1;
        EntityId(self.next_badge)
    }

    fn enqueue(&mut self, mut entity: Entity, delay: u32) -> EntityId {
        if entity.id == EntityId::UNSET {
            entity.id = self.issue_badge();
        }
        let id = entity.id;
        self.awaiting.push(PendingInsert {
            delay: delay as i32,
            entity,
        });
        id
    }

    /// Resolve pending queues whose delay has elapsed. Undue entries keep
    /// counting down; due insertions promote in enqueue order.
    fn resolve_queues(&mut self) {
        let pending = mem::take(&mut self.awaiting);
        let mut due = Vec::new();
        for mut p in pending {
            if p.delay <= 0 {
                due.push(p.entity);
            } else {
                p.delay -= 1;
                self.awaiting.push(p);
            }
        }
        for entity in due {
            self.promote(entity);
        }

        let removals = mem::take(&mut self.deleting);
        let mut due_ids = Vec::new();
        for mut r in removals {
            if r.delay <= 0 {
                due_ids.push(r.id);
            } else {
                r.delay -= 1;
                self.deleting.push(r);
            }
        }
        for id in due_ids {
            self.remove_now(id);
        }
    }

    fn promote(&mut self, mut entity: Entity) {
        entity.present = true;
        let pos = entity.bounds.pos;
        if let Some(mobility) = entity.mobility.as_mut() {
            mobility.prev = pos;
        }
        if entity.player.as_ref().is_some_and(|p| !p.is_ghost()) {
            self.players.push(entity.id);
        }
        log::debug!("promote {:?} tag={:?}", entity.id, entity.tag);

        if let Some(mut hook) = entity.on_insert.take() {
            let tiles: &dyn TileSource = self.tiles.as_ref();
            let no_obstacles = HashMap::new();
            let mut queued = Vec::new();
            {
                let mut ops = FrameOps::new(self.frame, tiles, &no_obstacles, &mut queued);
                hook(&mut entity, &mut ops);
            }
            entity.on_insert = Some(hook);
            self.apply_deferred(queued);
        }

        self.live.push(entity);
        self.sort_needed = true;
    }

    fn remove_now(&mut self, id: EntityId) {
        let Some(idx) = self.live.iter().position(|e| e.id == id) else {
            return;
        };
        // Order-preserving removal; swap_remove would break determinism.
        let mut entity = self.live.remove(idx);
        entity.present = false;
        log::debug!("discard {:?} tag={:?}", id, entity.tag);

        if let Some(mut hook) = entity.on_dispose.take() {
            let tiles: &dyn TileSource = self.tiles.as_ref();
            let no_obstacles = HashMap::new();
            let mut queued = Vec::new();
            {
                let mut ops = FrameOps::new(self.frame, tiles, &no_obstacles, &mut queued);
                hook(&mut entity, &mut ops);
            }
            self.apply_deferred(queued);
        }

        self.players.retain(|p| *p != id);
        self.sound_listeners.retain(|p| *p != id);
    }

    fn update_entities(&mut self, input: &mut dyn InputSource) -> Vec<DeferredOp> {
        // Obstacle rectangles settle at pass start; movement resolved this
        // frame reads last frame's placements, keeping replay exact.
        let obstacles: HashMap<EntityId, Rect> =
            self.live.iter().map(|e| (e.id, e.bounds)).collect();
        let tiles: &dyn TileSource = self.tiles.as_ref();
        let frame = self.frame;
        let replaying = self.replaying;
        let mut queued = Vec::new();

        for i in 0..self.live.len() {
            let entity = &mut self.live[i];
            if !entity.active {
                continue;
            }
            let id = entity.id;
            let mut ops = FrameOps::new(frame, tiles, &obstacles, &mut queued);

            let resolved = match entity.player.as_mut() {
                Some(player) => {
                    let keys = if player.is_ghost() {
                        player.next_input()
                    } else if player.is_alive() {
                        if replaying {
                            player.next_input()
                        } else {
                            input.poll(id)
                        }
                    } else {
                        InputSnapshot::STILL
                    };
                    if player.is_alive() && !player.is_ghost() && !replaying {
                        player.record_frame(keys);
                    }
                    player.tick_cooldown();
                    player.set_keys(keys);
                    Some(keys)
                }
                None => None,
            };

            match resolved {
                Some(keys)
                    if keys.suicide
                        && entity.player.as_ref().is_some_and(|p| p.is_alive()) =>
                {
                    if let Err(err) = entity.set_vitality(Vitality::Dead, &mut ops) {
                        log::warn!("suicide transition rejected for {:?}: {err}", id);
                    }
                }
                Some(_) => {
                    entity.run_behaviors(&mut ops);
                    Self::dispatch_tiles(entity, tiles, &mut ops);
                    entity.snapshot_prev();
                }
                None if entity.mobility.is_some() => {
                    entity.run_behaviors(&mut ops);
                    Self::dispatch_tiles(entity, tiles, &mut ops);
                    entity.snapshot_prev();
                }
                None => {
                    entity.run_behaviors(&mut ops);
                }
            }
        }
        queued
    }

    fn dispatch_tiles(entity: &mut Entity, tiles: &dyn TileSource, ops: &mut FrameOps) {
        if !entity.has_tile_behaviors() {
            return;
        }
        for kind in entity.occupied_kinds(tiles) {
            entity.run_tile_behaviors(kind, ops);
        }
    }

    fn apply_deferred(&mut self, queued: Vec<DeferredOp>) {
        for op in queued {
            match op {
                DeferredOp::Add { entity, delay } => {
                    self.enqueue(entity, delay);
                }
                DeferredOp::AddTemp { entity, life } => {
                    let id = self.enqueue(entity, 0);
                    self.discard_after(id, life);
                }
                DeferredOp::Discard { id, delay } => {
                    self.discard_after(id, delay);
                }
                DeferredOp::Sound(cue) => self.sounds.push(cue),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::mobile::Mobility;
    use crate::components::playable::{PlayerState, Vitality};
    use crate::core::tiles::{Tile, TileGrid};
    use crate::input::snapshot::{Idle, Recording};
    use glam::Vec2;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn empty_level() -> Level {
        Level::new(TileGrid::new(32, 32))
    }

    fn tick_n(level: &mut Level, n: usize) {
        for _ in 0..n {
            level.tick(&mut Idle);
        }
    }

    #[test]
    fn add_after_delay_is_exact() {
        let mut level = empty_level();
        let id = level.add_after(Entity::new(), 3);

        for frame in 1..=3 {
            level.tick(&mut Idle);
            assert!(!level.contains(id), "frame {frame}: must still be absent");
        }
        level.tick(&mut Idle);
        assert!(level.contains(id), "frame 4: must be present");
    }

    #[test]
    fn add_is_live_on_first_frame() {
        let mut level = empty_level();
        let id = level.add(Entity::new());
        assert!(!level.contains(id)); // detached until the next pass begins
        level.tick(&mut Idle);
        assert!(level.contains(id));
    }

    #[test]
    fn mid_pass_discard_is_deferred() {
        let mut level = empty_level();
        let seen_after_discard = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen_after_discard);
        let id = level.add(Entity::new().with_behavior(move |me, ops| {
            ops.discard(me.id());
            log.borrow_mut().push(ops.frame());
        }));

        level.tick(&mut Idle); // entity runs, requests its own discard
        assert!(
            level.contains(id),
            "removal must not land until the next pass resolves queues"
        );
        level.tick(&mut Idle);
        assert!(!level.contains(id));
        // The behavior ran exactly once: it was gone before pass 2's update.
        assert_eq!(seen_after_discard.borrow().len(), 1);
    }

    #[test]
    fn add_when_fires_once_and_wrapper_self_discards() {
        let mut level = empty_level();
        let target = Entity::new().with_tag("payload");
        let id = level.add_when(target, |ops| ops.frame() == 3);

        // Passes 1-4 run with frames 0..=3; the predicate first holds in
        // pass 4, so the payload is live from pass 5 onward.
        for frame in 1..=4 {
            level.tick(&mut Idle);
            assert!(!level.contains(id), "pass {frame}: payload early");
        }
        level.tick(&mut Idle);
        assert!(level.contains(id));

        // Wrapper fired, discarded itself; only the payload remains.
        tick_n(&mut level, 2);
        assert_eq!(level.len(), 1);
    }

    #[test]
    fn temp_entity_lives_exactly_n_frames() {
        let mut level = empty_level();
        let id = level.temp(Entity::new(), 3);
        level.tick(&mut Idle);
        assert!(level.contains(id)); // frame 1
        tick_n(&mut level, 2);
        assert!(level.contains(id)); // frame 3
        level.tick(&mut Idle);
        assert!(!level.contains(id)); // gone from frame 4
    }

    #[test]
    fn live_list_is_z_sorted_with_stable_ties() {
        let mut level = empty_level();
        let a = level.add(Entity::new().with_z_index(5).with_tag("a"));
        let b = level.add(Entity::new().with_z_index(-1).with_tag("b"));
        let c = level.add(Entity::new().with_z_index(5).with_tag("c"));
        level.tick(&mut Idle);

        let order: Vec<EntityId> = level.entities().map(|e| e.id).collect();
        assert_eq!(order, vec![b, a, c]); // a before c: insertion order kept
    }

    #[test]
    fn update_order_follows_z_order() {
        let mut level = empty_level();
        let order = Rc::new(RefCell::new(String::new()));
        for (z, name) in [(3, 'x'), (1, 'y'), (2, 'z')] {
            let log = Rc::clone(&order);
            level.add(
                Entity::new()
                    .with_z_index(z)
                    .with_behavior(move |_, _| log.borrow_mut().push(name)),
            );
        }
        level.tick(&mut Idle);
        assert_eq!(&*order.borrow(), "yzx");
    }

    #[test]
    fn inactive_entities_skip_behaviors_but_stay_live() {
        let mut level = empty_level();
        let count = Rc::new(RefCell::new(0));
        let log = Rc::clone(&count);
        let id = level.add(Entity::new().with_behavior(move |_, _| *log.borrow_mut() += 1));
        level.tick(&mut Idle);
        assert_eq!(*count.borrow(), 1);

        if let Some(e) = level.entity_mut(id) {
            e.activate(false);
        }
        level.tick(&mut Idle);
        assert_eq!(*count.borrow(), 1);
        assert!(level.contains(id));
    }

    #[test]
    fn run_once_after_and_run_interval() {
        let mut level = empty_level();
        let hits = Rc::new(RefCell::new((0, 0)));

        let h = Rc::clone(&hits);
        level.run_once_after(move |_| h.borrow_mut().0 += 1, 2);
        let h = Rc::clone(&hits);
        level.run_interval(move |_| h.borrow_mut().1 += 1, 3);

        tick_n(&mut level, 9);
        let (once, interval) = *hits.borrow();
        assert_eq!(once, 1);
        assert_eq!(interval, 3); // frames 3, 6, 9
    }

    #[test]
    fn run_once_when_fires_on_first_true_frame() {
        let mut level = empty_level();
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        level.run_once_when(move |_| *h.borrow_mut() += 1, |ops| ops.frame() >= 2);

        tick_n(&mut level, 2);
        assert_eq!(*hits.borrow(), 0); // predicate not yet true
        tick_n(&mut level, 4);
        assert_eq!(*hits.borrow(), 1);
        assert!(level.is_empty()); // wrapper discarded itself
    }

    #[test]
    fn tile_behaviors_fire_per_distinct_kind() {
        let mut tiles = TileGrid::new(16, 16);
        tiles.set(2, 2, Tile::Lethal);
        tiles.set(3, 2, Tile::Lethal);
        tiles.set(2, 3, Tile::Goal);
        let mut level = Level::new(tiles);

        let kinds = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&kinds);
        let mut e = Entity::new()
            .with_bounds(Rect::new(2.0, 2.0, 2.0, 2.0))
            .with_mobility(Mobility::new(1.0));
        e.add_tile_behavior(move |_, kind, _| log.borrow_mut().push(kind));
        level.add(e);

        level.tick(&mut Idle);
        // Two lethal cells collapse into one dispatch; hollow never fires.
        assert_eq!(&*kinds.borrow(), &vec![Tile::Lethal, Tile::Goal]);
    }

    #[test]
    fn previous_position_snapshots_after_logic() {
        let mut level = empty_level();
        let id = level.add(
            Entity::new()
                .with_pos(Vec2::ZERO)
                .with_mobility(Mobility::new(2.0))
                .with_behavior(|me, ops| {
                    let view = ops.surroundings();
                    me.dumb_move_toward(Vec2::new(10.0, 0.0), &view);
                }),
        );

        level.tick(&mut Idle);
        let e = level.entity(id).unwrap();
        // Snapshot taken after the move, so prev equals the new position.
        assert_eq!(e.bounds.pos, Vec2::new(2.0, 0.0));
        assert_eq!(e.mobility.as_ref().unwrap().prev(), Vec2::new(2.0, 0.0));
    }

    #[test]
    fn player_input_is_recorded_while_alive() {
        let mut level = empty_level();
        let id = level.add(Entity::new().with_player(PlayerState::new()));
        let mut source = |_: EntityId| InputSnapshot {
            right: true,
            ..InputSnapshot::STILL
        };
        for _ in 0..5 {
            level.tick(&mut source);
        }
        let e = level.entity(id).unwrap();
        let rec = e.player.as_ref().unwrap().recording();
        assert_eq!(rec.len(), 5);
        assert!(rec.iter().all(|s| s.right));
        assert_eq!(level.player_ids(), &[id]);
    }

    #[test]
    fn suicide_input_forces_death() {
        let mut level = empty_level();
        let id = level.add(Entity::new().with_player(PlayerState::new()));
        let mut source = |_: EntityId| InputSnapshot {
            suicide: true,
            ..InputSnapshot::STILL
        };
        level.tick(&mut source);
        let e = level.entity(id).unwrap();
        assert_eq!(e.player.as_ref().unwrap().vitality(), Vitality::Dead);
        assert!(!e.active);
        assert!(level.alive_players().is_empty());
    }

    #[test]
    fn death_cue_reaches_the_sound_drain() {
        let mut level = empty_level();
        let mut player = PlayerState::new();
        player.death_cue = Some(SoundCue(4));
        let id = level.add(Entity::new().with_player(player));
        level.tick(&mut Idle);
        level.with_entity(id, |e, ops| e.lose(ops)).unwrap().unwrap();
        assert_eq!(level.drain_sounds(), vec![SoundCue(4)]);
        assert!(level.drain_sounds().is_empty());
    }

    #[test]
    fn ghosts_are_not_registered_as_players() {
        let mut level = empty_level();
        let mut ghost_state = PlayerState::new();
        ghost_state.make_ghost(Recording::new());
        level.add(Entity::new().with_player(ghost_state));
        level.tick(&mut Idle);
        assert!(level.player_ids().is_empty());
    }

    fn ghost_level(recording: Recording) -> (Level, EntityId) {
        let mut tiles = TileGrid::new(32, 32);
        tiles.fill_rect(0, 10, 32, 1, Tile::Solid); // floor
        tiles.fill_rect(12, 0, 1, 10, Tile::Solid); // wall
        let mut level = Level::new(tiles);

        let mut state = PlayerState::new();
        state.make_ghost(recording);
        let id = level.add(
            Entity::new()
                .with_bounds(Rect::new(2.0, 9.0, 1.0, 1.0))
                .with_player(state)
                .with_mobility(Mobility::new(1.0))
                .with_behavior(|me, ops| {
                    let keys = me.player.as_ref().map(|p| p.keys()).unwrap_or_default();
                    let mut target = me.bounds.pos;
                    if keys.right {
                        target.x += 10.0;
                    }
                    if keys.left {
                        target.x -= 10.0;
                    }
                    if keys.jump {
                        target.y -= 10.0;
                    }
                    let view = ops.surroundings();
                    me.smart_move_toward(target, &view);
                }),
        );
        (level, id)
    }

    #[test]
    fn ghost_replay_is_deterministic() {
        let mut recording = Recording::new();
        for i in 0..30 {
            recording.push(InputSnapshot {
                right: true,
                jump: i % 4 == 0,
                ..InputSnapshot::STILL
            });
        }

        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let (mut level, id) = ghost_level(recording.clone());
            tick_n(&mut level, 40); // past exhaustion: ghost goes idle
            let e = level.entity(id).unwrap();
            outcomes.push((e.bounds.pos, e.player.as_ref().unwrap().vitality()));
        }
        assert_eq!(outcomes[0], outcomes[1]);
        assert_eq!(outcomes[0].1, Vitality::Alive);
    }

    #[test]
    fn replaying_level_consumes_own_recording() {
        let mut level = empty_level();
        let mut state = PlayerState::new();
        let mut rec = Recording::new();
        rec.push(InputSnapshot {
            suicide: true,
            ..InputSnapshot::STILL
        });
        // Pre-load the recording, then replay it instead of polling.
        state.load_recording(rec);
        let id = level.add(Entity::new().with_player(state));
        level.set_replaying(true);
        level.tick(&mut Idle);
        let e = level.entity(id).unwrap();
        assert_eq!(e.player.as_ref().unwrap().vitality(), Vitality::Dead);
        // Replay never appends to the recording.
        assert_eq!(e.player.as_ref().unwrap().recording().len(), 1);
    }

    #[test]
    fn checkpoint_captures_after_entity_updates() {
        let mut level = empty_level();
        level
            .checkpoints_mut()
            .append(Vec2::new(1.0, 1.0), Rect::new(4.0, 0.0, 2.0, 2.0));
        level.add(
            Entity::new()
                .with_bounds(Rect::new(4.5, 0.5, 1.0, 1.0))
                .with_player(PlayerState::new()),
        );
        level.tick(&mut Idle);
        assert_eq!(level.checkpoints().latest(), Some(Vec2::new(1.0, 1.0)));
    }

    #[test]
    fn insert_hook_runs_at_promotion_with_valid_presence() {
        let mut level = empty_level();
        let seen = Rc::new(RefCell::new(false));
        let log = Rc::clone(&seen);
        level.add(Entity::new().with_insert_hook(move |me, _| {
            assert!(me.is_present());
            *log.borrow_mut() = true;
        }));
        level.tick(&mut Idle);
        assert!(*seen.borrow());
    }

    #[test]
    fn dispose_hook_runs_once_on_removal() {
        let mut level = empty_level();
        let disposed = Rc::new(RefCell::new(0));
        let log = Rc::clone(&disposed);
        let id = level.add(Entity::new().with_dispose_hook(move |me, _| {
            assert!(!me.is_present());
            *log.borrow_mut() += 1;
        }));
        level.tick(&mut Idle);
        level.discard(id);
        tick_n(&mut level, 2);
        assert!(!level.contains(id));
        assert_eq!(*disposed.borrow(), 1);
    }

    #[test]
    fn clean_disposes_everything() {
        let mut level = empty_level();
        level.add(Entity::new().with_player(PlayerState::new()));
        level.add(Entity::new());
        level.tick(&mut Idle);
        assert_eq!(level.len(), 2);
        level.clean();
        assert!(level.is_empty());
        assert!(level.player_ids().is_empty());
    }

    #[test]
    fn sound_listeners_fall_back_to_non_dead_players() {
        let mut level = empty_level();
        let id = level.add(Entity::new().with_player(PlayerState::new()));
        level.tick(&mut Idle);
        assert_eq!(level.sound_listeners(), vec![id]);

        let other = level.add(Entity::new());
        level.tick(&mut Idle);
        level.add_sound_listener(other);
        assert_eq!(level.sound_listeners(), vec![other]);
    }
}
