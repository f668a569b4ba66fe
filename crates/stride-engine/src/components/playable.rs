//! Playable capability: vitality state machine, hit-point accounting and
//! the input-recording/ghost-replay facility.
//!
//! Vitality transitions are monotone except for the dead→alive revival
//! path; completed is terminal. Violations are programming errors in the
//! calling code and surface as [`TransitionError`] — never a silent no-op.

use thiserror::Error;

use crate::api::context::FrameOps;
use crate::api::types::SoundCue;
use crate::components::blueprint::Blueprint;
use crate::components::entity::Entity;
use crate::input::snapshot::{InputSnapshot, Recording};

/// Three-state life-cycle status of a playable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vitality {
    Alive,
    Dead,
    Completed,
}

/// Rejected vitality transition. No partial transition is ever committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot kill a character that is already dead")]
    AlreadyDead,
    #[error("completed is terminal; cannot leave it")]
    CompletedIsTerminal,
    #[error("entity has no playable capability")]
    NotPlayable,
}

/// Frames of invulnerability to further negative touches after being hurt.
pub const HURT_COOLDOWN_FRAMES: i32 = 100;

/// Playable state attached to an entity.
pub struct PlayerState {
    hp: i32,
    vitality: Vitality,
    hurt_cooldown: i32,
    ghost: bool,
    recording: Recording,
    cursor: usize,
    keys: InputSnapshot,
    pub hurt_cue: Option<SoundCue>,
    pub death_cue: Option<SoundCue>,
    /// Template spawned at the entity's centre on death.
    pub death_visual: Option<Blueprint>,
}

impl PlayerState {
    pub fn new() -> Self {
        Self {
            hp: 1,
            vitality: Vitality::Alive,
            hurt_cooldown: 0,
            ghost: false,
            recording: Recording::new(),
            cursor: 0,
            keys: InputSnapshot::STILL,
            hurt_cue: None,
            death_cue: None,
            death_visual: None,
        }
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn vitality(&self) -> Vitality {
        self.vitality
    }

    pub fn is_alive(&self) -> bool {
        self.vitality == Vitality::Alive
    }

    pub fn is_dead(&self) -> bool {
        self.vitality == Vitality::Dead
    }

    pub fn is_done(&self) -> bool {
        self.vitality == Vitality::Completed
    }

    /// Whether the hurt cooldown is still running.
    pub fn is_hurt(&self) -> bool {
        self.hurt_cooldown > 0
    }

    pub fn is_ghost(&self) -> bool {
        self.ghost
    }

    /// The input snapshot resolved for the current frame.
    pub fn keys(&self) -> InputSnapshot {
        self.keys
    }

    pub(crate) fn set_keys(&mut self, keys: InputSnapshot) {
        self.keys = keys;
    }

    /// The inputs recorded so far for this run.
    pub fn recording(&self) -> &Recording {
        &self.recording
    }

    /// Turn this state into a ghost driven by `recording`. The stream is
    /// read-only from here on; the replay cursor starts at the beginning.
    pub fn make_ghost(&mut self, recording: Recording) {
        self.load_recording(recording);
        self.ghost = true;
    }

    /// Load a recorded run for whole-level replay. Unlike a ghost the
    /// character stays a registered player; the level's replaying flag
    /// decides whether this stream or the live source drives it.
    pub fn load_recording(&mut self, recording: Recording) {
        self.recording = recording;
        self.cursor = 0;
    }

    /// Next recorded input. Once the recording is exhausted the ghost goes
    /// idle rather than erroring or looping.
    pub(crate) fn next_input(&mut self) -> InputSnapshot {
        match self.recording.get(self.cursor) {
            Some(snapshot) => {
                self.cursor += 1;
                snapshot
            }
            None => InputSnapshot::STILL,
        }
    }

    pub(crate) fn record_frame(&mut self, keys: InputSnapshot) {
        self.recording.push(keys);
    }

    pub(crate) fn tick_cooldown(&mut self) {
        if self.hurt_cooldown > 0 {
            self.hurt_cooldown -= 1;
        }
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity {
    /// Drive the vitality state machine.
    ///
    /// Rejected transitions (killing the dead, leaving completed) return an
    /// error and leave the entity untouched. Accepted transitions apply
    /// their side effects: death deactivates and hides the entity, spawns
    /// the death visual and plays the death cue; revival reactivates and
    /// shows it.
    pub fn set_vitality(
        &mut self,
        to: Vitality,
        ops: &mut FrameOps,
    ) -> Result<(), TransitionError> {
        let player = self.player.as_ref().ok_or(TransitionError::NotPlayable)?;
        let from = player.vitality;

        if from == Vitality::Completed && to != Vitality::Completed {
            return Err(TransitionError::CompletedIsTerminal);
        }
        if from == Vitality::Dead && to == Vitality::Dead {
            return Err(TransitionError::AlreadyDead);
        }
        if from == to {
            return Ok(());
        }

        if let Some(player) = self.player.as_mut() {
            player.vitality = to;
        }
        log::debug!("entity {:?} vitality {:?} -> {:?}", self.id, from, to);
        match to {
            Vitality::Dead => self.apply_death_effects(ops),
            Vitality::Alive => {
                // Revival path.
                self.active = true;
                self.visible = true;
            }
            Vitality::Completed => {}
        }
        Ok(())
    }

    fn apply_death_effects(&mut self, ops: &mut FrameOps) {
        self.active = false;
        self.visible = false;
        let center = self.center();
        if let Some(player) = self.player.as_ref() {
            if let Some(blueprint) = player.death_visual.as_ref() {
                let visual = blueprint.instantiate_centered(center);
                ops.add_temp(visual, blueprint.lifetime);
            }
            if let Some(cue) = player.death_cue {
                ops.play_sound(cue);
            }
        }
    }

    /// Apply a hit-point delta.
    ///
    /// Non-negative amounts heal and clear the hurt cooldown. Negative
    /// amounts apply only once the cooldown has fully elapsed, then re-arm
    /// it and play the hurt cue if hit points stay positive. Reaching zero
    /// or below while alive forces the alive→dead transition.
    pub fn touch(&mut self, amount: i32, ops: &mut FrameOps) -> Result<(), TransitionError> {
        let player = self.player.as_mut().ok_or(TransitionError::NotPlayable)?;

        if amount >= 0 {
            player.hp += amount;
            player.hurt_cooldown = 0;
        } else if player.hurt_cooldown <= 0 {
            player.hp += amount;
            player.hurt_cooldown = HURT_COOLDOWN_FRAMES;
            if player.hp > 0 {
                if let Some(cue) = player.hurt_cue {
                    ops.play_sound(cue);
                }
            }
        }

        if player.hp <= 0 && player.vitality == Vitality::Alive {
            self.set_vitality(Vitality::Dead, ops)?;
        }
        Ok(())
    }

    /// Explicit win: alive→completed.
    pub fn win(&mut self, ops: &mut FrameOps) -> Result<(), TransitionError> {
        self.set_vitality(Vitality::Completed, ops)
    }

    /// Force death unless already dead.
    pub fn lose(&mut self, ops: &mut FrameOps) -> Result<(), TransitionError> {
        match self.player.as_ref() {
            Some(player) if player.is_dead() => Ok(()),
            Some(_) => self.set_vitality(Vitality::Dead, ops),
            None => Err(TransitionError::NotPlayable),
        }
    }

    /// Explicit revival: dead→alive.
    pub fn revive(&mut self, ops: &mut FrameOps) -> Result<(), TransitionError> {
        self.set_vitality(Vitality::Alive, ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::context::DeferredOp;
    use crate::api::types::Rect;
    use crate::core::tiles::TileGrid;
    use std::collections::HashMap;

    fn with_ops<R>(f: impl FnOnce(&mut FrameOps) -> R) -> (R, Vec<DeferredOp>) {
        let tiles = TileGrid::new(4, 4);
        let obstacles = HashMap::new();
        let mut queued = Vec::new();
        let result = {
            let mut ops = FrameOps::new(0, &tiles, &obstacles, &mut queued);
            f(&mut ops)
        };
        (result, queued)
    }

    fn playable() -> Entity {
        Entity::new()
            .with_bounds(Rect::new(0.0, 0.0, 1.0, 1.0))
            .with_player(PlayerState::new())
    }

    #[test]
    fn one_hp_fatal_touch_dies_once_with_side_effects() {
        let mut e = playable();
        e.player.as_mut().unwrap().death_cue = Some(SoundCue(9));
        e.player.as_mut().unwrap().death_visual =
            Some(Blueprint::new(glam::Vec2::new(2.0, 2.0)).with_lifetime(30));

        let (result, queued) = with_ops(|ops| e.touch(-1, ops));
        result.unwrap();

        let p = e.player.as_ref().unwrap();
        assert!(p.is_dead());
        assert!(!e.active);
        assert!(!e.visible);
        let sounds = queued
            .iter()
            .filter(|op| matches!(op, DeferredOp::Sound(SoundCue(9))))
            .count();
        let spawns = queued
            .iter()
            .filter(|op| matches!(op, DeferredOp::AddTemp { life: 30, .. }))
            .count();
        assert_eq!(sounds, 1);
        assert_eq!(spawns, 1);
    }

    #[test]
    fn hurt_cooldown_blocks_repeat_damage() {
        let mut e = playable();
        let (r, _) = with_ops(|ops| e.touch(5, ops));
        r.unwrap();
        assert_eq!(e.player.as_ref().unwrap().hp(), 6);

        let (r, _) = with_ops(|ops| e.touch(-2, ops));
        r.unwrap();
        assert_eq!(e.player.as_ref().unwrap().hp(), 4);
        assert!(e.player.as_ref().unwrap().is_hurt());

        // Within the cooldown window: negative touches do not land.
        let (r, _) = with_ops(|ops| e.touch(-2, ops));
        r.unwrap();
        assert_eq!(e.player.as_ref().unwrap().hp(), 4);

        // Let the cooldown elapse.
        for _ in 0..HURT_COOLDOWN_FRAMES {
            e.player.as_mut().unwrap().tick_cooldown();
        }
        assert!(!e.player.as_ref().unwrap().is_hurt());
        let (r, _) = with_ops(|ops| e.touch(-2, ops));
        r.unwrap();
        assert_eq!(e.player.as_ref().unwrap().hp(), 2);
    }

    #[test]
    fn healing_clears_the_cooldown() {
        let mut e = playable();
        let (r, _) = with_ops(|ops| e.touch(4, ops));
        r.unwrap();
        let (r, _) = with_ops(|ops| e.touch(-1, ops));
        r.unwrap();
        assert!(e.player.as_ref().unwrap().is_hurt());
        let (r, _) = with_ops(|ops| e.touch(0, ops));
        r.unwrap();
        assert!(!e.player.as_ref().unwrap().is_hurt());
    }

    #[test]
    fn hurt_cue_plays_only_when_surviving() {
        let mut e = playable();
        e.player.as_mut().unwrap().hurt_cue = Some(SoundCue(3));
        let (r, _) = with_ops(|ops| e.touch(2, ops));
        r.unwrap();

        let (r, queued) = with_ops(|ops| e.touch(-1, ops));
        r.unwrap();
        assert!(queued
            .iter()
            .any(|op| matches!(op, DeferredOp::Sound(SoundCue(3)))));

        for _ in 0..HURT_COOLDOWN_FRAMES {
            e.player.as_mut().unwrap().tick_cooldown();
        }
        // Fatal touch: no hurt cue.
        let (r, queued) = with_ops(|ops| e.touch(-5, ops));
        r.unwrap();
        assert!(!queued
            .iter()
            .any(|op| matches!(op, DeferredOp::Sound(SoundCue(3)))));
    }

    #[test]
    fn killing_the_dead_fails_loudly() {
        let mut e = playable();
        let (r, _) = with_ops(|ops| e.lose(ops));
        r.unwrap();
        let (r, _) = with_ops(|ops| e.set_vitality(Vitality::Dead, ops));
        assert_eq!(r, Err(TransitionError::AlreadyDead));
        // lose() on an already-dead entity is the tolerant wrapper.
        let (r, _) = with_ops(|ops| e.lose(ops));
        assert_eq!(r, Ok(()));
    }

    #[test]
    fn completed_is_terminal() {
        let mut e = playable();
        let (r, _) = with_ops(|ops| e.win(ops));
        r.unwrap();
        let (r, _) = with_ops(|ops| e.revive(ops));
        assert_eq!(r, Err(TransitionError::CompletedIsTerminal));
        let (r, _) = with_ops(|ops| e.set_vitality(Vitality::Dead, ops));
        assert_eq!(r, Err(TransitionError::CompletedIsTerminal));
        assert!(e.player.as_ref().unwrap().is_done());
        // Re-completing is an idempotent no-op.
        let (r, _) = with_ops(|ops| e.win(ops));
        assert_eq!(r, Ok(()));
    }

    #[test]
    fn revival_restores_activity() {
        let mut e = playable();
        let (r, _) = with_ops(|ops| e.lose(ops));
        r.unwrap();
        assert!(!e.active);
        let (r, _) = with_ops(|ops| e.revive(ops));
        r.unwrap();
        assert!(e.active);
        assert!(e.visible);
        assert!(e.player.as_ref().unwrap().is_alive());
    }

    #[test]
    fn ghost_goes_idle_after_exhaustion() {
        let mut p = PlayerState::new();
        let rec: Recording = [
            InputSnapshot {
                right: true,
                ..InputSnapshot::STILL
            },
            InputSnapshot {
                jump: true,
                ..InputSnapshot::STILL
            },
        ]
        .into_iter()
        .collect();
        p.make_ghost(rec);
        assert!(p.next_input().right);
        assert!(p.next_input().jump);
        assert_eq!(p.next_input(), InputSnapshot::STILL);
        assert_eq!(p.next_input(), InputSnapshot::STILL);
    }

    #[test]
    fn non_playable_entity_rejects_vitality_calls() {
        let mut e = Entity::new();
        let (r, _) = with_ops(|ops| e.touch(-1, ops));
        assert_eq!(r, Err(TransitionError::NotPlayable));
    }
}
