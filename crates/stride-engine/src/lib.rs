pub mod api;
pub mod components;
pub mod core;
pub mod input;

// Re-export key types at crate root for convenience
pub use crate::api::context::{FrameOps, Surroundings};
pub use crate::api::types::{EntityId, Rect, SoundCue};
pub use crate::components::animation::{FrameCell, Playback, Sequencer};
pub use crate::components::blueprint::Blueprint;
pub use crate::components::entity::{Behavior, BehaviorId, Entity, LifecycleHook, TileBehavior};
pub use crate::components::hitbox::{Hitbox, PixelMask};
pub use crate::components::mobile::{step_toward, Facing, Mobility, MoveOutcome};
pub use crate::components::playable::{PlayerState, TransitionError, Vitality, HURT_COOLDOWN_FRAMES};
pub use crate::core::checkpoint::CheckpointHandler;
pub use crate::core::level::Level;
pub use crate::core::tiles::{Tile, TileGrid, TileSource};
pub use crate::input::snapshot::{Idle, InputSnapshot, InputSource, Recording};
