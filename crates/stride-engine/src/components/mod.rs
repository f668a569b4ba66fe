pub mod animation;
pub mod blueprint;
pub mod entity;
pub mod hitbox;
pub mod mobile;
pub mod playable;
