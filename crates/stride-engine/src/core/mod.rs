pub mod checkpoint;
pub mod level;
pub mod tiles;
