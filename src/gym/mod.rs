pub mod grid_world;

pub use grid_world::{Dir, GridState, GridWorld};
