pub mod game;
pub mod generation;
