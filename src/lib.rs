pub mod cli;
pub mod config;
pub mod net;
pub mod persistence;
pub mod simulation;
pub mod world;
