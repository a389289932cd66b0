pub mod action;
pub mod classify;
pub mod config;
pub mod instance;
pub mod interactive;
pub mod rotate;
pub mod sequencer;
pub mod style;

pub use crate::config::Config;
