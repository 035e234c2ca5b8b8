pub mod compat;
pub mod config;
pub mod embedding;
pub mod model;
pub mod sequencer;
pub mod similarity;
pub mod snapshot;

/// Application name for XDG paths
pub const APP_NAME: &str = "segue";
