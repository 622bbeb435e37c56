pub mod config;
pub mod daemon;
pub mod settings;
pub mod timer;
