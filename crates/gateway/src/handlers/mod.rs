//! API handlers module

pub mod analytics;
pub mod config_options;
pub mod health;
pub mod tasks;
