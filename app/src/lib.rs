//! Twitch live notifier: polls tracked channels and opens/announces the
//! ones that just went live.

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod control;
pub mod credentials;
pub mod matcher;
pub mod platform;
pub mod reconcile;
pub mod scheduler;
pub mod server;
pub mod shutdown;
pub mod status;

pub use bootstrap::{init_foundation, spawn_background_tasks};
