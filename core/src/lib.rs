//! Single-instance coordination and command dispatch for OneClickRunner.

pub mod actions;
pub mod app;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod instance;
pub mod ipc;
pub mod logging;

pub use error::{LauncherError, Result};
