//! learnloop command-line front end.
//!
//! Configuration, logging and rendering live here, separate from main.rs,
//! so command handlers can be exercised in-process by the integration tests.

pub mod commands;
pub mod config;
pub mod logging;
pub mod render;
