//! Domain types shared by the image task engine.
//!
//! Holds the task record, its status state machine, submission
//! parameters, command objects and the pure oracles (display-name
//! resolution, language detection) consumed by the engine.

pub mod catalog;
pub mod commands;
pub mod error;
pub mod language;
pub mod status;
pub mod task;
pub mod types;
