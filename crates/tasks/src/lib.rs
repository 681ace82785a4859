//! Asynchronous task lifecycle engine.
//!
//! Turns generation requests into tracked tasks and drives each one to a
//! terminal state:
//!
//! - [`orchestrator`] validates, preprocesses and submits jobs, then
//!   attaches a poller to every new task.
//! - [`registry`] owns all task records and enforces the status state
//!   machine.
//! - [`poller`] runs one polling loop per active task.
//! - [`preprocessor`] translates prompts before submission.
//! - [`events`] carries registry changes to observers.
//! - [`config`] reads engine settings from the environment.

pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod poller;
pub mod preprocessor;
pub mod registry;
