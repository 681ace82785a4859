//! HTTP client for the remote image-generation and translation services.
//!
//! Provides typed request/response messages, a [`reqwest`]-based API
//! wrapper and the [`backend`] traits through which the task engine
//! talks to the remote side. The client never retries or caches;
//! failure policy belongs to its callers.

pub mod api;
pub mod backend;
pub mod config;
pub mod messages;
