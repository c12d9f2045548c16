//! Lapboard Server Library
//!
//! Exposes server components for integration testing.

pub mod api;
pub mod config;
pub mod recompute;
pub mod scheduler;
pub mod state;
