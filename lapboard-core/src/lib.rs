//! Lapboard Core Library
//!
//! This crate provides the timing data model and the ranking and scoring
//! engine: lap-time parsing, session grouping, circuit leaderboards, position
//! tracking, points rules and competition standings. Everything here is pure
//! computation over snapshots handed in by a [`TimingStore`].

pub mod error;
pub mod grouping;
pub mod laptime;
pub mod model;
pub mod ranking;
pub mod scoring;
pub mod standings;
pub mod store;
pub mod tracking;

pub use error::{RuleError, StoreError};
pub use ranking::LeaderboardEntry;
pub use scoring::ScoringRule;
pub use standings::Standing;
pub use store::TimingStore;
