//! Sequential Thinking MCP server.
//!
//! A Model Context Protocol server that records a sequence of structured
//! thoughts, keeps them durable on disk, and analyzes the sequence as it
//! grows: related-thought lookup, per-stage summaries, and detection of
//! ordering anomalies.
//!
//! # Architecture
//!
//! - [`model`] - Thought records, stages, and the persisted dataset
//! - [`store`] - Crash-safe file-backed persistence with advisory locking
//! - [`analysis`] - Pure functions over recorded sequences
//! - [`session`] - Controller combining store and analysis
//! - [`critic`] - Optional HTTP-backed critical-thinking commentary
//! - [`server`] - MCP protocol over stdio
//! - [`config`] - Environment-based configuration
//! - [`error`] - Error types for all subsystems

#![warn(missing_docs)]

pub mod analysis;
pub mod config;
pub mod critic;
pub mod error;
pub mod model;
pub mod server;
pub mod session;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use model::{Dataset, ThoughtRecord, ThoughtStage};
pub use session::{ProcessedThought, SessionController};
pub use store::SessionStore;
