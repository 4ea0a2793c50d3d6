//! DECKWATCH: battle log to stock trades
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod sources;
pub mod services;
pub mod engine;
pub mod dashboard;
