//! Core engine: the fetch → filter → decode → trade loop.

pub mod filter;
pub mod ledger;
pub mod dispatcher;
pub mod pipeline;
