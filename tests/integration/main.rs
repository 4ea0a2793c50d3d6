//! Integration tests: the full pipeline wired to in-memory services.

mod pipeline;
