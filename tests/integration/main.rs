//! Integration tests for linkscrub
//!
//! These exercise the public API end to end: the bundled rule file, rule
//! resolution with a fake transport, and the interceptor backed by SQLite.

mod common;
mod engine_tests;
mod pipeline_tests;
mod state_tests;
