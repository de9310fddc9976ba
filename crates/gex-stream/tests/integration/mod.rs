//! Shared fixtures for gex-stream integration tests.

pub mod common;
