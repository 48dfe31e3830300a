//! Test support module
//!
//! Shared fixtures and helpers for the integration tests.

pub mod helpers;

pub mod fixtures;
