//! Shared test utilities for lexicard integration tests.
//!
//! This module provides:
//! - `TestHarness` with an in-memory database and recording collaborators
//! - Builders for word results, activities and configuration files
//!
//! Each test binary uses a different part of it.

#![allow(dead_code, unused_imports)]

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{FakeGateway, RecordingNotifier, RecordingScheduler, TestHarness};
