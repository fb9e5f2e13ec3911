//! Integration test suite for launchkit
//!
//! End-to-end tests that drive the `launchkit` and `launchkit-updater`
//! binaries against throwaway install directories and a local HTTP server.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **launcher**: `version`, `check`, `run`, `rollback` and the single-instance lock
//! - **updater**: exit codes and the file swap performed by the updater binary
//! - **handoff**: the complete launcher → updater → relaunch cycle

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod handoff;
mod launcher;
mod updater;
