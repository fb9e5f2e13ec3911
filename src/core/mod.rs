//! Core types shared by the launcher and the updater.
//!
//! At the moment this is the error system: [`LauncherError`] for typed
//! failures and [`ErrorContext`] for operator-facing messages.

pub mod error;

pub use error::{ErrorContext, LauncherError, user_friendly_error};
