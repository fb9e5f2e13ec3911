//! Configuration management for launchkit.
//!
//! There is a single configuration file, `launchkit.toml`, read by the live
//! application. The updater process takes everything it needs from its
//! command line and never reads configuration.

mod launcher;

pub use launcher::LauncherConfig;
