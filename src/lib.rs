//! launchkit - application launcher with in-place self-update
//!
//! A running application cannot overwrite its own executable on every
//! platform, so updates are split across two processes:
//!
//! - the **launcher** (`launchkit`) checks a remote version descriptor,
//!   downloads the new executable into a staging directory, starts the
//!   updater and exits at once;
//! - the **updater** (`launchkit-updater`) waits for the launcher to go away,
//!   backs up the old executable, swaps in the new one, records the installed
//!   version and starts the launcher again.
//!
//! # Architecture Overview
//!
//! ```text
//! launchkit                                   launchkit-updater
//! ─────────                                   ─────────────────
//! VersionStore ─ installed version
//! UpdateChecker ─ GET version.json
//! Downloader ─ stream to downloads/
//! UpdateOrchestrator ─ spawn updater ───────► WAIT_PID → WAIT_FILE_FREE
//!                      release lock, exit     → BACKUP → SWAP → WRITE_VERSION
//!                                             → CLEAR_LOCK → RELAUNCH → DONE
//! ```
//!
//! # Install Directory Layout
//!
//! ```text
//! <install dir>/
//! ├── launchkit                # the launcher executable
//! ├── launchkit_backup         # previous executable, left by the updater
//! ├── launchkit-updater        # the updater executable
//! ├── launchkit.toml           # optional configuration
//! ├── launcher.lock            # pid of the running instance
//! └── version_local.json       # installed version record
//! ```
//!
//! # Modules
//!
//! - [`cli`] - `launchkit` subcommands and logging setup
//! - [`config`] - `launchkit.toml` loading
//! - [`constants`] - file names, timeouts and defaults
//! - [`core`] - error types and operator-facing error messages
//! - [`upgrade`] - version store, checker, downloader, orchestrator and updater
//! - [`utils`] - atomic file writes and progress bars
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Start the launcher (checks for updates first)
//! launchkit run
//!
//! # Show installed and published versions
//! launchkit check
//!
//! # Install the published version without asking
//! launchkit upgrade --yes
//!
//! # Put the previous executable back
//! launchkit rollback
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod upgrade;
pub mod utils;

// Test utilities (available in tests and with the test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
