//! Self-update for launchkit.
//!
//! A running program cannot reliably overwrite its own executable, so an
//! update is split across two processes that share nothing but the
//! filesystem:
//!
//! - The **live application** ([`UpdateOrchestrator`]) checks the remote
//!   version descriptor, downloads the new executable, starts
//!   `launchkit-updater` and exits immediately.
//! - The **updater** ([`Updater`]) waits for the old process to go away and
//!   for the executable to become free. It then backs up the executable and
//!   swaps in the new one. Last, it records the new version, clears the
//!   instance lock and relaunches the application.
//!
//! # Update Process Flow
//!
//! ```text
//! launchkit (live)                         launchkit-updater
//! ----------------                         -----------------
//! 1. UpdateChecker::check_for_update
//!    └── GET update_url, literal version comparison
//! 2. Downloader::download
//!    └── stream to <download_dir>/<name>, progress over a channel
//! 3. spawn updater(staged, exe, pid, version) ──► WAIT_PID        (30s, then continue)
//! 4. release lock, exit(0)                        WAIT_FILE_FREE  (60s, then ABORT)
//!                                                 BACKUP          rename exe -> exe_backup
//!                                                 SWAP            rename or copy, rollback on failure
//!                                                 WRITE_VERSION   version_local.json
//!                                                 CLEAR_LOCK      launcher.lock
//!                                                 RELAUNCH        detached, cwd = install dir
//! ```
//!
//! # Files in the Install Directory
//!
//! | File | Written by | Purpose |
//! |---|---|---|
//! | `launchkit[.exe]` | updater | the application |
//! | `launchkit_backup[.exe]` | updater | previous version, kept for recovery |
//! | `version_local.json` | both | installed version and time of install |
//! | `launcher.lock` | live app | pid of the running instance |
//! | `launchkit.toml` | operator | optional configuration |
//!
//! # Version Comparison
//!
//! An update is available when the remote version is non-empty and differs
//! from the installed one byte for byte. Publishing an older version string
//! therefore offers a downgrade; there is no version ordering.
//!
//! # Module Structure
//!
//! - [`version_store`]: the persisted installed-version record
//! - [`version_check`]: remote descriptor fetch and comparison
//! - [`download`]: streaming download without partial artifacts
//! - [`orchestrator`]: the live application's side, including [`AppContext`]
//! - [`updater`]: the updater state machine
//! - [`probe`], [`process`], [`instance_lock`], [`backup`]: the OS-facing pieces
//!   the state machine is built from
//! - [`config`]: the `[upgrade]` configuration section

pub mod backup;
pub mod config;
pub mod download;
pub mod instance_lock;
pub mod orchestrator;
pub mod probe;
pub mod process;
pub mod updater;
pub mod version_check;
pub mod version_store;


pub use backup::BackupManager;
pub use download::Downloader;
pub use orchestrator::{AppContext, UpdateChoice, UpdateOrchestrator, UpdatePrompt};
pub use updater::{UpdateReport, Updater, UpdaterArgs, UpdaterState};
pub use version_check::{UpdateChecker, VersionDescriptor, is_update_available};
pub use version_store::{LocalVersionRecord, VersionStore};
