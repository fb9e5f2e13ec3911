//! Cross-cutting utilities: atomic file writes and progress display.

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, remove_if_exists, write_json_file};
pub use progress::{DownloadProgress, ProgressBar, ProgressStyle};
