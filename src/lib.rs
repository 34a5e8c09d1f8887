//! In-memory tar archive decoder with PAX support and worker-thread offload
//!
//! # Usage
//!
//! ## Decoding an archive on the current thread
//!
//! ```rust
//! use untar_light::decode;
//!
//! let tar_data = vec![0u8; 1024];
//! let files = decode(&tar_data, Some("assets/")).unwrap();
//! for file in &files {
//!     let content = file.content.as_ref().unwrap();
//!     println!("{:?}: {} bytes", file.name, content.len());
//! }
//! ```
//!
//! ## Decoding on a worker thread
//!
//! ```rust
//! use untar_light::{UntarWorker, WorkerConfig};
//!
//! let mut worker = UntarWorker::new(WorkerConfig::default()).unwrap();
//! worker
//!     .submit(vec![0u8; 1024], |result| match result {
//!         Ok(files) => println!("{} files", files.len()),
//!         Err(e) => eprintln!("Error: {}", e),
//!     })
//!     .unwrap();
//! // callbacks run here, on the thread that owns the worker
//! worker.wait();
//! ```
//!
//! ## Listing files in a TAR archive on disk
//!
//! ```rust,no_run
//! use untar_light::list;
//!
//! match list("archive.tar") {
//!     Ok(files) => {
//!         println!("Files in archive:");
//!         for file in files {
//!             println!("  {:?} ({} bytes)", file.name, file.size);
//!         }
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

pub mod channel;
pub mod config;
pub mod content;
pub mod error;
pub mod pax;
pub mod tar;
pub mod worker;

#[cfg(test)]
pub(crate) mod test;

use std::fs;
use std::path::Path;

pub use config::WorkerConfig;
pub use content::{Content, Resolution};
pub use error::{Result, UntarError};
pub use pax::{PaxField, PaxHeader};
pub use tar::{FileEntry, Untar};
pub use worker::UntarWorker;

/// Decodes `archive` on the current thread and attaches a content handle to
/// every entry. `prefix` is prepended to each non-empty name.
pub fn decode(archive: &[u8], prefix: Option<&str>) -> Result<Vec<FileEntry>> {
    let mut files = Untar::new(archive).untar(prefix)?;
    Resolution::Immediate.apply(archive, &mut files);
    Ok(files)
}

/// Lists the files of a tar archive on disk, without content
pub fn list(tarfile: impl AsRef<Path>) -> Result<Vec<FileEntry>> {
    let tar_data = fs::read(tarfile)?;
    Untar::new(&tar_data).untar(None)
}
