//! imgshrink Core Library
//!
//! This library provides the core functionality for the imgshrink tool,
//! which batch-compresses images by submitting them to a remote shrink
//! service while keeping repeated runs idempotent.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`scheduler`] - Bounded-concurrency task scheduler with retry drain
//! - [`cache`] - Content-addressed dedup cache of processed fingerprints
//! - [`walker`] - Recursive discovery of candidate image files
//! - [`compress`] - HTTP client for the remote shrink service
//!
//! The scheduler and cache are the correctness-critical core: admission
//! control over a work queue, failure isolation into a retry queue,
//! quiescence detection, and persisted fingerprints that make re-runs
//! skip already-compressed files.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod compress;
pub mod scheduler;
pub mod walker;

// Re-export commonly used types
pub use cache::{CacheError, ContentCache, Fingerprint};
pub use compress::{CompressClient, CompressError, CompressOutcome};
pub use scheduler::{
    DEFAULT_CONCURRENCY, RunReport, Scheduler, SchedulerError, SchedulerStats, Task, TaskError,
    task,
};
pub use walker::{DEFAULT_MAX_FILE_SIZE, ScanFilter, scan};
