//! Remote image compression client.
//!
//! This module talks to the public shrink endpoint: it uploads a file's raw
//! bytes, parses the service's JSON verdict, downloads the compressed
//! result, and overwrites the source file in place.
//!
//! # Example
//!
//! ```no_run
//! use imgshrink_core::compress::CompressClient;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CompressClient::new();
//! let outcome = client.compress(Path::new("./photo.png")).await?;
//! println!("{} -> {} bytes", outcome.input_size, outcome.output_size);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod identity;

pub use client::{CompressClient, CompressOutcome, DEFAULT_ENDPOINT};
pub use error::CompressError;
