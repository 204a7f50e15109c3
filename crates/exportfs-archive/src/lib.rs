//! Safe extraction of zip archives onto disk.
//!
//! # Architecture
//!
//! - `sanitize.rs` - Canonical containment check (zip-slip prevention)
//! - `extract.rs` - Extraction loops over seekable and streaming readers
//! - `options.rs` - Collision policy, directory reporting, progress
//! - `error.rs` - Error taxonomy

pub use error::{Error, Result};
pub use extract::{extract, extract_file, extract_stream};
pub use options::{CollisionPolicy, ExtractOptions, Progress};
pub use sanitize::{ContainedPath, canonical_root, resolve_contained};

mod error;
mod extract;
pub mod options;
mod sanitize;
