//! One write interface over a directory on disk, a streaming zip and memory.
//!
//! Exporters write a tree of named files through a [`VirtualFile`] without
//! knowing which medium is behind it. Archives pulled back in go through
//! [`extract`], which refuses entries that would land outside the target.
//!
//! # Architecture
//!
//! - `vfile.rs` - The handle exporters see, dispatching to a medium
//! - `disk.rs` - Real directories
//! - `archive.rs` - Shared streaming zip encoder, prefix handles, nesting
//! - `memory.rs` - In-process maps for tests and previews
//! - `sink.rs` - Per-entry sinks and input streams
//! - `tree.rs` - Recursive export of any tree source
//! - `name.rs` - Display name to path segment
//! - `document.rs` - Structured documents as JSON
//! - `error.rs` - Error taxonomy

pub use archive::{ArchiveDestination, ArchiveOptions, EntrySink, SinkOwnership};
pub use disk::DiskDestination;
pub use error::{Error, Result};
pub use exportfs_archive::{
    CollisionPolicy, ExtractOptions, Progress, extract, extract_file, extract_stream,
};
pub use memory::{MemoryBuffer, MemoryDestination};
pub use name::{file_name_with_timestamp, make_legal_name};
pub use sink::{ByteSink, InputStream, TextSink};
pub use tree::{FsTree, TreeSource, export_contents, export_tree};
pub use vfile::VirtualFile;

pub use zip::CompressionMethod;

mod archive;
mod disk;
pub mod document;
mod error;
mod memory;
pub mod name;
mod sink;
mod tree;
mod vfile;
