//! fidump - reconstructs decrypted Mach-O images from a running process.
//!
//! An executable whose on-disk form carries an encrypted range is decrypted
//! transparently by the loader, so the plaintext is resident in the running
//! process. This library copies the original container from disk, overwrites
//! the encrypted range with the plaintext read from memory, and clears the
//! encryption descriptor's cryptid flag so downstream tools treat the output
//! as unencrypted.
//!
//! # Features
//!
//! - Fat (universal) container slice selection by the running architecture
//! - 32- and 64-bit mach header classification
//! - Bounded load command walking with a central zero-size guard
//! - Fixed-buffer patched copying with exact-length guarantees
//! - Batch dumping of an application's modules, one outcome per module
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use fidump::{Dumper, ImageDescriptor, ModuleHost, Result, SnapshotImage};
//!
//! // The host wraps the instrumentation API of the target process.
//! struct Host;
//!
//! impl ModuleHost for Host {
//!     fn modules(&self) -> Result<Vec<ImageDescriptor>> {
//!         Ok(Vec::new())
//!     }
//!     fn is_loaded(&self, _name: &str) -> bool {
//!         true
//!     }
//!     fn load_library(&self, _path: &Path) -> bool {
//!         false
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let memory = SnapshotImage::map_file("MyApp.mem".as_ref(), 0x100000000)?;
//!     let dumper = Dumper::new(&Host, &memory, "/var/mobile/Documents");
//!
//!     for outcome in dumper.run_dump(None)? {
//!         println!("{} {} -> patched {} bytes",
//!             outcome.name, outcome.base_string(), outcome.bytes_patched());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod copy;
pub mod dumper;
pub mod error;
pub mod macho;
pub mod memory;
pub mod patcher;
pub mod util;

// Re-export main types
pub use copy::{ChunkedCopier, BUFSIZE};
pub use dumper::{DumpOutcome, DumpStatus, Dumper, ImageDescriptor, ModuleHost};
pub use error::{Error, Result};
pub use macho::{ArchSlice, EncryptionInfo, HeaderInfo, SliceLocation};
pub use memory::{MemoryCursor, MemoryView, SnapshotImage};
pub use patcher::patch_image;
