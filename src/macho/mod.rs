//! Mach-O file format handling.
//!
//! This module provides the format logic of the dump pipeline: fat container
//! slice location, mach header classification, and encryption descriptor
//! discovery in a loaded image's command table.

mod constants;
mod encryption;
mod fat;
mod header;
mod structs;

pub use constants::*;
pub use encryption::*;
pub use fat::*;
pub use header::*;
pub use structs::*;
