//! Error types for the dump pipeline.
//!
//! This module provides error handling for all dump operations, including
//! container parsing, load command walking, process memory access, and the
//! patched copy itself.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for image dump operations.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to memory map file '{path}': {source}")]
    MemoryMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source ended early: expected {expected} bytes, copied {copied}")]
    ShortRead { expected: u64, copied: u64 },

    // ==================== Memory Errors ====================
    #[error("cannot read {len} bytes of process memory at {addr:#x}")]
    MemoryRead { addr: u64, len: usize },

    // ==================== Format Errors ====================
    #[error("unrecognized Mach-O magic: {0:#x}")]
    InvalidMagic(u32),

    #[error("no slice for cpu type {cputype:#x} subtype {cpusubtype:#x} in fat container")]
    NoMatchingSlice { cputype: u32, cpusubtype: u32 },

    #[error("load command at offset {offset:#x} has zero size")]
    MalformedCommandTable { offset: u64 },

    // ==================== Module Errors ====================
    #[error("module not found: {name}")]
    ModuleNotFound { name: String },
}

/// A specialized Result type for dump operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true if this error describes a malformed or unsupported
    /// on-disk format rather than a failed file or memory operation.
    ///
    /// Format errors abort only the current module's dump; the batch
    /// continues with the next module.
    #[inline]
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Error::InvalidMagic(_)
                | Error::NoMatchingSlice { .. }
                | Error::MalformedCommandTable { .. }
        )
    }

    /// Creates a module not found error.
    #[inline]
    pub fn module_not_found(name: impl Into<String>) -> Self {
        Error::ModuleNotFound { name: name.into() }
    }

    /// Creates a memory read error.
    #[inline]
    pub fn memory_read(addr: u64, len: usize) -> Self {
        Error::MemoryRead { addr, len }
    }
}
