//! Process memory access seam.
//!
//! The scanner and patcher read the loaded image's header and plaintext
//! through [`MemoryView`] rather than any ambient process API, so the same
//! code runs against a live instrumentation host, a captured snapshot file,
//! or an in-memory fixture in tests.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Error, Result};

/// Read access to the virtual address space of the instrumented process.
///
/// Implementations must serve any address inside an enumerated module's
/// `[base, base + size)` range.
pub trait MemoryView {
    /// Fills `buf` with the bytes at `addr`.
    fn read_bytes(&self, addr: u64, buf: &mut [u8]) -> Result<()>;

    /// Reads a native-order u32 at `addr`.
    fn read_u32(&self, addr: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

/// A byte slice viewed as memory starting at address zero.
///
/// Lets on-disk slice bytes stand in for a mapped image: the loader maps a
/// selected slice starting at its own offset zero, so file offsets within
/// the slice and addresses relative to the base coincide.
impl MemoryView for [u8] {
    fn read_bytes(&self, addr: u64, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(addr).map_err(|_| Error::memory_read(addr, buf.len()))?;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.len())
            .ok_or_else(|| Error::memory_read(addr, buf.len()))?;
        buf.copy_from_slice(&self[start..end]);
        Ok(())
    }
}

enum SnapshotData {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

/// A captured image of one loaded module's memory.
///
/// Backs the offline workflow (a snapshot file mapped from disk) and the
/// tests (a snapshot built in memory). Addresses are validated against the
/// `[base, base + len)` window the snapshot covers.
pub struct SnapshotImage {
    data: SnapshotData,
    base: u64,
}

impl SnapshotImage {
    /// Wraps an in-memory snapshot captured at `base`.
    pub fn from_bytes(data: Vec<u8>, base: u64) -> Self {
        Self {
            data: SnapshotData::Owned(data),
            base,
        }
    }

    /// Memory maps a snapshot file captured at `base`.
    pub fn map_file(path: &Path, base: u64) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::FileOpen {
            path: path.to_path_buf(),
            source: e,
        })?;

        // The map stays valid for the life of the Mmap; the snapshot file
        // is not expected to change underneath us.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| Error::MemoryMap {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            data: SnapshotData::Mapped(map),
            base,
        })
    }

    /// Base address the snapshot was captured at.
    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Length of the snapshot in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// Returns true if the snapshot is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    fn bytes(&self) -> &[u8] {
        match &self.data {
            SnapshotData::Owned(vec) => vec,
            SnapshotData::Mapped(map) => map,
        }
    }
}

impl MemoryView for SnapshotImage {
    fn read_bytes(&self, addr: u64, buf: &mut [u8]) -> Result<()> {
        let offset = addr
            .checked_sub(self.base)
            .ok_or_else(|| Error::memory_read(addr, buf.len()))?;
        self.bytes().read_bytes(offset, buf)
    }
}

/// Streams process memory as a [`Read`] source for the chunked copier.
///
/// Each read consumes the requested bytes starting at the cursor's current
/// address and advances it; a failed memory read surfaces as an I/O error.
pub struct MemoryCursor<'a, M: MemoryView + ?Sized> {
    mem: &'a M,
    addr: u64,
}

impl<'a, M: MemoryView + ?Sized> MemoryCursor<'a, M> {
    /// Creates a cursor positioned at `addr`.
    pub fn new(mem: &'a M, addr: u64) -> Self {
        Self { mem, addr }
    }
}

impl<M: MemoryView + ?Sized> Read for MemoryCursor<'_, M> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.mem
            .read_bytes(self.addr, buf)
            .map_err(|e| io::Error::new(io::ErrorKind::UnexpectedEof, e))?;
        self.addr += buf.len() as u64;
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_view_bounds() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut buf = [0u8; 4];

        data.as_slice().read_bytes(2, &mut buf).unwrap();
        assert_eq!(buf, [3, 4, 5, 6]);

        assert!(data.as_slice().read_bytes(6, &mut buf).is_err());
    }

    #[test]
    fn test_snapshot_window() {
        let snap = SnapshotImage::from_bytes(vec![0xAA; 16], 0x1000);
        assert_eq!(snap.base(), 0x1000);
        assert_eq!(snap.len(), 16);

        assert_eq!(snap.read_u32(0x1000).unwrap(), 0xAAAA_AAAA);
        assert!(snap.read_u32(0xFFF).is_err());
        assert!(snap.read_u32(0x100E).is_err());
    }

    #[test]
    fn test_memory_cursor_advances() {
        let snap = SnapshotImage::from_bytes((0u8..16).collect(), 0x4000);
        let mut cursor = MemoryCursor::new(&snap, 0x4004);

        let mut buf = [0u8; 4];
        cursor.read(&mut buf).unwrap();
        assert_eq!(buf, [4, 5, 6, 7]);
        cursor.read(&mut buf).unwrap();
        assert_eq!(buf, [8, 9, 10, 11]);
    }
}
