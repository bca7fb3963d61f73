//! Fat (universal) container slice location.
//!
//! A fat container wraps several single-architecture images in one file,
//! prefixed by an architecture table. The table is stored byte-swapped
//! relative to the reader on the platforms this tool targets, so the byte
//! order is detected once from the magic and then applied to every field
//! through the [`byteorder`] traits.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::macho::constants::{arch_name, FAT_CIGAM, FAT_MAGIC};
use crate::util::read_u32_le;

/// Size of the fat container header: magic plus architecture count.
pub const FAT_HEADER_SIZE: usize = 8;

/// Size of one architecture table entry:
/// cputype, cpusubtype, offset, size, align.
pub const FAT_ARCH_SIZE: usize = 20;

/// One architecture's byte range within a fat container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchSlice {
    /// CPU type of the slice.
    pub cputype: u32,
    /// CPU subtype of the slice.
    pub cpusubtype: u32,
    /// File offset of the slice within the container.
    pub offset: u64,
    /// Length of the slice in bytes.
    pub length: u64,
}

impl ArchSlice {
    /// Returns the conventional architecture name of this slice.
    pub fn arch_name(&self) -> &'static str {
        arch_name(self.cputype, self.cpusubtype)
    }
}

/// Where the loaded image's bytes live within the on-disk container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceLocation {
    /// The file is a thin image; the slice spans the whole file.
    WholeFile {
        /// Length of the file in bytes.
        length: u64,
    },
    /// The file is a fat container; the matched entry's byte range.
    FatSlice(ArchSlice),
}

impl SliceLocation {
    /// File offset where the image's bytes begin.
    #[inline]
    pub fn offset(&self) -> u64 {
        match self {
            SliceLocation::WholeFile { .. } => 0,
            SliceLocation::FatSlice(arch) => arch.offset,
        }
    }

    /// Length of the image's bytes.
    #[inline]
    pub fn length(&self) -> u64 {
        match self {
            SliceLocation::WholeFile { length } => *length,
            SliceLocation::FatSlice(arch) => arch.length,
        }
    }

    /// Returns true if the container is fat.
    #[inline]
    pub fn is_fat(&self) -> bool {
        matches!(self, SliceLocation::FatSlice(_))
    }
}

/// Locates the running architecture's slice within a container.
///
/// `header` holds the first bytes of the container file; `cputype` and
/// `cpusubtype` come from the loaded image's in-memory header. A file that
/// is not a fat container is treated as a single slice spanning all of
/// `file_len` — that is not an error. A fat container without a matching
/// entry fails with [`Error::NoMatchingSlice`].
pub fn locate_slice(
    header: &[u8],
    cputype: u32,
    cpusubtype: u32,
    file_len: u64,
) -> Result<SliceLocation> {
    if header.len() < FAT_HEADER_SIZE {
        return Ok(SliceLocation::WholeFile { length: file_len });
    }

    match read_u32_le(header) {
        // The standard container stores its table big-endian, which reads
        // back as the swapped magic on a little-endian host.
        FAT_CIGAM => locate_in_table::<BigEndian>(header, cputype, cpusubtype),
        FAT_MAGIC => locate_in_table::<LittleEndian>(header, cputype, cpusubtype),
        _ => Ok(SliceLocation::WholeFile { length: file_len }),
    }
}

/// Parses the architecture table of a fat container.
///
/// Returns `None` if the bytes are not a fat container. Used by callers that
/// want the whole table rather than one matching slice.
pub fn arch_slices(header: &[u8]) -> Option<Vec<ArchSlice>> {
    if header.len() < FAT_HEADER_SIZE {
        return None;
    }
    match read_u32_le(header) {
        FAT_CIGAM => Some(read_table::<BigEndian>(header)),
        FAT_MAGIC => Some(read_table::<LittleEndian>(header)),
        _ => None,
    }
}

fn read_table<E: ByteOrder>(header: &[u8]) -> Vec<ArchSlice> {
    let count = E::read_u32(&header[4..]) as usize;
    let mut slices = Vec::with_capacity(count);

    for index in 0..count {
        let entry = FAT_HEADER_SIZE + index * FAT_ARCH_SIZE;
        if entry + FAT_ARCH_SIZE > header.len() {
            break;
        }
        slices.push(ArchSlice {
            cputype: E::read_u32(&header[entry..]),
            cpusubtype: E::read_u32(&header[entry + 4..]),
            offset: E::read_u32(&header[entry + 8..]) as u64,
            length: E::read_u32(&header[entry + 12..]) as u64,
        });
    }

    slices
}

fn locate_in_table<E: ByteOrder>(
    header: &[u8],
    cputype: u32,
    cpusubtype: u32,
) -> Result<SliceLocation> {
    for slice in read_table::<E>(header) {
        if slice.cputype == cputype && slice.cpusubtype == cpusubtype {
            // A matched entry with a zero offset or length carries no
            // usable image bytes.
            if slice.offset == 0 || slice.length == 0 {
                break;
            }
            return Ok(SliceLocation::FatSlice(slice));
        }
    }

    Err(Error::NoMatchingSlice {
        cputype,
        cpusubtype,
    })
}
