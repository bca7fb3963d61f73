//! Mach header classification.
//!
//! The loaded image's header is always a single-architecture mach header,
//! even when the on-disk file is a fat container. Classification only needs
//! the 4-byte magic: it decides the bit width and, with it, the fixed header
//! length after which the load commands begin.

use crate::error::{Error, Result};
use crate::macho::constants::{MH_CIGAM, MH_CIGAM_64, MH_MAGIC, MH_MAGIC_64};
use crate::macho::structs::{MachHeader32, MachHeader64};

/// Byte offset of the cputype field within a mach header (both widths).
pub const CPUTYPE_OFFSET: u64 = 4;

/// Byte offset of the cpusubtype field within a mach header (both widths).
pub const CPUSUBTYPE_OFFSET: u64 = 8;

/// Byte offset of the load command count field (both widths).
pub const NCMDS_OFFSET: u64 = 16;

/// Bit width and fixed header length of a classified mach header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    /// True for 64-bit images.
    pub is_64bit: bool,
    /// Fixed header length in bytes; load commands start here.
    pub size: u64,
}

/// Classifies a mach header by its magic.
///
/// Both byte orders of each magic are accepted. Any other value fails with
/// [`Error::InvalidMagic`].
pub fn classify(magic: u32) -> Result<HeaderInfo> {
    match magic {
        MH_MAGIC | MH_CIGAM => Ok(HeaderInfo {
            is_64bit: false,
            size: MachHeader32::SIZE as u64,
        }),
        MH_MAGIC_64 | MH_CIGAM_64 => Ok(HeaderInfo {
            is_64bit: true,
            size: MachHeader64::SIZE as u64,
        }),
        other => Err(Error::InvalidMagic(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_recognized_magics() {
        for magic in [MH_MAGIC, MH_CIGAM] {
            let info = classify(magic).unwrap();
            assert!(!info.is_64bit);
            assert_eq!(info.size, 28);
        }
        for magic in [MH_MAGIC_64, MH_CIGAM_64] {
            let info = classify(magic).unwrap();
            assert!(info.is_64bit);
            assert_eq!(info.size, 32);
        }
    }

    #[test]
    fn test_classify_rejects_unknown_magic() {
        for magic in [0u32, 0xCAFEBABE, 0xDEADBEEF, 0xFEEDFAC0] {
            match classify(magic) {
                Err(Error::InvalidMagic(m)) => assert_eq!(m, magic),
                other => panic!("expected InvalidMagic, got {:?}", other),
            }
        }
    }
}
