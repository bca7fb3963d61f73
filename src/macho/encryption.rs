//! Encryption descriptor discovery in a loaded image's command table.
//!
//! The walk runs against the live memory image, not the disk copy: the
//! loader maps the selected slice starting at its own offset zero, so the
//! command table offsets read from memory are valid file offsets within the
//! slice.

use crate::error::{Error, Result};
use crate::macho::constants::{LC_ENCRYPTION_INFO, LC_ENCRYPTION_INFO_64};
use crate::macho::header::{HeaderInfo, NCMDS_OFFSET};
use crate::memory::MemoryView;

/// One load command header, as encountered while walking the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadCommandEntry {
    /// Command id.
    pub cmd: u32,
    /// Command size in bytes; always nonzero for yielded entries.
    pub cmdsize: u32,
    /// Offset of this command from the image base.
    pub offset: u64,
}

/// Bounded iterator over the load commands of a loaded image.
///
/// Yields at most the header's declared command count. A zero-size command
/// means the walk cannot advance; the iterator yields
/// [`Error::MalformedCommandTable`] once and then fuses, so a corrupt table
/// can never hang the caller.
pub struct LoadCommands<'a, M: MemoryView + ?Sized> {
    mem: &'a M,
    base: u64,
    cursor: u64,
    remaining: u32,
    done: bool,
}

impl<'a, M: MemoryView + ?Sized> LoadCommands<'a, M> {
    /// Starts a walk at `base + header.size`.
    pub fn new(mem: &'a M, base: u64, header: &HeaderInfo) -> Result<Self> {
        let ncmds = mem.read_u32(base + NCMDS_OFFSET)?;
        Ok(Self {
            mem,
            base,
            cursor: header.size,
            remaining: ncmds,
            done: false,
        })
    }
}

impl<M: MemoryView + ?Sized> Iterator for LoadCommands<'_, M> {
    type Item = Result<LoadCommandEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 {
            return None;
        }

        let cmd = match self.mem.read_u32(self.base + self.cursor) {
            Ok(value) => value,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let cmdsize = match self.mem.read_u32(self.base + self.cursor + 4) {
            Ok(value) => value,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        if cmdsize == 0 {
            self.done = true;
            return Some(Err(Error::MalformedCommandTable {
                offset: self.cursor,
            }));
        }

        let entry = LoadCommandEntry {
            cmd,
            cmdsize,
            offset: self.cursor,
        };
        self.cursor += cmdsize as u64;
        self.remaining -= 1;
        Some(Ok(entry))
    }
}

/// Location of the encryption descriptor within an image.
///
/// All offsets are relative to the slice start, which equals the offset
/// from the in-memory image base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionInfo {
    /// File offset of the cryptid flag field.
    pub cryptid_offset: u64,
    /// Start of the encrypted byte range.
    pub cryptoff: u64,
    /// Length of the encrypted byte range.
    pub cryptsize: u64,
}

/// Scans the command table for an encryption descriptor.
///
/// Returns `Ok(None)` when the image carries none — a valid state meaning
/// the image is not encrypted. When several descriptors are present the
/// last one wins.
pub fn find_encryption_info<M: MemoryView + ?Sized>(
    mem: &M,
    base: u64,
    header: &HeaderInfo,
) -> Result<Option<EncryptionInfo>> {
    let mut found = None;

    for entry in LoadCommands::new(mem, base, header)? {
        let entry = entry?;
        if entry.cmd == LC_ENCRYPTION_INFO || entry.cmd == LC_ENCRYPTION_INFO_64 {
            // Both descriptor widths share the {cmd, cmdsize, cryptoff,
            // cryptsize, cryptid} prefix, so the flag sits 16 bytes in
            // either way.
            found = Some(EncryptionInfo {
                cryptid_offset: entry.offset + 16,
                cryptoff: mem.read_u32(base + entry.offset + 8)? as u64,
                cryptsize: mem.read_u32(base + entry.offset + 12)? as u64,
            });
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use zerocopy::IntoBytes;

    use super::*;
    use crate::macho::constants::{
        CPU_SUBTYPE_ARM64_ALL, CPU_TYPE_ARM, CPU_TYPE_ARM64, LC_SYMTAB, LC_UUID, MH_MAGIC,
        MH_MAGIC_64,
    };
    use crate::macho::header::classify;
    use crate::macho::structs::{EncryptionInfoCommand, EncryptionInfoCommand64, MachHeader32, MachHeader64};

    /// Builds a 64-bit image header followed by the given raw commands.
    fn image_with_commands(commands: &[&[u8]]) -> Vec<u8> {
        let sizeofcmds: usize = commands.iter().map(|c| c.len()).sum();
        let header = MachHeader64 {
            cputype: CPU_TYPE_ARM64,
            cpusubtype: CPU_SUBTYPE_ARM64_ALL,
            ncmds: commands.len() as u32,
            sizeofcmds: sizeofcmds as u32,
            ..Default::default()
        };

        let mut data = header.as_bytes().to_vec();
        for command in commands {
            data.extend_from_slice(command);
        }
        data.resize(data.len().max(0x100), 0);
        data
    }

    fn raw_command(cmd: u32, cmdsize: u32) -> Vec<u8> {
        // A declared size of zero still needs storage for the 8-byte
        // command header itself.
        let mut data = vec![0u8; (cmdsize as usize).max(8)];
        data[..4].copy_from_slice(&cmd.to_le_bytes());
        data[4..8].copy_from_slice(&cmdsize.to_le_bytes());
        data
    }

    #[test]
    fn test_walk_yields_declared_commands() {
        let symtab = raw_command(LC_SYMTAB, 24);
        let uuid = raw_command(LC_UUID, 24);
        let image = image_with_commands(&[&symtab, &uuid]);
        let header = classify(MH_MAGIC_64).unwrap();

        let entries: Vec<_> = LoadCommands::new(image.as_slice(), 0, &header)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].cmd, LC_SYMTAB);
        assert_eq!(entries[0].offset, 32);
        assert_eq!(entries[1].cmd, LC_UUID);
        assert_eq!(entries[1].offset, 56);
    }

    #[test]
    fn test_zero_size_command_stops_walk() {
        let symtab = raw_command(LC_SYMTAB, 24);
        let uuid = raw_command(LC_UUID, 24);
        let broken = raw_command(LC_SYMTAB, 0);
        let image = image_with_commands(&[&symtab, &uuid, &broken]);
        let header = classify(MH_MAGIC_64).unwrap();

        let mut walk = LoadCommands::new(image.as_slice(), 0, &header).unwrap();
        assert!(walk.next().unwrap().is_ok());
        assert!(walk.next().unwrap().is_ok());
        assert!(matches!(
            walk.next().unwrap(),
            Err(Error::MalformedCommandTable { offset: 80 })
        ));
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_find_encryption_info() {
        let symtab = raw_command(LC_SYMTAB, 24);
        let enc = EncryptionInfoCommand64 {
            cryptoff: 16384,
            cryptsize: 8192,
            cryptid: 1,
            ..Default::default()
        };
        let image = image_with_commands(&[&symtab, enc.as_bytes()]);
        let header = classify(MH_MAGIC_64).unwrap();

        let info = find_encryption_info(image.as_slice(), 0, &header)
            .unwrap()
            .unwrap();
        // Descriptor at cursor 56: flag at 56 + 16, range fields at +8/+12.
        assert_eq!(info.cryptid_offset, 72);
        assert_eq!(info.cryptoff, 16384);
        assert_eq!(info.cryptsize, 8192);
    }

    #[test]
    fn test_find_encryption_info_32bit() {
        let header = MachHeader32 {
            cputype: CPU_TYPE_ARM,
            ncmds: 1,
            sizeofcmds: EncryptionInfoCommand::SIZE as u32,
            ..Default::default()
        };
        let enc = EncryptionInfoCommand {
            cryptoff: 0x1000,
            cryptsize: 0x800,
            cryptid: 1,
            ..Default::default()
        };
        let mut image = header.as_bytes().to_vec();
        image.extend_from_slice(enc.as_bytes());
        image.resize(0x100, 0);

        let info = classify(MH_MAGIC).unwrap();
        let found = find_encryption_info(image.as_slice(), 0, &info)
            .unwrap()
            .unwrap();
        // The 32-bit header is 28 bytes; the flag convention stays +16.
        assert_eq!(found.cryptid_offset, 44);
        assert_eq!(found.cryptoff, 0x1000);
        assert_eq!(found.cryptsize, 0x800);
    }

    #[test]
    fn test_unencrypted_image_is_not_an_error() {
        let symtab = raw_command(LC_SYMTAB, 24);
        let image = image_with_commands(&[&symtab]);
        let header = classify(MH_MAGIC_64).unwrap();

        assert!(find_encryption_info(image.as_slice(), 0, &header)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_malformed_table_surfaces_from_scan() {
        let broken = raw_command(LC_SYMTAB, 0);
        let image = image_with_commands(&[&broken]);
        let header = classify(MH_MAGIC_64).unwrap();

        assert!(matches!(
            find_encryption_info(image.as_slice(), 0, &header),
            Err(Error::MalformedCommandTable { offset: 32 })
        ));
    }
}
