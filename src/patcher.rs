//! Patched copy of one image: plain bytes from disk, plaintext from memory.

use std::io::{Read, Seek, SeekFrom, Write};

use tracing::{debug, info};

use crate::copy::ChunkedCopier;
use crate::error::Result;
use crate::macho::{classify, find_encryption_info, SliceLocation};
use crate::memory::{MemoryCursor, MemoryView};

/// Zero bytes written over the cryptid flag field.
const CLEARED_CRYPTID: [u8; 4] = [0u8; 4];

/// Writes an unencrypted-equivalent copy of a loaded image to `dest`.
///
/// `source` is the original on-disk container, `mem`/`base` the live memory
/// image, and `slice` the byte range within the container that corresponds
/// to the running architecture. The steps, in order:
///
/// 1. Copy the image bytes verbatim: the matched fat slice when the
///    container is fat, otherwise the whole file.
/// 2. Classify the in-memory header and scan its command table for the
///    encryption descriptor. The memory image is authoritative; the freshly
///    written destination is never re-parsed.
/// 3. Without a descriptor the copy already stands as the output; zero
///    bytes are patched.
/// 4. With one, clear the 4-byte cryptid flag in the destination and
///    overwrite the encrypted range with the plaintext resident at
///    `base + cryptoff` — the mapped slice preserves file-offset-to-address
///    correspondence, so source address and destination offset line up.
///
/// Returns the number of patched bytes.
pub fn patch_image<R, W, M>(
    copier: &mut ChunkedCopier,
    source: &mut R,
    dest: &mut W,
    mem: &M,
    base: u64,
    slice: &SliceLocation,
) -> Result<u64>
where
    R: Read + Seek + ?Sized,
    W: Write + Seek + ?Sized,
    M: MemoryView + ?Sized,
{
    match slice {
        SliceLocation::FatSlice(arch) => {
            source.seek(SeekFrom::Start(arch.offset))?;
            dest.seek(SeekFrom::Start(0))?;
            copier.copy_range(source, dest, arch.length)?;
            debug!(
                "copied {} slice: {:#x}..{:#x}",
                arch.arch_name(),
                arch.offset,
                arch.offset + arch.length
            );
        }
        SliceLocation::WholeFile { .. } => {
            source.seek(SeekFrom::Start(0))?;
            dest.seek(SeekFrom::Start(0))?;
            let copied = copier.copy_all(source, dest)?;
            debug!("copied thin image: {} bytes", copied);
        }
    }

    let header = classify(mem.read_u32(base)?)?;
    let enc = match find_encryption_info(mem, base, &header)? {
        Some(enc) => enc,
        None => {
            debug!("no encryption descriptor, copy stands as output");
            return Ok(0);
        }
    };

    dest.seek(SeekFrom::Start(enc.cryptid_offset))?;
    dest.write_all(&CLEARED_CRYPTID)?;

    dest.seek(SeekFrom::Start(enc.cryptoff))?;
    let mut plaintext = MemoryCursor::new(mem, base + enc.cryptoff);
    copier.copy_range(&mut plaintext, dest, enc.cryptsize)?;

    info!(
        "patched {} bytes at {:#x}, cleared cryptid at {:#x}",
        enc.cryptsize, enc.cryptoff, enc.cryptid_offset
    );
    Ok(enc.cryptsize)
}
