//! fidump - reconstruct decrypted Mach-O images.
//!
//! Offline front end for the dump library: given the encrypted binary on
//! disk and a memory snapshot of the loaded image, writes the decrypted
//! `.fid` copy, or inspects a container's slices and encryption descriptors.

use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use memmap2::Mmap;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fidump::macho::{
    arch_slices, classify, find_encryption_info, locate_slice, CPUSUBTYPE_OFFSET, CPUTYPE_OFFSET,
};
use fidump::memory::MemoryView;
use fidump::{patch_image, ChunkedCopier, SliceLocation, SnapshotImage, BUFSIZE};

/// Reconstruct decrypted Mach-O images.
#[derive(Parser, Debug)]
#[command(name = "fidump")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
    #[arg(short, long, global = true, default_value = "1")]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a decrypted copy of a binary from a memory snapshot
    Patch {
        /// Path to the encrypted binary on disk
        binary: PathBuf,

        /// Memory snapshot of the loaded image (plaintext resident)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Virtual base address the snapshot was captured at (hex accepted)
        #[arg(short, long, default_value = "0")]
        base: String,

        /// Output path (defaults to `<binary>.fid` next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the architecture table and encryption descriptors of a file
    Info {
        /// Path to the binary
        binary: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbosity);

    match cli.command {
        Commands::Patch {
            binary,
            snapshot,
            base,
            output,
        } => cmd_patch(binary, snapshot, &base, output),
        Commands::Info { binary } => cmd_info(binary),
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        _ => Level::DEBUG,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Parses an address, accepting a 0x prefix for hex.
fn parse_address(text: &str) -> Result<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).with_context(|| format!("invalid address: {text}"))
    } else {
        text.parse()
            .with_context(|| format!("invalid address: {text}"))
    }
}

fn cmd_patch(
    binary: PathBuf,
    snapshot: PathBuf,
    base: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let base = parse_address(base)?;
    let memory = SnapshotImage::map_file(&snapshot, base)
        .with_context(|| format!("cannot load snapshot {}", snapshot.display()))?;

    let cputype = memory.read_u32(base + CPUTYPE_OFFSET)?;
    let cpusubtype = memory.read_u32(base + CPUSUBTYPE_OFFSET)?;

    let mut source =
        File::open(&binary).with_context(|| format!("cannot open {}", binary.display()))?;
    let mut header = [0u8; BUFSIZE];
    let got = read_header(&mut source, &mut header)?;

    let file_len = source.metadata()?.len();
    let slice = locate_slice(&header[..got], cputype, cpusubtype, file_len)?;
    if let SliceLocation::FatSlice(arch) = &slice {
        info!(
            "fat container, selected {} slice at {:#x}",
            arch.arch_name(),
            arch.offset
        );
    }

    let out_path = output.unwrap_or_else(|| default_output_path(&binary));
    if out_path.exists() {
        fs::remove_file(&out_path)
            .with_context(|| format!("cannot remove stale {}", out_path.display()))?;
    }
    let dest = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&out_path)
        .with_context(|| format!("cannot create {}", out_path.display()))?;

    let progress = ProgressBar::new(slice.length());
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {bytes}/{total_bytes} {msg}")
            .expect("valid progress template"),
    );

    let mut source = progress.wrap_read(source);
    let mut dest = dest;
    let patched = patch_image(
        &mut ChunkedCopier::new(),
        &mut source,
        &mut dest,
        &memory,
        base,
        &slice,
    )?;
    progress.finish_and_clear();

    if patched > 0 {
        println!(
            "{} -> {} ({} bytes decrypted)",
            binary.display(),
            out_path.display(),
            patched
        );
    } else {
        println!(
            "{} -> {} (image was not encrypted)",
            binary.display(),
            out_path.display()
        );
    }
    Ok(())
}

fn cmd_info(binary: PathBuf) -> Result<()> {
    let file = File::open(&binary).with_context(|| format!("cannot open {}", binary.display()))?;
    // Read-only view of the container for slice walking.
    let map = unsafe { Mmap::map(&file) }
        .with_context(|| format!("cannot map {}", binary.display()))?;

    match arch_slices(&map) {
        Some(slices) => {
            println!("fat container, {} slice(s):", slices.len());
            for arch in slices {
                let end = (arch.offset + arch.length) as usize;
                if end > map.len() {
                    bail!(
                        "slice {} extends past end of file ({:#x} > {:#x})",
                        arch.arch_name(),
                        end,
                        map.len()
                    );
                }
                println!(
                    "  {:8} offset {:#10x} length {:#10x}",
                    arch.arch_name(),
                    arch.offset,
                    arch.length
                );
                print_slice_info(&map[arch.offset as usize..end], "    ")?;
            }
        }
        None => {
            println!("thin image, {} bytes:", map.len());
            print_slice_info(&map, "  ")?;
        }
    }
    Ok(())
}

/// Prints the encryption descriptor of one single-architecture slice.
///
/// The on-disk slice layout is offset-compatible with the mapped image, so
/// the slice bytes stand in for a memory view based at zero.
fn print_slice_info(slice: &[u8], indent: &str) -> Result<()> {
    let header = classify(slice.read_u32(0)?)?;
    let width = if header.is_64bit { 64 } else { 32 };

    match find_encryption_info(slice, 0, &header)? {
        Some(enc) => {
            let cryptid = slice.read_u32(enc.cryptid_offset)?;
            println!(
                "{indent}{width}-bit, encrypted range {:#x}..{:#x} (cryptid {})",
                enc.cryptoff,
                enc.cryptoff + enc.cryptsize,
                cryptid
            );
        }
        None => println!("{indent}{width}-bit, no encryption descriptor"),
    }
    Ok(())
}

/// Appends the dump extension to the file name: `MyApp` -> `MyApp.fid`.
fn default_output_path(binary: &Path) -> PathBuf {
    let name = binary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    binary.with_file_name(format!("{name}.fid"))
}

/// Fills `buf` from the stream, stopping early at end of input.
fn read_header<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
