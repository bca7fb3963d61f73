//! Batch dump orchestration over the instrumented process's modules.

use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::copy::{ChunkedCopier, BUFSIZE};
use crate::error::{Error, Result};
use crate::macho::{locate_slice, CPUSUBTYPE_OFFSET, CPUTYPE_OFFSET};
use crate::memory::MemoryView;
use crate::patcher::patch_image;

/// Path marker identifying modules that belong to the application bundle.
const APP_BUNDLE_MARKER: &str = ".app";

/// Extension given to reconstructed images.
const DUMP_EXTENSION: &str = "fid";

/// One loaded image of the instrumented process.
///
/// Supplied by the module enumerator; read-only input to a dump.
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    /// Module name.
    pub name: String,
    /// Base virtual address the image is loaded at.
    pub base: u64,
    /// Size of the loaded image in bytes.
    pub size: u64,
    /// Path of the original file on disk.
    pub path: PathBuf,
}

impl ImageDescriptor {
    /// Formats the base address the way dump reports carry it.
    pub fn base_string(&self) -> String {
        format!("{:#x}", self.base)
    }

    /// Returns true if the module belongs to the application bundle.
    pub fn is_app_module(&self) -> bool {
        self.path.to_string_lossy().contains(APP_BUNDLE_MARKER)
    }
}

/// Module enumeration and library loading for the instrumented process.
///
/// A thin contract over the host's introspection API, kept explicit so the
/// orchestrator carries no ambient process state and tests can mock it.
pub trait ModuleHost {
    /// Lists the currently loaded images.
    fn modules(&self) -> Result<Vec<ImageDescriptor>>;

    /// Returns true if a module with this name is currently loaded.
    fn is_loaded(&self, name: &str) -> bool;

    /// Loads a library into the process. Best-effort; returns whether the
    /// load took.
    fn load_library(&self, path: &Path) -> bool;
}

/// How one module's dump ended.
#[derive(Debug)]
pub enum DumpStatus {
    /// The output file was written. Zero bytes patched means the image was
    /// not encrypted and the plain copy stands.
    Dumped {
        /// Number of bytes overwritten with resident plaintext.
        bytes_patched: u64,
    },
    /// The dump failed; the rest of the batch is unaffected.
    Failed(Error),
}

/// Result of one module's dump.
#[derive(Debug)]
pub struct DumpOutcome {
    /// Module name.
    pub name: String,
    /// Base virtual address of the module.
    pub base: u64,
    /// Size of the loaded image in bytes.
    pub size: u64,
    /// Path of the original file on disk.
    pub path: PathBuf,
    /// How the dump ended.
    pub status: DumpStatus,
}

impl DumpOutcome {
    /// Returns true if the module's output file was written.
    pub fn succeeded(&self) -> bool {
        matches!(self.status, DumpStatus::Dumped { .. })
    }

    /// Bytes overwritten with plaintext; zero for unencrypted or failed
    /// modules.
    pub fn bytes_patched(&self) -> u64 {
        match self.status {
            DumpStatus::Dumped { bytes_patched } => bytes_patched,
            DumpStatus::Failed(_) => 0,
        }
    }

    /// Formats the base address the way dump reports carry it.
    pub fn base_string(&self) -> String {
        format!("{:#x}", self.base)
    }
}

/// Drives the dump of individual modules and whole batches.
pub struct Dumper<'a, H: ModuleHost + ?Sized, M: MemoryView + ?Sized> {
    host: &'a H,
    memory: &'a M,
    output_dir: PathBuf,
}

impl<'a, H: ModuleHost + ?Sized, M: MemoryView + ?Sized> Dumper<'a, H, M> {
    /// Creates a dumper writing into `output_dir`.
    ///
    /// The directory is the host's per-user documents directory by
    /// convention; it must exist and be writable.
    pub fn new(host: &'a H, memory: &'a M, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            host,
            memory,
            output_dir: output_dir.into(),
        }
    }

    /// Resolves the output path for a module: `<output dir>/<name>.fid`.
    pub fn output_path(&self, module: &ImageDescriptor) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", module.name, DUMP_EXTENSION))
    }

    /// Dumps one module to its output path.
    ///
    /// Any stale output from a previous run is deleted first; a re-dump
    /// recreates the file rather than merging into it. Returns the number
    /// of patched bytes.
    pub fn dump_module(&self, module: &ImageDescriptor) -> Result<u64> {
        let out_path = self.output_path(module);
        if out_path.exists() {
            fs::remove_file(&out_path)?;
        }

        // The destination is created before the source is opened, so a
        // source-open failure leaves a fresh empty output rather than a
        // stale one.
        let mut dest = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&out_path)
            .map_err(|e| Error::FileOpen {
                path: out_path.clone(),
                source: e,
            })?;
        let mut source = File::open(&module.path).map_err(|e| Error::FileOpen {
            path: module.path.clone(),
            source: e,
        })?;

        // The first bytes of the container decide fat versus thin and hold
        // the architecture table when fat.
        let mut header = [0u8; BUFSIZE];
        let got = read_header(&mut source, &mut header)?;

        let cputype = self.memory.read_u32(module.base + CPUTYPE_OFFSET)?;
        let cpusubtype = self.memory.read_u32(module.base + CPUSUBTYPE_OFFSET)?;
        let file_len = source.metadata()?.len();
        let slice = locate_slice(&header[..got], cputype, cpusubtype, file_len)?;

        let mut copier = ChunkedCopier::new();
        patch_image(
            &mut copier,
            &mut source,
            &mut dest,
            self.memory,
            module.base,
            &slice,
        )
    }

    /// Dumps the first module whose path contains `name`.
    pub fn dump_named(&self, name: &str) -> Result<u64> {
        let modules = self.app_modules()?;
        let module = modules
            .iter()
            .find(|m| m.path.to_string_lossy().contains(name))
            .ok_or_else(|| Error::module_not_found(name))?;
        self.dump_module(module)
    }

    /// Lists the application modules of the process.
    pub fn app_modules(&self) -> Result<Vec<ImageDescriptor>> {
        Ok(self
            .host
            .modules()?
            .into_iter()
            .filter(ImageDescriptor::is_app_module)
            .collect())
    }

    /// Dumps every application module matching `filter`, strictly
    /// sequentially.
    ///
    /// Application dylibs not yet resident are loaded best-effort first, so
    /// their plaintext is available in memory. Every considered module gets
    /// an outcome; one module's failure never stops the batch.
    pub fn run_dump(&self, filter: Option<&str>) -> Result<Vec<DumpOutcome>> {
        let modules = self.app_modules()?;
        self.load_app_libraries(&modules);

        let mut outcomes = Vec::with_capacity(modules.len());
        for module in modules {
            if let Some(filter) = filter {
                if !module.name.contains(filter)
                    && !module.path.to_string_lossy().contains(filter)
                {
                    continue;
                }
            }

            let status = match self.dump_module(&module) {
                Ok(bytes_patched) => {
                    info!(
                        "dumped {} ({} bytes patched)",
                        module.name, bytes_patched
                    );
                    DumpStatus::Dumped { bytes_patched }
                }
                Err(err) => {
                    warn!("failed to dump {}: {}", module.name, err);
                    DumpStatus::Failed(err)
                }
            };
            outcomes.push(DumpOutcome {
                name: module.name,
                base: module.base,
                size: module.size,
                path: module.path,
                status,
            });
        }
        Ok(outcomes)
    }

    /// Loads application dylibs that are not yet resident. Failures are
    /// ignored beyond a warning.
    fn load_app_libraries(&self, modules: &[ImageDescriptor]) {
        for module in modules {
            let is_dylib = module.path.extension().is_some_and(|ext| ext == "dylib");
            if is_dylib
                && !self.host.is_loaded(&module.name)
                && !self.host.load_library(&module.path)
            {
                warn!("could not load {}", module.path.display());
            }
        }
    }
}

/// Fills `buf` from the stream's current position, stopping early at end of
/// input. Returns the number of bytes read.
fn read_header<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_module_marker() {
        let in_bundle = ImageDescriptor {
            name: "MyApp".into(),
            base: 0x100000000,
            size: 0x4000,
            path: PathBuf::from("/var/containers/Bundle/Application/X/MyApp.app/MyApp"),
        };
        let system = ImageDescriptor {
            name: "libSystem.B.dylib".into(),
            base: 0x180000000,
            size: 0x8000,
            path: PathBuf::from("/usr/lib/libSystem.B.dylib"),
        };

        assert!(in_bundle.is_app_module());
        assert!(!system.is_app_module());
    }

    #[test]
    fn test_base_string_format() {
        let module = ImageDescriptor {
            name: "MyApp".into(),
            base: 0x1_0000_4000,
            size: 0,
            path: PathBuf::new(),
        };
        assert_eq!(module.base_string(), "0x100004000");
    }

    #[test]
    fn test_read_header_short_input() {
        let data = vec![7u8; 100];
        let mut buf = [0u8; BUFSIZE];
        let got = read_header(&mut data.as_slice(), &mut buf).unwrap();
        assert_eq!(got, 100);
        assert!(buf[..100].iter().all(|&b| b == 7));
    }
}
