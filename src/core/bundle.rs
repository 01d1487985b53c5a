//! Application bundles: AppImage files and extracted AppDirs.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// How a bundle is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    /// A single AppImage file: an ELF runtime followed by a filesystem image
    AppImage,
    /// An already extracted directory tree
    AppDir,
}

/// A bundle to check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    path: PathBuf,
    kind: BundleKind,
}

impl Bundle {
    /// Open a bundle, deciding its kind from the filesystem.
    ///
    /// The path is made absolute since the mount runtime resolves it from a
    /// different working directory.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;

        let kind = if metadata.is_dir() {
            BundleKind::AppDir
        } else if metadata.is_file() {
            BundleKind::AppImage
        } else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is neither a file nor a directory", path.display()),
            ));
        };

        let path = std::fs::canonicalize(path)?;

        Ok(Bundle { path, kind })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> BundleKind {
        self.kind
    }

    /// The embedded runtime binary, which must be scanned as well.
    ///
    /// For an AppImage this is the file itself: the ELF headers describe only
    /// the runtime, the payload image is appended after it.
    pub fn runtime_path(&self) -> Option<&Path> {
        match self.kind {
            BundleKind::AppImage => Some(&self.path),
            BundleKind::AppDir => None,
        }
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
