//! Lazy enumeration of ELF files below a directory.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// Whether `path` starts with the ELF magic.
pub fn is_elf_file(path: &Path) -> bool {
    let mut magic = [0u8; 4];

    match File::open(path).and_then(|mut f| f.read_exact(&mut magic)) {
        Ok(()) => &magic == ELF_MAGIC,
        Err(e) => {
            tracing::debug!("skipping {}: {}", path.display(), e);
            false
        }
    }
}

/// Iterator over the ELF files of a directory tree.
///
/// Symlinks are neither followed nor yielded, so every binary is visited at
/// most once and nothing outside the tree is touched.
pub struct BinaryWalker {
    inner: walkdir::IntoIter,
}

impl BinaryWalker {
    pub fn new(root: impl AsRef<Path>) -> Self {
        BinaryWalker {
            inner: WalkDir::new(root).follow_links(false).into_iter(),
        }
    }
}

impl Iterator for BinaryWalker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        for entry in self.inner.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("skipping unreadable entry: {}", e);
                    continue;
                }
            };

            // file_type() is the symlink's own type since links aren't followed
            if !entry.file_type().is_file() {
                continue;
            }

            if is_elf_file(entry.path()) {
                return Some(entry.into_path());
            }
        }

        None
    }
}

/// Enumerate ELF binaries below `root`.
pub fn enumerate_binaries(root: impl AsRef<Path>) -> BinaryWalker {
    BinaryWalker::new(root)
}
