//! In-process ELF introspection with goblin.

use std::fs::File;
use std::path::Path;

use goblin::elf::section_header::{SHT_GNU_VERDEF, SHT_GNU_VERNEED};
use goblin::elf::Elf;
use goblin::strtab::Strtab;
use memmap2::Mmap;

use super::{ElfIntrospector, IntrospectionError, VersionQuery};

/// Reads version sections by parsing the ELF file directly.
#[derive(Debug, Clone, Default)]
pub struct NativeIntrospector;

impl NativeIntrospector {
    pub fn new() -> Self {
        NativeIntrospector
    }
}

impl ElfIntrospector for NativeIntrospector {
    fn version_names(
        &self,
        path: &Path,
        query: VersionQuery,
    ) -> Result<Vec<String>, IntrospectionError> {
        let io_err = |source: std::io::Error| IntrospectionError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(io_err)?;
        if file.metadata().map_err(io_err)?.len() < 4 {
            return Err(IntrospectionError::NotElf {
                path: path.to_path_buf(),
            });
        }

        // AppImages carry their payload after the runtime; only the pages
        // goblin touches get read.
        // SAFETY: the map is read-only and dropped before returning.
        let bytes = unsafe { Mmap::map(&file) }.map_err(io_err)?;

        if !bytes.starts_with(b"\x7fELF") {
            return Err(IntrospectionError::NotElf {
                path: path.to_path_buf(),
            });
        }

        let elf = Elf::parse(&bytes).map_err(|source| IntrospectionError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(version_names(&elf, &bytes, query))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// Collect version names from a parsed ELF file.
pub fn version_names(elf: &Elf<'_>, bytes: &[u8], query: VersionQuery) -> Vec<String> {
    let mut names = Vec::new();

    if query.includes_required() {
        if let Some(verneed) = &elf.verneed {
            let strtab = linked_strtab(elf, bytes, SHT_GNU_VERNEED);

            for need in verneed.iter() {
                for aux in need.iter() {
                    if let Some(name) = lookup_name(elf, strtab.as_ref(), aux.vna_name as usize) {
                        names.push(name.to_string());
                    }
                }
            }
        }
    }

    if query.includes_defined() {
        if let Some(verdef) = &elf.verdef {
            let strtab = linked_strtab(elf, bytes, SHT_GNU_VERDEF);

            for def in verdef.iter() {
                for aux in def.iter() {
                    if let Some(name) = lookup_name(elf, strtab.as_ref(), aux.vda_name as usize) {
                        names.push(name.to_string());
                    }
                }
            }
        }
    }

    names
}

/// The string table a version section points to through `sh_link`.
fn linked_strtab<'a>(elf: &Elf<'_>, bytes: &'a [u8], sh_type: u32) -> Option<Strtab<'a>> {
    let section = elf
        .section_headers
        .iter()
        .find(|header| header.sh_type == sh_type)?;
    let strings = elf.section_headers.get(section.sh_link as usize)?;

    Strtab::parse(
        bytes,
        strings.sh_offset as usize,
        strings.sh_size as usize,
        0x0,
    )
    .ok()
}

/// Resolve a name offset, preferring the linked table over the dynamic one.
fn lookup_name<'a>(elf: &'a Elf<'_>, strtab: Option<&'a Strtab<'_>>, offset: usize) -> Option<&'a str> {
    strtab
        .and_then(|table| table.get_at(offset))
        .or_else(|| elf.dynstrtab.get_at(offset))
}
