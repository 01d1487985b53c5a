//! Minimal ELF64 file builder with GNU version sections.
//!
//! Emits a little-endian x86-64 shared object without program headers or code
//! that carries `.gnu.version_r` and `.gnu.version_d` sections. That is enough
//! for version introspection and for the ELF magic check of the binary walker.
//!
//! Only depends on std so integration tests can include it with `#[path]`.

#![allow(dead_code)]

use std::io;
use std::path::Path;

const EHDR_SIZE: usize = 64;
const SHDR_SIZE: usize = 64;

const SHT_STRTAB: u32 = 3;
const SHT_GNU_VERDEF: u32 = 0x6fff_fffd;
const SHT_GNU_VERNEED: u32 = 0x6fff_fffe;

const VERNEED_SIZE: usize = 16;
const VERNAUX_SIZE: usize = 16;
const VERDEF_SIZE: usize = 20;
const VERDAUX_SIZE: usize = 8;

/// Builder for a fixture ELF file.
#[derive(Debug, Clone, Default)]
pub struct ElfFixture {
    needs: Vec<(String, Vec<String>)>,
    defines: Vec<String>,
}

impl ElfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `versions` from the shared library `file`.
    pub fn needs(mut self, file: &str, versions: &[&str]) -> Self {
        self.needs.push((
            file.to_string(),
            versions.iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    /// Define `versions`; the first one is the base definition (the soname).
    pub fn defines(mut self, versions: &[&str]) -> Self {
        self.defines.extend(versions.iter().map(|v| v.to_string()));
        self
    }

    /// Write the file to `path`.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.build())
    }

    /// Serialize the ELF image.
    pub fn build(&self) -> Vec<u8> {
        let mut dynstr = StringTable::new();

        // .gnu.version_r
        let mut verneed = Vec::new();
        let mut other: u16 = 2;
        for (i, (file, versions)) in self.needs.iter().enumerate() {
            let last_file = i + 1 == self.needs.len();
            let next = if last_file {
                0
            } else {
                VERNEED_SIZE + VERNAUX_SIZE * versions.len()
            };
            let aux = if versions.is_empty() { 0 } else { VERNEED_SIZE };

            push_u16(&mut verneed, 1);
            push_u16(&mut verneed, versions.len() as u16);
            push_u32(&mut verneed, dynstr.add(file));
            push_u32(&mut verneed, aux as u32);
            push_u32(&mut verneed, next as u32);

            for (j, version) in versions.iter().enumerate() {
                let next = if j + 1 == versions.len() { 0 } else { VERNAUX_SIZE };

                push_u32(&mut verneed, elf_hash(version));
                push_u16(&mut verneed, 0);
                push_u16(&mut verneed, other);
                push_u32(&mut verneed, dynstr.add(version));
                push_u32(&mut verneed, next as u32);

                other += 1;
            }
        }

        // .gnu.version_d
        let mut verdef = Vec::new();
        for (i, version) in self.defines.iter().enumerate() {
            let next = if i + 1 == self.defines.len() {
                0
            } else {
                VERDEF_SIZE + VERDAUX_SIZE
            };
            let flags = if i == 0 { 1 } else { 0 };

            push_u16(&mut verdef, 1);
            push_u16(&mut verdef, flags);
            push_u16(&mut verdef, (i + 1) as u16);
            push_u16(&mut verdef, 1);
            push_u32(&mut verdef, elf_hash(version));
            push_u32(&mut verdef, VERDEF_SIZE as u32);
            push_u32(&mut verdef, next as u32);

            push_u32(&mut verdef, dynstr.add(version));
            push_u32(&mut verdef, 0);
        }

        let mut shstrtab = StringTable::new();
        let mut sections = vec![Section::null()];

        sections.push(Section {
            name: shstrtab.add(".dynstr"),
            sh_type: SHT_STRTAB,
            link: 0,
            info: 0,
            data: dynstr.into_bytes(),
        });
        const DYNSTR_INDEX: u32 = 1;

        if !self.needs.is_empty() {
            sections.push(Section {
                name: shstrtab.add(".gnu.version_r"),
                sh_type: SHT_GNU_VERNEED,
                link: DYNSTR_INDEX,
                info: self.needs.len() as u32,
                data: verneed,
            });
        }

        if !self.defines.is_empty() {
            sections.push(Section {
                name: shstrtab.add(".gnu.version_d"),
                sh_type: SHT_GNU_VERDEF,
                link: DYNSTR_INDEX,
                info: self.defines.len() as u32,
                data: verdef,
            });
        }

        let shstrtab_name = shstrtab.add(".shstrtab");
        sections.push(Section {
            name: shstrtab_name,
            sh_type: SHT_STRTAB,
            link: 0,
            info: 0,
            data: shstrtab.into_bytes(),
        });

        // Section contents follow the header, section headers come last.
        let mut body = Vec::new();
        let mut offsets = Vec::with_capacity(sections.len());
        for section in &sections {
            align(&mut body, 8);
            offsets.push(EHDR_SIZE + body.len());
            body.extend_from_slice(&section.data);
        }
        align(&mut body, 8);
        let shoff = EHDR_SIZE + body.len();

        let mut out = Vec::with_capacity(shoff + SHDR_SIZE * sections.len());

        // e_ident
        out.extend_from_slice(b"\x7fELF");
        out.push(2); // ELFCLASS64
        out.push(1); // ELFDATA2LSB
        out.push(1); // EV_CURRENT
        out.resize(16, 0);

        push_u16(&mut out, 3); // ET_DYN
        push_u16(&mut out, 62); // EM_X86_64
        push_u32(&mut out, 1);
        push_u64(&mut out, 0); // e_entry
        push_u64(&mut out, 0); // e_phoff
        push_u64(&mut out, shoff as u64);
        push_u32(&mut out, 0); // e_flags
        push_u16(&mut out, EHDR_SIZE as u16);
        push_u16(&mut out, 56); // e_phentsize
        push_u16(&mut out, 0); // e_phnum
        push_u16(&mut out, SHDR_SIZE as u16);
        push_u16(&mut out, sections.len() as u16);
        push_u16(&mut out, (sections.len() - 1) as u16);

        out.extend_from_slice(&body);

        for (section, offset) in sections.iter().zip(offsets) {
            let is_null = section.sh_type == 0;

            push_u32(&mut out, section.name);
            push_u32(&mut out, section.sh_type);
            push_u64(&mut out, 0); // sh_flags
            push_u64(&mut out, 0); // sh_addr
            push_u64(&mut out, if is_null { 0 } else { offset as u64 });
            push_u64(&mut out, section.data.len() as u64);
            push_u32(&mut out, section.link);
            push_u32(&mut out, section.info);
            push_u64(&mut out, if is_null { 0 } else { 1 });
            push_u64(&mut out, 0); // sh_entsize
        }

        out
    }
}

struct Section {
    name: u32,
    sh_type: u32,
    link: u32,
    info: u32,
    data: Vec<u8>,
}

impl Section {
    fn null() -> Self {
        Section {
            name: 0,
            sh_type: 0,
            link: 0,
            info: 0,
            data: Vec::new(),
        }
    }
}

/// NUL-separated string table starting with an empty string.
struct StringTable {
    bytes: Vec<u8>,
}

impl StringTable {
    fn new() -> Self {
        StringTable { bytes: vec![0] }
    }

    fn add(&mut self, s: &str) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        offset
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

fn elf_hash(name: &str) -> u32 {
    let mut h: u32 = 0;
    for &byte in name.as_bytes() {
        h = (h << 4).wrapping_add(byte as u32);
        let g = h & 0xf000_0000;
        if g != 0 {
            h ^= g >> 24;
        }
        h &= !g;
    }
    h
}

fn align(buf: &mut Vec<u8>, to: usize) {
    while buf.len() % to != 0 {
        buf.push(0);
    }
}

fn push_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}
