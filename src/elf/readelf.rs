//! ELF introspection through `readelf -V -W`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::{ElfIntrospector, IntrospectionError, VersionQuery};
use crate::util::process::{find_readelf, ProcessBuilder};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Name:\s*(\S+)").expect("valid regex"));

const VERNEED_HEADER: &str = "Version needs section";
const VERDEF_HEADER: &str = "Version definition section";

/// Reads version sections from the text dump of a `readelf` subprocess.
#[derive(Debug, Clone)]
pub struct ReadelfIntrospector {
    readelf: PathBuf,
}

impl ReadelfIntrospector {
    /// Use a specific `readelf` binary.
    pub fn new(readelf: impl Into<PathBuf>) -> Self {
        ReadelfIntrospector {
            readelf: readelf.into(),
        }
    }

    /// Locate `readelf` (honoring `$READELF`).
    pub fn from_path() -> Result<Self, IntrospectionError> {
        find_readelf()
            .map(Self::new)
            .ok_or(IntrospectionError::ToolNotFound)
    }
}

impl ElfIntrospector for ReadelfIntrospector {
    fn version_names(
        &self,
        path: &Path,
        query: VersionQuery,
    ) -> Result<Vec<String>, IntrospectionError> {
        let cmd = ProcessBuilder::new(&self.readelf)
            .args(["-V", "-W"])
            .arg(path);

        let output = cmd.exec().map_err(|e| IntrospectionError::Tool {
            command: cmd.display_command(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(IntrospectionError::Tool {
                command: cmd.display_command(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_version_dump(
            &String::from_utf8_lossy(&output.stdout),
            query,
        ))
    }

    fn name(&self) -> &'static str {
        "readelf"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Needs,
    Definitions,
}

/// Extract `Name:` tokens from the requested sections of a `readelf -V` dump.
pub fn parse_version_dump(dump: &str, query: VersionQuery) -> Vec<String> {
    let mut names = Vec::new();
    let mut section = Section::None;

    for line in dump.lines() {
        if line.trim().is_empty() {
            section = Section::None;
            continue;
        }

        if line.starts_with(VERNEED_HEADER) {
            section = Section::Needs;
            continue;
        }

        if line.starts_with(VERDEF_HEADER) {
            section = Section::Definitions;
            continue;
        }

        let wanted = match section {
            Section::None => false,
            Section::Needs => query.includes_required(),
            Section::Definitions => query.includes_defined(),
        };

        if !wanted {
            continue;
        }

        if let Some(captures) = NAME_RE.captures(line) {
            names.push(captures[1].to_string());
        }
    }

    names
}
