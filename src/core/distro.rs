//! Target distributions and their releases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Debian suite aliases that are checked; they move between codenames over time.
pub const DEBIAN_SUITES: [&str; 4] = ["oldstable", "stable", "testing", "unstable"];

/// A Linux distribution with published compatibility data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distro {
    Debian,
    Ubuntu,
}

impl Distro {
    pub const ALL: [Distro; 2] = [Distro::Debian, Distro::Ubuntu];

    pub fn id(&self) -> &'static str {
        match self {
            Distro::Debian => "debian",
            Distro::Ubuntu => "ubuntu",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Distro::Debian => "Debian",
            Distro::Ubuntu => "Ubuntu",
        }
    }

    /// Whether check targets are rolling suite aliases that need a codename lookup.
    pub fn uses_suite_aliases(&self) -> bool {
        matches!(self, Distro::Debian)
    }
}

impl fmt::Display for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Distro {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debian" => Ok(Distro::Debian),
            "ubuntu" => Ok(Distro::Ubuntu),
            _ => Err(format!(
                "invalid distribution '{}', valid values: debian, ubuntu",
                s
            )),
        }
    }
}

/// One check target: a release as the user thinks of it, plus its codename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Identifier shown in results (`stable`, `jammy`)
    pub id: String,

    /// Fixed codename used to look up version data; `None` if unresolvable
    pub codename: Option<String>,
}

impl Release {
    /// A release whose identifier is already its codename.
    pub fn fixed(name: impl Into<String>) -> Self {
        let name = name.into();
        Release {
            codename: Some(name.clone()),
            id: name,
        }
    }

    /// A suite alias resolved (or not) to a codename.
    pub fn alias(id: impl Into<String>, codename: Option<String>) -> Self {
        Release {
            id: id.into(),
            codename,
        }
    }

    /// Label for messages: `stable (bookworm)` or `jammy`.
    pub fn label(&self) -> String {
        match &self.codename {
            Some(codename) if codename != &self.id => format!("{} ({})", self.id, codename),
            _ => self.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distro_parsing() {
        assert_eq!("Debian".parse::<Distro>(), Ok(Distro::Debian));
        assert!("arch".parse::<Distro>().is_err());
    }

    #[test]
    fn test_release_label() {
        assert_eq!(Release::fixed("jammy").label(), "jammy");
        assert_eq!(
            Release::alias("stable", Some("bookworm".into())).label(),
            "stable (bookworm)"
        );
        assert_eq!(Release::alias("testing", None).label(), "testing");
    }
}
