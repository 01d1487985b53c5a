//! Digest of the code that produces cached reference data.
//!
//! Every cache record stores the digest it was written with. Changing how data
//! is fetched, parsed or normalized changes the digest, which invalidates all
//! records written by older builds regardless of their age.

use std::sync::LazyLock;

use crate::util::hash::Fingerprint;

/// Sources that shape cached payloads.
const CODEBASE: &[(&str, &str)] = &[
    ("cache/mod.rs", include_str!("mod.rs")),
    ("cache/runtime.rs", include_str!("runtime.rs")),
    ("core/version.rs", include_str!("../core/version.rs")),
    ("elf/mod.rs", include_str!("../elf/mod.rs")),
    ("elf/native.rs", include_str!("../elf/native.rs")),
    ("sources/mod.rs", include_str!("../sources/mod.rs")),
    ("sources/debian.rs", include_str!("../sources/debian.rs")),
    ("sources/ubuntu.rs", include_str!("../sources/ubuntu.rs")),
    ("sources/packages.rs", include_str!("../sources/packages.rs")),
    ("sources/glibcxx.rs", include_str!("../sources/glibcxx.rs")),
];

static DIGEST: LazyLock<String> = LazyLock::new(|| {
    let mut fp = Fingerprint::new();
    fp.update_str(env!("CARGO_PKG_VERSION"));
    for (name, contents) in CODEBASE {
        fp.update_strs([*name, *contents]);
    }
    fp.finish()
});

/// Hex digest of the current codebase.
pub fn codebase_digest() -> &'static str {
    &DIGEST
}
