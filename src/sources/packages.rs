//! APT repository plumbing: `Packages` indices and `.deb` archives.

use std::io::{self, Cursor, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::cache::CacheError;
use crate::core::distro::Distro;
use crate::sources::Mirrors;
use crate::util::http::HttpClient;

/// Path of the amd64 `main` index of a release, relative to the mirror.
pub fn packages_index_path(release: &str) -> String {
    format!("dists/{}/main/binary-amd64/Packages.gz", release)
}

/// Download and decompress the `main` package index of a release.
pub fn fetch_packages_index(
    http: &HttpClient,
    mirrors: &Mirrors,
    distro: Distro,
    release: &str,
) -> Result<String, CacheError> {
    let url = mirrors.url(distro, &packages_index_path(release));
    tracing::info!("fetching {} package index for {}", distro, release);

    let compressed = http.get_bytes(&url)?;

    let mut index = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut index)
        .map_err(|e| CacheError::malformed(&url, format!("invalid Packages.gz: {}", e)))?;

    Ok(index)
}

/// Value of `field` in the first stanza of `index` describing `package`.
pub fn package_field(index: &str, package: &str, field: &str) -> Option<String> {
    let mut in_package = false;

    for line in index.lines() {
        if line.trim().is_empty() {
            // stanza boundary
            in_package = false;
            continue;
        }

        let Some((name, value)) = line.split_once(':') else {
            continue;
        };

        // continuation lines start with whitespace
        if name.starts_with(char::is_whitespace) {
            continue;
        }

        if name == "Package" {
            in_package = value.trim() == package;
            continue;
        }

        if in_package && name == field {
            return Some(value.trim().to_string());
        }
    }

    None
}

/// Unpack the `data.tar[.<ext>]` member of a `.deb` archive into `dest`.
pub fn extract_deb(deb: &[u8], dest: &Path) -> io::Result<()> {
    let mut archive = ar::Archive::new(Cursor::new(deb));

    while let Some(entry) = archive.next_entry() {
        let mut entry = entry?;
        let identifier = String::from_utf8_lossy(entry.header().identifier()).into_owned();

        let Some(extension) = identifier.strip_prefix("data.tar") else {
            continue;
        };

        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        let data = Cursor::new(data);

        let reader: Box<dyn Read> = match extension {
            "" => Box::new(data),
            ".gz" => Box::new(GzDecoder::new(data)),
            ".xz" => Box::new(xz2::read::XzDecoder::new(data)),
            ".zst" => Box::new(zstd::stream::read::Decoder::new(data)?),
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unsupported data archive compression: {}", other),
                ))
            }
        };

        return tar::Archive::new(reader).unpack(dest);
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "no data.tar member in package",
    ))
}
