//! Cache maintenance: refresh every record regardless of freshness.

use crate::cache::runtime::RuntimeCache;
use crate::cache::{CacheError, CacheLocation, CompatibilityCache, ReferenceSource};
use crate::core::distro::Distro;
use crate::sources::{
    suite_codenames, DebianCodenames, DebianGlibcVersions, GlibcxxVersions,
    UbuntuGlibcVersions, UbuntuReleaseNames,
};

/// Outcome of refreshing one record.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub key: String,
    pub result: Result<(), CacheError>,
}

impl UpdateOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Refresh `source` at `location`, recording the outcome.
///
/// Returns the new payload or, if refreshing failed, the payload already
/// stored at `location`.
fn update<S: ReferenceSource>(
    cache: &CompatibilityCache,
    source: &S,
    location: CacheLocation,
    outcomes: &mut Vec<UpdateOutcome>,
) -> Option<S::Payload> {
    let key = source.cache_key();

    match cache.update_now(source, location) {
        Ok(payload) => {
            outcomes.push(UpdateOutcome { key, result: Ok(()) });
            Some(payload)
        }
        Err(e) => {
            outcomes.push(UpdateOutcome { key, result: Err(e) });
            cache.stored(source, location)
        }
    }
}

/// Refresh a source whose release list comes from `location` as well.
fn update_for_releases<S: ReferenceSource>(
    cache: &CompatibilityCache,
    source: S,
    releases: Option<&Vec<String>>,
    pin: impl FnOnce(S, Vec<String>) -> S,
    location: CacheLocation,
    outcomes: &mut Vec<UpdateOutcome>,
) {
    match releases {
        Some(releases) => {
            update(cache, &pin(source, releases.clone()), location, outcomes);
        }
        None => {
            let key = source.cache_key();
            outcomes.push(UpdateOutcome {
                key: key.clone(),
                result: Err(CacheError::OutOfDate {
                    key,
                    message: "no release list available".to_string(),
                    stale: None,
                    source: None,
                }),
            });
        }
    }
}

/// Fetch every reference record and the runtime into `location`.
///
/// Codenames and release names come first. The version sources depending on
/// them use the lists just written to `location`, or the ones already stored
/// there, so a bundled update never reads or writes the user cache. A failing
/// record doesn't stop the others.
pub fn update_all(cache: &CompatibilityCache, location: CacheLocation) -> Vec<UpdateOutcome> {
    let mut outcomes = Vec::new();

    let debian_releases = update(cache, &DebianCodenames, location, &mut outcomes)
        .map(|codenames| suite_codenames(&codenames));
    let ubuntu_releases = update(cache, &UbuntuReleaseNames, location, &mut outcomes);

    update(cache, &DebianGlibcVersions, location, &mut outcomes);
    update_for_releases(
        cache,
        UbuntuGlibcVersions::new(),
        ubuntu_releases.as_ref(),
        UbuntuGlibcVersions::with_releases,
        location,
        &mut outcomes,
    );
    update_for_releases(
        cache,
        GlibcxxVersions::new(Distro::Debian),
        debian_releases.as_ref(),
        GlibcxxVersions::with_releases,
        location,
        &mut outcomes,
    );
    update_for_releases(
        cache,
        GlibcxxVersions::new(Distro::Ubuntu),
        ubuntu_releases.as_ref(),
        GlibcxxVersions::with_releases,
        location,
        &mut outcomes,
    );

    match RuntimeCache::for_host(cache) {
        Some(runtime) => outcomes.push(UpdateOutcome {
            key: runtime.file_name(),
            result: runtime.update_now(location).map(|_| ()),
        }),
        None => tracing::warn!(
            "no AppImage runtime available for {}",
            std::env::consts::ARCH
        ),
    }

    outcomes
}
