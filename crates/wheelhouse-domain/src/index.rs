use std::collections::{BTreeMap, BTreeSet};

use pep440_rs::Version;
use tracing::{debug, trace};

use crate::filename::{WheelFilename, WheelFilenameError, WheelTag};
use crate::host::HostProfile;
use crate::name::PackageName;

/// A wheel published in the remote index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub filename: String,
    pub name: PackageName,
    pub version: Version,
    pub tags: BTreeSet<WheelTag>,
}

/// Host-compatible wheels of a remote index, grouped by canonical name.
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    packages: BTreeMap<PackageName, Vec<ArtifactRecord>>,
}

impl PackageIndex {
    /// Builds the index from an autoindex-style HTML listing.
    ///
    /// Every quoted `.whl` reference must parse; wheels with no tag usable on
    /// `host` are left out.
    pub fn from_listing(listing: &str, host: &HostProfile) -> Result<Self, WheelFilenameError> {
        Self::from_filenames(listing_filenames(listing), host)
    }

    pub fn from_filenames<I, S>(filenames: I, host: &HostProfile) -> Result<Self, WheelFilenameError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut packages: BTreeMap<PackageName, Vec<ArtifactRecord>> = BTreeMap::new();
        let mut skipped = 0usize;
        for filename in filenames {
            let filename = filename.as_ref();
            let wheel: WheelFilename = filename.parse()?;
            if !wheel.is_compatible(host) {
                trace!(filename, "skipping wheel incompatible with host");
                skipped += 1;
                continue;
            }
            let WheelFilename {
                name,
                version,
                tags,
                ..
            } = wheel;
            packages.entry(name.clone()).or_default().push(ArtifactRecord {
                filename: filename.to_string(),
                name,
                version,
                tags,
            });
        }
        debug!(
            packages = packages.len(),
            skipped, "parsed wheel index listing"
        );
        Ok(Self { packages })
    }

    pub fn records(&self, name: &PackageName) -> &[ArtifactRecord] {
        self.packages.get(name).map_or(&[], Vec::as_slice)
    }

    /// Every indexed version of `name`, duplicates included.
    pub fn versions(&self, name: &PackageName) -> Vec<&Version> {
        self.records(name).iter().map(|record| &record.version).collect()
    }

    pub fn contains_version(&self, name: &PackageName, version: &Version) -> bool {
        self.records(name).iter().any(|record| &record.version == version)
    }

    /// The names in `desired` whose exact version is already published.
    pub fn existing_packages(&self, desired: &BTreeMap<PackageName, Version>) -> BTreeSet<PackageName> {
        desired
            .iter()
            .filter(|(name, version)| self.contains_version(name, version))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Quoted `.whl` references in a listing, reduced to their file names.
pub fn listing_filenames(listing: &str) -> Vec<&str> {
    listing
        .split('"')
        .skip(1)
        .step_by(2)
        .filter_map(|quoted| {
            let without_fragment = quoted.split(['#', '?']).next().unwrap_or(quoted);
            let filename = without_fragment.rsplit('/').next().unwrap_or(without_fragment);
            let is_wheel = filename.len() > ".whl".len()
                && filename
                    .get(filename.len() - ".whl".len()..)
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(".whl"));
            is_wheel.then_some(filename)
        })
        .collect()
}
