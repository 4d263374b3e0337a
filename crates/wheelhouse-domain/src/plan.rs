use std::collections::BTreeMap;
use std::fmt;

use pep440_rs::Version;
use tracing::info;

use crate::index::PackageIndex;
use crate::name::PackageName;
use crate::spec::desired_versions;

/// Selector value meaning "no forced source builds".
pub const NONE_SENTINEL: &str = ":none:";

/// Delimiter between names, both in the request and in the rendered plan.
pub const SELECTOR_DELIMITER: &str = ",";

/// The caller's skip-binary selector before it is checked against the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipBinaryRequest {
    None,
    Names(Vec<PackageName>),
}

impl SkipBinaryRequest {
    /// Parses `:none:` or a comma separated list of names.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == NONE_SENTINEL {
            return Self::None;
        }
        let names: Vec<PackageName> = trimmed
            .split(SELECTOR_DELIMITER)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(PackageName::new)
            .collect();
        if names.is_empty() {
            Self::None
        } else {
            Self::Names(names)
        }
    }

    pub fn names(&self) -> &[PackageName] {
        match self {
            Self::None => &[],
            Self::Names(names) => names,
        }
    }
}

/// Packages that must be compiled from source, with the version to build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SkipBinary {
    #[default]
    None,
    Packages(BTreeMap<PackageName, Version>),
}

impl SkipBinary {
    pub fn from_pins(pins: BTreeMap<PackageName, Version>) -> Self {
        if pins.is_empty() {
            Self::None
        } else {
            Self::Packages(pins)
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn names(&self) -> Vec<&PackageName> {
        match self {
            Self::None => Vec::new(),
            Self::Packages(pins) => pins.keys().collect(),
        }
    }

    pub fn pins(&self) -> Option<&BTreeMap<PackageName, Version>> {
        match self {
            Self::None => None,
            Self::Packages(pins) => Some(pins),
        }
    }
}

impl fmt::Display for SkipBinary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str(NONE_SENTINEL),
            Self::Packages(pins) => {
                let names = pins
                    .keys()
                    .map(PackageName::as_str)
                    .collect::<Vec<_>>()
                    .join(SELECTOR_DELIMITER);
                f.write_str(&names)
            }
        }
    }
}

/// Narrows a skip-binary request to the packages that still need a source build.
///
/// Requested names without a desired version in `packages` ++ `constraints`
/// are dropped, as are names whose desired version is already in `index`.
/// The result never names a package the request did not.
pub fn plan_skip_binary<P, C>(
    index: &PackageIndex,
    request: &SkipBinaryRequest,
    packages: P,
    constraints: C,
) -> SkipBinary
where
    P: IntoIterator,
    P::Item: AsRef<str>,
    C: IntoIterator,
    C::Item: AsRef<str>,
{
    let SkipBinaryRequest::Names(requested) = request else {
        return SkipBinary::None;
    };

    let package_map = desired_versions(
        packages
            .into_iter()
            .map(|spec| spec.as_ref().to_string())
            .chain(constraints.into_iter().map(|spec| spec.as_ref().to_string())),
    );

    let mut candidates = BTreeMap::new();
    for name in requested {
        match package_map.get(name) {
            Some(version) => {
                candidates.insert(name.clone(), version.clone());
            }
            None => info!(
                package = %name,
                "skip binary not in packages/constraints; can't determine desired version"
            ),
        }
    }

    info!(candidates = %render_pins(&candidates), "checking if binaries already exist");
    let existing = index.existing_packages(&candidates);
    if !existing.is_empty() {
        let names = existing.iter().map(PackageName::as_str).collect::<Vec<_>>();
        info!(packages = %names.join(", "), "packages already exist");
    }
    candidates.retain(|name, _| !existing.contains(name));

    let plan = SkipBinary::from_pins(candidates);
    if !plan.is_none() {
        info!(packages = %plan, "will force binary build");
    }
    plan
}

fn render_pins(pins: &BTreeMap<PackageName, Version>) -> String {
    pins.iter()
        .map(|(name, version)| format!("{name}=={version}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostProfile, PlatformEpoch};

    const TEST_INDEX_FILES: &[&str] = &[
        "aiohttp-3.6.1-cp310-none-any.whl",
        "aiohttp-3.7.3-cp310-none-any.whl",
        "aiohttp-3.7.4-cp310-none-any.whl",
        "google_cloud_pubsub-2.1.0-py2.py3-none-any.whl",
        "grpcio-1.31.0-cp310-cp310-musllinux_1_2_x86_64.whl",
    ];

    fn index() -> PackageIndex {
        let host = HostProfile::new("x86_64", "cp310", "musllinux", PlatformEpoch::new(1, 2));
        PackageIndex::from_filenames(TEST_INDEX_FILES, &host).unwrap()
    }

    fn plan(skip: &str, packages: &[&str], constraints: &[&str]) -> String {
        plan_skip_binary(
            &index(),
            &SkipBinaryRequest::parse(skip),
            packages,
            constraints,
        )
        .to_string()
    }

    const PACKAGES: &[&str] = &["aiohttp==3.7.4", "google_cloud_pubsub==2.1.0"];

    #[test]
    fn none_request_is_a_no_op() {
        assert_eq!(plan(":none:", PACKAGES, &[]), ":none:");
        assert_eq!(SkipBinaryRequest::parse(" "), SkipBinaryRequest::None);
    }

    #[test]
    fn all_is_never_forced() {
        assert_eq!(plan(":all:", PACKAGES, &[]), ":none:");
    }

    #[test]
    fn version_present_in_index() {
        assert_eq!(plan("aiohttp", PACKAGES, &[]), ":none:");
    }

    #[test]
    fn version_missing_from_index() {
        assert_eq!(
            plan("aiohttp", &["aiohttp==3.7.5", "google_cloud_pubsub==2.1.0"], &[]),
            "aiohttp"
        );
    }

    #[test]
    fn implicit_dependency_is_dropped() {
        assert_eq!(plan("aiohttp,grpcio", PACKAGES, &[]), ":none:");
    }

    #[test]
    fn constraint_versions_are_considered() {
        assert_eq!(plan("aiohttp,grpcio", PACKAGES, &["grpcio==1.31.0"]), ":none:");
        assert_eq!(plan("aiohttp,grpcio", PACKAGES, &["grpcio==1.43.0"]), "grpcio");
    }

    #[test]
    fn grpcio_pin_decides_forced_build() {
        assert_eq!(plan("grpcio", &["grpcio==1.31.0"], &[]), ":none:");
        assert_eq!(plan("grpcio", &["grpcio==1.43.0"], &[]), "grpcio");
    }

    #[test]
    fn request_names_are_canonicalized() {
        let plan = plan_skip_binary(
            &index(),
            &SkipBinaryRequest::parse("Google.Cloud.PubSub, AIOHTTP"),
            ["google-cloud-pubsub==2.2.0", "aiohttp==3.8.0"],
            Vec::<String>::new(),
        );
        assert_eq!(plan.to_string(), "aiohttp,google-cloud-pubsub");
        let pins = plan.pins().unwrap();
        assert_eq!(
            pins.get(&PackageName::new("google_cloud_pubsub")).map(ToString::to_string),
            Some("2.2.0".to_string())
        );
    }

    #[test]
    fn later_constraint_overrides_package_pin() {
        assert_eq!(
            plan("grpcio", &["grpcio==1.43.0"], &["grpcio==1.31.0"]),
            ":none:"
        );
    }
}
