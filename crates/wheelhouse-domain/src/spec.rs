use std::collections::BTreeMap;
use std::str::FromStr;

use pep440_rs::{Operator, Version, VersionSpecifier, VersionSpecifiers};
use pep508_rs::{Requirement as PepRequirement, VersionOrUrl};
use tracing::debug;

use crate::name::PackageName;

/// One requirement line reduced to a name and its version specifiers.
#[derive(Debug, Clone)]
pub struct PackageSpec {
    pub name: PackageName,
    pub specifiers: VersionSpecifiers,
    pub raw: String,
}

impl PackageSpec {
    /// Parses a PEP 508 requirement line.
    ///
    /// Returns `None` for lines without a package name (URLs, local paths,
    /// option-only lines).
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = strip_wrapping_quotes(raw.trim());
        let requirement = match PepRequirement::from_str(cleaned) {
            Ok(requirement) => requirement,
            Err(err) => {
                debug!(spec = cleaned, error = %err, "not a package requirement");
                return None;
            }
        };
        let specifiers = match requirement.version_or_url.as_ref() {
            Some(VersionOrUrl::VersionSpecifier(specifiers)) => {
                VersionSpecifiers::from_str(&specifiers.to_string()).ok()?
            }
            Some(VersionOrUrl::Url(_)) | None => VersionSpecifiers::from_iter(std::iter::empty()),
        };
        Some(Self {
            name: PackageName::new(&requirement.name.to_string()),
            specifiers,
            raw: raw.trim().to_string(),
        })
    }

    /// The version this spec asks to build, if it names one.
    ///
    /// An exact pin wins over range bounds. Exclusions and wildcard clauses
    /// never describe a desired version.
    pub fn desired_version(&self) -> Option<&Version> {
        let exact = self
            .specifiers
            .iter()
            .find(|specifier| matches!(specifier.operator(), Operator::Equal | Operator::ExactEqual));
        exact
            .or_else(|| {
                self.specifiers.iter().find(|specifier| {
                    !matches!(
                        specifier.operator(),
                        Operator::NotEqual | Operator::NotEqualStar | Operator::EqualStar
                    )
                })
            })
            .map(VersionSpecifier::version)
    }
}

fn strip_wrapping_quotes(input: &str) -> &str {
    if input.len() >= 2 {
        let bytes = input.as_bytes();
        let first = bytes[0];
        let last = bytes[input.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &input[1..input.len() - 1];
        }
    }
    input
}

/// Maps each canonical name to the version its spec asks for.
///
/// Specs are applied in iteration order and a later spec for the same name
/// replaces the earlier one. Specs without a usable version are skipped.
pub fn desired_versions<I, S>(specs: I) -> BTreeMap<PackageName, Version>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut versions = BTreeMap::new();
    for raw in specs {
        let raw = raw.as_ref();
        let Some(spec) = PackageSpec::parse(raw) else {
            debug!(spec = raw, "skipping line without a package name");
            continue;
        };
        let Some(version) = spec.desired_version().cloned() else {
            continue;
        };
        versions.insert(spec.name, version);
    }
    versions
}
