use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use wheelhouse_domain::{desired_versions, HostProfile, PackageIndex, PackageName, Version, WheelFilename};

/// Packages whose freshly built wheels were unusable on the host, still
/// present after the corrective rebuild.
#[derive(Debug, thiserror::Error)]
#[error("wheels incompatible with the host remain after rebuilding: {}", render_pins(.packages))]
pub struct CompatibilityViolation {
    pub packages: BTreeMap<PackageName, Version>,
}

/// A wheel file in the output directory.
#[derive(Debug, Clone)]
pub struct LocalArtifact {
    pub path: PathBuf,
    pub wheel: WheelFilename,
}

#[derive(Clone, Debug, Serialize)]
pub struct ArtifactSummary {
    pub path: String,
    pub bytes: u64,
    pub sha256: String,
}

/// Parses every `*.whl` directly inside `dir`, sorted by path.
///
/// # Errors
/// Returns an error if the directory cannot be read or a wheel name is
/// malformed.
pub fn scan_local_artifacts(dir: &Path) -> Result<Vec<LocalArtifact>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut artifacts = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading dir {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() || !is_wheel(&path) {
            continue;
        }
        let wheel = WheelFilename::from_path(&path)
            .with_context(|| format!("error parsing wheel {}", path.display()))?;
        artifacts.push(LocalArtifact { path, wheel });
    }
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(artifacts)
}

/// Deletes every wheel in `dir` that has no tag usable on `host`.
///
/// Returns the name and version of each deleted wheel so the caller can
/// rebuild exactly those pins.
///
/// # Errors
/// Returns an error if the directory cannot be scanned or a file cannot be
/// removed.
pub fn validate_output(dir: &Path, host: &HostProfile) -> Result<BTreeMap<PackageName, Version>> {
    let mut rejected = BTreeMap::new();
    for artifact in scan_local_artifacts(dir)? {
        if artifact.wheel.is_compatible(host) {
            continue;
        }
        warn!(
            path = %artifact.path.display(),
            platform = %host.platform_tag(),
            "found wheel that does not match the host requirements"
        );
        remove_artifact(&artifact.path)?;
        rejected.insert(artifact.wheel.name, artifact.wheel.version);
    }
    Ok(rejected)
}

/// Removes local wheels that the index already publishes.
///
/// Only names in `removal_names` with a desired version in `packages` are
/// considered, and only when that exact version is indexed. Every local wheel
/// of such a package is removed except those newer than the indexed version.
///
/// # Errors
/// Returns an error if the directory cannot be scanned or a file cannot be
/// removed.
pub fn prune_local_wheels<P>(
    index: &PackageIndex,
    removal_names: &[PackageName],
    packages: P,
    dir: &Path,
) -> Result<Vec<PathBuf>>
where
    P: IntoIterator,
    P::Item: AsRef<str>,
{
    let package_map = desired_versions(packages);
    let candidates: BTreeMap<PackageName, Version> = removal_names
        .iter()
        .filter_map(|name| {
            package_map
                .get(name)
                .map(|version| (name.clone(), version.clone()))
        })
        .collect();
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    info!(packages = %render_pins(&candidates), "checking if binaries already exist");
    let existing = index.existing_packages(&candidates);

    let mut removed = Vec::new();
    for artifact in scan_local_artifacts(dir)? {
        let name = &artifact.wheel.name;
        if !existing.contains(name) {
            continue;
        }
        let Some(indexed) = candidates.get(name) else {
            continue;
        };
        if artifact.wheel.version > *indexed {
            debug!(
                path = %artifact.path.display(),
                indexed = %indexed,
                "keeping local wheel newer than the indexed release"
            );
            continue;
        }
        info!(path = %artifact.path.display(), "removing local wheel already in index");
        remove_artifact(&artifact.path)?;
        removed.push(artifact.path);
    }
    Ok(removed)
}

/// Deletes `path`; a file that is already gone counts as removed.
///
/// # Errors
/// Returns an error for any failure other than the file being absent.
pub fn remove_artifact(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "wheel vanished before removal");
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("removing file {}", path.display())),
    }
}

/// Size and digest of every wheel left in `dir`.
///
/// # Errors
/// Returns an error if a file cannot be read.
pub fn collect_artifact_summaries(dir: &Path) -> Result<Vec<ArtifactSummary>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_wheel(&path) {
            continue;
        }
        entries.push(ArtifactSummary {
            path: path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string(),
            bytes: fs::metadata(&path)?.len(),
            sha256: compute_file_sha256(&path)?,
        });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

pub(crate) fn compute_file_sha256(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

pub(crate) fn is_wheel(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("whl"))
}

pub(crate) fn render_pins(pins: &BTreeMap<PackageName, Version>) -> String {
    pins.iter()
        .map(|(name, version)| format!("{name}=={version}"))
        .collect::<Vec<_>>()
        .join(", ")
}
