use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::name::PackageName;
use crate::spec::PackageSpec;

/// Packages that cannot be built for some build architectures.
const ARCH_EXCLUDES: &[(&str, &[&str])] = &[("RPi.GPIO", &["amd64", "i386", "armhf"])];

#[derive(Debug, thiserror::Error)]
pub enum RequirementError {
    #[error("{} includes missing requirement file {}", .path.display(), .include.display())]
    IncludeMissing { path: PathBuf, include: PathBuf },
    #[error("failed to read requirement file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write requirement file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Reads a requirement file into the set of specs it names.
///
/// `-r`/`--requirement` lines are followed relative to the including file,
/// `-c`/`--constraint` lines are skipped, and every other line contributes its
/// last whitespace-separated token.
pub fn parse_requirements(path: &Path) -> Result<BTreeSet<String>, RequirementError> {
    let mut visited = HashSet::new();
    let mut specs = BTreeSet::new();
    parse_requirements_inner(path, &mut visited, &mut specs)?;
    Ok(specs)
}

fn parse_requirements_inner(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
    specs: &mut BTreeSet<String>,
) -> Result<(), RequirementError> {
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical.clone()) {
        return Ok(());
    }
    let contents = fs::read_to_string(&canonical).map_err(|source| RequirementError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = canonical.parent().unwrap_or_else(|| Path::new("."));
    for line in contents.lines() {
        let Some(line) = strip_comment(line) else {
            continue;
        };
        if option_value(line, &["-c", "--constraint"]).is_some() {
            continue;
        }
        if let Some(target) = option_value(line, &["-r", "--requirement"]) {
            let include = if Path::new(target).is_absolute() {
                PathBuf::from(target)
            } else {
                base_dir.join(target)
            };
            if !include.is_file() {
                return Err(RequirementError::IncludeMissing {
                    path: path.to_path_buf(),
                    include,
                });
            }
            parse_requirements_inner(&include, visited, specs)?;
            continue;
        }
        if let Some(token) = line.split_whitespace().last() {
            specs.insert(token.to_string());
        }
    }
    Ok(())
}

fn strip_comment(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let spec = match trimmed.find(" #").or_else(|| trimmed.find("\t#")) {
        Some(idx) => trimmed[..idx].trim_end(),
        None => trimmed,
    };
    Some(spec)
}

fn option_value<'a>(line: &'a str, flags: &[&str]) -> Option<&'a str> {
    flags.iter().find_map(|flag| {
        let rest = line.strip_prefix(flag)?;
        if !(rest.starts_with(' ') || rest.starts_with('=') || rest.starts_with('\t')) {
            return None;
        }
        let value = rest.trim_start_matches([' ', '\t', '=']).trim();
        (!value.is_empty()).then_some(value)
    })
}

/// Specs in `path` that are not already in `base`.
pub fn extract_packages(
    path: &Path,
    base: Option<&Path>,
) -> Result<BTreeSet<String>, RequirementError> {
    let packages = parse_requirements(path)?;
    let Some(base) = base else {
        return Ok(packages);
    };
    let previous = parse_requirements(base)?;
    Ok(packages.difference(&previous).cloned().collect())
}

pub fn write_requirements(path: &Path, specs: &BTreeSet<String>) -> Result<(), RequirementError> {
    let mut contents = specs.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }
    fs::write(path, contents).map_err(|source| RequirementError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Drops specs for packages known not to build on `arch`.
pub fn filter_packages(specs: &BTreeSet<String>, arch: &str) -> BTreeSet<String> {
    let excluded: Vec<PackageName> = ARCH_EXCLUDES
        .iter()
        .filter(|(_, arches)| arches.contains(&arch))
        .map(|(name, _)| PackageName::new(name))
        .collect();
    specs
        .iter()
        .filter(|raw| {
            let drop = PackageSpec::parse(raw).is_some_and(|spec| excluded.contains(&spec.name));
            if drop {
                info!(spec = raw.as_str(), arch, "excluding package unsupported on arch");
            }
            !drop
        })
        .cloned()
        .collect()
}

/// Rewrites `path` without the specs `filter_packages` drops for `arch`.
pub fn filter_requirements(path: &Path, arch: &str) -> Result<Vec<String>, RequirementError> {
    let specs = parse_requirements(path)?;
    let kept = filter_packages(&specs, arch);
    let removed = specs.difference(&kept).cloned().collect::<Vec<_>>();
    debug!(path = %path.display(), removed = removed.len(), "rewriting requirement file");
    write_requirements(path, &kept)?;
    Ok(removed)
}
