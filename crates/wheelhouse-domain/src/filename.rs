use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use pep440_rs::Version;

use crate::host::HostProfile;
use crate::name::PackageName;
use crate::tags::compatible;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WheelFilenameError {
    #[error("`{0}` is not a wheel (expected a `.whl` extension)")]
    Extension(String),
    #[error("`{0}` does not match `{{name}}-{{version}}(-{{build}})?-{{python}}-{{abi}}-{{platform}}.whl`")]
    Segments(String),
    #[error("`{filename}` has build tag `{build}` which does not start with a digit")]
    BuildTag { filename: String, build: String },
    #[error("`{filename}` has invalid version `{version}`: {message}")]
    Version {
        filename: String,
        version: String,
        message: String,
    },
}

/// One `(python, abi, platform)` triple a wheel claims to support.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WheelTag {
    pub python: String,
    pub abi: String,
    pub platform: String,
}

impl fmt::Display for WheelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.python, self.abi, self.platform)
    }
}

/// A parsed `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl`.
///
/// Compressed tag sets (`cp310.cp311`, `manylinux_2_17_x86_64.manylinux2014_x86_64`)
/// expand into every combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelFilename {
    pub name: PackageName,
    pub version: Version,
    pub build: Option<String>,
    pub tags: BTreeSet<WheelTag>,
}

impl WheelFilename {
    /// Parses the final component of `path`.
    pub fn from_path(path: &Path) -> Result<Self, WheelFilenameError> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        filename.parse()
    }

    /// True when at least one tag is usable on `host`.
    pub fn is_compatible(&self, host: &HostProfile) -> bool {
        self.tags
            .iter()
            .any(|tag| compatible(&tag.abi, &tag.platform, host))
    }
}

impl FromStr for WheelFilename {
    type Err = WheelFilenameError;

    fn from_str(filename: &str) -> Result<Self, Self::Err> {
        let stem = Path::new(filename)
            .extension()
            .filter(|ext| ext.eq_ignore_ascii_case("whl"))
            .and_then(|_| filename.get(..filename.len() - ".whl".len()))
            .ok_or_else(|| WheelFilenameError::Extension(filename.to_string()))?;

        let parts: Vec<&str> = stem.split('-').collect();
        if !matches!(parts.len(), 5 | 6) || parts.iter().any(|part| part.is_empty()) {
            return Err(WheelFilenameError::Segments(filename.to_string()));
        }
        let build = if parts.len() == 6 {
            let build = parts[2];
            if !build.starts_with(|ch: char| ch.is_ascii_digit()) {
                return Err(WheelFilenameError::BuildTag {
                    filename: filename.to_string(),
                    build: build.to_string(),
                });
            }
            Some(build.to_string())
        } else {
            None
        };

        let version = Version::from_str(parts[1]).map_err(|err| WheelFilenameError::Version {
            filename: filename.to_string(),
            version: parts[1].to_string(),
            message: err.to_string(),
        })?;

        let [python, abi, platform] = [
            parts[parts.len() - 3],
            parts[parts.len() - 2],
            parts[parts.len() - 1],
        ];
        let mut tags = BTreeSet::new();
        for python in python.split('.') {
            for abi in abi.split('.') {
                for platform in platform.split('.') {
                    tags.insert(WheelTag {
                        python: python.to_string(),
                        abi: abi.to_string(),
                        platform: platform.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            name: PackageName::new(parts[0]),
            version,
            build,
            tags,
        })
    }
}
