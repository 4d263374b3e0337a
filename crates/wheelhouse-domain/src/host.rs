use std::fmt;

use serde::Serialize;

/// Wheel architecture for each supported build architecture name.
const ARCH_PLATFORMS: &[(&str, &str)] = &[
    ("amd64", "x86_64"),
    ("i386", "i686"),
    ("aarch64", "aarch64"),
    ("armhf", "armv6l"),
    ("armv7", "armv7l"),
];

/// musllinux epoch shipped by each supported Alpine release.
const ALPINE_PLATFORMS: &[((u32, u32), PlatformEpoch)] = &[
    ((3, 16), PlatformEpoch::new(1, 2)),
    ((3, 17), PlatformEpoch::new(1, 2)),
    ((3, 18), PlatformEpoch::new(1, 2)),
    ((3, 19), PlatformEpoch::new(1, 2)),
    ((3, 20), PlatformEpoch::new(1, 2)),
    ((3, 21), PlatformEpoch::new(1, 2)),
    ((3, 22), PlatformEpoch::new(1, 2)),
];

const MUSLLINUX: &str = "musllinux";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TagError {
    #[error("`{0}` is not a platform of the form `{{family}}_{{major}}_{{minor}}`")]
    Platform(String),
}

/// `(major, minor)` compatibility level of a platform family such as musllinux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PlatformEpoch {
    pub major: u32,
    pub minor: u32,
}

impl PlatformEpoch {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Whether a tag built for `other` runs on a host at `self`.
    pub fn accepts(self, other: PlatformEpoch) -> bool {
        self.major == other.major && other.minor <= self.minor
    }
}

impl fmt::Display for PlatformEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.major, self.minor)
    }
}

/// The build target every compatibility decision is made against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostProfile {
    arch: String,
    abi: String,
    family: String,
    epoch: PlatformEpoch,
}

impl HostProfile {
    pub fn new(
        arch: impl Into<String>,
        abi: impl Into<String>,
        family: impl Into<String>,
        epoch: PlatformEpoch,
    ) -> Self {
        Self {
            arch: arch.into(),
            abi: abi.into(),
            family: family.into(),
            epoch,
        }
    }

    /// Parses `{family}_{major}_{minor}` (e.g. `musllinux_1_2`) into a host.
    pub fn from_platform(
        arch: impl Into<String>,
        abi: impl Into<String>,
        platform: &str,
    ) -> Result<Self, TagError> {
        let invalid = || TagError::Platform(platform.to_string());
        let mut parts = platform.rsplitn(3, '_');
        let minor = parts.next().and_then(|raw| raw.parse().ok()).ok_or_else(invalid)?;
        let major = parts.next().and_then(|raw| raw.parse().ok()).ok_or_else(invalid)?;
        let family = parts.next().filter(|raw| !raw.is_empty()).ok_or_else(invalid)?;
        Ok(Self::new(arch, abi, family, PlatformEpoch::new(major, minor)))
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn abi(&self) -> &str {
        &self.abi
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn epoch(&self) -> PlatformEpoch {
        self.epoch
    }

    /// The newest platform tag this host produces, e.g. `musllinux_1_2_x86_64`.
    pub fn platform_tag(&self) -> String {
        format!("{}_{}_{}", self.family, self.epoch, self.arch)
    }
}

pub fn wheel_arch(build_arch: &str) -> Option<&'static str> {
    ARCH_PLATFORMS
        .iter()
        .find(|(name, _)| *name == build_arch)
        .map(|(_, arch)| *arch)
}

pub fn alpine_platform(major: u32, minor: u32) -> Option<(&'static str, PlatformEpoch)> {
    ALPINE_PLATFORMS
        .iter()
        .find(|(release, _)| *release == (major, minor))
        .map(|(_, epoch)| (MUSLLINUX, *epoch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epochs_accept_older_minors_only() {
        let host = PlatformEpoch::new(1, 2);
        assert!(host.accepts(PlatformEpoch::new(1, 0)));
        assert!(host.accepts(PlatformEpoch::new(1, 2)));
        assert!(!host.accepts(PlatformEpoch::new(1, 3)));
        assert!(!host.accepts(PlatformEpoch::new(2, 0)));
        assert!(!host.accepts(PlatformEpoch::new(0, 9)));
    }

    #[test]
    fn parses_platform_override() {
        let host = HostProfile::from_platform("x86_64", "cp313", "musllinux_1_2").unwrap();
        assert_eq!(host.family(), "musllinux");
        assert_eq!(host.epoch(), PlatformEpoch::new(1, 2));
        assert_eq!(host.platform_tag(), "musllinux_1_2_x86_64");

        let host = HostProfile::from_platform("x86_64", "cp313", "manylinux_2_28").unwrap();
        assert_eq!(host.family(), "manylinux");

        assert!(HostProfile::from_platform("x86_64", "cp313", "musllinux").is_err());
        assert!(HostProfile::from_platform("x86_64", "cp313", "_1_2").is_err());
    }

    #[test]
    fn maps_build_arch_and_alpine_release() {
        assert_eq!(wheel_arch("amd64"), Some("x86_64"));
        assert_eq!(wheel_arch("armv7"), Some("armv7l"));
        assert_eq!(wheel_arch("sparc"), None);
        assert_eq!(alpine_platform(3, 21), Some(("musllinux", PlatformEpoch::new(1, 2))));
        assert_eq!(alpine_platform(3, 12), None);
    }
}
