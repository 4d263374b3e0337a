use crate::host::{HostProfile, PlatformEpoch};

/// A single platform tag as it appears in a wheel filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformTag<'a> {
    Any,
    /// `{family}_{major}_{minor}_{arch}`, e.g. `musllinux_1_2_x86_64`.
    Versioned {
        family: &'a str,
        epoch: PlatformEpoch,
        arch: &'a str,
    },
    /// Anything without an epoch: `linux_x86_64`, `manylinux2014_aarch64`, `win_amd64`.
    Legacy(&'a str),
}

impl<'a> PlatformTag<'a> {
    pub fn parse(tag: &'a str) -> Self {
        if tag == "any" {
            return Self::Any;
        }
        let mut parts = tag.splitn(4, '_');
        let (Some(family), Some(major), Some(minor), Some(arch)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Self::Legacy(tag);
        };
        match (major.parse::<u32>(), minor.parse::<u32>()) {
            (Ok(major), Ok(minor)) if !family.is_empty() && !arch.is_empty() => Self::Versioned {
                family,
                epoch: PlatformEpoch::new(major, minor),
                arch,
            },
            _ => Self::Legacy(tag),
        }
    }
}

pub fn platform_compatible(tag: &str, host: &HostProfile) -> bool {
    match PlatformTag::parse(tag) {
        PlatformTag::Any => true,
        PlatformTag::Versioned {
            family,
            epoch,
            arch,
        } => family == host.family() && arch == host.arch() && host.epoch().accepts(epoch),
        PlatformTag::Legacy(_) => false,
    }
}

pub fn abi_compatible(tag: &str, host: &HostProfile) -> bool {
    matches!(tag, "none" | "abi3") || tag == host.abi()
}

pub fn compatible(abi: &str, platform: &str, host: &HostProfile) -> bool {
    platform_compatible(platform, host) && abi_compatible(abi, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostProfile {
        HostProfile::new("x86_64", "cp310", "musllinux", PlatformEpoch::new(1, 2))
    }

    #[test]
    fn accepts_same_major_older_minor() {
        let host = host();
        for tag in [
            "musllinux_1_0_x86_64",
            "musllinux_1_1_x86_64",
            "musllinux_1_2_x86_64",
            "any",
        ] {
            assert!(platform_compatible(tag, &host), "{tag}");
        }
        for tag in [
            "musllinux_1_3_x86_64",
            "musllinux_2_0_x86_64",
            "musllinux_1_2_i686",
            "manylinux_1_2_x86_64",
            "linux_x86_64",
            "manylinux2014_x86_64",
            "win_amd64",
        ] {
            assert!(!platform_compatible(tag, &host), "{tag}");
        }
    }

    #[test]
    fn abi_accepts_none_abi3_and_host() {
        let host = host();
        assert!(abi_compatible("none", &host));
        assert!(abi_compatible("abi3", &host));
        assert!(abi_compatible(host.abi(), &host));
        assert!(!abi_compatible("cp311", &host));
        assert!(!abi_compatible("cp310d", &host));
    }

    #[test]
    fn combined_check_requires_both() {
        let host = host();
        assert!(compatible("cp310", "musllinux_1_1_x86_64", &host));
        assert!(compatible("abi3", "musllinux_1_0_x86_64", &host));
        assert!(compatible("none", "any", &host));
        assert!(!compatible("cp311", "musllinux_1_2_x86_64", &host));
        assert!(!compatible("cp310", "musllinux_1_2_i686", &host));
        assert!(!compatible("abi3", "musllinux_1_3_x86_64", &host));
    }

    #[test]
    fn parses_arch_with_underscores() {
        assert_eq!(
            PlatformTag::parse("musllinux_1_2_x86_64"),
            PlatformTag::Versioned {
                family: "musllinux",
                epoch: PlatformEpoch::new(1, 2),
                arch: "x86_64",
            }
        );
        assert_eq!(PlatformTag::parse("linux_x86_64"), PlatformTag::Legacy("linux_x86_64"));
    }
}
