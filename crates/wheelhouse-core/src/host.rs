use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;
use wheelhouse_domain::{alpine_platform, wheel_arch, HostProfile};

use crate::config::HostConfig;

/// Builds the host profile from `ARCH`, `ABI` and the Alpine release.
///
/// # Errors
/// Returns an error when a required variable is missing, the architecture or
/// Alpine release is unknown, or the release file cannot be read.
pub fn detect_host(config: &HostConfig) -> Result<HostProfile> {
    let build_arch = config
        .build_arch
        .as_deref()
        .ok_or_else(|| anyhow!("ARCH is not set; expected one of amd64, i386, aarch64, armhf, armv7"))?;
    let arch = wheel_arch(build_arch)
        .ok_or_else(|| anyhow!("unsupported build architecture `{build_arch}`"))?;
    let abi = config
        .abi
        .as_deref()
        .ok_or_else(|| anyhow!("ABI is not set; expected an interpreter tag such as cp313"))?;

    let host = match config.platform.as_deref() {
        Some(platform) => HostProfile::from_platform(arch, abi, platform)?,
        None => {
            let (major, minor) = read_alpine_release(&config.alpine_release)?;
            let (family, epoch) = alpine_platform(major, minor).ok_or_else(|| {
                anyhow!("Alpine {major}.{minor} has no known wheel platform; set WHEELS_PLATFORM")
            })?;
            HostProfile::new(arch, abi, family, epoch)
        }
    };
    debug!(
        arch = host.arch(),
        abi = host.abi(),
        platform = %host.platform_tag(),
        "detected build host"
    );
    Ok(host)
}

fn read_alpine_release(path: &Path) -> Result<(u32, u32)> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read Alpine release from {}", path.display()))?;
    let mut parts = contents.trim().split('.');
    let (Some(major), Some(minor)) = (parts.next(), parts.next()) else {
        bail!("unexpected Alpine release `{}` in {}", contents.trim(), path.display());
    };
    let parse = |raw: &str| {
        raw.parse::<u32>()
            .with_context(|| format!("unexpected Alpine release `{}`", contents.trim()))
    };
    Ok((parse(major)?, parse(minor)?))
}
