#![allow(dead_code)]

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;

const HOST_VARS: &[&str] = &[
    "ARCH",
    "ABI",
    "WHEELS_PLATFORM",
    "WHEELS_ALPINE_RELEASE",
    "WHEELS_INDEX",
    "WHEELS_HTTP_TIMEOUT",
    "WHEELS_BUILDER_UPLOAD_PLUGIN_REMOTE_S3",
    "WHEELS_KEEP_PROXIES",
    "PIP_CACHE_DIR",
];

/// The binary with host variables cleared.
pub fn wheelhouse() -> Command {
    let mut cmd = cargo_bin_cmd!("wheelhouse");
    for var in HOST_VARS {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

/// The binary configured as an amd64 / cp310 / musllinux_1_2 host.
pub fn wheelhouse_on_host() -> Command {
    let mut cmd = wheelhouse();
    cmd.env("ARCH", "amd64")
        .env("ABI", "cp310")
        .env("WHEELS_PLATFORM", "musllinux_1_2");
    cmd
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}
