use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde_json::json;
use wheelhouse_domain::{
    extract_packages, filter_requirements, parse_requirements, plan_skip_binary,
    SkipBinaryRequest,
};

use crate::artifacts::{prune_local_wheels, validate_output};
use crate::config::context::CommandContext;
use crate::index::load_index;
use crate::outcome::ExecutionOutcome;

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub index: String,
    pub requirement: PathBuf,
    pub requirement_diff: Option<PathBuf>,
    pub constraint: Option<PathBuf>,
    pub skip_binary: String,
}

#[derive(Debug, Clone)]
pub struct PruneRequest {
    pub index: String,
    pub requirement: PathBuf,
    pub skip_exists: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FilterRequest {
    pub requirement: PathBuf,
    /// Build architecture; `ARCH` when unset.
    pub arch: Option<String>,
}

/// Resolves the `--no-binary` selector pip would receive.
///
/// # Errors
/// Returns an error if the host, requirement files, or index cannot be read.
pub fn plan(ctx: &CommandContext, request: &PlanRequest) -> Result<ExecutionOutcome> {
    let host = ctx.host()?;
    let packages = extract_packages(&request.requirement, request.requirement_diff.as_deref())?;
    let constraints = request
        .constraint
        .as_deref()
        .map(parse_requirements)
        .transpose()?
        .unwrap_or_default();
    let index = load_index(ctx.index(), &request.index, host)?;
    let selector = plan_skip_binary(
        &index,
        &SkipBinaryRequest::parse(&request.skip_binary),
        &packages,
        &constraints,
    );
    let pins = selector
        .pins()
        .map(|pins| {
            pins.iter()
                .map(|(name, version)| (name.to_string(), json!(version.to_string())))
                .collect::<serde_json::Map<_, _>>()
        })
        .unwrap_or_default();
    Ok(ExecutionOutcome::success(
        selector.to_string(),
        json!({
            "skip_binary": selector.to_string(),
            "pins": pins,
            "packages": packages.len(),
        }),
    ))
}

/// Deletes wheels in `dir` that the host cannot install.
///
/// # Errors
/// Returns an error if the host cannot be detected or the directory cannot be
/// processed.
pub fn validate(ctx: &CommandContext, dir: &Path) -> Result<ExecutionOutcome> {
    let host = ctx.host()?;
    let rejected = validate_output(dir, host)?;
    let message = if rejected.is_empty() {
        "all wheels match the host".to_string()
    } else {
        format!("removed {} incompatible wheel(s)", rejected.len())
    };
    let rejected = rejected
        .iter()
        .map(|(name, version)| (name.to_string(), json!(version.to_string())))
        .collect::<serde_json::Map<_, _>>();
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "host": host,
            "rejected": rejected,
        }),
    ))
}

/// Deletes local wheels the index already publishes.
///
/// # Errors
/// Returns an error if the host, requirement file, index, or directory cannot
/// be read.
pub fn prune(ctx: &CommandContext, request: &PruneRequest) -> Result<ExecutionOutcome> {
    let host = ctx.host()?;
    let packages = parse_requirements(&request.requirement)?;
    let index = load_index(ctx.index(), &request.index, host)?;
    let removal = SkipBinaryRequest::parse(&request.skip_exists);
    let removed = prune_local_wheels(&index, removal.names(), &packages, &request.dir)?;
    let removed = removed
        .iter()
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    Ok(ExecutionOutcome::success(
        format!("removed {} local wheel(s)", removed.len()),
        json!({ "removed": removed }),
    ))
}

/// Rewrites a requirement file without packages unsupported on the arch.
///
/// # Errors
/// Returns an error if no arch is known or the file cannot be rewritten.
pub fn filter(ctx: &CommandContext, request: &FilterRequest) -> Result<ExecutionOutcome> {
    let arch = request
        .arch
        .clone()
        .or_else(|| ctx.config().host().build_arch.clone())
        .ok_or_else(|| anyhow!("no build architecture; pass --arch or set ARCH"))?;
    let removed = filter_requirements(&request.requirement, &arch)?;
    Ok(ExecutionOutcome::success(
        format!("removed {} requirement(s) for {arch}", removed.len()),
        json!({
            "arch": arch,
            "file": request.requirement.display().to_string(),
            "removed": removed,
        }),
    ))
}

/// Reports the detected build host.
///
/// # Errors
/// Returns an error if the host cannot be detected.
pub fn host(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let host = ctx.host()?;
    Ok(ExecutionOutcome::success(
        format!("{} {}", host.abi(), host.platform_tag()),
        json!({
            "host": host,
            "platform": host.platform_tag(),
        }),
    ))
}
