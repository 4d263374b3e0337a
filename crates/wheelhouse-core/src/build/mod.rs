mod executor;
mod salvage;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use tracing::{info, warn};
use wheelhouse_domain::{
    extract_packages, filter_packages, parse_requirements, plan_skip_binary, write_requirements,
    PackageName, SkipBinary, SkipBinaryRequest, Version,
};

pub use executor::{
    build_packages, build_requirement, pip_wheel_invocation, BuildStatus, BuildTarget, WheelOptions,
};
pub use salvage::copy_wheels_from_cache;

use crate::artifacts::{
    collect_artifact_summaries, prune_local_wheels, render_pins, validate_output,
    CompatibilityViolation,
};
use crate::config::context::CommandContext;
use crate::index::{load_index, pip_index_url};
use crate::outcome::{CommandStatus, ExecutionOutcome};
use crate::upload::{run_upload, UploadBackend};

#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Base URL of the remote wheel repository.
    pub index: String,
    pub requirement: PathBuf,
    /// Specs already present here are left out of the build.
    pub requirement_diff: Option<PathBuf>,
    pub constraint: Option<PathBuf>,
    pub skip_binary: String,
    /// Packages whose local wheels are dropped when the index has them.
    pub skip_exists: String,
    pub single: bool,
    pub timeout: Option<Duration>,
    pub output: PathBuf,
    pub upload: Option<UploadTarget>,
}

#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub backend: UploadBackend,
    pub remote: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    Completed,
    CompletedWithFailures,
    TimedOut,
}

impl From<RunStatus> for CommandStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Completed => Self::Ok,
            RunStatus::CompletedWithFailures => Self::BuildFailures,
            RunStatus::TimedOut => Self::TimedOut,
        }
    }
}

#[derive(Debug, Default)]
struct BuildLog {
    failed: Vec<String>,
    timed_out: bool,
}

impl BuildLog {
    fn record(&mut self, target: &str, status: BuildStatus) {
        match status {
            BuildStatus::Built => {}
            BuildStatus::Failed(_) => self.failed.push(target.to_string()),
            BuildStatus::TimedOut => self.timed_out = true,
        }
    }

    fn status(&self) -> RunStatus {
        if self.timed_out {
            RunStatus::TimedOut
        } else if self.failed.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithFailures
        }
    }
}

/// Builds the wheels a requirement file is missing from the remote index.
///
/// # Errors
/// Returns an error when the host, requirement files, or index cannot be
/// read, when pip cannot be started, when incompatible wheels survive the
/// corrective rebuild, or when the upload fails.
pub fn run_build(ctx: &CommandContext, request: &BuildRequest) -> Result<ExecutionOutcome> {
    let host = ctx.host()?;
    let remote = request
        .upload
        .as_ref()
        .map(|target| resolve_remote(ctx, target))
        .transpose()?;

    let build_arch = ctx.config().host().build_arch.as_deref().unwrap_or_default();
    let packages = filter_packages(
        &extract_packages(&request.requirement, request.requirement_diff.as_deref())?,
        build_arch,
    );
    if packages.is_empty() {
        info!("no packages to build");
        return Ok(ExecutionOutcome::success(
            "nothing to build",
            json!({ "host": host, "packages": [] }),
        ));
    }
    let constraints = request
        .constraint
        .as_deref()
        .map(parse_requirements)
        .transpose()?
        .unwrap_or_default();

    let index = load_index(ctx.index(), &request.index, host)?;
    let skip_binary = plan_skip_binary(
        &index,
        &SkipBinaryRequest::parse(&request.skip_binary),
        &packages,
        &constraints,
    );

    let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
    let requirement = scratch.path().join("requirements.txt");
    write_requirements(&requirement, &packages)?;

    let wheels_dir = request.output.join(host.family());
    fs::create_dir_all(&wheels_dir)
        .with_context(|| format!("creating {}", wheels_dir.display()))?;
    let options = WheelOptions {
        index_url: pip_index_url(&request.index, host)?.to_string(),
        output: wheels_dir.clone(),
        skip_binary: skip_binary.to_string(),
        constraint: request.constraint.clone(),
    };

    let mut log = BuildLog::default();
    if request.single {
        let specs = packages.iter().cloned().collect::<Vec<_>>();
        for (spec, status) in build_packages(ctx.runner(), &specs, &options, request.timeout)? {
            log.record(&spec, status);
        }
    } else {
        let status = build_requirement(ctx.runner(), requirement, &options, request.timeout)?;
        log.record(&request.requirement.display().to_string(), status);
    }

    if log.timed_out {
        copy_wheels_from_cache(&ctx.config().cache().pip_cache, &wheels_dir);
    }

    let rejected = validate_output(&wheels_dir, host)?;
    if !rejected.is_empty() {
        if log.timed_out {
            warn!(packages = %render_pins(&rejected), "removed incompatible wheels after timeout");
        } else {
            rebuild_rejected(ctx, &options, &rejected, request.timeout, &mut log)?;
            let remaining = validate_output(&wheels_dir, host)?;
            if !remaining.is_empty() {
                return Err(CompatibilityViolation {
                    packages: remaining,
                }
                .into());
            }
        }
    }

    let removal = SkipBinaryRequest::parse(&request.skip_exists);
    let pruned = prune_local_wheels(&index, removal.names(), &packages, &wheels_dir)?;

    let artifacts = collect_artifact_summaries(&wheels_dir)?;
    let uploaded = match (&request.upload, remote) {
        (Some(target), Some(remote)) => {
            let wheels = artifacts
                .iter()
                .map(|artifact| wheels_dir.join(&artifact.path))
                .collect::<Vec<_>>();
            run_upload(ctx.runner(), target.backend, &request.output, &wheels, &remote)?
        }
        _ => false,
    };

    let status = log.status();
    let message = match status {
        RunStatus::Completed => format!("built {} wheel(s)", artifacts.len()),
        RunStatus::CompletedWithFailures => {
            format!("failed to build {}", log.failed.join(", "))
        }
        RunStatus::TimedOut => "build timed out; kept wheels salvaged from the pip cache".into(),
    };
    let details = json!({
        "host": host,
        "skip_binary": skip_binary.to_string(),
        "failed": log.failed,
        "rejected": pins_json(&rejected),
        "pruned": pruned
            .iter()
            .map(|path| display_name(path))
            .collect::<Vec<_>>(),
        "artifacts": artifacts,
        "uploaded": uploaded,
    });
    Ok(ExecutionOutcome::with_status(status.into(), message, details))
}

fn rebuild_rejected(
    ctx: &CommandContext,
    options: &WheelOptions,
    rejected: &BTreeMap<PackageName, Version>,
    timeout: Option<Duration>,
    log: &mut BuildLog,
) -> Result<()> {
    let pins = SkipBinary::from_pins(rejected.clone());
    info!(packages = %render_pins(rejected), "rebuilding incompatible wheels from source");
    let options = WheelOptions {
        skip_binary: pins.to_string(),
        ..options.clone()
    };
    let specs = rejected
        .iter()
        .map(|(name, version)| format!("{name}=={version}"))
        .collect::<Vec<_>>();
    for (spec, status) in build_packages(ctx.runner(), &specs, &options, timeout)? {
        log.record(&spec, status);
    }
    Ok(())
}

fn resolve_remote(ctx: &CommandContext, target: &UploadTarget) -> Result<String> {
    if let Some(remote) = &target.remote {
        return Ok(remote.clone());
    }
    match target.backend {
        UploadBackend::S3 => ctx.config().upload().s3_remote.clone().ok_or_else(|| {
            anyhow!("no S3 remote given; pass --remote or set WHEELS_BUILDER_UPLOAD_PLUGIN_REMOTE_S3")
        }),
        UploadBackend::Rsync => Err(anyhow!("rsync upload requires --remote")),
    }
}

fn pins_json(pins: &BTreeMap<PackageName, Version>) -> serde_json::Value {
    pins.iter()
        .map(|(name, version)| (name.to_string(), json!(version.to_string())))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{Config, EnvSnapshot};
    use crate::effects::testing::{ScriptedRunner, TestEffects};
    use crate::effects::{Invocation, SharedEffects};
    use crate::index::tests::StaticIndex;
    use crate::process::CommandOutcome;
    use tempfile::{tempdir, TempDir};
    use wheelhouse_domain::{HostProfile, PlatformEpoch};

    const INDEX: &str = "https://wheels.example.org";

    struct Fixture {
        tmp: TempDir,
        effects: Arc<TestEffects>,
        config: Config,
    }

    impl Fixture {
        fn new(requirements: &str, runner: ScriptedRunner) -> Result<Self> {
            let tmp = tempdir()?;
            fs::write(tmp.path().join("requirements.txt"), requirements)?;
            fs::create_dir_all(tmp.path().join("pip-cache"))?;
            let mut index = StaticIndex::default();
            index.listings.insert(
                format!("{INDEX}/musllinux/"),
                [
                    "aiohttp-3.7.4-cp310-cp310-musllinux_1_2_x86_64.whl",
                    "grpcio-1.31.0-cp310-cp310-musllinux_1_2_x86_64.whl",
                ]
                .iter()
                .map(|wheel| format!("<a href=\"{wheel}\">{wheel}</a>"))
                .collect::<Vec<_>>()
                .join("\n"),
            );
            let cache = tmp.path().join("pip-cache").display().to_string();
            let config = Config::from_snapshot(&EnvSnapshot::testing(&[
                ("ARCH", "amd64"),
                ("ABI", "cp310"),
                ("PIP_CACHE_DIR", cache.as_str()),
                ("WHEELS_BUILDER_UPLOAD_PLUGIN_REMOTE_S3", "https://s3.example.com/wheels"),
            ]))?;
            Ok(Self {
                tmp,
                effects: Arc::new(TestEffects { index, runner }),
                config,
            })
        }

        fn request(&self) -> BuildRequest {
            BuildRequest {
                index: INDEX.into(),
                requirement: self.tmp.path().join("requirements.txt"),
                requirement_diff: None,
                constraint: None,
                skip_binary: ":none:".into(),
                skip_exists: String::new(),
                single: false,
                timeout: None,
                output: self.tmp.path().join("out"),
                upload: None,
            }
        }

        fn run(&self, request: &BuildRequest) -> Result<ExecutionOutcome> {
                let effects: SharedEffects = self.effects.clone();
            let ctx = CommandContext::new(self.config.clone(), effects).with_host(
                HostProfile::new("x86_64", "cp310", "musllinux", PlatformEpoch::new(1, 2)),
            );
            run_build(&ctx, request)
        }

        fn wheels(&self) -> Result<Vec<String>> {
            let mut names = fs::read_dir(self.tmp.path().join("out/musllinux"))?
                .map(|entry| Ok(entry?.file_name().to_string_lossy().into_owned()))
                .collect::<Result<Vec<_>>>()?;
            names.sort();
            Ok(names)
        }
    }

    fn wheel_dir(invocation: &Invocation) -> PathBuf {
        let position = invocation
            .args
            .iter()
            .position(|arg| arg == "--wheel-dir")
            .expect("pip invocation carries --wheel-dir");
        PathBuf::from(&invocation.args[position + 1])
    }

    fn produce(
        wheels: &'static [&'static str],
        outcome: CommandOutcome,
    ) -> impl Fn(&Invocation) -> Result<CommandOutcome> + Send + Sync + 'static {
        move |invocation: &Invocation| {
            let dir = wheel_dir(invocation);
            for wheel in wheels {
                fs::write(dir.join(wheel), b"wheel")?;
            }
            Ok(outcome)
        }
    }

    #[test]
    fn builds_prunes_and_uploads() -> Result<()> {
        let runner = ScriptedRunner::new().then(produce(
            &[
                "aiohttp-3.7.4-cp310-cp310-musllinux_1_2_x86_64.whl",
                "six-1.16.0-py2.py3-none-any.whl",
            ],
            CommandOutcome::Exited(0),
        ));
        let fixture = Fixture::new("aiohttp==3.7.4\nsix==1.16.0\nRPi.GPIO==0.7.0\n", runner)?;
        let mut request = fixture.request();
        request.skip_binary = "aiohttp".into();
        request.skip_exists = "aiohttp".into();
        request.upload = Some(UploadTarget {
            backend: UploadBackend::Rsync,
            remote: Some("wheels@host:/srv".into()),
        });

        let outcome = fixture.run(&request)?;
        assert_eq!(outcome.status, CommandStatus::Ok, "{outcome:?}");
        assert_eq!(fixture.wheels()?, vec!["six-1.16.0-py2.py3-none-any.whl"]);
        assert_eq!(outcome.details["skip_binary"], ":none:");
        assert_eq!(outcome.details["uploaded"], true);

        let calls = fixture.effects.runner.calls();
        assert_eq!(calls.len(), 2);
        let pip = &calls[0];
        assert!(pip.args.contains(&"https://wheels.example.org/musllinux-index/".to_string()));
        let requirement = pip.args.last().cloned().unwrap_or_default();
        assert!(requirement.ends_with("requirements.txt"));
        assert_eq!(calls[1].program, PathBuf::from("rsync"));
        Ok(())
    }

    #[test]
    fn corrective_pass_rebuilds_rejected_pins() -> Result<()> {
        let runner = ScriptedRunner::new()
            .then(produce(
                &["grpcio-1.43.0-cp310-cp310-linux_x86_64.whl"],
                CommandOutcome::Exited(0),
            ))
            .then(produce(
                &["grpcio-1.43.0-cp310-cp310-musllinux_1_2_x86_64.whl"],
                CommandOutcome::Exited(0),
            ));
        let fixture = Fixture::new("grpcio==1.43.0\n", runner)?;
        let outcome = fixture.run(&fixture.request())?;

        assert_eq!(outcome.status, CommandStatus::Ok);
        assert_eq!(outcome.details["rejected"]["grpcio"], "1.43.0");
        assert_eq!(
            fixture.wheels()?,
            vec!["grpcio-1.43.0-cp310-cp310-musllinux_1_2_x86_64.whl"]
        );
        let calls = fixture.effects.runner.calls();
        assert_eq!(calls.len(), 2);
        let rebuild = &calls[1].args;
        assert_eq!(rebuild.last().map(String::as_str), Some("grpcio==1.43.0"));
        let position = rebuild.iter().position(|arg| arg == "--no-binary").unwrap();
        assert_eq!(rebuild[position + 1], "grpcio");
        Ok(())
    }

    #[test]
    fn persistent_incompatibility_is_fatal() -> Result<()> {
        let bad: &'static [&'static str] = &["grpcio-1.43.0-cp310-cp310-linux_x86_64.whl"];
        let runner = ScriptedRunner::new()
            .then(produce(bad, CommandOutcome::Exited(0)))
            .then(produce(bad, CommandOutcome::Exited(0)));
        let fixture = Fixture::new("grpcio==1.43.0\n", runner)?;
        let err = fixture.run(&fixture.request()).unwrap_err();
        let violation = err
            .downcast_ref::<CompatibilityViolation>()
            .expect("violation should stay typed");
        assert!(violation.packages.contains_key(&PackageName::new("grpcio")));
        Ok(())
    }

    #[test]
    fn timeout_salvages_cache_and_skips_rebuild() -> Result<()> {
        let runner = ScriptedRunner::new().then(produce(
            &["grpcio-1.43.0-cp310-cp310-linux_x86_64.whl"],
            CommandOutcome::TimedOut,
        ));
        let fixture = Fixture::new("six==1.16.0\ngrpcio==1.43.0\n", runner)?;
        let cached = fixture.tmp.path().join("pip-cache/wheels/aa");
        fs::create_dir_all(&cached)?;
        fs::write(cached.join("six-1.16.0-py2.py3-none-any.whl"), b"wheel")?;

        let mut request = fixture.request();
        request.timeout = Some(Duration::from_secs(1));
        let outcome = fixture.run(&request)?;
        assert_eq!(outcome.status, CommandStatus::TimedOut);
        assert_eq!(fixture.wheels()?, vec!["six-1.16.0-py2.py3-none-any.whl"]);
        assert_eq!(fixture.effects.runner.calls().len(), 1);
        Ok(())
    }

    #[test]
    fn single_mode_reports_failures() -> Result<()> {
        let runner = ScriptedRunner::new()
            .then(|_| Ok(CommandOutcome::Exited(1)))
            .then(produce(&["six-1.16.0-py2.py3-none-any.whl"], CommandOutcome::Exited(0)));
        let fixture = Fixture::new("broken==0.1\nsix==1.16.0\n", runner)?;
        let mut request = fixture.request();
        request.single = true;
        let outcome = fixture.run(&request)?;
        assert_eq!(outcome.status, CommandStatus::BuildFailures);
        assert_eq!(outcome.details["failed"][0], "broken==0.1");
        assert_eq!(fixture.wheels()?, vec!["six-1.16.0-py2.py3-none-any.whl"]);
        Ok(())
    }

    #[test]
    fn s3_remote_falls_back_to_environment() -> Result<()> {
        let runner = ScriptedRunner::new()
            .then(produce(&["six-1.16.0-py2.py3-none-any.whl"], CommandOutcome::Exited(0)));
        let fixture = Fixture::new("six==1.16.0\n", runner)?;
        let mut request = fixture.request();
        request.upload = Some(UploadTarget {
            backend: UploadBackend::S3,
            remote: None,
        });
        fixture.run(&request)?;
        let calls = fixture.effects.runner.calls();
        assert_eq!(calls[1].program, PathBuf::from("s3pypi"));
        assert!(calls[1].args.ends_with(&[
            "--bucket".to_string(),
            "wheels".to_string(),
            "--s3-endpoint-url".to_string(),
            "https://s3.example.com".to_string(),
        ]));
        Ok(())
    }

    #[test]
    fn unreachable_index_is_fatal() -> Result<()> {
        let fixture = Fixture::new("six==1.16.0\n", ScriptedRunner::new())?;
        let mut request = fixture.request();
        request.index = "https://elsewhere.example.org".into();
        let err = fixture.run(&request).unwrap_err();
        assert!(err.downcast_ref::<crate::index::IndexFetchError>().is_some());
        assert!(fixture.effects.runner.calls().is_empty());
        Ok(())
    }
}
