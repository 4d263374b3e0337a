use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::effects::{CommandRunner, Invocation};
use crate::process::CommandOutcome;

const PIP: &str = "pip3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildTarget {
    Requirement(PathBuf),
    Package(String),
}

/// Options shared by every `pip wheel` call of one run.
#[derive(Debug, Clone)]
pub struct WheelOptions {
    pub index_url: String,
    pub output: PathBuf,
    /// Rendered `--no-binary` selector.
    pub skip_binary: String,
    pub constraint: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status", content = "code")]
pub enum BuildStatus {
    Built,
    Failed(i32),
    TimedOut,
}

impl From<CommandOutcome> for BuildStatus {
    fn from(outcome: CommandOutcome) -> Self {
        match outcome {
            CommandOutcome::Exited(0) => Self::Built,
            CommandOutcome::Exited(code) => Self::Failed(code),
            CommandOutcome::TimedOut => Self::TimedOut,
        }
    }
}

pub fn pip_wheel_invocation(
    target: &BuildTarget,
    options: &WheelOptions,
    timeout: Option<Duration>,
) -> Invocation {
    let mut args = vec![
        "wheel".to_string(),
        "--no-clean".to_string(),
        "--no-binary".to_string(),
        options.skip_binary.clone(),
        "--wheel-dir".to_string(),
        options.output.display().to_string(),
        "--extra-index-url".to_string(),
        options.index_url.clone(),
    ];
    if let Some(constraint) = &options.constraint {
        args.push("--constraint".to_string());
        args.push(constraint.display().to_string());
    }
    match target {
        BuildTarget::Requirement(path) => {
            args.push("--requirement".to_string());
            args.push(path.display().to_string());
        }
        BuildTarget::Package(spec) => args.push(spec.clone()),
    }
    Invocation::new(PIP, args)
        .env("MAKEFLAGS", format!("-j{}", build_jobs()))
        .timeout(timeout)
}

fn build_jobs() -> usize {
    thread::available_parallelism().map_or(4, usize::from)
}

/// Builds every spec of a requirement file in one `pip wheel` call.
///
/// # Errors
/// Returns an error if pip cannot be started.
pub fn build_requirement(
    runner: &dyn CommandRunner,
    requirement: PathBuf,
    options: &WheelOptions,
    timeout: Option<Duration>,
) -> Result<BuildStatus> {
    let invocation = pip_wheel_invocation(&BuildTarget::Requirement(requirement), options, timeout);
    let status = BuildStatus::from(runner.run(&invocation)?);
    if status != BuildStatus::Built {
        warn!(?status, "requirement build did not complete");
    }
    Ok(status)
}

/// Builds `specs` one at a time against a shared deadline.
///
/// A failed package does not stop the rest. Once the deadline passes, the
/// running build is killed and the remaining specs are not attempted.
///
/// # Errors
/// Returns an error if pip cannot be started.
pub fn build_packages(
    runner: &dyn CommandRunner,
    specs: &[String],
    options: &WheelOptions,
    timeout: Option<Duration>,
) -> Result<Vec<(String, BuildStatus)>> {
    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    let mut results = Vec::with_capacity(specs.len());
    for spec in specs {
        let remaining = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => Some(left),
                _ => {
                    warn!(package = spec.as_str(), "build deadline reached; skipping");
                    results.push((spec.clone(), BuildStatus::TimedOut));
                    break;
                }
            },
            None => None,
        };
        info!(package = spec.as_str(), "building wheel");
        let invocation =
            pip_wheel_invocation(&BuildTarget::Package(spec.clone()), options, remaining);
        let status = BuildStatus::from(runner.run(&invocation)?);
        match status {
            BuildStatus::Built => {}
            BuildStatus::Failed(code) => {
                warn!(package = spec.as_str(), code, "failed to build wheel");
            }
            BuildStatus::TimedOut => {
                results.push((spec.clone(), status));
                break;
            }
        }
        results.push((spec.clone(), status));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::ScriptedRunner;

    fn options() -> WheelOptions {
        WheelOptions {
            index_url: "https://wheels.example.org/musllinux-index/".into(),
            output: PathBuf::from("/tmp/wheels"),
            skip_binary: ":none:".into(),
            constraint: None,
        }
    }

    #[test]
    fn requirement_invocation_matches_pip_cli() {
        let mut options = options();
        options.constraint = Some(PathBuf::from("/src/constraints.txt"));
        options.skip_binary = "aiohttp,grpcio".into();
        let invocation = pip_wheel_invocation(
            &BuildTarget::Requirement(PathBuf::from("/src/requirements.txt")),
            &options,
            Some(Duration::from_secs(60)),
        );
        assert_eq!(invocation.program, PathBuf::from("pip3"));
        assert_eq!(
            invocation.args,
            vec![
                "wheel",
                "--no-clean",
                "--no-binary",
                "aiohttp,grpcio",
                "--wheel-dir",
                "/tmp/wheels",
                "--extra-index-url",
                "https://wheels.example.org/musllinux-index/",
                "--constraint",
                "/src/constraints.txt",
                "--requirement",
                "/src/requirements.txt",
            ]
        );
        assert_eq!(invocation.timeout, Some(Duration::from_secs(60)));
        assert!(invocation
            .envs
            .iter()
            .any(|(key, value)| key == "MAKEFLAGS" && value.starts_with("-j")));
    }

    #[test]
    fn package_invocation_ends_with_spec() {
        let invocation =
            pip_wheel_invocation(&BuildTarget::Package("aiohttp==3.7.4".into()), &options(), None);
        assert_eq!(invocation.args.last().map(String::as_str), Some("aiohttp==3.7.4"));
        assert!(!invocation.args.iter().any(|arg| arg == "--constraint"));
    }

    #[test]
    fn single_mode_continues_after_failure() -> Result<()> {
        let runner = ScriptedRunner::new()
            .then(|_| Ok(CommandOutcome::Exited(1)))
            .then(|_| Ok(CommandOutcome::Exited(0)));
        let specs = vec!["broken==1.0".to_string(), "six==1.16.0".to_string()];
        let results = build_packages(&runner, &specs, &options(), None)?;
        assert_eq!(
            results,
            vec![
                ("broken==1.0".to_string(), BuildStatus::Failed(1)),
                ("six==1.16.0".to_string(), BuildStatus::Built),
            ]
        );
        assert_eq!(runner.calls().len(), 2);
        Ok(())
    }

    #[test]
    fn single_mode_stops_on_timeout() -> Result<()> {
        let runner = ScriptedRunner::new().then(|_| Ok(CommandOutcome::TimedOut));
        let specs = vec!["slow==1.0".to_string(), "six==1.16.0".to_string()];
        let results = build_packages(&runner, &specs, &options(), Some(Duration::from_secs(30)))?;
        assert_eq!(results, vec![("slow==1.0".to_string(), BuildStatus::TimedOut)]);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].timeout.is_some_and(|left| left <= Duration::from_secs(30)));
        Ok(())
    }
}
