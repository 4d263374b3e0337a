use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use tracing::info;

use crate::effects::{CommandRunner, Invocation};
use crate::process::CommandOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadBackend {
    Rsync,
    S3,
}

impl FromStr for UploadBackend {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "rsync" => Ok(Self::Rsync),
            "s3" => Ok(Self::S3),
            other => Err(anyhow!("unknown upload backend `{other}` (expected rsync or s3)")),
        }
    }
}

impl fmt::Display for UploadBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rsync => "rsync",
            Self::S3 => "s3",
        })
    }
}

/// Command publishing the wheels of one run.
///
/// `root` is the output tree (`{root}/{family}/*.whl`); rsync mirrors it as a
/// whole while s3 receives the individual `wheels`.
pub fn upload_invocation(
    backend: UploadBackend,
    root: &Path,
    wheels: &[PathBuf],
    remote: &str,
) -> Invocation {
    let remote = remote.trim_end_matches('/');
    match backend {
        UploadBackend::Rsync => Invocation::new(
            "rsync",
            vec![
                "--human-readable".into(),
                "--recursive".into(),
                "--progress".into(),
                "--checksum".into(),
                format!("{}/", root.display()),
                format!("{remote}/"),
            ],
        ),
        UploadBackend::S3 => {
            let mut args: Vec<String> = wheels
                .iter()
                .map(|wheel| wheel.display().to_string())
                .collect();
            let (endpoint, bucket) = match remote.rsplit_once('/') {
                Some((endpoint, bucket)) => (Some(endpoint), bucket),
                None => (None, remote),
            };
            args.push("--bucket".into());
            args.push(bucket.to_string());
            if let Some(endpoint) = endpoint {
                args.push("--s3-endpoint-url".into());
                args.push(endpoint.to_string());
            }
            Invocation::new("s3pypi", args)
        }
    }
}

/// Publishes `wheels`; does nothing when there are none.
///
/// Returns whether an upload ran.
///
/// # Errors
/// Returns an error if the upload tool cannot be started or exits non-zero.
pub fn run_upload(
    runner: &dyn CommandRunner,
    backend: UploadBackend,
    root: &Path,
    wheels: &[PathBuf],
    remote: &str,
) -> Result<bool> {
    if wheels.is_empty() {
        info!("no wheels to upload");
        return Ok(false);
    }
    info!(backend = %backend, remote, wheels = wheels.len(), "uploading wheels");
    let invocation = upload_invocation(backend, root, wheels, remote);
    match runner.run(&invocation)? {
        CommandOutcome::Exited(0) => Ok(true),
        CommandOutcome::Exited(code) => bail!("{backend} upload to {remote} exited with {code}"),
        CommandOutcome::TimedOut => bail!("{backend} upload to {remote} timed out"),
    }
}
