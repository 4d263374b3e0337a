use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use wheelhouse_core::UploadBackend;

pub const WHEELHOUSE_BEFORE_HELP: &str = concat!(
    "wheelhouse ",
    env!("CARGO_PKG_VERSION"),
    " – incremental musllinux wheel builds\n\n",
    "\x1b[1;36mPipeline\x1b[0m\n",
    "  build            Build missing wheels, validate, prune, and upload them.\n\n",
    "\x1b[1;36mSteps\x1b[0m\n",
    "  plan             Show which packages would be forced to build from source.\n",
    "  validate         Delete wheels the build host cannot install.\n",
    "  prune            Delete local wheels the remote index already has.\n",
    "  filter           Drop requirements that cannot build on an architecture.\n",
    "  host             Print the detected build host.\n",
);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = WHEELHOUSE_BEFORE_HELP
)]
#[allow(clippy::struct_excessive_bools)]
pub struct WheelhouseCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(about = "Build wheels missing from the index, then validate, prune, and upload.")]
    Build(BuildArgs),
    #[command(about = "Resolve the --no-binary selector pip would receive.")]
    Plan(PlanArgs),
    #[command(about = "Delete wheels in a directory that the build host cannot install.")]
    Validate(ValidateArgs),
    #[command(about = "Delete local wheels whose pinned version the index already publishes.")]
    Prune(PruneArgs),
    #[command(about = "Rewrite a requirement file without packages unsupported on an arch.")]
    Filter(FilterArgs),
    #[command(about = "Print the build host derived from ARCH, ABI, and the Alpine release.")]
    Host,
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    #[arg(long, env = "WHEELS_INDEX", help = "Base URL of the remote wheel repository")]
    pub index: String,
}

#[derive(Args, Debug, Clone)]
pub struct RequirementArgs {
    #[arg(long, help = "Requirement file listing the packages to build")]
    pub requirement: PathBuf,
    #[arg(long, help = "Only build specs missing from this earlier requirement file")]
    pub requirement_diff: Option<PathBuf>,
    #[arg(long, help = "Constraint file passed through to pip")]
    pub constraint: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub index: IndexArgs,
    #[command(flatten)]
    pub requirements: RequirementArgs,
    #[arg(
        long,
        default_value = ":none:",
        help = "Comma separated packages to build from source when their pin is not indexed"
    )]
    pub skip_binary: String,
    #[arg(
        long,
        default_value = "",
        help = "Comma separated packages whose local wheels are dropped when already indexed"
    )]
    pub skip_exists: String,
    #[arg(long, help = "Build each package in its own pip call")]
    pub single: bool,
    #[arg(long, value_name = "MINUTES", help = "Abort pip after this many minutes")]
    pub timeout: Option<u64>,
    #[arg(long, value_enum, default_value_t = UploadArg::Rsync)]
    pub upload: UploadArg,
    #[arg(long, help = "Upload destination (rsync target or S3 endpoint/bucket)")]
    pub remote: Option<String>,
    #[arg(long, default_value = "wheels", help = "Directory receiving built wheels")]
    pub output: PathBuf,
    #[arg(long, help = "Keep wheels locally instead of uploading them")]
    pub no_upload: bool,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub index: IndexArgs,
    #[command(flatten)]
    pub requirements: RequirementArgs,
    #[arg(long, default_value = ":none:")]
    pub skip_binary: String,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(help = "Directory of built wheels")]
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct PruneArgs {
    #[command(flatten)]
    pub index: IndexArgs,
    #[arg(long, help = "Requirement file providing the pinned versions")]
    pub requirement: PathBuf,
    #[arg(long, help = "Comma separated packages eligible for removal")]
    pub skip_exists: String,
    #[arg(help = "Directory of built wheels")]
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    #[arg(help = "Requirement file rewritten in place")]
    pub requirement: PathBuf,
    #[arg(long, help = "Build architecture (defaults to ARCH)")]
    pub arch: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadArg {
    Rsync,
    S3,
}

impl From<UploadArg> for UploadBackend {
    fn from(arg: UploadArg) -> Self {
        match arg {
            UploadArg::Rsync => Self::Rsync,
            UploadArg::S3 => Self::S3,
        }
    }
}
