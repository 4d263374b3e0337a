#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

//! Build orchestration around the wheel model: host detection, the remote
//! index, `pip wheel`, output validation, pruning, and upload.

pub mod artifacts;
pub mod build;
pub mod commands;
pub mod config;
pub mod effects;
pub mod errors;
pub mod host;
pub mod index;
pub mod outcome;
pub mod process;
pub mod upload;

pub use artifacts::{ArtifactSummary, CompatibilityViolation};
pub use build::{run_build, BuildRequest, BuildStatus, UploadTarget};
pub use commands::{FilterRequest, PlanRequest, PruneRequest};
pub use config::context::{CommandContext, CommandInfo};
pub use config::Config;
pub use effects::{SharedEffects, SystemEffects};
pub use errors::{error_outcome, format_status_message, to_json_response};
pub use host::detect_host;
pub use index::IndexFetchError;
pub use outcome::{CommandStatus, ExecutionOutcome};
pub use upload::UploadBackend;
