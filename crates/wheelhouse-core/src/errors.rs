use serde_json::{json, Value};
use wheelhouse_domain::{RequirementError, WheelFilenameError};

use crate::artifacts::CompatibilityViolation;
use crate::config::context::CommandInfo;
use crate::index::IndexFetchError;
use crate::outcome::ExecutionOutcome;

/// Turns the typed failures of a run into a structured outcome.
///
/// Returns `None` for errors with no dedicated reason; the caller reports
/// those as-is.
pub fn error_outcome(err: &anyhow::Error) -> Option<ExecutionOutcome> {
    for cause in err.chain() {
        if let Some(fetch) = cause.downcast_ref::<IndexFetchError>() {
            return Some(ExecutionOutcome::failure(
                fetch.to_string(),
                json!({
                    "reason": "index_fetch",
                    "url": fetch.url,
                    "error": fetch.reason,
                }),
            ));
        }
        if let Some(RequirementError::IncludeMissing { path, include }) =
            cause.downcast_ref::<RequirementError>()
        {
            return Some(ExecutionOutcome::failure(
                cause.to_string(),
                json!({
                    "reason": "include_missing",
                    "file": path.display().to_string(),
                    "include": include.display().to_string(),
                }),
            ));
        }
        if let Some(violation) = cause.downcast_ref::<CompatibilityViolation>() {
            let packages: serde_json::Map<String, Value> = violation
                .packages
                .iter()
                .map(|(name, version)| (name.to_string(), json!(version.to_string())))
                .collect();
            return Some(ExecutionOutcome::failure(
                violation.to_string(),
                json!({
                    "reason": "compatibility_violation",
                    "packages": packages,
                }),
            ));
        }
        if let Some(parse) = cause.downcast_ref::<WheelFilenameError>() {
            return Some(ExecutionOutcome::failure(
                format!("{err:#}"),
                json!({
                    "reason": "invalid_wheel_filename",
                    "error": parse.to_string(),
                }),
            ));
        }
    }
    None
}

#[must_use]
pub fn to_json_response(info: CommandInfo, outcome: &ExecutionOutcome) -> Value {
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": outcome.status.label(),
        "message": format_status_message(info, &outcome.message),
        "details": details,
    })
}

#[must_use]
pub fn format_status_message(info: CommandInfo, message: &str) -> String {
    let prefix = format!("wheelhouse {}", info.name);
    if message.is_empty() {
        prefix
    } else if message.starts_with(&prefix) {
        message.to_string()
    } else {
        format!("{prefix}: {message}")
    }
}
