use std::time::Duration;

use color_eyre::Result;
use serde_json::json;
use wheelhouse_core::commands;
use wheelhouse_core::{
    error_outcome, run_build, BuildRequest, CommandContext, CommandInfo, ExecutionOutcome,
    FilterRequest, PlanRequest, PruneRequest, UploadTarget,
};

use crate::cli::{BuildArgs, CommandGroupCli, PlanArgs};

pub fn dispatch_command(
    ctx: &CommandContext,
    group: &CommandGroupCli,
) -> Result<(CommandInfo, ExecutionOutcome)> {
    match group {
        CommandGroupCli::Build(args) => {
            let info = CommandInfo::new("build");
            let request = build_request_from_args(args);
            core_call(info, || run_build(ctx, &request))
        }
        CommandGroupCli::Plan(args) => {
            let info = CommandInfo::new("plan");
            let request = plan_request_from_args(args);
            core_call(info, || commands::plan(ctx, &request))
        }
        CommandGroupCli::Validate(args) => {
            let info = CommandInfo::new("validate");
            core_call(info, || commands::validate(ctx, &args.dir))
        }
        CommandGroupCli::Prune(args) => {
            let info = CommandInfo::new("prune");
            let request = PruneRequest {
                index: args.index.index.clone(),
                requirement: args.requirement.clone(),
                skip_exists: args.skip_exists.clone(),
                dir: args.dir.clone(),
            };
            core_call(info, || commands::prune(ctx, &request))
        }
        CommandGroupCli::Filter(args) => {
            let info = CommandInfo::new("filter");
            let request = FilterRequest {
                requirement: args.requirement.clone(),
                arch: args.arch.clone(),
            };
            core_call(info, || commands::filter(ctx, &request))
        }
        CommandGroupCli::Host => {
            let info = CommandInfo::new("host");
            core_call(info, || commands::host(ctx))
        }
    }
}

fn build_request_from_args(args: &BuildArgs) -> BuildRequest {
    BuildRequest {
        index: args.index.index.clone(),
        requirement: args.requirements.requirement.clone(),
        requirement_diff: args.requirements.requirement_diff.clone(),
        constraint: args.requirements.constraint.clone(),
        skip_binary: args.skip_binary.clone(),
        skip_exists: args.skip_exists.clone(),
        single: args.single,
        timeout: args
            .timeout
            .map(|minutes| Duration::from_secs(minutes.saturating_mul(60))),
        output: args.output.clone(),
        upload: (!args.no_upload).then(|| UploadTarget {
            backend: args.upload.into(),
            remote: args.remote.clone(),
        }),
    }
}

fn plan_request_from_args(args: &PlanArgs) -> PlanRequest {
    PlanRequest {
        index: args.index.index.clone(),
        requirement: args.requirements.requirement.clone(),
        requirement_diff: args.requirements.requirement_diff.clone(),
        constraint: args.requirements.constraint.clone(),
        skip_binary: args.skip_binary.clone(),
    }
}

fn core_call<F>(info: CommandInfo, action: F) -> Result<(CommandInfo, ExecutionOutcome)>
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    match action() {
        Ok(outcome) => Ok((info, outcome)),
        Err(err) => {
            if let Some(outcome) = error_outcome(&err) {
                return Ok((info, outcome));
            }
            tracing::debug!(error = ?err, command = info.name, "command failed");
            let issues: Vec<String> = err.chain().map(ToString::to_string).collect();
            Ok((
                info,
                ExecutionOutcome::failure(
                    err.to_string(),
                    json!({
                        "reason": "internal_error",
                        "error": err.to_string(),
                        "issues": issues,
                        "hint": "Re-run with `-v` or `--trace` for more detail.",
                    }),
                ),
            ))
        }
    }
}
