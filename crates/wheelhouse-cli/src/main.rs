use std::sync::Arc;

use atty::Stream;
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use wheelhouse_core::{
    format_status_message, to_json_response, CommandContext, CommandInfo, Config,
    ExecutionOutcome, SharedEffects, SystemEffects,
};

mod cli;
mod dispatch;
mod style;

use cli::WheelhouseCli;
use dispatch::dispatch_command;
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = WheelhouseCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let config = Config::from_env().map_err(|err| eyre!("{err:?}"))?;
    let effects: SharedEffects =
        Arc::new(SystemEffects::new(&config).map_err(|err| eyre!("{err:?}"))?);
    let ctx = CommandContext::new(config, effects);

    let (info, outcome) = dispatch_command(&ctx, &cli.command)?;
    let code = emit_output(&cli, info, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("wheelhouse_core={level},wheelhouse_domain={level},wheelhouse={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(cli: &WheelhouseCli, info: CommandInfo, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.status.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = to_json_response(info, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !cli.quiet {
        let message = format_status_message(info, &outcome.message);
        println!("{}", style.status(outcome.status, &message));
        for line in detail_lines(&outcome.details) {
            println!("{}", style.item(&line));
        }
        if let Some(hint) = hint_from_details(&outcome.details) {
            println!("{}", style.info(&format!("Hint: {hint}")));
        }
    }

    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

/// Per-package lines worth showing after the status line.
fn detail_lines(details: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(map) = details.as_object() else {
        return lines;
    };
    for (key, label) in [("failed", "failed"), ("pruned", "pruned"), ("removed", "removed")] {
        if let Some(items) = map.get(key).and_then(Value::as_array) {
            lines.extend(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|item| format!("{label} {item}")),
            );
        }
    }
    if let Some(rejected) = map.get("rejected").and_then(Value::as_object) {
        lines.extend(rejected.iter().map(|(name, version)| {
            format!("rejected {name}=={}", version.as_str().unwrap_or_default())
        }));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_lines_cover_package_lists() {
        let details = json!({
            "failed": ["broken==0.1"],
            "rejected": {"grpcio": "1.43.0"},
            "pruned": ["aiohttp-3.7.4-cp310-cp310-musllinux_1_2_x86_64.whl"],
            "artifacts": [],
        });
        assert_eq!(
            detail_lines(&details),
            vec![
                "failed broken==0.1",
                "pruned aiohttp-3.7.4-cp310-cp310-musllinux_1_2_x86_64.whl",
                "rejected grpcio==1.43.0",
            ]
        );
        assert!(detail_lines(&Value::Null).is_empty());
    }
}
