// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tagpoll_config::TagPollConfig;
use tagpoll_opcua::AuthMode;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let stdout = std::io::stdout();
    validate_to(&cli.config, &args, &mut stdout.lock())
}

/// Validates the file at `config_path` and writes the report to `out`.
pub fn validate_to<W: Write>(config_path: &Path, args: &ValidateArgs, out: &mut W) -> BinResult<()> {
    if !config_path.exists() {
        return Err(BinError::config(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = tagpoll_config::load_config(config_path)?;
    let connector = config.connector_config()?;
    let warnings = config.warnings();

    let summary = Summary {
        endpoint: &connector.endpoint,
        auth_mode: connector.auth_mode(),
        root_node_ids: connector.root_node_ids.iter().map(ToString::to_string).collect(),
        application_name: &connector.application_name,
        session_timeout_secs: connector.session_timeout.as_secs(),
        dedupe_visited: connector.dedupe_visited,
    };

    match args.format {
        OutputFormat::Text => write_text(out, config_path, &summary, &warnings, args, &config)?,
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": summary,
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let text = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(format!("Failed to encode report: {}", e)))?;
            writeln!(out, "{}", text)?;
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

#[derive(Serialize)]
struct Summary<'a> {
    endpoint: &'a str,
    auth_mode: AuthMode,
    root_node_ids: Vec<String>,
    application_name: &'a str,
    session_timeout_secs: u64,
    dedupe_visited: bool,
}

fn write_text<W: Write>(
    out: &mut W,
    config_path: &Path,
    summary: &Summary<'_>,
    warnings: &[String],
    args: &ValidateArgs,
    config: &TagPollConfig,
) -> BinResult<()> {
    writeln!(out, "✓ Configuration is valid: {}", config_path.display())?;
    writeln!(out)?;
    writeln!(out, "Summary:")?;
    writeln!(out, "  Endpoint: {}", summary.endpoint)?;
    writeln!(out, "  Auth: {:?}", summary.auth_mode)?;
    writeln!(out, "  Roots: {}", summary.root_node_ids.join(", "))?;
    writeln!(out, "  Application: {}", summary.application_name)?;
    writeln!(out, "  Session timeout: {}s", summary.session_timeout_secs)?;
    writeln!(
        out,
        "  Dedupe visited: {}",
        if summary.dedupe_visited { "enabled" } else { "disabled" }
    )?;

    if !warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "Warnings:")?;
        for warning in warnings {
            writeln!(out, "  ⚠ {}", warning)?;
        }
    }

    if args.show_config {
        // Secrets serialize redacted.
        let text = serde_json::to_string_pretty(config)
            .unwrap_or_else(|_| "(serialization error)".to_string());
        writeln!(out)?;
        writeln!(out, "Parsed configuration:")?;
        writeln!(out, "{}", text)?;
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
