// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.
//!
//! Logs go to stderr; stdout carries readings and command output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::LogFormat;

/// Directives appended to every filter. The protocol stack is chatty at info.
const QUIET_DEPENDENCIES: &str = "opcua=warn";

// =============================================================================
// Logging Initialization
// =============================================================================

/// Initializes the logging subsystem.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Example
///
/// ```ignore
/// use tagpoll_bin::cli::LogFormat;
/// use tagpoll_bin::logging::init_logging;
///
/// init_logging("info", LogFormat::Text);
/// ```
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = build_filter(level);

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_ansi(stderr_is_terminal()),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(stderr_is_terminal()),
            )
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{},{}", level, QUIET_DEPENDENCIES)))
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{}", QUIET_DEPENDENCIES)))
}

fn stderr_is_terminal() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_levels() {
        for level in ["trace", "debug", "info", "warn", "error", "tagpoll_opcua=trace"] {
            let filter = build_filter(level).to_string();
            assert!(filter.contains("opcua=warn"), "{}", filter);
        }
    }
}
