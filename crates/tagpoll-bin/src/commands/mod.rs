// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `run`: Poll tags until shutdown
//! - `validate`: Validate configuration file
//! - `browse`: Print the tag table once
//! - `version`: Show version information

mod browse;
mod run;
mod validate;
mod version;

pub use browse::{browse, write_table};
pub use run::run;
pub use validate::{validate, validate_to};
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Browse(args) => browse::browse(&cli, args).await,
        Commands::Version => version::version(&cli),
    }
}
