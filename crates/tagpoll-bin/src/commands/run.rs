// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::runtime::{default_transport, PollRuntime};
use crate::shutdown::ShutdownCoordinator;

/// Executes the `run` command to poll tags until shutdown.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let config = tagpoll_config::load_config(&cli.config)?;
    config.validate()?;

    let mut runtime = PollRuntime::new(&config, default_transport()?)?
        .with_max_batches(args.max_batches);
    if let Some(format) = args.format {
        runtime = runtime.with_format(format);
    }

    let shutdown = ShutdownCoordinator::new();
    let cancel = shutdown.cancellation_token();

    let stdout = std::io::stdout();
    let batches = runtime.run(&mut stdout.lock(), &cancel).await?;

    let stats = runtime.driver().poll_loop().stats();
    info!(
        batches,
        readings = stats.readings(),
        skipped = stats.skipped(),
        failures = stats.failures(),
        "tagpoll stopped"
    );
    Ok(())
}
