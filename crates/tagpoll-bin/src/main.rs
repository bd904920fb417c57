// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! tagpoll - OPC UA tag discovery and polling.

use anyhow::Context;

use tagpoll_bin::error::report_error_and_exit;
use tagpoll_bin::{commands, init_logging, BinError, Cli};

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.effective_log_level(), cli.log_format);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
    {
        Ok(runtime) => runtime,
        Err(e) => report_error_and_exit(BinError::init(format!("{:#}", e))),
    };

    if let Err(e) = runtime.block_on(commands::execute(cli)) {
        if e.exit_code() == 0 {
            return;
        }
        report_error_and_exit(e);
    }
}
