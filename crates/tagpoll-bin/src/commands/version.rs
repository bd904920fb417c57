// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("tagpoll - OPC UA tag discovery and polling");
    println!();
    println!("Version Information:");
    println!("  tagpoll-bin:    {}", crate::VERSION);
    println!("  tagpoll-opcua:  {}", tagpoll_opcua::VERSION);
    println!("  tagpoll-config: {}", tagpoll_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Rust Edition: 2024");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Features:");
    println!(
        "  Transport:    {}",
        if cfg!(feature = "real-transport") { "opcua" } else { "none" }
    );
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
