// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tagpoll-bin
//!
//! CLI binary for the tagpoll OPC UA connector.
//!
//! - CLI argument parsing with clap
//! - Poll runtime with reconnect on session loss
//! - Graceful shutdown on SIGTERM/SIGINT
//! - Logging initialization
//! - Command implementations (run, validate, browse, version)
//!
//! ## Architecture
//!
//! ```text
//!        main.rs ──▶ cli.rs ──▶ commands
//!                                  │
//!                    ┌─────────────┼─────────────┐
//!                    ▼             ▼             ▼
//!                runtime       shutdown       logging
//!                    │
//!                    ▼
//!             tagpoll-opcua ◀── tagpoll-config
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Poll with the default config file (tagpoll.yaml)
//! tagpoll
//!
//! # Poll with a custom config, text lines, stop after 10 batches
//! tagpoll -c /etc/tagpoll/line1.yaml run -f text --max-batches 10
//!
//! # Write the discovered tag table
//! tagpoll browse -o tags.csv
//!
//! # Validate configuration
//! tagpoll validate --strict
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::PollRuntime;
pub use shutdown::ShutdownCoordinator;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
