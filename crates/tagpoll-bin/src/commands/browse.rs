// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `browse` command.

use std::fs::File;
use std::io::{BufWriter, Write};

use tagpoll_opcua::{TagDefinition, TagPollDriver};
use tracing::info;

use crate::cli::{BrowseArgs, Cli, TableFormat};
use crate::error::{BinError, BinResult};
use crate::runtime::{browse_once, default_transport, write_csv};
use crate::shutdown::ShutdownCoordinator;

/// Executes the `browse` command: connect, print the tag table, disconnect.
pub async fn browse(cli: &Cli, args: BrowseArgs) -> BinResult<()> {
    let config = tagpoll_config::load_config(&cli.config)?;
    config.validate()?;

    let driver = TagPollDriver::new(config.connector_config()?, default_transport()?);
    let cancel = ShutdownCoordinator::new().cancellation_token();
    let tags = browse_once(&driver, &cancel).await?;

    match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                BinError::io(format!("Failed to create {}: {}", path.display(), e))
            })?;
            write_table(&mut BufWriter::new(file), &tags, args.format)?;
            info!(path = %path.display(), tags = tags.len(), "Tag table written");
        }
        None => {
            let stdout = std::io::stdout();
            write_table(&mut stdout.lock(), &tags, args.format)?;
        }
    }
    Ok(())
}

/// Writes the tag table in `format`.
pub fn write_table<W: Write>(out: &mut W, tags: &[TagDefinition], format: TableFormat) -> BinResult<()> {
    match format {
        TableFormat::Csv => write_csv(out, tags),
        TableFormat::Json => {
            let text = serde_json::to_string_pretty(tags)
                .map_err(|e| BinError::runtime(format!("Failed to encode tags: {}", e)))?;
            writeln!(out, "{}", text)?;
            out.flush()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table() {
        let mut out = Vec::new();
        write_table(&mut out, &[], TableFormat::Json).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "[]");

        let mut out = Vec::new();
        write_table(&mut out, &[], TableFormat::Csv).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }
}
