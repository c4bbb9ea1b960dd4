// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! edgectl command-line entry point.

use std::process::ExitCode;

use clap::Parser;
use edgectl::{Cli, logging};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.root.verbose);

    let mut stdin = std::io::stdin().lock();
    let mut stdout = std::io::stdout().lock();
    match edgectl::run(cli, &mut stdin, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
