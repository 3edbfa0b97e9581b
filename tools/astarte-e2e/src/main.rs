// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! astarte-e2e - end-to-end verification harness.
//!
//! Reads the command grammar on stdin (one command per line, see the
//! `command` module) and verifies live traffic against the queued
//! expectations. Exit code 0 means every command succeeded, every expected
//! message matched and nothing was left over; 1 means a parse/semantic
//! failure on the current command or a verification failure.

use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use astarte_device::logging::{init_logger, ConsoleOutput, LogLevel};
use astarte_device::uuid::Uuid;
use astarte_e2e::command::LineOutcome;
use astarte_e2e::idata::Idata;
use astarte_e2e::interfaces::test_interfaces;
use astarte_e2e::runner::Runner;

/// End-to-end verification harness for the Astarte device library
#[derive(Parser, Debug)]
#[command(name = "astarte-e2e")]
#[command(version, about)]
struct Args {
    /// Minimum device-library log level: debug, info, warn, error
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seconds to wait for the device to connect before giving up
    #[arg(long, default_value = "10")]
    connect_timeout: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.log_level.parse::<LogLevel>() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logger(Arc::new(ConsoleOutput::new()), level);

    let run_id = match Uuid::new_v4() {
        Ok(id) => id,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    eprintln!("[e2e] run {}", run_id.to_base64url());

    let interfaces = test_interfaces();
    let idata = Arc::new(Idata::new(&interfaces));
    let runner = match Runner::start(interfaces, Arc::clone(&idata)) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Hold the command stream until the device is fully connected.
    if !runner.wait_connected(Duration::from_secs(args.connect_timeout)) {
        eprintln!("error: device did not connect within {}s", args.connect_timeout);
        return ExitCode::FAILURE;
    }
    println!("ready");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("error: stdin read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match runner.handle_line(&line) {
            Ok(LineOutcome::Continue) => println!("ok"),
            Ok(LineOutcome::Disconnect) => {
                println!("ok");
                break;
            }
            Err(e) => {
                eprintln!("error: {}", e);
                runner.shutdown();
                return ExitCode::FAILURE;
            }
        }
    }

    if runner.shutdown() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
