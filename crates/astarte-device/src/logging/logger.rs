// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global logger state.
//!
//! The logger is configured once and immutable afterwards, so the hot path
//! is a single `OnceLock` load plus a level comparison; no lock is taken
//! and nothing is formatted for records the filter rejects. Output
//! backends serialize their own writes.

use super::output::{LogLevel, Output};
use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};

static LOGGER: OnceLock<GlobalLogger> = OnceLock::new();

struct GlobalLogger {
    output: Arc<dyn Output>,
    level: LogLevel,
}

/// Initialize the global logger with an output backend and the minimum
/// level to emit.
///
/// Call early in application startup; the first call wins and later calls
/// are ignored, so libraries and binaries can both attempt it safely.
pub fn init_logger(output: Arc<dyn Output>, level: LogLevel) {
    let _ = LOGGER.set(GlobalLogger { output, level });
}

/// Emit one record through the global logger.
///
/// Called by the logging macros with the caller's `format_args!`; the
/// message is rendered only when the level passes the filter. A no-op
/// before initialization, and backend I/O errors are swallowed - logging
/// never disturbs the device.
#[inline]
pub(crate) fn log_message(level: LogLevel, message: fmt::Arguments<'_>) {
    if let Some(logger) = LOGGER.get() {
        if level >= logger.level {
            let _ = logger.output.write(level, message);
        }
    }
}

/// Emit a function entry marker, used by the `trace_fn!()` macro.
#[cfg(feature = "trace")]
#[inline]
pub(crate) fn trace_entry(fn_name: &str) {
    log_message(LogLevel::Debug, format_args!("[ENTER:FNC] {}", fn_name));
}

/// Flush the active output. Safe to call before initialization.
pub fn flush_logger() -> io::Result<()> {
    match LOGGER.get() {
        Some(logger) => logger.output.flush(),
        None => Ok(()),
    }
}
