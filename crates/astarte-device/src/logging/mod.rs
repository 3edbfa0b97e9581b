// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compile-time configurable logging system.
//!
//! Four severity levels are available through the `debug!()`, `info!()`,
//! `warn!()` and `error!()` macros. The macros hand the caller's
//! `format_args!` straight to the global logger, so nothing is formatted
//! unless the record passes the level filter; with the `logging` cargo
//! feature disabled every macro expands to a no-op and release firmware
//! images carry no logging code at all.
//!
//! ## Example
//!
//! ```ignore
//! use astarte_device::logging::{init_logger, ConsoleOutput, LogLevel};
//! use std::sync::Arc;
//!
//! init_logger(Arc::new(ConsoleOutput::new()), LogLevel::Debug);
//!
//! info!("device {} connected", device_id);
//! warn!("introspection is {} bytes", size);
//! ```

#[cfg(feature = "logging")]
pub mod logger;
#[cfg(feature = "logging")]
mod output;

#[cfg(feature = "logging")]
pub use output::{ConsoleOutput, FileOutput, LogLevel, Output};

#[cfg(feature = "logging")]
pub use logger::{flush_logger, init_logger};

/// Debug-level log record, `println!()`-style arguments.
///
/// Emitted only when compiled with the `logging` feature and the global
/// level filter admits `Debug`.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Debug,
            format_args!($($arg)*),
        )
    };
}

/// Info-level log record, `println!()`-style arguments.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Info,
            format_args!($($arg)*),
        )
    };
}

/// Warning-level log record, `println!()`-style arguments.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Warning,
            format_args!($($arg)*),
        )
    };
}

/// Error-level log record, `println!()`-style arguments.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Error,
            format_args!($($arg)*),
        )
    };
}

/// Function entry trace marker, active with both `logging` and `trace`.
#[macro_export]
#[cfg(all(feature = "logging", feature = "trace"))]
macro_rules! trace_fn {
    ($fn_name:expr) => {
        $crate::logging::logger::trace_entry($fn_name)
    };
}

/// No-op trace macro (when the `trace` feature is disabled).
#[macro_export]
#[cfg(not(all(feature = "logging", feature = "trace")))]
macro_rules! trace_fn {
    ($fn_name:expr) => {};
}

/// No-op debug macro (when the `logging` feature is disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

/// No-op info macro (when the `logging` feature is disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}

/// No-op warn macro (when the `logging` feature is disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

/// No-op error macro (when the `logging` feature is disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}

#[cfg(all(test, feature = "logging"))]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_macros_compile_in_statement_and_expression_position() {
        debug!("debug message");
        info!("with args: {}", 42);
        warn!("with format: {:?}", vec![1, 2, 3]);

        // The macros are plain unit expressions, so they fit match arms.
        let logged = match 1 + 1 {
            2 => error!("expression position"),
            _ => {}
        };
        logged
    }

    #[test]
    fn test_init_and_log() {
        init_logger(Arc::new(ConsoleOutput::new()), LogLevel::Debug);

        debug!("test debug");
        info!("test info");
        warn!("test warning");
        error!("test error");

        assert!(flush_logger().is_ok());
    }
}
