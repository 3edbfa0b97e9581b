// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging output backends (console and file).
//!
//! Backends receive pre-filtered records as [`fmt::Arguments`], so a
//! message is only ever formatted once, directly into the output stream.
//! Level filtering is the logger's job; backends just render.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Mutex;

/// Log severity, ordered from chattiest to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Detailed development information.
    Debug = 0,
    /// Normal operation.
    Info = 1,
    /// Potentially harmful situations.
    Warning = 2,
    /// Error conditions.
    Error = 3,
}

impl LogLevel {
    /// Short lowercase label used as the line prefix.
    pub fn label(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" | "dbg" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" | "err" => Ok(Self::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Output destination for log records.
///
/// Implementations must be thread-safe; records arrive already filtered.
pub trait Output: Send + Sync {
    /// Render one record.
    fn write(&self, level: LogLevel, message: fmt::Arguments<'_>) -> io::Result<()>;

    /// Flush any buffered output.
    fn flush(&self) -> io::Result<()>;
}

/// Console output, one `[level] message` line on stderr per record.
///
/// Stateless: stderr is line-locked per write, so interleaving between
/// threads stays at line granularity.
#[derive(Default)]
pub struct ConsoleOutput;

impl ConsoleOutput {
    /// Console backend.
    pub fn new() -> Self {
        Self
    }
}

impl Output for ConsoleOutput {
    fn write(&self, level: LogLevel, message: fmt::Arguments<'_>) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "[{:<5}] {}", level, message)
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// File output, appending `[level] message` lines.
///
/// The file is opened once and kept behind a mutex; existing content is
/// preserved so restarts extend the same log.
pub struct FileOutput {
    file: Mutex<std::fs::File>,
}

impl FileOutput {
    /// File backend appending to `path`, creating the file if needed.
    pub fn new(path: &str) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl Output for FileOutput {
    fn write(&self, level: LogLevel, message: fmt::Arguments<'_>) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("file output mutex poisoned"))?;
        writeln!(file, "[{:<5}] {}", level, message)
    }

    fn flush(&self) -> io::Result<()> {
        self.file
            .lock()
            .map_err(|_| io::Error::other("file output mutex poisoned"))?
            .flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering_and_labels() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);

        assert_eq!(LogLevel::Warning.label(), "warn");
        assert_eq!(format!("{:<5}", LogLevel::Info), "info ");
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("err".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_console_output_writes() {
        let output = ConsoleOutput::new();
        assert!(output
            .write(LogLevel::Error, format_args!("console test"))
            .is_ok());
        assert!(output.flush().is_ok());
    }

    #[test]
    fn test_file_output_appends_across_instances() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("astarte.log");
        let path_str = path.to_str().expect("temp path should be valid UTF-8");

        {
            let output = FileOutput::new(path_str).expect("file output created");
            output
                .write(LogLevel::Info, format_args!("first {}", 1))
                .expect("write should succeed");
            output.flush().expect("flush should succeed");
        }
        {
            // A second instance extends the same file instead of
            // truncating it.
            let output = FileOutput::new(path_str).expect("file output reopened");
            output
                .write(LogLevel::Warning, format_args!("second"))
                .expect("write should succeed");
            output.flush().expect("flush should succeed");
        }

        let contents = std::fs::read_to_string(&path).expect("log file should be readable");
        assert_eq!(contents, "[info ] first 1\n[warn ] second\n");
    }
}
