// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A small logging backend for the `log` facade: timestamped lines with a
//! crate label. Errors and warnings go to stderr; everything else goes to
//! stdout, keeping the operator-facing contract strings uncluttered.

use chrono::prelude::*;

pub use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

/// Log at error level, then terminate the process with a non-zero exit.
#[macro_export]
macro_rules! fatal {
    () => (
        error!();
        std::process::exit(1);
        );
    ($fmt:expr) => (
        error!($fmt);
        std::process::exit(1);
        );
    ($fmt:expr, $($arg:tt)*) => (
        error!($fmt, $($arg)*);
        std::process::exit(1);
        );
}

pub struct Logger {
    label: Option<&'static str>,
    level: Level,
}

impl Logger {
    pub fn new() -> Self {
        Logger {
            label: None,
            level: Level::Info,
        }
    }

    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn init(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self)).map(|()| log::set_max_level(level.to_level_filter()))
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let target = if let Some(label) = self.label {
            match log::max_level() {
                // include the module path when debugging
                LevelFilter::Debug | LevelFilter::Trace => {
                    format!("{}::{}", label, record.target())
                }
                _ => label.to_string(),
            }
        } else {
            record.target().to_string()
        };

        let line = format!(
            "{} {:<5} [{}] {}",
            Utc::now(),
            record.level(),
            target,
            record.args()
        );

        if record.level() <= Level::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    fn flush(&self) {}
}
