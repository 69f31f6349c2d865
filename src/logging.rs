/*
 * Copyright 2026 The ramfs-core authors
 *
 * This file is part of ramfs-core.
 *
 * ramfs-core is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * ramfs-core is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * ramfs-core. If not, see <https://www.gnu.org/licenses/>.
 */

//! Retained diagnostic log, used by `GET_ALLOCATION_INFO`/`DUMP_INDEX` style
//! introspection and by allocator panic-mode warnings.
//!
//! A filesystem kernel component cannot assume a terminal or a file to write logs to,
//! so records are kept in a bounded ring buffer that the caller can drain. Records
//! are pushed through the ordinary [`log`] facade, so call sites just use
//! `log::warn!` etc., and installing [`RingLog`] as the global logger is optional.

use log::{Level, Log, Metadata, Record};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Maximum number of retained log lines.
const CAPACITY: usize = 4096;

/// One retained log line.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// A bounded ring buffer of log lines, installable as the global [`log`] sink.
#[derive(Debug, Default)]
pub struct RingLog {
    lines: Mutex<VecDeque<LogLine>>,
}

impl RingLog {
    pub const fn new() -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns a snapshot of the retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lines.lock().iter().cloned().collect()
    }

    /// Drops all retained lines.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl Log for RingLog {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let mut lines = self.lines.lock();
        if lines.len() >= CAPACITY {
            lines.pop_front();
        }
        lines.push_back(LogLine {
            level: record.level(),
            target: record.target().to_string(),
            message: format!("{}", record.args()),
        });
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_log_bounds_capacity() {
        let ring = RingLog::new();
        for i in 0..(CAPACITY + 10) {
            ring.log(
                &Record::builder()
                    .args(format_args!("line {i}"))
                    .level(Level::Info)
                    .target("test")
                    .build(),
            );
        }
        assert_eq!(ring.snapshot().len(), CAPACITY);
        assert_eq!(ring.snapshot().first().unwrap().message, "line 10");
    }
}
