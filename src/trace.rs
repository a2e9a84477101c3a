use std::collections::VecDeque;

use crate::{Error, Result};

/// Bounded trace buffer; when full, the oldest line is dropped.
#[derive(Debug, Clone)]
pub(crate) struct Trace {
    enabled: bool,
    sync: bool,
    dependency: bool,
    logs: VecDeque<String>,
    log_limit: usize,
    to_stderr: bool,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            enabled: false,
            sync: true,
            dependency: true,
            logs: VecDeque::new(),
            log_limit: 10_000,
            to_stderr: true,
        }
    }
}

impl Trace {
    pub(crate) fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_sync(&mut self, enabled: bool) {
        self.sync = enabled;
    }

    pub(crate) fn set_dependency(&mut self, enabled: bool) {
        self.dependency = enabled;
    }

    pub(crate) fn set_stderr(&mut self, enabled: bool) {
        self.to_stderr = enabled;
    }

    pub(crate) fn set_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Config(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.log_limit = max_entries;
        while self.logs.len() > self.log_limit {
            self.logs.pop_front();
        }
        Ok(())
    }

    pub(crate) fn take_logs(&mut self) -> Vec<String> {
        self.logs.drain(..).collect()
    }

    pub(crate) fn sync_line(&mut self, line: String) {
        if self.enabled && self.sync {
            self.line(line);
        }
    }

    pub(crate) fn dependency_line(&mut self, line: String) {
        if self.enabled && self.dependency {
            self.line(line);
        }
    }

    fn line(&mut self, line: String) {
        if self.to_stderr {
            eprintln!("{line}");
        }
        if self.logs.len() >= self.log_limit {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }
}
