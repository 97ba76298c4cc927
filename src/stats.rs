use std::time::{Duration, Instant};

use crate::runner::{Event, EventKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub elapsed: Duration,
    pub tokens: u64,
    pub tool_calls: u64,
}

impl UsageSnapshot {
    pub fn summary(&self) -> String {
        let secs = self.elapsed.as_secs();
        format!(
            "{}m{:02}s · {} tokens · {} tools",
            secs / 60,
            secs % 60,
            self.tokens,
            self.tool_calls
        )
    }
}

pub trait StatsCollector: Send {
    fn record(&mut self, event: &Event);
    fn snapshot(&self) -> UsageSnapshot;
}

#[derive(Debug, Clone)]
pub struct UsageStats {
    started: Instant,
    tokens: u64,
    tool_calls: u64,
}

impl UsageStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            tokens: 0,
            tool_calls: 0,
        }
    }
}

impl Default for UsageStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector for UsageStats {
    fn record(&mut self, event: &Event) {
        if event.kind == EventKind::Assistant {
            self.tool_calls += event.tool_uses.len() as u64;
        }
        if let Some(tokens) = event.tokens {
            self.tokens = self.tokens.saturating_add(tokens);
        }
    }

    fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            elapsed: self.started.elapsed(),
            tokens: self.tokens,
            tool_calls: self.tool_calls,
        }
    }
}
