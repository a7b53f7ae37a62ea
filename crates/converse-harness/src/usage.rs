use std::ops::AddAssign;

/// Cumulative token counts as reported by a provider at some point of a
/// response. Providers resend totals, not deltas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UsageReport {
    /// Prompt tokens including cache reads.
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
}

/// Token usage of one or more model responses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Usage {
    /// Prompt tokens net of `cache_read_tokens`.
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens = self.input_tokens.saturating_add(rhs.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(rhs.output_tokens);
        self.cache_read_tokens = self.cache_read_tokens.saturating_add(rhs.cache_read_tokens);
        self.cache_write_tokens = self.cache_write_tokens.saturating_add(rhs.cache_write_tokens);
    }
}

impl From<UsageReport> for Usage {
    fn from(report: UsageReport) -> Self {
        let mut tracker = UsageTracker::default();
        tracker.observe(report);
        tracker.usage()
    }
}

/// Folds successive reports of one response into running maximums.
#[derive(Clone, Copy, Debug, Default)]
pub struct UsageTracker {
    max: UsageReport,
}

impl UsageTracker {
    pub fn observe(&mut self, report: UsageReport) {
        self.max.prompt_tokens = self.max.prompt_tokens.max(report.prompt_tokens);
        self.max.completion_tokens = self.max.completion_tokens.max(report.completion_tokens);
        self.max.cache_read_tokens = self.max.cache_read_tokens.max(report.cache_read_tokens);
        self.max.cache_write_tokens = self.max.cache_write_tokens.max(report.cache_write_tokens);
    }

    pub fn usage(&self) -> Usage {
        Usage {
            input_tokens: self
                .max
                .prompt_tokens
                .saturating_sub(self.max.cache_read_tokens),
            output_tokens: self.max.completion_tokens,
            cache_read_tokens: self.max.cache_read_tokens,
            cache_write_tokens: self.max.cache_write_tokens,
        }
    }
}
