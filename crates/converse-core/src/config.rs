use tracing::warn;

use crate::observability::parse_bool_env;

/// Default cap on provider calls that return tool calls within one submit.
pub const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 25;
pub const DEFAULT_SNAPSHOT_BUFFER: usize = 64;

/// How the calls of one assistant turn are executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToolExecution {
    #[default]
    Sequential,
    /// All calls of a batch run concurrently; results keep request order.
    Concurrent,
}

/// Immutable per-orchestrator settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub max_tool_iterations: u32,
    /// Capacity of the snapshot channel handed to the caller.
    pub snapshot_buffer: usize,
    pub tool_execution: ToolExecution,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            snapshot_buffer: DEFAULT_SNAPSHOT_BUFFER,
            tool_execution: ToolExecution::Sequential,
        }
    }
}

impl OrchestratorConfig {
    /// Reads overrides from the environment, keeping defaults for unset or
    /// unparsable values.
    ///
    /// - `CONVERSE_MAX_TOOL_ITERATIONS` (positive integer)
    /// - `CONVERSE_SNAPSHOT_BUFFER` (positive integer)
    /// - `CONVERSE_CONCURRENT_TOOLS` (boolean)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = positive_from(&lookup, "CONVERSE_MAX_TOOL_ITERATIONS") {
            config.max_tool_iterations = value;
        }
        if let Some(value) = positive_from(&lookup, "CONVERSE_SNAPSHOT_BUFFER") {
            config.snapshot_buffer = value;
        }
        if let Some(raw) = lookup("CONVERSE_CONCURRENT_TOOLS") {
            match parse_bool_env(&raw) {
                Some(true) => config.tool_execution = ToolExecution::Concurrent,
                Some(false) => config.tool_execution = ToolExecution::Sequential,
                None => warn!(value = %raw, "ignoring invalid CONVERSE_CONCURRENT_TOOLS"),
            }
        }
        config
    }

    pub fn max_tool_iterations(mut self, max: u32) -> Self {
        self.max_tool_iterations = max.max(1);
        self
    }

    pub fn snapshot_buffer(mut self, capacity: usize) -> Self {
        self.snapshot_buffer = capacity.max(1);
        self
    }

    pub fn tool_execution(mut self, mode: ToolExecution) -> Self {
        self.tool_execution = mode;
        self
    }
}

fn positive_from<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        _ => {
            warn!(key, value = %raw, "ignoring invalid numeric setting");
            None
        }
    }
}
