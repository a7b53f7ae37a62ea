//! Demo tools registered by the chat binary.

use chrono::{FixedOffset, Utc};
use converse_core::{ToolError, ToolRegistry};
use converse_harness::ToolSpec;
use serde::Deserialize;
use serde_json::{Value, json};

pub const SOURCE: &str = "AIAnalyst";

#[derive(Deserialize)]
struct CurrentTimeArgs {
    #[serde(default)]
    utc_offset_hours: Option<i32>,
}

#[derive(Deserialize)]
struct SumArgs {
    numbers: Vec<f64>,
}

pub fn current_time(args: Value) -> String {
    let args: CurrentTimeArgs = match serde_json::from_value(args) {
        Ok(args) => args,
        Err(e) => return format!("Error reading arguments: {e}"),
    };
    let hours = args.utc_offset_hours.unwrap_or(0);
    match FixedOffset::east_opt(hours * 3600) {
        Some(offset) => Utc::now().with_timezone(&offset).to_rfc3339(),
        None => format!("Error: offset {hours}h is out of range"),
    }
}

pub fn sum_numbers(args: Value) -> String {
    match serde_json::from_value::<SumArgs>(args) {
        Ok(args) => args.numbers.iter().sum::<f64>().to_string(),
        Err(e) => format!("Error reading arguments: {e}"),
    }
}

/// Registry with the built-in suggestions tool and the demo tools.
pub fn demo_registry() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::with_builtins();
    registry.register_fn(
        ToolSpec::new(
            "current_time",
            "Returns the current date and time in RFC 3339 format.",
            json!({
                "type": "object",
                "properties": {
                    "utc_offset_hours": {"type": "integer", "minimum": -23, "maximum": 23}
                },
                "additionalProperties": false
            }),
        )
        .source(SOURCE)
        .source("AIAssistant"),
        |args| async move { current_time(args) },
    )?;
    registry.register_fn(
        ToolSpec::new(
            "sum_numbers",
            "Adds a list of numbers and returns the total.",
            json!({
                "type": "object",
                "properties": {"numbers": {"type": "array", "items": {"type": "number"}}},
                "required": ["numbers"],
                "additionalProperties": false
            }),
        )
        .source(SOURCE),
        |args| async move { sum_numbers(args) },
    )?;
    Ok(registry)
}
