//! Display records
//!
//! The normalized unit the viewport stores. Every record owns its text; nothing
//! here borrows from the line it was decoded from.

/// One displayable item derived from a log envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayRecord {
    /// Session header: model and working directory.
    SystemInfo { model: String, cwd: String },
    /// Assistant prose.
    AssistantText { body: String },
    /// Assistant thinking block.
    Reasoning { body: String },
    /// A tool call, with its input kept as compact JSON text.
    ToolInvocation { name: String, input_json: String },
    /// Tool output, already capped for display.
    ToolOutcome { content_text: String },
    /// Human input.
    UserText { body: String },
    /// Successful end-of-run summary.
    RunSummary {
        turns: u32,
        cost_usd: f64,
        duration_ms: u64,
    },
    /// Envelope kind this viewer does not know how to present.
    Unrecognized { kind: String },
}

impl DisplayRecord {
    /// Short label used for badges and logging.
    pub fn label(&self) -> &str {
        match self {
            Self::SystemInfo { .. } => "system",
            Self::AssistantText { .. } => "text",
            Self::Reasoning { .. } => "thinking",
            Self::ToolInvocation { .. } => "tool_use",
            Self::ToolOutcome { .. } => "result",
            Self::UserText { .. } => "user",
            Self::RunSummary { .. } => "done",
            Self::Unrecognized { kind } => kind,
        }
    }

    /// One-line summary of a run, e.g. `✓ 3 turns | $0.1200 | 4500ms`.
    pub fn summary_text(turns: u32, cost_usd: f64, duration_ms: u64) -> String {
        format!("✓ {turns} turns | ${cost_usd:.4} | {duration_ms}ms")
    }
}
