//! Stream-json envelope decoding
//!
//! Each log line holds one JSON object tagged by `type`. Decoding turns that
//! object into zero or more [`DisplayRecord`]s. The polymorphic fields
//! (message content, tool result content) are modeled as serde enums so that
//! shape mismatches surface as [`DecodeError`]s instead of silent coercions.
//!
//! Decoding is a pure function of the line bytes.

use crate::record::DisplayRecord;
use crate::text::truncate_marked;
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

/// Tool output longer than this many characters is cut and marked.
pub const TOOL_OUTPUT_CAP: usize = 500;

/// Errors produced while decoding one line.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("envelope is not a JSON object")]
    NotAnObject,
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level envelope kind, taken from the `type` key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "Option<String>")]
enum EnvelopeKind {
    System,
    Assistant,
    User,
    Result,
    Other(String),
    #[default]
    Missing,
}

impl From<Option<String>> for EnvelopeKind {
    fn from(kind: Option<String>) -> Self {
        let Some(kind) = kind else {
            return Self::Missing;
        };
        match kind.as_str() {
            "" => Self::Missing,
            "system" => Self::System,
            "assistant" => Self::Assistant,
            "user" => Self::User,
            "result" => Self::Result,
            _ => Self::Other(kind),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type", default)]
    kind: EnvelopeKind,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default, rename = "gitBranch")]
    git_branch: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<Message>,

    // Result fields. Newer producers write `total_cost_usd`, older ones `cost_usd`.
    #[serde(default)]
    cost_usd: Option<f64>,
    #[serde(default)]
    total_cost_usd: Option<f64>,
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    num_turns: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Option<MessageContent>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Message content is either a bare string or an ordered list of blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<BlockEntry>),
}

impl MessageContent {
    fn into_blocks(self) -> Vec<ContentBlock> {
        match self {
            Self::Text(text) => vec![ContentBlock::Text { text: Some(text) }],
            Self::Blocks(entries) => entries.into_iter().map(BlockEntry::into_block).collect(),
        }
    }
}

/// One element of a block list. A block without a `type`, or one whose
/// fields do not fit, is ignored without failing its siblings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BlockEntry {
    Known(ContentBlock),
    Ignored(IgnoredAny),
}

impl BlockEntry {
    fn into_block(self) -> ContentBlock {
        match self {
            Self::Known(block) => block,
            Self::Ignored(_) => ContentBlock::Other,
        }
    }
}

// Producers write `null` for fields they have nothing for, so every string is optional.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        #[serde(default)]
        text: Option<String>,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: Option<Value>,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Option<ToolOutcomeContent>,
    },
    Thinking {
        #[serde(default)]
        thinking: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// Tool results carry either plain text or arbitrary structured JSON.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ToolOutcomeContent {
    Text(String),
    Structured(Value),
}

impl ToolOutcomeContent {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(value) => value.to_string(),
        }
    }
}

/// Decode one log line into display records.
///
/// Blank lines decode to nothing. Lines that are not a JSON object, or whose
/// fields have the wrong shape, fail with [`DecodeError`].
pub fn decode(line: &[u8]) -> Result<Vec<DisplayRecord>, DecodeError> {
    let Some(first) = line.iter().find(|b| !b.is_ascii_whitespace()) else {
        return Ok(Vec::new());
    };
    if *first != b'{' {
        return Err(DecodeError::NotAnObject);
    }

    let envelope: RawEnvelope = serde_json::from_slice(line)?;
    trace!(
        kind = ?envelope.kind,
        session_id = envelope.session_id.as_deref().unwrap_or(""),
        timestamp = envelope.timestamp.as_deref().unwrap_or(""),
        branch = envelope.git_branch.as_deref().unwrap_or(""),
        "decoded envelope"
    );
    Ok(envelope.into_records())
}

impl RawEnvelope {
    fn into_records(self) -> Vec<DisplayRecord> {
        match self.kind {
            EnvelopeKind::System => vec![DisplayRecord::SystemInfo {
                model: self.model.unwrap_or_default(),
                cwd: self.cwd.unwrap_or_default(),
            }],
            EnvelopeKind::Assistant => self
                .message
                .map(assistant_records)
                .unwrap_or_default(),
            EnvelopeKind::User => self.message.map(user_records).unwrap_or_default(),
            EnvelopeKind::Result => {
                if self.subtype.as_deref() != Some("success") {
                    return Vec::new();
                }
                vec![DisplayRecord::RunSummary {
                    turns: self.num_turns.unwrap_or(0),
                    cost_usd: self.cost_usd.or(self.total_cost_usd).unwrap_or(0.0),
                    duration_ms: self.duration_ms.unwrap_or(0),
                }]
            }
            EnvelopeKind::Other(kind) => vec![DisplayRecord::Unrecognized { kind }],
            EnvelopeKind::Missing => Vec::new(),
        }
    }
}

fn assistant_records(message: Message) -> Vec<DisplayRecord> {
    if let Some(usage) = &message.usage {
        trace!(
            model = message.model.as_deref().unwrap_or(""),
            stop_reason = message.stop_reason.as_deref().unwrap_or(""),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "assistant usage"
        );
    }

    let Some(content) = message.content else {
        return Vec::new();
    };

    content
        .into_blocks()
        .into_iter()
        .filter_map(|block| match block {
            // Producers emit zero-length deltas; those are not worth a record.
            ContentBlock::Text { text } => text
                .filter(|text| !text.is_empty())
                .map(|body| DisplayRecord::AssistantText { body }),
            ContentBlock::Thinking { thinking } => thinking
                .filter(|thinking| !thinking.is_empty())
                .map(|body| DisplayRecord::Reasoning { body }),
            ContentBlock::ToolUse { id, name, input } => {
                trace!(
                    tool_id = id.as_deref().unwrap_or(""),
                    tool = name.as_deref().unwrap_or(""),
                    "tool invocation"
                );
                Some(DisplayRecord::ToolInvocation {
                    name: name.unwrap_or_default(),
                    input_json: input.map(|v| v.to_string()).unwrap_or_default(),
                })
            }
            ContentBlock::ToolResult { .. } | ContentBlock::Other => None,
        })
        .collect()
}

fn user_records(message: Message) -> Vec<DisplayRecord> {
    match message.content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) => {
            if text.trim().is_empty() {
                Vec::new()
            } else {
                vec![DisplayRecord::UserText { body: text }]
            }
        }
        Some(MessageContent::Blocks(entries)) => entries
            .into_iter()
            .map(BlockEntry::into_block)
            .filter_map(|block| match block {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                } => {
                    let text = content.map(ToolOutcomeContent::into_text).unwrap_or_default();
                    trace!(
                        tool_id = tool_use_id.as_deref().unwrap_or(""),
                        len = text.len(),
                        "tool outcome"
                    );
                    Some(DisplayRecord::ToolOutcome {
                        content_text: truncate_marked(&text, TOOL_OUTPUT_CAP),
                    })
                }
                _ => None,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::ELLIPSIS;
    use serde_json::json;

    fn decode_str(line: &str) -> Vec<DisplayRecord> {
        decode(line.as_bytes()).unwrap()
    }

    // ==================== Kinds ====================

    #[test]
    fn system_combines_model_and_cwd() {
        let records =
            decode_str(r#"{"type":"system","subtype":"init","model":"opus","cwd":"/tmp/p"}"#);
        assert_eq!(
            records,
            vec![DisplayRecord::SystemInfo {
                model: "opus".into(),
                cwd: "/tmp/p".into(),
            }]
        );
    }

    #[test]
    fn successful_result_becomes_run_summary() {
        let records = decode_str(
            r#"{"type":"result","subtype":"success","num_turns":3,"cost_usd":0.12,"duration_ms":4500}"#,
        );
        assert_eq!(
            records,
            vec![DisplayRecord::RunSummary {
                turns: 3,
                cost_usd: 0.12,
                duration_ms: 4500,
            }]
        );
    }

    #[test]
    fn result_accepts_total_cost_usd() {
        let records = decode_str(
            r#"{"type":"result","subtype":"success","num_turns":1,"total_cost_usd":0.5,"duration_ms":10}"#,
        );
        assert!(matches!(
            records.as_slice(),
            [DisplayRecord::RunSummary { cost_usd, .. }] if *cost_usd == 0.5
        ));
    }

    // Failed runs are not surfaced as records. Keep this pinned until failure
    // results get a record type of their own.
    #[test]
    fn non_success_result_is_dropped() {
        assert!(decode_str(r#"{"type":"result","subtype":"error_max_turns","num_turns":9}"#).is_empty());
        assert!(decode_str(r#"{"type":"result"}"#).is_empty());
    }

    #[test]
    fn unknown_kind_is_kept_visible() {
        assert_eq!(
            decode_str(r#"{"type":"heartbeat"}"#),
            vec![DisplayRecord::Unrecognized {
                kind: "heartbeat".into()
            }]
        );
    }

    #[test]
    fn empty_or_missing_kind_yields_nothing() {
        assert!(decode_str(r#"{"type":""}"#).is_empty());
        assert!(decode_str(r#"{"foo":1}"#).is_empty());
        assert!(decode_str(r#"{"type":null}"#).is_empty());
    }

    // ==================== Assistant ====================

    #[test]
    fn empty_text_block_is_dropped_and_tool_use_kept() {
        let records = decode_str(
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":""},{"type":"tool_use","id":"1","name":"Read","input":{"path":"x"}}]}}"#,
        );
        assert_eq!(
            records,
            vec![DisplayRecord::ToolInvocation {
                name: "Read".into(),
                input_json: r#"{"path":"x"}"#.into(),
            }]
        );
    }

    #[test]
    fn null_text_block_does_not_sink_its_siblings() {
        let records = decode_str(
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":null},{"type":"tool_use","id":"t1","name":"Read","input":{"path":"x"}}]}}"#,
        );
        assert_eq!(
            records,
            vec![DisplayRecord::ToolInvocation {
                name: "Read".into(),
                input_json: r#"{"path":"x"}"#.into(),
            }]
        );
    }

    #[test]
    fn null_tool_fields_still_yield_an_invocation() {
        let records = decode_str(
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":null,"name":null,"input":null},{"type":"thinking","thinking":null}]}}"#,
        );
        assert_eq!(
            records,
            vec![DisplayRecord::ToolInvocation {
                name: String::new(),
                input_json: String::new(),
            }]
        );
    }

    #[test]
    fn assistant_blocks_keep_their_order() {
        let line = json!({
            "type": "assistant",
            "message": {
                "model": "opus",
                "stop_reason": "tool_use",
                "usage": { "input_tokens": 10, "output_tokens": 4 },
                "content": [
                    { "type": "thinking", "thinking": "plan" },
                    { "type": "text", "text": "Looking." },
                    { "type": "tool_use", "id": "t1", "name": "Bash", "input": { "cmd": "ls" } },
                    { "type": "thinking", "thinking": "" },
                    { "type": "redacted_thinking", "data": "xx" }
                ]
            }
        })
        .to_string();

        let records = decode_str(&line);
        assert_eq!(
            records,
            vec![
                DisplayRecord::Reasoning {
                    body: "plan".into()
                },
                DisplayRecord::AssistantText {
                    body: "Looking.".into()
                },
                DisplayRecord::ToolInvocation {
                    name: "Bash".into(),
                    input_json: r#"{"cmd":"ls"}"#.into(),
                },
            ]
        );
    }

    #[test]
    fn assistant_without_message_yields_nothing() {
        assert!(decode_str(r#"{"type":"assistant"}"#).is_empty());
        assert!(decode_str(r#"{"type":"assistant","message":{"role":"assistant"}}"#).is_empty());
    }

    #[test]
    fn assistant_string_content_is_one_text_block() {
        assert_eq!(
            decode_str(r#"{"type":"assistant","message":{"content":"hi"}}"#),
            vec![DisplayRecord::AssistantText { body: "hi".into() }]
        );
    }

    // ==================== User ====================

    #[test]
    fn user_string_content_is_human_input() {
        assert_eq!(
            decode_str(r#"{"type":"user","message":{"role":"user","content":"fix the bug"}}"#),
            vec![DisplayRecord::UserText {
                body: "fix the bug".into()
            }]
        );
        assert!(decode_str(r#"{"type":"user","message":{"content":"   "}}"#).is_empty());
    }

    #[test]
    fn user_block_content_only_surfaces_tool_results() {
        let line = json!({
            "type": "user",
            "message": {
                "content": [
                    { "type": "text", "text": "ignored" },
                    { "type": "tool_result", "tool_use_id": "t1", "content": "file body" },
                    { "type": "tool_result", "tool_use_id": "t2", "content": [{ "type": "text", "text": "x" }] }
                ]
            }
        })
        .to_string();

        assert_eq!(
            decode_str(&line),
            vec![
                DisplayRecord::ToolOutcome {
                    content_text: "file body".into()
                },
                DisplayRecord::ToolOutcome {
                    content_text: r#"[{"text":"x","type":"text"}]"#.into()
                },
            ]
        );
    }

    #[test]
    fn untyped_block_is_skipped_beside_a_tool_result() {
        let line = json!({
            "type": "user",
            "message": {
                "content": [
                    { "text": "no type here" },
                    "stray",
                    { "type": "tool_result", "tool_use_id": null, "content": "done" }
                ]
            }
        })
        .to_string();

        assert_eq!(
            decode_str(&line),
            vec![DisplayRecord::ToolOutcome {
                content_text: "done".into()
            }]
        );
    }

    #[test]
    fn long_tool_output_is_capped() {
        let body = "a".repeat(10_000);
        let line = json!({
            "type": "user",
            "message": { "content": [{ "type": "tool_result", "tool_use_id": "t", "content": body }] }
        })
        .to_string();

        let records = decode_str(&line);
        let [DisplayRecord::ToolOutcome { content_text }] = records.as_slice() else {
            panic!("expected one tool outcome, got {records:?}");
        };
        assert_eq!(
            content_text.chars().count(),
            TOOL_OUTPUT_CAP + ELLIPSIS.len()
        );
        assert!(content_text.ends_with(ELLIPSIS));
    }

    // ==================== Errors & purity ====================

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            decode(br#"{"type":"system""#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(decode(b"[1,2]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode(b"42"), Err(DecodeError::NotAnObject)));
    }

    #[test]
    fn mistyped_content_is_an_error() {
        assert!(decode(br#"{"type":"user","message":{"content":42}}"#).is_err());
        assert!(decode(br#"{"type":5}"#).is_err());
    }

    #[test]
    fn blank_line_yields_nothing() {
        assert!(decode(b"").unwrap().is_empty());
        assert!(decode(b"  \t").unwrap().is_empty());
    }

    #[test]
    fn decode_is_idempotent() {
        let line = br#"{"type":"assistant","message":{"content":[{"type":"text","text":"a"},{"type":"tool_use","id":"1","name":"Grep","input":{"q":"x"}}]}}"#;
        assert_eq!(decode(line).unwrap(), decode(line).unwrap());
    }
}
