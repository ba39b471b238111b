//! ACP session update records.
//!
//! Records arrive as JSON objects, either bare (`{"sessionUpdate": ..}`) or
//! wrapped in a `session/update` notification. Decoding never fails: an
//! unrecognised or incomplete record becomes [`SessionUpdate::Unknown`] so
//! the aggregator can skip it.

use std::io::BufRead;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{ErrorType, PlanEntry, PlanEntryStatus, ToolCallStatus};

/// Wall-clock time attached to a record by the update source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Iso(String),
}

impl Timestamp {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .map(|f| f as i64)
                })
                .map(Timestamp::Millis),
            Value::String(s) if !s.trim().is_empty() => Some(Timestamp::Iso(s.clone())),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRecord {
    pub session_id: Option<String>,
    pub timestamp: Option<Timestamp>,
    pub update: SessionUpdate,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContentItem {
    Text { text: String },
    Image { data: String, mime_type: String },
    /// Content type this client does not render; carries the `type` string.
    Other(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolCallFields {
    pub id: String,
    pub title: Option<String>,
    pub status: Option<ToolCallStatus>,
    pub kind: Option<String>,
    pub raw_input: Option<Value>,
    pub raw_output: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMode {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub model_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentError {
    pub error_type: ErrorType,
    pub message: String,
    pub agent_id: Option<String>,
    pub auth_command: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionUpdate {
    UserMessage {
        content: Vec<ContentItem>,
    },
    AgentMessageChunk {
        content: Option<ContentItem>,
    },
    AgentThoughtChunk {
        content: Option<ContentItem>,
    },
    ToolCall(ToolCallFields),
    ToolCallUpdate(ToolCallFields),
    Plan {
        entries: Vec<PlanEntry>,
    },
    ModeState {
        current_mode_id: Option<String>,
        available_modes: Vec<SessionMode>,
    },
    ModelState {
        current_model_id: Option<String>,
        available_models: Vec<ModelInfo>,
    },
    Error(AgentError),
    /// Discriminator this client does not know, or a record missing a
    /// required field.
    Unknown(String),
}

impl SessionUpdate {
    pub fn kind(&self) -> &str {
        match self {
            SessionUpdate::UserMessage { .. } => "user_message",
            SessionUpdate::AgentMessageChunk { .. } => "agent_message_chunk",
            SessionUpdate::AgentThoughtChunk { .. } => "agent_thought_chunk",
            SessionUpdate::ToolCall(_) => "tool_call",
            SessionUpdate::ToolCallUpdate(_) => "tool_call_update",
            SessionUpdate::Plan { .. } => "plan",
            SessionUpdate::ModeState { .. } => "mode_state",
            SessionUpdate::ModelState { .. } => "model_state",
            SessionUpdate::Error(_) => "error",
            SessionUpdate::Unknown(kind) => kind,
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

fn non_null(value: &Value, key: &str) -> Option<Value> {
    value.get(key).filter(|v| !v.is_null()).cloned()
}

fn parse_content_item(value: &Value) -> Option<ContentItem> {
    let kind = value.get("type").and_then(Value::as_str).unwrap_or("text");
    match kind {
        "text" => Some(ContentItem::Text {
            text: value.get("text")?.as_str()?.to_string(),
        }),
        "image" => Some(ContentItem::Image {
            data: str_field(value, "data")?,
            mime_type: str_field(value, "mimeType").unwrap_or_else(|| "image/png".to_string()),
        }),
        other => Some(ContentItem::Other(other.to_string())),
    }
}

fn parse_content_list(value: Option<&Value>) -> Vec<ContentItem> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(parse_content_item).collect(),
        Some(Value::String(text)) => vec![ContentItem::Text { text: text.clone() }],
        Some(item @ Value::Object(_)) => parse_content_item(item).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Text carried by a tool call's `content` list, used when the agent sends no
/// `rawOutput`. Diff and terminal items are not text and are skipped.
fn tool_content_text(value: &Value) -> Option<Value> {
    let items = value.get("content")?.as_array()?;
    let parts: Vec<&str> = items
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("content"))
        .filter_map(|item| item.get("content")?.get("text")?.as_str())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(Value::String(parts.join("\n")))
}

/// `kind` is read as the tool classifier only when the record's own type came
/// from `sessionUpdate`; a record typed through `kind` carries no classifier.
fn parse_tool_call_fields(
    value: &Value,
    lenient_status: bool,
    kind_is_type: bool,
) -> Option<ToolCallFields> {
    let id = str_field(value, "toolCallId")?;
    let status = match value.get("status").and_then(Value::as_str) {
        Some(raw) => match ToolCallStatus::parse(raw) {
            Some(status) => Some(status),
            None if lenient_status => Some(ToolCallStatus::Pending),
            None => None,
        },
        None => None,
    };
    Some(ToolCallFields {
        id,
        title: str_field(value, "title"),
        status,
        kind: if kind_is_type {
            None
        } else {
            str_field(value, "kind").filter(|kind| !is_tool_update_type(kind))
        },
        raw_input: non_null(value, "rawInput"),
        raw_output: non_null(value, "rawOutput").or_else(|| tool_content_text(value)),
    })
}

fn parse_plan_entries(value: &Value) -> Vec<PlanEntry> {
    value
        .get("entries")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let content = str_field(entry, "content")?;
                    let status = entry
                        .get("status")
                        .and_then(Value::as_str)
                        .and_then(PlanEntryStatus::parse)
                        .unwrap_or(PlanEntryStatus::Pending);
                    Some(PlanEntry { content, status })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_list<T: for<'de> Deserialize<'de>>(value: &Value, key: &str) -> Vec<T> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn is_tool_update_type(name: &str) -> bool {
    matches!(name, "tool_call" | "tool_call_update")
}

/// Decodes the kind-specific part of an update object.
pub fn parse_session_update(value: &Value) -> SessionUpdate {
    let (kind, kind_is_type) = match value.get("sessionUpdate").and_then(Value::as_str) {
        Some(kind) => (kind, false),
        None => (
            value.get("kind").and_then(Value::as_str).unwrap_or_default(),
            true,
        ),
    };

    let parsed = match kind {
        "user_message" => Some(SessionUpdate::UserMessage {
            content: parse_content_list(value.get("content")),
        }),
        "agent_message_chunk" => Some(SessionUpdate::AgentMessageChunk {
            content: value.get("content").and_then(parse_content_item),
        }),
        "agent_thought_chunk" => Some(SessionUpdate::AgentThoughtChunk {
            content: value.get("content").and_then(parse_content_item),
        }),
        "tool_call" => {
            parse_tool_call_fields(value, true, kind_is_type).map(SessionUpdate::ToolCall)
        }
        "tool_call_update" => {
            parse_tool_call_fields(value, false, kind_is_type).map(SessionUpdate::ToolCallUpdate)
        }
        "plan" => Some(SessionUpdate::Plan {
            entries: parse_plan_entries(value),
        }),
        "mode_state" | "current_mode_update" => Some(SessionUpdate::ModeState {
            current_mode_id: str_field(value, "currentModeId"),
            available_modes: parse_list(value, "availableModes"),
        }),
        "model_state" => Some(SessionUpdate::ModelState {
            current_model_id: str_field(value, "currentModelId"),
            available_models: parse_list(value, "availableModels"),
        }),
        "error" => str_field(value, "message").map(|message| {
            SessionUpdate::Error(AgentError {
                error_type: value
                    .get("errorType")
                    .and_then(Value::as_str)
                    .map(ErrorType::parse)
                    .unwrap_or(ErrorType::General),
                message,
                agent_id: str_field(value, "agentId"),
                auth_command: str_field(value, "authCommand"),
            })
        }),
        _ => None,
    };

    parsed.unwrap_or_else(|| {
        tracing::trace!(kind, "skipping unrenderable session update");
        SessionUpdate::Unknown(kind.to_string())
    })
}

/// Decodes one record. Envelope fields (`sessionId`, `timestamp`) may sit on
/// the record itself or on a `session/update` notification's `params`.
pub fn parse_update_record(value: &Value) -> UpdateRecord {
    let params = if value.get("method").and_then(Value::as_str) == Some("session/update") {
        value.get("params").unwrap_or(value)
    } else {
        value
    };
    let body = params.get("update").unwrap_or(params);

    let session_id = str_field(params, "sessionId").or_else(|| str_field(body, "sessionId"));
    let timestamp = params
        .get("timestamp")
        .or_else(|| body.get("timestamp"))
        .or_else(|| value.get("timestamp"))
        .and_then(Timestamp::from_value);

    UpdateRecord {
        session_id,
        timestamp,
        update: parse_session_update(body),
    }
}

pub fn parse_update_line(line: &str) -> Result<UpdateRecord> {
    let value: Value = serde_json::from_str(line).context("parse update json")?;
    Ok(parse_update_record(&value))
}

/// Reads a JSONL update log. In strict mode the first malformed line is an
/// error; otherwise malformed lines (bad JSON or bad UTF-8) are logged and
/// skipped. Only an I/O failure stops a lenient read.
pub fn read_update_log<R: BufRead>(mut reader: R, strict: bool) -> Result<Vec<UpdateRecord>> {
    let mut records = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("read update log line {}", line_no + 1))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        let parsed = decode_line(&buf).and_then(|line| {
            if line.trim().is_empty() {
                Ok(None)
            } else {
                parse_update_line(line).map(Some)
            }
        });
        match parsed {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(err) if strict => {
                return Err(err.context(format!("malformed update on line {line_no}")));
            }
            Err(err) => {
                tracing::warn!(line = line_no, error = %err, "skipping malformed update");
            }
        }
    }
    Ok(records)
}

/// Strips the line terminator and checks the bytes are UTF-8.
pub(crate) fn decode_line(bytes: &[u8]) -> Result<&str> {
    let line = std::str::from_utf8(bytes).context("update line is not valid utf-8")?;
    Ok(line.trim_end_matches(['\n', '\r']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn unwraps_session_update_notification() {
        let record = parse_update_record(&json!({
            "jsonrpc": "2.0",
            "method": "session/update",
            "params": {
                "sessionId": "s1",
                "update": {
                    "sessionUpdate": "agent_message_chunk",
                    "content": {"type": "text", "text": "hi"}
                }
            }
        }));
        assert_eq!(record.session_id.as_deref(), Some("s1"));
        assert_eq!(
            record.update,
            SessionUpdate::AgentMessageChunk {
                content: Some(ContentItem::Text {
                    text: "hi".to_string()
                })
            }
        );
    }

    #[test]
    fn kind_alias_and_timestamps() {
        let record = parse_update_record(&json!({
            "kind": "agent_thought_chunk",
            "sessionId": "s2",
            "timestamp": 1700000000000i64,
            "content": {"type": "text", "text": "hmm"}
        }));
        assert_eq!(record.timestamp, Some(Timestamp::Millis(1700000000000)));
        assert_eq!(record.update.kind(), "agent_thought_chunk");

        let iso = parse_update_record(&json!({
            "kind": "plan",
            "timestamp": "2025-01-01T00:00:00Z",
            "entries": []
        }));
        assert_eq!(
            iso.timestamp,
            Some(Timestamp::Iso("2025-01-01T00:00:00Z".to_string()))
        );
    }

    #[test]
    fn integral_float_timestamps_are_millis() {
        let record = parse_update_record(&json!({
            "sessionUpdate": "agent_message_chunk",
            "timestamp": 1700000000000.0,
            "content": {"type": "text", "text": "a"}
        }));
        assert_eq!(record.timestamp, Some(Timestamp::Millis(1700000000000)));

        let fractional = parse_update_record(&json!({
            "sessionUpdate": "plan",
            "timestamp": 1.5
        }));
        assert_eq!(fractional.timestamp, None);
    }

    #[test]
    fn kind_typed_tool_update_has_no_classifier() {
        let update = parse_session_update(&json!({
            "kind": "tool_call_update",
            "toolCallId": "t",
            "status": "completed"
        }));
        let SessionUpdate::ToolCallUpdate(fields) = update else {
            panic!("expected tool_call_update");
        };
        assert_eq!(fields.kind, None);
        assert_eq!(fields.status, Some(ToolCallStatus::Completed));

        let update = parse_session_update(&json!({
            "sessionUpdate": "tool_call",
            "toolCallId": "t",
            "kind": "read"
        }));
        let SessionUpdate::ToolCall(fields) = update else {
            panic!("expected tool_call");
        };
        assert_eq!(fields.kind.as_deref(), Some("read"));

        let update = parse_session_update(&json!({
            "sessionUpdate": "tool_call_update",
            "toolCallId": "t",
            "kind": "tool_call_update"
        }));
        let SessionUpdate::ToolCallUpdate(fields) = update else {
            panic!("expected tool_call_update");
        };
        assert_eq!(fields.kind, None);
    }

    #[test]
    fn tool_call_without_id_is_unknown() {
        let update = parse_session_update(&json!({"sessionUpdate": "tool_call", "title": "x"}));
        assert_eq!(update, SessionUpdate::Unknown("tool_call".to_string()));
    }

    #[test]
    fn tool_call_update_ignores_unknown_status() {
        let update = parse_session_update(&json!({
            "sessionUpdate": "tool_call_update",
            "toolCallId": "a",
            "status": "exploded"
        }));
        let SessionUpdate::ToolCallUpdate(fields) = update else {
            panic!("expected tool_call_update");
        };
        assert_eq!(fields.status, None);

        let update = parse_session_update(&json!({
            "sessionUpdate": "tool_call",
            "toolCallId": "a",
            "status": "exploded"
        }));
        let SessionUpdate::ToolCall(fields) = update else {
            panic!("expected tool_call");
        };
        assert_eq!(fields.status, Some(ToolCallStatus::Pending));
    }

    #[test]
    fn tool_content_list_fills_missing_raw_output() {
        let update = parse_session_update(&json!({
            "sessionUpdate": "tool_call_update",
            "toolCallId": "a",
            "content": [
                {"type": "content", "content": {"type": "text", "text": "line one"}},
                {"type": "diff", "path": "/x", "newText": "y"},
                {"type": "content", "content": {"type": "text", "text": "line two"}}
            ]
        }));
        let SessionUpdate::ToolCallUpdate(fields) = update else {
            panic!("expected tool_call_update");
        };
        assert_eq!(fields.raw_output, Some(json!("line one\nline two")));
    }

    #[test]
    fn user_message_keeps_images_and_marks_other_content() {
        let update = parse_session_update(&json!({
            "sessionUpdate": "user_message",
            "content": [
                {"type": "text", "text": "look"},
                {"type": "image", "data": "AAAA", "mimeType": "image/jpeg"},
                {"type": "resource_link", "uri": "file:///x"}
            ]
        }));
        assert_eq!(
            update,
            SessionUpdate::UserMessage {
                content: vec![
                    ContentItem::Text {
                        text: "look".to_string()
                    },
                    ContentItem::Image {
                        data: "AAAA".to_string(),
                        mime_type: "image/jpeg".to_string()
                    },
                    ContentItem::Other("resource_link".to_string()),
                ]
            }
        );
    }

    #[test]
    fn error_defaults_to_general() {
        let update = parse_session_update(&json!({"sessionUpdate": "error", "message": "boom"}));
        assert_eq!(
            update,
            SessionUpdate::Error(AgentError {
                error_type: ErrorType::General,
                message: "boom".to_string(),
                agent_id: None,
                auth_command: None,
            })
        );
    }

    #[test]
    fn mode_and_model_state_lists() {
        let update = parse_session_update(&json!({
            "sessionUpdate": "model_state",
            "currentModelId": "m2",
            "availableModels": [
                {"modelId": "m1", "name": "One"},
                {"modelId": "m2", "name": "Two", "description": "second"},
                {"bogus": true}
            ]
        }));
        let SessionUpdate::ModelState {
            current_model_id,
            available_models,
        } = update
        else {
            panic!("expected model_state");
        };
        assert_eq!(current_model_id.as_deref(), Some("m2"));
        assert_eq!(available_models.len(), 2);
    }

    #[test]
    fn lenient_reader_skips_bad_lines() {
        let log = "{\"sessionUpdate\":\"agent_message_chunk\",\"content\":{\"type\":\"text\",\"text\":\"a\"}}\nnot json\n\n{\"sessionUpdate\":\"future_kind\"}\n";
        let records = read_update_log(log.as_bytes(), false).expect("lenient read");
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1].update,
            SessionUpdate::Unknown("future_kind".to_string())
        );

        let err = read_update_log(log.as_bytes(), true).expect_err("strict read fails");
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn reader_skips_lines_that_are_not_utf8() {
        let mut log = Vec::new();
        log.extend_from_slice(b"{\"sessionUpdate\":\"plan\",\"entries\":[]}\n");
        log.extend_from_slice(b"\xff\xfe garbage\n");
        log.extend_from_slice(b"{\"sessionUpdate\":\"plan\",\"entries\":[]}\r\n");

        let records = read_update_log(log.as_slice(), false).expect("lenient read");
        assert_eq!(records.len(), 2);

        let err = read_update_log(log.as_slice(), true).expect_err("strict read fails");
        assert!(format!("{err:#}").contains("line 2"));
    }
}
