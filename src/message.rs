use serde::{Deserialize, Serialize};

use crate::update::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    #[serde(alias = "running")]
    InProgress,
    Completed,
    Failed,
}

impl ToolCallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCallStatus::Pending => "pending",
            ToolCallStatus::InProgress => "in_progress",
            ToolCallStatus::Completed => "completed",
            ToolCallStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pending" => Some(ToolCallStatus::Pending),
            "in_progress" | "running" | "in-progress" => Some(ToolCallStatus::InProgress),
            "completed" | "complete" | "done" => Some(ToolCallStatus::Completed),
            "failed" | "error" => Some(ToolCallStatus::Failed),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ToolCallStatus::Pending | ToolCallStatus::InProgress)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryStatus {
    Pending,
    InProgress,
    Completed,
}

impl PlanEntryStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pending" => Some(PlanEntryStatus::Pending),
            "in_progress" | "running" => Some(PlanEntryStatus::InProgress),
            "completed" => Some(PlanEntryStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub content: String,
    pub status: PlanEntryStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Auth,
    General,
}

impl ErrorType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "auth" | "authentication" | "auth_required" => ErrorType::Auth,
            _ => ErrorType::General,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallBlock {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Display form of the output, cut at the configured ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thought {
        text: String,
    },
    ToolCall(ToolCallBlock),
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Plan {
        entries: Vec<PlanEntry>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        error_type: ErrorType,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auth_command: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub blocks: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_action: Option<String>,
}

impl Message {
    pub(crate) fn user(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            blocks,
            start_time: None,
            end_time: None,
            last_event_timestamp: None,
            current_action: None,
        }
    }

    /// Concatenated text of every text block.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallBlock> {
        self.blocks.iter().filter_map(|block| match block {
            ContentBlock::ToolCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn thought(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            ContentBlock::Thought { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn message_serializes_with_protocol_field_names() {
        let msg = Message {
            role: Role::Assistant,
            blocks: vec![
                ContentBlock::ToolCall(ToolCallBlock {
                    id: "t1".to_string(),
                    title: "Read file".to_string(),
                    kind: Some("read".to_string()),
                    status: ToolCallStatus::InProgress,
                    input: None,
                    output: None,
                    raw_output: None,
                }),
                ContentBlock::Error {
                    error_type: ErrorType::Auth,
                    message: "login".to_string(),
                    auth_command: Some("agent login".to_string()),
                    agent_id: None,
                },
            ],
            start_time: Some(Timestamp::Millis(5)),
            end_time: None,
            last_event_timestamp: Some(Timestamp::Millis(9)),
            current_action: Some("Running Read file".to_string()),
        };
        let value = serde_json::to_value(&msg).expect("serialize message");
        assert_eq!(
            value,
            json!({
                "role": "assistant",
                "blocks": [
                    {"type": "tool_call", "id": "t1", "title": "Read file", "kind": "read", "status": "in_progress"},
                    {"type": "error", "errorType": "auth", "message": "login", "authCommand": "agent login"}
                ],
                "startTime": 5,
                "lastEventTimestamp": 9,
                "currentAction": "Running Read file"
            })
        );
    }

    #[test]
    fn status_parse_accepts_running_alias() {
        assert_eq!(
            ToolCallStatus::parse("running"),
            Some(ToolCallStatus::InProgress)
        );
        assert_eq!(ToolCallStatus::parse("nope"), None);
        assert_eq!(ErrorType::parse("AUTH"), ErrorType::Auth);
        assert_eq!(ErrorType::parse("other"), ErrorType::General);
    }
}
