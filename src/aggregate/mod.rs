//! Folds a session's ordered update log into display messages.
//!
//! The fold is a single pass. [`Fold`] owns everything it needs (closed
//! messages plus the open assistant turn) so a full run and a resumed run
//! from a checkpoint go through the same code.

use indexmap::IndexMap;
use serde::Serialize;

use crate::message::{ContentBlock, Message, PlanEntry, Role, ToolCallBlock, ToolCallStatus};
use crate::text::{format_raw_value, truncate_chars};
use crate::update::{
    is_tool_update_type, AgentError, ContentItem, ModelInfo, SessionMode, SessionUpdate, Timestamp, ToolCallFields,
    UpdateRecord,
};

mod checkpoint;

pub use checkpoint::IncrementalAggregator;

pub const DEFAULT_OUTPUT_LIMIT: usize = 500;
pub const DEFAULT_TOOL_TITLE: &str = "Tool Call";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Character ceiling for a tool call's displayed output.
    pub output_limit: usize,
    /// Treat the log as finished: the final turn gets an `end_time` (its
    /// last event) and no `current_action`, like any other closed turn.
    pub close_final_turn: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            output_limit: DEFAULT_OUTPUT_LIMIT,
            close_final_turn: false,
        }
    }
}

pub fn aggregate(updates: &[UpdateRecord]) -> Vec<Message> {
    aggregate_with(updates, &AggregateOptions::default())
}

pub fn aggregate_with(updates: &[UpdateRecord], options: &AggregateOptions) -> Vec<Message> {
    let mut fold = Fold::new(*options);
    for record in updates {
        fold.apply(record);
    }
    fold.snapshot()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Activity {
    Thinking,
    Responding,
    Tool,
    Planning,
}

/// The assistant turn still receiving content.
#[derive(Clone, Debug, Default)]
struct OpenTurn {
    text: String,
    thought: String,
    tools: IndexMap<String, ToolCallBlock>,
    latest_tool: Option<String>,
    plan: Option<Vec<PlanEntry>>,
    errors: Vec<ContentBlock>,
    start_time: Option<Timestamp>,
    last_event: Option<Timestamp>,
    activity: Option<Activity>,
}

impl OpenTurn {
    fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
            || !self.thought.trim().is_empty()
            || !self.tools.is_empty()
            || self.plan.is_some()
            || !self.errors.is_empty()
    }

    fn touch(&mut self, timestamp: Option<&Timestamp>, activity: Activity) {
        if let Some(ts) = timestamp {
            if self.start_time.is_none() {
                self.start_time = Some(ts.clone());
            }
            self.last_event = Some(ts.clone());
        }
        self.activity = Some(activity);
    }

    fn current_action(&self) -> Option<String> {
        match self.activity? {
            Activity::Thinking => Some("Thinking".to_string()),
            Activity::Responding => Some("Responding".to_string()),
            Activity::Planning => Some("Planning".to_string()),
            Activity::Tool => {
                let tool = self.tools.get(self.latest_tool.as_deref()?)?;
                if tool.status.is_active() {
                    Some(format!("Running {}", tool.title))
                } else {
                    Some("Processing".to_string())
                }
            }
        }
    }

    fn to_message(&self, end_time: Option<Timestamp>, current_action: Option<String>) -> Message {
        let mut blocks = Vec::with_capacity(self.tools.len() + 4);
        let thought = self.thought.trim();
        if !thought.is_empty() {
            blocks.push(ContentBlock::Thought {
                text: thought.to_string(),
            });
        }
        if let Some(entries) = &self.plan {
            blocks.push(ContentBlock::Plan {
                entries: entries.clone(),
            });
        }
        blocks.extend(self.tools.values().cloned().map(ContentBlock::ToolCall));
        let text = self.text.trim();
        if !text.is_empty() {
            blocks.push(ContentBlock::Text {
                text: text.to_string(),
            });
        }
        blocks.extend(self.errors.iter().cloned());

        Message {
            role: Role::Assistant,
            blocks,
            start_time: self.start_time.clone(),
            end_time,
            last_event_timestamp: self.last_event.clone(),
            current_action,
        }
    }

    /// A known id merges in place and keeps its position; an unknown id
    /// (including an update that raced ahead of its `tool_call`) is appended.
    /// A repeated `tool_call` merges the same way rather than replacing the
    /// block, so fields it omits keep their earlier values.
    fn upsert_tool(&mut self, fields: &ToolCallFields, options: &AggregateOptions) {
        match self.tools.get_mut(&fields.id) {
            Some(block) => merge_tool_fields(block, fields, options),
            None => {
                let block = new_tool_block(fields, options);
                self.tools.insert(fields.id.clone(), block);
            }
        }
        self.latest_tool = Some(fields.id.clone());
    }
}

fn display_output(raw: &str, options: &AggregateOptions) -> String {
    truncate_chars(raw, options.output_limit)
}

fn new_tool_block(fields: &ToolCallFields, options: &AggregateOptions) -> ToolCallBlock {
    let raw_output = fields.raw_output.as_ref().and_then(format_raw_value);
    ToolCallBlock {
        id: fields.id.clone(),
        title: fields
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TOOL_TITLE.to_string()),
        kind: tool_classifier(fields),
        status: fields.status.unwrap_or(ToolCallStatus::Pending),
        input: fields.raw_input.as_ref().and_then(format_raw_value),
        output: raw_output.as_deref().map(|raw| display_output(raw, options)),
        raw_output,
    }
}

/// The record type names are never a tool classifier.
fn tool_classifier(fields: &ToolCallFields) -> Option<String> {
    fields
        .kind
        .clone()
        .filter(|kind| !is_tool_update_type(kind))
}

/// Merges the fields an update actually carries. Empty input/output never
/// clear what is already shown.
fn merge_tool_fields(block: &mut ToolCallBlock, fields: &ToolCallFields, options: &AggregateOptions) {
    if let Some(status) = fields.status {
        block.status = status;
    }
    if let Some(title) = fields.title.as_ref().filter(|t| !t.trim().is_empty()) {
        block.title = title.clone();
    }
    if let Some(kind) = tool_classifier(fields) {
        block.kind = Some(kind);
    }
    if let Some(input) = fields.raw_input.as_ref().and_then(format_raw_value) {
        block.input = Some(input);
    }
    if let Some(raw) = fields.raw_output.as_ref().and_then(format_raw_value) {
        block.output = Some(display_output(&raw, options));
        block.raw_output = Some(raw);
    }
}

fn user_message(content: &[ContentItem]) -> Option<Message> {
    let text = content
        .iter()
        .filter_map(|item| match item {
            ContentItem::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut blocks = Vec::new();
    if !text.is_empty() {
        blocks.push(ContentBlock::Text { text });
    }
    for item in content {
        if let ContentItem::Image { data, mime_type } = item {
            blocks.push(ContentBlock::Image {
                data: data.clone(),
                mime_type: mime_type.clone(),
            });
        }
    }
    if blocks.is_empty() {
        return None;
    }
    Some(Message::user(blocks))
}

fn error_block(error: &AgentError) -> ContentBlock {
    ContentBlock::Error {
        error_type: error.error_type,
        message: error.message.clone(),
        auth_command: error.auth_command.clone(),
        agent_id: error.agent_id.clone(),
    }
}

fn chunk_text(content: &Option<ContentItem>) -> Option<&str> {
    match content {
        Some(ContentItem::Text { text }) => Some(text.as_str()),
        _ => None,
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Fold {
    options: AggregateOptions,
    closed: Vec<Message>,
    open: OpenTurn,
}

impl Fold {
    pub(crate) fn new(options: AggregateOptions) -> Self {
        Self {
            options,
            closed: Vec::new(),
            open: OpenTurn::default(),
        }
    }

    fn close_turn(&mut self, end_time: Option<Timestamp>) {
        if self.open.has_content() {
            let end_time = end_time.or_else(|| self.open.last_event.clone());
            let message = self.open.to_message(end_time, None);
            self.closed.push(message);
        }
        self.open = OpenTurn::default();
    }

    pub(crate) fn apply(&mut self, record: &UpdateRecord) {
        let ts = record.timestamp.as_ref();
        match &record.update {
            SessionUpdate::UserMessage { content } => {
                self.close_turn(ts.cloned());
                if let Some(message) = user_message(content) {
                    self.closed.push(message);
                }
            }
            SessionUpdate::AgentMessageChunk { content } => {
                if let Some(text) = chunk_text(content) {
                    self.open.text.push_str(text);
                    self.open.touch(ts, Activity::Responding);
                }
            }
            SessionUpdate::AgentThoughtChunk { content } => {
                if let Some(text) = chunk_text(content) {
                    self.open.thought.push_str(text);
                    self.open.touch(ts, Activity::Thinking);
                }
            }
            SessionUpdate::ToolCall(fields) | SessionUpdate::ToolCallUpdate(fields) => {
                self.open.upsert_tool(fields, &self.options);
                self.open.touch(ts, Activity::Tool);
            }
            SessionUpdate::Plan { entries } => {
                self.open.plan = Some(entries.clone());
                self.open.touch(ts, Activity::Planning);
            }
            SessionUpdate::Error(error) => {
                self.open.errors.push(error_block(error));
                self.open.touch(ts, Activity::Responding);
                self.close_turn(ts.cloned());
            }
            SessionUpdate::ModeState { .. } | SessionUpdate::ModelState { .. } => {}
            SessionUpdate::Unknown(_) => {}
        }
    }

    /// Closed messages followed by the open turn, if it has content. With
    /// `close_final_turn` the open turn is emitted as closed at its last event.
    pub(crate) fn snapshot(&self) -> Vec<Message> {
        let mut messages = self.closed.clone();
        if self.open.has_content() {
            let message = if self.options.close_final_turn {
                self.open.to_message(self.open.last_event.clone(), None)
            } else {
                self.open.to_message(None, self.open.current_action())
            };
            messages.push(message);
        }
        messages
    }

    pub(crate) fn closed(&self) -> &[Message] {
        &self.closed
    }
}

/// Latest mode/model selection seen in a session log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub current_mode_id: Option<String>,
    pub available_modes: Vec<SessionMode>,
    pub current_model_id: Option<String>,
    pub available_models: Vec<ModelInfo>,
    pub last_event_timestamp: Option<Timestamp>,
}

pub fn session_state(updates: &[UpdateRecord]) -> SessionState {
    let mut state = SessionState::default();
    for record in updates {
        match &record.update {
            SessionUpdate::ModeState {
                current_mode_id,
                available_modes,
            } => {
                if current_mode_id.is_some() {
                    state.current_mode_id = current_mode_id.clone();
                }
                if !available_modes.is_empty() {
                    state.available_modes = available_modes.clone();
                }
            }
            SessionUpdate::ModelState {
                current_model_id,
                available_models,
            } => {
                if current_model_id.is_some() {
                    state.current_model_id = current_model_id.clone();
                }
                if !available_models.is_empty() {
                    state.available_models = available_models.clone();
                }
            }
            SessionUpdate::Unknown(_) => continue,
            _ => {}
        }
        if record.timestamp.is_some() {
            state.last_event_timestamp = record.timestamp.clone();
        }
    }
    state
}
