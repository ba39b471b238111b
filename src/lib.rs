//! Aggregation core for an Agent Client Protocol chat client.
//!
//! An update source appends ACP session updates to a per-session log;
//! [`aggregate`] folds that log into the message list a chat view renders.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod message;
pub mod render;
pub mod session;
pub mod text;
pub mod update;

pub use aggregate::{
    aggregate, aggregate_with, session_state, AggregateOptions, IncrementalAggregator,
    SessionState,
};
pub use message::{ContentBlock, Message, Role, ToolCallBlock, ToolCallStatus};
pub use session::SessionLog;
pub use update::{parse_update_record, SessionUpdate, UpdateRecord};
