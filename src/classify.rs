//! Icon and label heuristics for finished tool-call blocks.
//!
//! These only look at a block's `kind` and `title`; they run after
//! aggregation and never influence it.

use crate::message::{ToolCallBlock, ToolCallStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolCategory {
    Read,
    Edit,
    Delete,
    Move,
    Search,
    Execute,
    Think,
    Fetch,
    SwitchMode,
    Other,
}

impl ToolCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "read" => Some(ToolCategory::Read),
            "edit" | "write" => Some(ToolCategory::Edit),
            "delete" => Some(ToolCategory::Delete),
            "move" => Some(ToolCategory::Move),
            "search" => Some(ToolCategory::Search),
            "execute" | "bash" | "shell" => Some(ToolCategory::Execute),
            "think" => Some(ToolCategory::Think),
            "fetch" => Some(ToolCategory::Fetch),
            "switch_mode" => Some(ToolCategory::SwitchMode),
            "other" => Some(ToolCategory::Other),
            _ => None,
        }
    }

    fn from_title(title: &str) -> Self {
        let t = title.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| t.contains(w));
        if has(&["read", "view", "cat ", "open"]) {
            ToolCategory::Read
        } else if has(&["edit", "write", "patch", "replace", "create"]) {
            ToolCategory::Edit
        } else if has(&["delete", "remove", "rm "]) {
            ToolCategory::Delete
        } else if has(&["move", "rename", "mv "]) {
            ToolCategory::Move
        } else if has(&["search", "grep", "find", "glob", "list"]) {
            ToolCategory::Search
        } else if has(&["run", "exec", "bash", "shell", "terminal", "command"]) {
            ToolCategory::Execute
        } else if has(&["fetch", "http", "web", "url", "download"]) {
            ToolCategory::Fetch
        } else if has(&["think", "plan", "todo"]) {
            ToolCategory::Think
        } else {
            ToolCategory::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolCategory::Read => "Read",
            ToolCategory::Edit => "Edit",
            ToolCategory::Delete => "Delete",
            ToolCategory::Move => "Move",
            ToolCategory::Search => "Search",
            ToolCategory::Execute => "Run",
            ToolCategory::Think => "Think",
            ToolCategory::Fetch => "Fetch",
            ToolCategory::SwitchMode => "Mode",
            ToolCategory::Other => "Tool",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ToolCategory::Read => "◧",
            ToolCategory::Edit => "✎",
            ToolCategory::Delete => "✗",
            ToolCategory::Move => "⇄",
            ToolCategory::Search => "⌕",
            ToolCategory::Execute => "$",
            ToolCategory::Think => "∴",
            ToolCategory::Fetch => "⇣",
            ToolCategory::SwitchMode => "⇆",
            ToolCategory::Other => "•",
        }
    }
}

/// Explicit `kind` wins; an absent or unrecognised kind (including the
/// catch-all `other`) falls back to title keywords.
pub fn classify(kind: Option<&str>, title: &str) -> ToolCategory {
    match kind.and_then(ToolCategory::parse) {
        Some(ToolCategory::Other) | None => ToolCategory::from_title(title),
        Some(category) => category,
    }
}

pub fn tool_icon(block: &ToolCallBlock) -> &'static str {
    classify(block.kind.as_deref(), &block.title).icon()
}

pub fn tool_label(block: &ToolCallBlock) -> String {
    let category = classify(block.kind.as_deref(), &block.title);
    format!("{} {}", category.label(), block.title.trim())
}

pub fn status_label(status: ToolCallStatus) -> &'static str {
    match status {
        ToolCallStatus::Pending => "pending",
        ToolCallStatus::InProgress => "running",
        ToolCallStatus::Completed => "done",
        ToolCallStatus::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: Option<&str>, title: &str) -> ToolCallBlock {
        ToolCallBlock {
            id: "t".to_string(),
            title: title.to_string(),
            kind: kind.map(|k| k.to_string()),
            status: ToolCallStatus::Pending,
            input: None,
            output: None,
            raw_output: None,
        }
    }

    #[test]
    fn explicit_kind_wins_over_title() {
        assert_eq!(classify(Some("execute"), "Read the docs"), ToolCategory::Execute);
        assert_eq!(tool_icon(&block(Some("edit"), "anything")), "✎");
    }

    #[test]
    fn title_keywords_used_without_kind() {
        assert_eq!(classify(None, "Read src/main.rs"), ToolCategory::Read);
        assert_eq!(classify(Some("other"), "grep TODO"), ToolCategory::Search);
        assert_eq!(classify(Some("mystery"), "npm run build"), ToolCategory::Execute);
        assert_eq!(classify(None, "Tool Call"), ToolCategory::Other);
    }

    #[test]
    fn label_prefixes_category() {
        assert_eq!(tool_label(&block(Some("fetch"), " example.com ")), "Fetch example.com");
        assert_eq!(status_label(ToolCallStatus::InProgress), "running");
    }
}
