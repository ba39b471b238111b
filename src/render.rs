//! Plain line rendering of aggregated messages.
//!
//! Builds ratatui `Line`s from a read-only message list. Markdown is shown
//! as written.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::classify::{status_label, tool_icon, tool_label};
use crate::message::{ContentBlock, ErrorType, Message, PlanEntryStatus, Role, ToolCallBlock};
use crate::text::{sanitize_runtime_text, truncate_display_width};

const TOOL_OUTPUT_PREVIEW_LINES: usize = 6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThemePreset {
    #[default]
    Graphite,
    Fjord,
    Ember,
}

impl ThemePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemePreset::Graphite => "graphite",
            ThemePreset::Fjord => "fjord",
            ThemePreset::Ember => "ember",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "graphite" | "slate" | "gray" => Some(ThemePreset::Graphite),
            "fjord" | "nord" | "blue" => Some(ThemePreset::Fjord),
            "ember" | "warm" | "copper" => Some(ThemePreset::Ember),
            _ => None,
        }
    }

    pub fn palette(self) -> ThemePalette {
        match self {
            ThemePreset::Graphite => ThemePalette {
                user_fg: Color::Rgb(200, 220, 240),
                user_bg: Color::Rgb(25, 35, 45),
                assistant_label: Color::Rgb(255, 127, 80),
                assistant_text: Color::Rgb(170, 190, 210),
                thought_text: Color::Rgb(100, 120, 140),
                muted_text: Color::Rgb(80, 100, 120),
                tool_icon: Color::Rgb(110, 130, 150),
                tool_text: Color::Rgb(120, 140, 160),
                error_label: Color::Rgb(220, 100, 100),
                error_text: Color::Rgb(230, 120, 120),
            },
            ThemePreset::Fjord => ThemePalette {
                user_fg: Color::Rgb(255, 255, 255),
                user_bg: Color::Rgb(25, 25, 25),
                assistant_label: Color::Rgb(65, 105, 225),
                assistant_text: Color::Rgb(210, 210, 210),
                thought_text: Color::Rgb(160, 160, 160),
                muted_text: Color::Rgb(128, 128, 128),
                tool_icon: Color::Rgb(150, 150, 150),
                tool_text: Color::Rgb(170, 170, 170),
                error_label: Color::Rgb(220, 100, 100),
                error_text: Color::Rgb(230, 120, 120),
            },
            ThemePreset::Ember => ThemePalette {
                user_fg: Color::Rgb(250, 230, 210),
                user_bg: Color::Rgb(45, 30, 25),
                assistant_label: Color::Rgb(230, 150, 90),
                assistant_text: Color::Rgb(225, 205, 185),
                thought_text: Color::Rgb(160, 130, 110),
                muted_text: Color::Rgb(130, 105, 90),
                tool_icon: Color::Rgb(190, 140, 100),
                tool_text: Color::Rgb(200, 170, 145),
                error_label: Color::Rgb(220, 100, 100),
                error_text: Color::Rgb(230, 120, 120),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThemePalette {
    pub user_fg: Color,
    pub user_bg: Color,
    pub assistant_label: Color,
    pub assistant_text: Color,
    pub thought_text: Color,
    pub muted_text: Color,
    pub tool_icon: Color,
    pub tool_text: Color,
    pub error_label: Color,
    pub error_text: Color,
}

impl ThemePalette {
    fn user_style(self) -> Style {
        Style::default().fg(self.user_fg).bg(self.user_bg)
    }

    fn label_style(self) -> Style {
        Style::default()
            .fg(self.assistant_label)
            .add_modifier(Modifier::BOLD)
    }

    fn body_style(self) -> Style {
        Style::default().fg(self.assistant_text)
    }

    fn thought_style(self) -> Style {
        Style::default()
            .fg(self.thought_text)
            .add_modifier(Modifier::ITALIC)
    }

    fn muted_style(self) -> Style {
        Style::default().fg(self.muted_text)
    }
}

fn push_text_lines(lines: &mut Vec<Line<'static>>, prefix: &str, text: &str, style: Style) {
    for part in text.split('\n') {
        let content = if part.is_empty() { " " } else { part };
        lines.push(Line::from(vec![Span::styled(
            format!("{prefix}{content}"),
            style,
        )]));
    }
}

fn push_tool_lines(
    lines: &mut Vec<Line<'static>>,
    tool: &ToolCallBlock,
    palette: &ThemePalette,
    width: usize,
) {
    let header = truncate_display_width(&tool_label(tool), width.saturating_sub(16).max(8));
    lines.push(Line::from(vec![
        Span::styled(
            format!("  {} ", tool_icon(tool)),
            Style::default().fg(palette.tool_icon),
        ),
        Span::styled(header, Style::default().fg(palette.tool_text)),
        Span::styled(
            format!(" [{}]", status_label(tool.status)),
            palette.muted_style(),
        ),
    ]));
    if let Some(output) = &tool.output {
        let cleaned = sanitize_runtime_text(output);
        for line in cleaned.lines().take(TOOL_OUTPUT_PREVIEW_LINES) {
            lines.push(Line::from(vec![Span::styled(
                format!("    {}", truncate_display_width(line, width.saturating_sub(4))),
                palette.muted_style(),
            )]));
        }
        let hidden = cleaned.lines().count().saturating_sub(TOOL_OUTPUT_PREVIEW_LINES);
        if hidden > 0 {
            lines.push(Line::from(vec![Span::styled(
                format!("    … {hidden} more lines"),
                palette.muted_style(),
            )]));
        }
    }
}

fn plan_marker(status: PlanEntryStatus) -> &'static str {
    match status {
        PlanEntryStatus::Pending => "[ ]",
        PlanEntryStatus::InProgress => "[~]",
        PlanEntryStatus::Completed => "[x]",
    }
}

pub fn render_messages(
    messages: &[Message],
    palette: &ThemePalette,
    width: u16,
) -> Vec<Line<'static>> {
    let width = width.max(1) as usize;
    let mut lines = Vec::new();
    for (idx, message) in messages.iter().enumerate() {
        if idx > 0 {
            lines.push(Line::from(""));
        }
        match message.role {
            Role::User => {
                for block in &message.blocks {
                    match block {
                        ContentBlock::Text { text } => {
                            push_text_lines(&mut lines, "> ", text, palette.user_style())
                        }
                        ContentBlock::Image { mime_type, data } => lines.push(Line::from(vec![
                            Span::styled(
                                format!("> [image {mime_type}, {} bytes encoded]", data.len()),
                                palette.muted_style(),
                            ),
                        ])),
                        _ => {}
                    }
                }
            }
            Role::Assistant => {
                let mut label = vec![Span::styled("[agent]", palette.label_style())];
                if let Some(action) = &message.current_action {
                    label.push(Span::styled(format!(" {action}…"), palette.muted_style()));
                }
                lines.push(Line::from(label));
                for block in &message.blocks {
                    match block {
                        ContentBlock::Thought { text } => {
                            push_text_lines(&mut lines, "  ~ ", text, palette.thought_style())
                        }
                        ContentBlock::Plan { entries } => {
                            for entry in entries {
                                lines.push(Line::from(vec![Span::styled(
                                    format!("  {} {}", plan_marker(entry.status), entry.content),
                                    palette.body_style(),
                                )]));
                            }
                        }
                        ContentBlock::ToolCall(tool) => {
                            push_tool_lines(&mut lines, tool, palette, width)
                        }
                        ContentBlock::Text { text } => {
                            push_text_lines(&mut lines, "", text, palette.body_style())
                        }
                        ContentBlock::Image { mime_type, .. } => lines.push(Line::from(vec![
                            Span::styled(format!("[image {mime_type}]"), palette.muted_style()),
                        ])),
                        ContentBlock::Error {
                            error_type,
                            message,
                            auth_command,
                            agent_id,
                        } => {
                            let tag = match error_type {
                                ErrorType::Auth => "[auth] ",
                                ErrorType::General => "[error] ",
                            };
                            let mut spans = vec![
                                Span::styled(
                                    tag,
                                    Style::default()
                                        .fg(palette.error_label)
                                        .add_modifier(Modifier::BOLD),
                                ),
                                Span::styled(
                                    message.clone(),
                                    Style::default().fg(palette.error_text),
                                ),
                            ];
                            if let Some(agent) = agent_id {
                                spans.push(Span::styled(
                                    format!(" ({agent})"),
                                    palette.muted_style(),
                                ));
                            }
                            lines.push(Line::from(spans));
                            if let Some(cmd) = auth_command {
                                lines.push(Line::from(vec![Span::styled(
                                    format!("  run: {cmd}"),
                                    palette.muted_style(),
                                )]));
                            }
                        }
                    }
                }
            }
        }
    }
    lines
}

pub fn flatten_lines_to_plain(lines: &[Line<'static>]) -> Vec<String> {
    lines.iter().map(flatten_line_to_plain).collect()
}

pub fn flatten_line_to_plain(line: &Line<'static>) -> String {
    let mut out = String::new();
    for span in &line.spans {
        out.push_str(span.content.as_ref());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::update::parse_update_record;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plain(messages: &[Message]) -> Vec<String> {
        let palette = ThemePreset::default().palette();
        flatten_lines_to_plain(&render_messages(messages, &palette, 80))
    }

    #[test]
    fn renders_a_turn() {
        let log: Vec<_> = [
            json!({"sessionUpdate": "user_message", "content": {"type": "text", "text": "list files"}}),
            json!({"sessionUpdate": "tool_call", "toolCallId": "t", "title": "ls", "kind": "execute", "status": "completed", "rawOutput": "\u{1b}[1ma.rs\u{1b}[0m\nb.rs"}),
            json!({"sessionUpdate": "agent_message_chunk", "content": {"type": "text", "text": "Two files."}}),
            json!({"sessionUpdate": "error", "message": "Login required", "errorType": "auth", "authCommand": "agent login"}),
        ]
        .iter()
        .map(parse_update_record)
        .collect();

        assert_eq!(
            plain(&aggregate(&log)),
            vec![
                "> list files",
                "",
                "[agent]",
                "  $ Run ls [done]",
                "    a.rs",
                "    b.rs",
                "Two files.",
                "[auth] Login required",
                "  run: agent login",
            ]
        );
    }

    #[test]
    fn open_turn_shows_current_action_and_plan() {
        let log: Vec<_> = [
            json!({"sessionUpdate": "agent_thought_chunk", "content": {"type": "text", "text": "hmm"}}),
            json!({"sessionUpdate": "plan", "entries": [
                {"content": "step one", "status": "completed"},
                {"content": "step two", "status": "in_progress"}
            ]}),
        ]
        .iter()
        .map(parse_update_record)
        .collect();

        assert_eq!(
            plain(&aggregate(&log)),
            vec![
                "[agent] Planning…",
                "  ~ hmm",
                "  [x] step one",
                "  [~] step two",
            ]
        );
    }

    #[test]
    fn long_tool_output_is_collapsed() {
        let output = (0..10).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let log = vec![parse_update_record(&json!({
            "sessionUpdate": "tool_call", "toolCallId": "t", "title": "cat log", "rawOutput": output
        }))];
        let lines = plain(&aggregate(&log));
        assert_eq!(lines.last().map(String::as_str), Some("    … 4 more lines"));
    }

    #[test]
    fn theme_names_round_trip() {
        for preset in [ThemePreset::Graphite, ThemePreset::Fjord, ThemePreset::Ember] {
            assert_eq!(ThemePreset::parse(preset.as_str()), Some(preset));
        }
        assert_eq!(ThemePreset::parse("nord"), Some(ThemePreset::Fjord));
    }
}
