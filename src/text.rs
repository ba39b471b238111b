use serde_json::Value;
use unicode_width::UnicodeWidthChar;

/// Marker appended to tool output cut at the display ceiling.
pub const TRUNCATION_MARKER: &str = "…";

/// Strips terminal escape sequences and stray control characters from tool
/// output before it is shown.
pub fn sanitize_runtime_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_escape = false;
    let mut in_csi = false;
    let mut after_cr = false;

    for ch in text.chars() {
        if in_escape {
            if in_csi {
                // CSI sequence terminates at bytes in range 0x40..0x7E.
                if ('@'..='~').contains(&ch) {
                    in_escape = false;
                    in_csi = false;
                }
                continue;
            }
            if ch == '[' {
                in_csi = true;
                continue;
            }
            in_escape = false;
            continue;
        }

        let was_cr = std::mem::replace(&mut after_cr, ch == '\r');
        match ch {
            '\u{1b}' => in_escape = true,
            '\r' => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            '\n' if was_cr => {}
            '\n' | '\t' => out.push(ch),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out
}

/// Cuts `text` to at most `limit` characters, appending [`TRUNCATION_MARKER`]
/// when anything was dropped.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

pub fn truncate_display_width(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + cw > max_width {
            break;
        }
        out.push(ch);
        used += cw;
    }
    out
}

/// Display form of a raw tool input/output value: strings verbatim,
/// structured values pretty-printed, empty values dropped.
pub fn format_raw_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) if map.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        other => serde_json::to_string_pretty(other).ok(),
    }
}
