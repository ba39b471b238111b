use crate::aggregate::{AggregateOptions, DEFAULT_OUTPUT_LIMIT};
use crate::render::ThemePreset;

const DEFAULT_WIDTH: u16 = 100;

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_output_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_OUTPUT_LIMIT)
}

fn parse_width(raw: Option<&str>) -> u16 {
    raw.and_then(|s| s.parse::<u16>().ok())
        .map(|w| w.clamp(20, 400))
        .unwrap_or(DEFAULT_WIDTH)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub aggregate: AggregateOptions,
    pub theme: ThemePreset,
    pub width: u16,
}

impl Settings {
    /// Reads `ACPVIEW_OUTPUT_LIMIT`, `ACPVIEW_THEME` and `ACPVIEW_WIDTH`,
    /// falling back to defaults for missing or unparsable values.
    pub fn from_env() -> Self {
        let theme = env_value("ACPVIEW_THEME");
        let theme = match theme.as_deref() {
            Some(raw) => ThemePreset::parse(raw).unwrap_or_else(|| {
                tracing::warn!(theme = raw, "unknown theme; using default");
                ThemePreset::default()
            }),
            None => ThemePreset::default(),
        };
        Self {
            aggregate: AggregateOptions {
                output_limit: parse_output_limit(env_value("ACPVIEW_OUTPUT_LIMIT").as_deref()),
                ..AggregateOptions::default()
            },
            theme,
            width: parse_width(env_value("ACPVIEW_WIDTH").as_deref()),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            aggregate: AggregateOptions::default(),
            theme: ThemePreset::default(),
            width: DEFAULT_WIDTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_limit_falls_back_on_bad_values() {
        assert_eq!(parse_output_limit(Some("120")), 120);
        assert_eq!(parse_output_limit(Some("0")), DEFAULT_OUTPUT_LIMIT);
        assert_eq!(parse_output_limit(Some("lots")), DEFAULT_OUTPUT_LIMIT);
        assert_eq!(parse_output_limit(None), DEFAULT_OUTPUT_LIMIT);
    }

    #[test]
    fn width_is_clamped() {
        assert_eq!(parse_width(Some("5")), 20);
        assert_eq!(parse_width(Some("80")), 80);
        assert_eq!(parse_width(None), DEFAULT_WIDTH);
    }
}
