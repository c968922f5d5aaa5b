use serde::{Deserialize, Serialize};

/// What a measurer knows about how a label will be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub css_classes: String,
    pub font_size: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            css_classes: String::new(),
            font_size: 10.0,
        }
    }
}

impl TextStyle {
    pub fn with_classes(css_classes: impl Into<String>) -> Self {
        Self {
            css_classes: css_classes.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
}

pub trait TextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics;
}

/// Rule of thumb: every character is `char_width` wide, every label `line_height` tall.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOfThumbMeasurer {
    pub char_width: f64,
    pub line_height: f64,
}

impl Default for RuleOfThumbMeasurer {
    fn default() -> Self {
        Self {
            char_width: 10.0,
            line_height: 10.0,
        }
    }
}

impl TextMeasurer for RuleOfThumbMeasurer {
    fn measure(&self, text: &str, _style: &TextStyle) -> TextMetrics {
        TextMetrics {
            width: self.char_width * text.chars().count() as f64,
            height: self.line_height,
        }
    }
}

/// Multi-line estimate scaled by font size; `<br>` variants and `\n` break lines.
#[derive(Debug, Clone, Default)]
pub struct DeterministicTextMeasurer {
    pub char_width_factor: f64,
    pub line_height_factor: f64,
}

impl DeterministicTextMeasurer {
    pub fn normalized_text_lines(text: &str) -> Vec<String> {
        text.replace("<br/>", "\n")
            .replace("<br />", "\n")
            .replace("<br>", "\n")
            .split('\n')
            .map(str::to_string)
            .collect()
    }
}

impl TextMeasurer for DeterministicTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let char_width_factor = if self.char_width_factor == 0.0 {
            0.6
        } else {
            self.char_width_factor
        };
        let line_height_factor = if self.line_height_factor == 0.0 {
            1.2
        } else {
            self.line_height_factor
        };

        let lines = Self::normalized_text_lines(text);
        let font_size = style.font_size.max(1.0);
        let max_chars = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        TextMetrics {
            width: max_chars as f64 * font_size * char_width_factor,
            height: lines.len() as f64 * font_size * line_height_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_of_thumb_counts_characters() {
        let m = RuleOfThumbMeasurer::default().measure("héllo", &TextStyle::default());
        assert_eq!((m.width, m.height), (50.0, 10.0));
    }

    #[test]
    fn deterministic_measurer_breaks_lines() {
        let measurer = DeterministicTextMeasurer::default();
        let style = TextStyle::default();
        let one = measurer.measure("abcd", &style);
        let two = measurer.measure("abcd<br>ab", &style);
        assert_eq!(one.width, two.width);
        assert!((two.height - 2.0 * one.height).abs() < 1e-9);
    }
}
