use crate::fonts::FontMetrics;
use crate::model::Alignment;

#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub width: f32,
}

/// Text wrapped to a fixed width in one font and size.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
    pub line_height: f32,
}

impl TextBlock {
    pub fn layout(text: &str, metrics: &FontMetrics, font_size: f32, max_width: f32) -> Self {
        TextBlock {
            lines: wrap_text(text, metrics, font_size, max_width),
            line_height: metrics.line_height(font_size),
        }
    }

    pub fn height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height
    }

    /// Keep only the lines that fit in `max_height`. Returns true if any
    /// line was dropped.
    pub fn clip_to(&mut self, max_height: f32) -> bool {
        let keep = if self.line_height > 0.0 {
            (max_height / self.line_height).floor().max(0.0) as usize
        } else {
            self.lines.len()
        };
        if keep < self.lines.len() {
            self.lines.truncate(keep);
            true
        } else {
            false
        }
    }
}

/// Greedy word wrap. Explicit newlines start a new line; words wider than
/// `max_width` are broken between characters. Empty text yields no lines.
pub fn wrap_text(text: &str, metrics: &FontMetrics, font_size: f32, max_width: f32) -> Vec<TextLine> {
    let space_w = metrics.text_width(" ", font_size);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_w = 0.0f32;

        for word in paragraph.split_whitespace() {
            let word_w = metrics.text_width(word, font_size);
            let proposed = if current.is_empty() {
                word_w
            } else {
                current_w + space_w + word_w
            };
            if proposed <= max_width {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                current_w = proposed;
                continue;
            }

            if !current.is_empty() {
                lines.push(TextLine {
                    text: std::mem::take(&mut current),
                    width: current_w,
                });
                current_w = 0.0;
            }
            if word_w <= max_width {
                current.push_str(word);
                current_w = word_w;
            } else {
                for ch in word.chars() {
                    let ch_w = metrics.char_width_1000(ch) * font_size / 1000.0;
                    if !current.is_empty() && current_w + ch_w > max_width {
                        lines.push(TextLine {
                            text: std::mem::take(&mut current),
                            width: current_w,
                        });
                        current_w = 0.0;
                    }
                    current.push(ch);
                    current_w += ch_w;
                }
            }
        }

        if !current.is_empty() {
            lines.push(TextLine {
                text: current,
                width: current_w,
            });
        }
    }
    lines
}

/// X of a line of `line_width` inside the box `[left, left + width]`,
/// keeping `padding` clear on the aligned side. Lines wider than the box
/// start at the left padding.
pub fn aligned_x(alignment: Alignment, left: f32, width: f32, line_width: f32, padding: f32) -> f32 {
    let x = match alignment {
        Alignment::Left => left + padding,
        Alignment::Center => left + (width - line_width) / 2.0,
        Alignment::Right => left + width - padding - line_width,
    };
    x.max(left + padding)
}
