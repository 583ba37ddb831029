//! Recording surface. Layout code pushes drawing operations here in
//! top-left page coordinates; serialization to PDF happens afterwards.

use crate::assets::AssetSlot;
use crate::config::Rgb;
use crate::fonts::FontRole;
use crate::geometry::Rect;

#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    FillRect { rect: Rect, color: Rgb },
    StrokeRect { rect: Rect, color: Rgb, width: f32 },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        color: Rgb,
        width: f32,
    },
    /// One line of text. `top` is the top of the line box; the baseline is
    /// derived from the font's ascent when serialized.
    Text {
        text: String,
        x: f32,
        top: f32,
        font: FontRole,
        size: f32,
        color: Rgb,
    },
    Image { slot: AssetSlot, rect: Rect },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayList {
    pages: Vec<Vec<DrawOp>>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new page; later operations land on it.
    pub fn begin_page(&mut self) {
        self.pages.push(Vec::new());
    }

    pub fn push(&mut self, op: DrawOp) {
        if self.pages.is_empty() {
            self.begin_page();
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(op);
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Vec<DrawOp>] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> &[DrawOp] {
        self.pages.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Text drawn on page `index` (0-based), in drawing order.
    pub fn texts(&self, index: usize) -> impl Iterator<Item = &str> {
        self.page(index).iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn line(&mut self, from: (f32, f32), to: (f32, f32)) {
        self.push(DrawOp::Line {
            from,
            to,
            color: Rgb::BLACK,
            width: 1.0,
        });
    }

    pub fn text(&mut self, text: impl Into<String>, x: f32, top: f32, font: FontRole, size: f32) {
        self.text_colored(text, x, top, font, size, Rgb::BLACK);
    }

    pub fn text_colored(
        &mut self,
        text: impl Into<String>,
        x: f32,
        top: f32,
        font: FontRole,
        size: f32,
        color: Rgb,
    ) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.push(DrawOp::Text {
            text,
            x,
            top,
            font,
            size,
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_land_on_the_current_page() {
        let mut list = DisplayList::new();
        list.text("first", 0.0, 0.0, FontRole::Regular, 10.0);
        list.begin_page();
        list.text("second", 0.0, 0.0, FontRole::Bold, 10.0);
        list.text("", 0.0, 0.0, FontRole::Bold, 10.0);
        assert_eq!(list.page_count(), 2);
        assert_eq!(list.texts(0).collect::<Vec<_>>(), ["first"]);
        assert_eq!(list.texts(1).collect::<Vec<_>>(), ["second"]);
        assert!(list.page(5).is_empty());
    }
}
