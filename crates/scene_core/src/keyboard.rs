//! Buttons, inline keyboards and the render payload

use serde::{Deserialize, Serialize};

/// A button as produced by a page, before layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSpec {
    pub label: String,
    /// Opaque callback string; usually produced by the callback codec.
    pub callback: String,
    /// Place this button alone on its own row.
    #[serde(default)]
    pub ignore_row: bool,
    /// Start a new row before placing this button.
    #[serde(default)]
    pub next_line: bool,
}

impl ButtonSpec {
    pub fn new(label: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback: callback.into(),
            ignore_row: false,
            next_line: false,
        }
    }

    pub fn alone(mut self) -> Self {
        self.ignore_row = true;
        self
    }

    pub fn on_next_line(mut self) -> Self {
        self.next_line = true;
        self
    }
}

/// A laid out keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub label: String,
    pub data: String,
}

/// Ordered rows of inline buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl Keyboard {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }
}

/// Lay buttons out in rows of `row_width`.
pub fn layout(buttons: &[ButtonSpec], row_width: usize) -> Keyboard {
    let width = row_width.max(1);
    let mut rows = Vec::new();
    let mut row: Vec<InlineButton> = Vec::new();

    for spec in buttons {
        let button = InlineButton {
            label: spec.label.clone(),
            data: spec.callback.clone(),
        };

        if spec.ignore_row {
            if !row.is_empty() {
                rows.push(std::mem::take(&mut row));
            }
            rows.push(vec![button]);
            continue;
        }

        if spec.next_line && !row.is_empty() {
            rows.push(std::mem::take(&mut row));
        }

        row.push(button);
        if row.len() == width {
            rows.push(std::mem::take(&mut row));
        }
    }

    if !row.is_empty() {
        rows.push(row);
    }
    Keyboard { rows }
}

/// Everything needed to draw one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPayload {
    pub content: String,
    pub buttons: Vec<ButtonSpec>,
    pub image: Option<String>,
    pub row_width: usize,
}

impl RenderPayload {
    pub fn keyboard(&self) -> Keyboard {
        layout(&self.buttons, self.row_width)
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}
