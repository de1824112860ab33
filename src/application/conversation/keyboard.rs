//! Inline keyboard layout

use crate::domain::traits::KeyboardButton;

/// Lay out buttons in rows of `per_row`, with optional single-button rows on top and bottom.
/// There is always at least one (possibly empty) row for the main buttons.
pub fn make_inline_keyboard(
    buttons: Vec<KeyboardButton>,
    per_row: usize,
    top: Option<KeyboardButton>,
    bottom: Option<KeyboardButton>,
) -> Vec<Vec<KeyboardButton>> {
    let per_row = per_row.max(1);
    let mut rows: Vec<Vec<KeyboardButton>> = Vec::new();

    if let Some(button) = top {
        rows.push(vec![button]);
    }

    if buttons.is_empty() {
        rows.push(Vec::new());
    } else {
        let mut iter = buttons.into_iter().peekable();
        while iter.peek().is_some() {
            rows.push(iter.by_ref().take(per_row).collect());
        }
    }

    if let Some(button) = bottom {
        rows.push(vec![button]);
    }

    rows
}

/// Button whose callback data is its own identifier
pub fn button(text: impl Into<String>, data: impl Into<String>) -> KeyboardButton {
    KeyboardButton::new(text).with_callback(data)
}
