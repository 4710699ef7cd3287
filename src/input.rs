//! Key bindings and pointer → grid cell mapping.

use crate::grid::CellPos;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Share of the window height used by tiles; the rest is the text strip.
pub const PLAY_FRACTION: f64 = 0.95;

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reset,
    Quit,
    None,
}

/// Map key event to game action.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::Quit;
    }
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('r' | 'R') => Action::Reset,
        _ => Action::None,
    }
}

/// Map a pointer position inside a `width × height` window to a grid cell.
///
/// Columns scale linearly over the full width; rows over the top
/// `PLAY_FRACTION` of the height. Points in the text strip clamp to the
/// bottom row. Points outside the window map to nothing.
pub fn pointer_to_cell(
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    rows: usize,
    cols: usize,
) -> Option<CellPos> {
    if width <= 0.0 || height <= 0.0 || x < 0.0 || y < 0.0 || x >= width || y >= height {
        return None;
    }
    let col = (x / width * cols as f64) as usize;
    let row = (y / (height * PLAY_FRACTION) * rows as f64) as usize;
    Some(CellPos::new(row.min(rows - 1), col.min(cols - 1)))
}
