//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.
//! Tile colour variants are looked up here by index; the grid never sees a Color.

use crate::grid::{MAX_COLORS, TileColor};
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// One Dark tile colours in variant order: red, green, blue, yellow, turquoise, magenta.
const ONEDARK_TILES: [Color; MAX_COLORS as usize] = [
    Color::Rgb(0xE0, 0x6C, 0x75),
    Color::Rgb(0x98, 0xC3, 0x79),
    Color::Rgb(0x61, 0xAF, 0xEF),
    Color::Rgb(0xE5, 0xC0, 0x7B),
    Color::Rgb(0x56, 0xB6, 0xC2),
    Color::Rgb(0xC6, 0x78, 0xDD),
];

const HIGH_CONTRAST_TILES: [Color; MAX_COLORS as usize] = [
    Color::Rgb(0xFF, 0x00, 0x00),
    Color::Rgb(0x00, 0xFF, 0x00),
    Color::Rgb(0x00, 0x88, 0xFF),
    Color::Rgb(0xFF, 0xFF, 0x00),
    Color::Rgb(0x00, 0xFF, 0xFF),
    Color::Rgb(0xFF, 0x00, 0xFF),
];

/// Avoids leaning on red/green alone.
const COLORBLIND_TILES: [Color; MAX_COLORS as usize] = [
    Color::Rgb(0xCC, 0x33, 0x11),
    Color::Rgb(0x00, 0x99, 0x88),
    Color::Rgb(0x00, 0x77, 0xBB),
    Color::Rgb(0xEE, 0x77, 0x33),
    Color::Rgb(0xBB, 0xBB, 0x00),
    Color::Rgb(0xEE, 0x33, 0x77),
];

/// Theme keys tried (in order) for each tile variant.
const TILE_KEYS: [&[&str]; MAX_COLORS as usize] = [
    &["cpu_end", "temp_end"],
    &["mem_box", "cpu_start"],
    &["cpu_box"],
    &["title", "cpu_mid"],
    &["hi_fg", "proc_misc"],
    &["net_box"],
];

/// Tile render handles and UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Tile colour per variant index.
    pub tiles: [Color; MAX_COLORS as usize],
    /// Board background.
    pub bg: Color,
    /// Borders.
    pub div_line: Color,
    /// Text (moves, score).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text (controls help).
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    pub fn onedark_default() -> Self {
        Self {
            tiles: ONEDARK_TILES,
            bg: Color::Rgb(0x28, 0x2C, 0x34),
            div_line: Color::Rgb(0x3F, 0x44, 0x4F),
            main_fg: Color::Rgb(0xAB, 0xB2, 0xBF),
            title: Color::Rgb(0xE5, 0xC0, 0x7B),
            inactive_fg: Color::Rgb(0x5C, 0x63, 0x70),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file does not exist.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => {
                let s = std::fs::read_to_string(p)?;
                let theme = Self::from_map(&parse_theme_file(&s));
                log::info!("theme loaded from {}", p.display());
                theme
            }
            Some(p) => {
                log::warn!("theme file {} not found, using defaults", p.display());
                Self::default()
            }
            None => Self::default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Override tile colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => self.tiles = HIGH_CONTRAST_TILES,
            crate::Palette::Colorblind => self.tiles = COLORBLIND_TILES,
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        let defaults = Self::onedark_default();
        let mut tiles = defaults.tiles;
        for (slot, keys) in tiles.iter_mut().zip(TILE_KEYS) {
            if let Some(c) = keys.iter().find_map(|k| get(*k)) {
                *slot = c;
            }
        }
        Self {
            tiles,
            bg: get("main_bg").unwrap_or(defaults.bg),
            div_line: get("div_line").unwrap_or(defaults.div_line),
            main_fg: get("main_fg").unwrap_or(defaults.main_fg),
            title: get("title").unwrap_or(defaults.title),
            inactive_fg: get("inactive_fg").unwrap_or(defaults.inactive_fg),
        }
    }

    /// Render colour for a tile variant.
    #[inline]
    pub fn tile_color(&self, color: TileColor) -> Color {
        self.tiles[color.index() % self.tiles.len()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let rest = line.strip_prefix("theme[")?;
            let (key, rest) = rest.split_once(']')?;
            let (_, value) = rest.split_once('=')?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (!value.is_empty()).then(|| (key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let digits = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|d| u8::from_str_radix(d, 16).ok())
            .ok_or_else(invalid)
    };
    match digits.len() {
        6 => Ok(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => Ok(Color::Rgb(
            channel(0..1)? * 17,
            channel(1..2)? * 17,
            channel(2..3)? * 17,
        )),
        _ => Err(invalid()),
    }
}
