//! Layout and drawing: board (projected tiles + text strip) and sidebar.

use crate::game::{GROWTH_FRAMES, PLAY_HEIGHT, Phase, RenderFeed, TileDraw, WORLD_HALF};
use crate::grid::{CellPos, TileColor};
use crate::input::PLAY_FRACTION;
use crate::model::Mesh;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

const SIDEBAR_WIDTH: u16 = 26;

/// Fade-in of refilled tiles after a compaction.
const REFILL_FADE_MS: u32 = 350;

/// Fade-in of the whole board after a reset.
const RESET_FADE_MS: u32 = 600;

/// Moves text sits at x = 0, score text at this share of the strip width.
const SCORE_TEXT_AT: f32 = 300.0 / 640.0;

/// Static inputs to drawing that don't change per frame.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    pub theme: &'a Theme,
    pub mesh: &'a Mesh,
    pub rows: usize,
    pub cols: usize,
    pub colors: u8,
}

/// What the next fade effect should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FadeTarget {
    Board,
    Cells(Vec<CellPos>),
}

/// TachyonFX fade state carried across frames.
#[derive(Default)]
pub struct FxState {
    pub target: Option<FadeTarget>,
    effect: Option<Effect>,
    last_process: Option<Instant>,
}

impl FxState {
    /// Replace whatever is fading with a new target.
    pub fn start(&mut self, target: FadeTarget) {
        self.target = Some(target);
        self.effect = None;
        self.last_process = None;
    }
}

/// Rows of the board window used by tiles; the rest is the text strip.
fn play_area(window: Rect) -> Rect {
    let play_h = (window.height as f64 * PLAY_FRACTION).floor() as u16;
    let play_h = play_h.min(window.height.saturating_sub(1));
    Rect { height: play_h, ..window }
}

fn world_to_col(x: f32, window: Rect) -> f32 {
    window.x as f32 + (x + WORLD_HALF) / (2.0 * WORLD_HALF) * window.width as f32
}

fn world_to_row(y: f32, window: Rect) -> f32 {
    window.y as f32 + (WORLD_HALF - y) / (2.0 * WORLD_HALF) * window.height as f32
}

/// Terminal rect covered by a tile: its mesh bounds rotated about Y, scaled,
/// translated, and clipped to the play area.
pub fn project_tile(tile: &TileDraw, half: [f32; 3], window: Rect) -> Option<Rect> {
    let (sin, cos) = tile.angle.to_radians().sin_cos();
    let half_w = tile.scale * (cos.abs() * half[0] + sin.abs() * half[2]);
    let half_h = tile.scale * half[1];
    let per_unit_x = window.width as f32 / (2.0 * WORLD_HALF);
    let per_unit_y = window.height as f32 / (2.0 * WORLD_HALF);

    let cx = world_to_col(tile.translation[0], window);
    let cy = world_to_row(tile.translation[1], window);
    let left = (cx - half_w * per_unit_x).round();
    let right = (cx + half_w * per_unit_x).round().max(left + 1.0);
    let top = (cy - half_h * per_unit_y).round();
    let bottom = (cy + half_h * per_unit_y).round().max(top + 1.0);

    let play = play_area(window);
    let left = left.max(play.x as f32);
    let right = right.min(play.right() as f32);
    let top = top.max(play.y as f32);
    let bottom = bottom.min(play.bottom() as f32);
    if right <= left || bottom <= top {
        return None;
    }
    Some(Rect::new(
        left as u16,
        top as u16,
        (right - left) as u16,
        (bottom - top) as u16,
    ))
}

/// Resting slot of a grid cell in terminal cells.
fn slot_rect(pos: CellPos, rows: usize, cols: usize, window: Rect) -> Rect {
    let dx = 2.0 * WORLD_HALF / cols as f32;
    let dy = PLAY_HEIGHT / rows as f32;
    let left = world_to_col(-WORLD_HALF + dx * pos.col as f32, window).round();
    let right = world_to_col(-WORLD_HALF + dx * (pos.col + 1) as f32, window).round();
    let top = world_to_row(WORLD_HALF - dy * pos.row as f32, window).round();
    let bottom = world_to_row(WORLD_HALF - dy * (pos.row + 1) as f32, window).round();
    Rect::new(
        left as u16,
        top as u16,
        (right - left).max(1.0) as u16,
        (bottom - top).max(1.0) as u16,
    )
}

/// Scale an RGB colour's brightness.
fn shade(color: Color, factor: f32) -> Color {
    let (r, g, b) = match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Red => (255, 0, 0),
        Color::Green => (0, 255, 0),
        Color::Yellow => (255, 255, 0),
        Color::Blue => (0, 0, 255),
        Color::Magenta => (255, 0, 255),
        Color::Cyan => (0, 255, 255),
        Color::White => (255, 255, 255),
        _ => (128, 128, 128),
    };
    let scale = |c: u8| (c as f32 * factor).clamp(0.0, 255.0) as u8;
    Color::Rgb(scale(r), scale(g), scale(b))
}

/// Brightness for a tile from its mesh facing (0..=1); pulsing tiles light
/// up with the explosion timer.
fn tile_brightness(tile: &TileDraw, facing: f32, growth_timer: u32) -> f32 {
    let base = 0.65 + 0.35 * facing;
    if tile.pulsing {
        base + 0.6 * growth_timer as f32 / GROWTH_FRAMES as f32
    } else {
        base
    }
}

/// Draw the frame. Returns the board window (tiles + text strip) that
/// pointer positions are mapped against.
pub fn draw(
    frame: &mut Frame,
    feed: &RenderFeed,
    view: &View,
    fx_state: &mut FxState,
    now: Instant,
) -> Rect {
    let area = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Fill(1), Constraint::Length(SIDEBAR_WIDTH)])
        .split(area);
    let window = draw_board(frame, feed, view, chunks[0]);
    draw_sidebar(frame, feed, view, chunks[1]);
    apply_fade(frame, view, window, fx_state, now);
    window
}

fn draw_board(frame: &mut Frame, feed: &RenderFeed, view: &View, area: Rect) -> Rect {
    let theme = view.theme;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .style(Style::default().bg(theme.bg))
        .title(Span::styled(" matchtui ", Style::default().fg(theme.title)));
    let window = block.inner(area);
    block.render(area, frame.buffer_mut());

    let half = view.mesh.bounds.half_extents();
    // Every tile shares one rotation.
    let facing = feed.tiles.first().map_or(1.0, |t| view.mesh.facing(t.angle));
    let buf = frame.buffer_mut();
    for tile in &feed.tiles {
        let Some(rect) = project_tile(tile, half, window) else {
            continue;
        };
        let color = theme.tile_color(tile.color);
        let brightness = tile_brightness(tile, facing, feed.growth_timer);
        let body = Style::default().fg(shade(color, brightness)).bg(theme.bg);
        let rim = Style::default().fg(shade(color, brightness * 1.15)).bg(theme.bg);
        for y in rect.top()..rect.bottom() {
            for x in rect.left()..rect.right() {
                let (symbol, style) = if y == rect.top() && rect.height > 1 {
                    ("▀", rim)
                } else {
                    ("█", body)
                };
                buf[(x, y)].set_symbol(symbol).set_style(style);
            }
        }
    }

    // Text strip: bottom row of the window.
    if window.height > 0 && window.width > 0 {
        let y = window.bottom() - 1;
        let style = Style::default().fg(theme.title).bg(theme.bg);
        let score_x = (window.width as f32 * SCORE_TEXT_AT) as u16;
        buf.set_stringn(window.x, y, &feed.moves_text, score_x.max(1) as usize, style);
        buf.set_stringn(
            window.x + score_x,
            y,
            &feed.score_text,
            (window.width - score_x) as usize,
            style,
        );
    }
    window
}

fn draw_sidebar(frame: &mut Frame, feed: &RenderFeed, view: &View, area: Rect) {
    let theme = view.theme;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);
    let boxed = |title: &'static str| {
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(theme.bg))
            .title(Span::styled(title, title_style))
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Stats
            Constraint::Length(3), // Pulse gauge
            Constraint::Length(3), // Colours
            Constraint::Length(5), // Model
            Constraint::Length(5), // Controls
            Constraint::Fill(1),
        ])
        .split(area);

    let phase_style = match feed.phase {
        Phase::Idle => Style::default().fg(Color::Green),
        Phase::MatchPending => fg_style,
        Phase::Exploding => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        Phase::Settling => Style::default().fg(Color::Cyan),
    };
    let stats = Text::from(vec![
        Line::from(Span::styled(feed.moves_text.as_str(), fg_style)),
        Line::from(Span::styled(feed.score_text.as_str(), fg_style)),
        Line::from(vec![
            Span::styled("State: ", title_style),
            Span::styled(feed.phase.label(), phase_style),
        ]),
    ]);
    Paragraph::new(stats)
        .block(boxed(" Stats "))
        .render(chunks[0], frame.buffer_mut());

    let ratio = (feed.growth_timer as f64 / GROWTH_FRAMES as f64).min(1.0);
    let bar_color = if ratio > 0.6 {
        Color::Red
    } else if ratio > 0.3 {
        Color::Yellow
    } else {
        Color::Green
    };
    Gauge::default()
        .block(boxed(" Pulse "))
        .ratio(ratio)
        .gauge_style(Style::default().fg(bar_color).bg(theme.bg))
        .render(chunks[1], frame.buffer_mut());

    let colours_block = boxed(" Colours ");
    let strip = colours_block.inner(chunks[2]);
    colours_block.render(chunks[2], frame.buffer_mut());
    draw_colour_strip(frame, view, strip);

    let mesh = view.mesh;
    let [hx, hy, hz] = mesh.bounds.half_extents();
    let model_lines = Text::from(vec![
        Line::from(Span::styled(mesh.name.as_str(), fg_style)),
        Line::from(Span::styled(
            format!("{} v  {} n  {} f", mesh.vertices.len(), mesh.normals.len(), mesh.faces.len()),
            fg_style,
        )),
        Line::from(Span::styled(
            format!("{:.2} x {:.2} x {:.2}", hx * 2.0, hy * 2.0, hz * 2.0),
            fg_style,
        )),
    ]);
    Paragraph::new(model_lines)
        .block(boxed(" Model "))
        .render(chunks[3], frame.buffer_mut());

    let help_style = Style::default().fg(theme.inactive_fg);
    let help = Text::from(vec![
        Line::from(Span::styled("click  clear tile", help_style)),
        Line::from(Span::styled("r      reset board", help_style)),
        Line::from(Span::styled("q/esc  quit", help_style)),
    ]);
    Paragraph::new(help)
        .block(boxed(" Controls "))
        .render(chunks[4], frame.buffer_mut());
}

/// One block per colour in play.
fn draw_colour_strip(frame: &mut Frame, view: &View, area: Rect) {
    let block_w = (area.width / view.colors.max(1) as u16).max(1);
    for i in 0..view.colors {
        let x = area.x + i as u16 * block_w;
        if x >= area.right() {
            break;
        }
        let r = Rect {
            x,
            y: area.y,
            width: block_w.min(area.right() - x),
            height: area.height.min(1),
        };
        let c = view.theme.tile_color(TileColor(i));
        Paragraph::new("█".repeat(r.width as usize))
            .style(Style::default().fg(c).bg(view.theme.bg))
            .render(r, frame.buffer_mut());
    }
}

/// Create or advance the fade effect (TachyonFX: fade tiles in from the background).
fn apply_fade(frame: &mut Frame, view: &View, window: Rect, fx_state: &mut FxState, now: Instant) {
    let Some(target) = fx_state.target.as_ref() else {
        return;
    };
    let delta = fx_state
        .last_process
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    fx_state.last_process = Some(now);

    if fx_state.effect.is_none() {
        let bg = view.theme.bg;
        let effect = match target {
            FadeTarget::Board => {
                fx::fade_from(bg, bg, (RESET_FADE_MS, Interpolation::QuadOut)).with_area(window)
            }
            FadeTarget::Cells(cells) => {
                let positions: HashSet<(u16, u16)> = cells
                    .iter()
                    .flat_map(|&pos| {
                        let slot = slot_rect(pos, view.rows, view.cols, window);
                        slot.positions().map(|p| (p.x, p.y)).collect::<Vec<_>>()
                    })
                    .collect();
                let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
                    positions.contains(&(pos.x, pos.y))
                }));
                fx::fade_from(bg, bg, (REFILL_FADE_MS, Interpolation::QuadOut))
                    .with_filter(filter)
                    .with_area(window)
            }
        };
        fx_state.effect = Some(effect);
    }

    if let Some(effect) = fx_state.effect.as_mut() {
        frame.render_effect(effect, window, TfxDuration::from_millis(delta_ms));
        if effect.done() {
            fx_state.effect = None;
            fx_state.target = None;
            fx_state.last_process = None;
        }
    }
}
