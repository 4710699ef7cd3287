//! Game state: match detection, explosion pulse, gravity compaction and settling.

use crate::grid::{CellPos, Grid, TileColor};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Ticks of explosion pulse before matched tiles are compacted away.
pub const GROWTH_FRAMES: u32 = 50;

/// Extra scale per pulse tick on a matched tile.
const GROWTH_STEP: f32 = 0.01;

/// Minimum run length (and minimum batch size for scoring).
const MIN_MATCH: usize = 3;

/// Degrees of decorative rotation per tick.
const ANGLE_STEP: f32 = 0.5;

/// World units of vertical placement per unit of fall offset.
const FALL_UNIT: f32 = 0.05;

/// World travel per row of shift, before dividing by the board height.
const FALL_TRAVEL: f32 = 20.0;

/// The board lives in the world square [-WORLD_HALF, WORLD_HALF]².
pub const WORLD_HALF: f32 = 10.0;

/// World height used by tiles; the bottom unit is the text strip.
pub const PLAY_HEIGHT: f32 = 19.0;

/// Tile scale numerator; divided by the larger board dimension.
const TILE_SCALE: f32 = 3.5;

/// Tiles sit behind the text layer.
const TILE_DEPTH: f32 = -10.0;

/// Options derived from CLI that affect the board itself.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub rows: usize,
    pub cols: usize,
    pub colors: u8,
    /// Fixed RNG seed; `None` draws one from the OS.
    pub seed: Option<u64>,
}

/// Per-run animation flags and counters. One instance, written once per tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Detection has run for the current stable board.
    pub explosion_checked: bool,
    /// A compaction is draining fall offsets.
    pub sliding: bool,
    /// Some cell is matched (recomputed every tick).
    pub animating: bool,
    /// Pulse counter 0..=GROWTH_FRAMES.
    pub growth_timer: u32,
    pub moves: u32,
    pub score: u32,
    /// Decorative Y rotation in degrees, kept in [0, 360).
    pub angle: f32,
}

impl Session {
    /// Board accepts a click: detection done, nothing exploding or falling.
    pub fn is_idle(&self) -> bool {
        !self.sliding && self.explosion_checked && !self.animating
    }

    pub fn phase(&self) -> Phase {
        if self.sliding {
            Phase::Settling
        } else if self.animating {
            Phase::Exploding
        } else if !self.explosion_checked {
            Phase::MatchPending
        } else {
            Phase::Idle
        }
    }
}

/// Observable engine state. Compaction is a one-shot inside a tick and is
/// reported through `RenderFeed::compaction` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    MatchPending,
    Exploding,
    Settling,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::MatchPending => "matching",
            Self::Exploding => "exploding",
            Self::Settling => "settling",
        }
    }
}

/// What one compact-and-refill pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compaction {
    /// Matched cells removed.
    pub cleared: usize,
    /// Points added to the score (0 for batches under three).
    pub awarded: u32,
    /// Cells that received a fresh random colour.
    pub refilled: Vec<CellPos>,
}

/// Draw request for one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileDraw {
    pub pos: CellPos,
    pub color: TileColor,
    /// Uniform scale, including the explosion pulse.
    pub scale: f32,
    /// World-space translation (x, y, z); y includes the fall shift.
    pub translation: [f32; 3],
    /// Y rotation in degrees.
    pub angle: f32,
    pub pulsing: bool,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFeed {
    pub tiles: Vec<TileDraw>,
    pub moves_text: String,
    pub score_text: String,
    pub phase: Phase,
    pub growth_timer: u32,
    pub compaction: Option<Compaction>,
}

/// Mark every maximal run of >= 3 equal colours in rows and columns.
/// No-op once detection has run for this board or while tiles are falling.
/// Returns true when a pass actually ran.
pub fn detect(grid: &mut Grid, session: &mut Session) -> bool {
    if session.explosion_checked || session.sliding {
        return false;
    }
    let (rows, cols) = (grid.rows(), grid.cols());
    for row in 0..rows {
        mark_runs(grid, (0..cols).map(|col| CellPos::new(row, col)));
    }
    for col in 0..cols {
        mark_runs(grid, (0..rows).map(|row| CellPos::new(row, col)));
    }
    log::debug!("detect: {} cells matched", grid.matched_count());
    session.explosion_checked = true;
    true
}

/// Walk one line keeping a running count of equal colours; mark the run as it grows past two.
fn mark_runs(grid: &mut Grid, line: impl Iterator<Item = CellPos>) {
    let mut run: Vec<CellPos> = Vec::new();
    let mut last: Option<TileColor> = None;
    for pos in line {
        let color = grid[pos].color;
        if last != Some(color) {
            run.clear();
            last = Some(color);
        }
        run.push(pos);
        if run.len() >= MIN_MATCH {
            for &p in &run {
                grid.set_matched(p);
            }
        }
    }
}

/// Fall offset for a tile shifted down by `distance` rows.
pub fn fall_offset_for(distance: usize, rows: usize) -> u32 {
    (distance as f32 * FALL_TRAVEL / (FALL_UNIT * rows as f32)) as u32
}

/// Remove matched cells, shift survivors down each column and refill the top.
///
/// Each column is scanned bottom-up. Nothing moves until the first matched
/// cell; from there on every cell copies the colour `distance` rows above it,
/// where `distance` only grows (past matched cells) on the way up, so
/// surviving tiles keep their relative order.
pub fn compact_and_refill(grid: &mut Grid, session: &mut Session, rng: &mut StdRng) -> Compaction {
    let cleared = grid.matched_count();
    let awarded = if cleared >= MIN_MATCH { cleared as u32 } else { 0 };
    session.score += awarded;
    session.growth_timer = 0;

    let (rows, cols) = (grid.rows(), grid.cols());
    let mut refilled = Vec::new();
    for col in 0..cols {
        let mut shifting = false;
        let mut distance = 1usize;
        for row in (0..rows).rev() {
            let pos = CellPos::new(row, col);
            if !shifting && !grid[pos].matched {
                grid[pos].fall_offset = 0;
                continue;
            }
            shifting = true;
            while distance <= row {
                let src = CellPos::new(row - distance, col);
                if !grid[src].matched {
                    grid[pos].color = grid[src].color;
                    break;
                }
                distance += 1;
            }
            grid[pos].fall_offset = fall_offset_for(distance, rows);
            if distance > row {
                grid[pos].color = grid.random_color(rng);
                refilled.push(pos);
            }
        }
    }

    grid.clear_matched();
    session.animating = false;
    session.sliding = true;
    log::info!(
        "compaction: cleared {} cells, +{} (score {}), {} refilled",
        cleared,
        awarded,
        session.score,
        refilled.len()
    );
    Compaction {
        cleared,
        awarded,
        refilled,
    }
}

/// Inject a click: mark `pos` for clearing if the board is idle.
/// Returns whether the click was accepted.
pub fn click(grid: &mut Grid, session: &mut Session, pos: CellPos) -> bool {
    if !session.is_idle() {
        log::debug!("click at {:?} dropped ({})", pos, session.phase().label());
        return false;
    }
    grid.set_matched(pos);
    session.moves += 1;
    true
}

/// Advance one frame: detect, pulse/compact, drain fall offsets, emit the render feed.
pub fn tick(grid: &mut Grid, session: &mut Session, rng: &mut StdRng) -> RenderFeed {
    detect(grid, session);

    let exploding = grid.matched_count();
    session.animating = exploding > 0;
    let compaction =
        (session.growth_timer == GROWTH_FRAMES).then(|| compact_and_refill(grid, session, rng));
    // Counted before compaction, so the timer leaves a compaction tick at 1
    // and the next pulse runs 1..=GROWTH_FRAMES.
    if exploding > 0 {
        session.growth_timer += 1;
    }

    let (rows, cols) = (grid.rows(), grid.cols());
    let base_scale = TILE_SCALE / rows.max(cols) as f32;
    let pulse = 1.0 + GROWTH_STEP * session.growth_timer as f32;
    let dx = 2.0 * WORLD_HALF / cols as f32;
    let dy = PLAY_HEIGHT / rows as f32;
    let angle = session.angle;

    // Counted before this tick's drain: a cell reaching zero now still moved this frame.
    let settled = grid.settled_count();
    let mut tiles = Vec::with_capacity(grid.len());
    for (pos, cell) in grid.iter_mut() {
        let shift = if cell.fall_offset > 0 {
            let s = FALL_UNIT * cell.fall_offset as f32;
            cell.fall_offset -= 1;
            s
        } else {
            0.0
        };
        let scale = if cell.matched { base_scale * pulse } else { base_scale };
        tiles.push(TileDraw {
            pos,
            color: cell.color,
            scale,
            translation: [
                -WORLD_HALF + dx * (pos.col as f32 + 0.5),
                WORLD_HALF - dy * (pos.row as f32 + 0.5) + shift,
                TILE_DEPTH,
            ],
            angle,
            pulsing: cell.matched,
        });
    }

    // Flags drop one tick after the last offset reaches zero.
    if settled == grid.len() && session.sliding {
        session.explosion_checked = false;
        session.sliding = false;
    }

    session.angle = (session.angle + ANGLE_STEP) % 360.0;

    RenderFeed {
        tiles,
        moves_text: format!("Moves: {}", session.moves),
        score_text: format!("Score: {}", session.score),
        phase: session.phase(),
        growth_timer: session.growth_timer,
        compaction,
    }
}

/// Board, session and RNG for one run.
#[derive(Debug)]
pub struct GameState {
    pub grid: Grid,
    pub session: Session,
    rng: StdRng,
}

impl GameState {
    pub fn new(config: &BoardConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let grid = Grid::new(config.rows, config.cols, config.colors, &mut rng);
        Self {
            grid,
            session: Session::default(),
            rng,
        }
    }

    /// Wrap an existing grid with a fixed seed.
    #[cfg(test)]
    pub fn with_grid(grid: Grid, seed: u64) -> Self {
        Self {
            grid,
            session: Session::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn tick(&mut self) -> RenderFeed {
        tick(&mut self.grid, &mut self.session, &mut self.rng)
    }

    pub fn click(&mut self, pos: CellPos) -> bool {
        click(&mut self.grid, &mut self.session, pos)
    }

    /// Re-randomize the board and clear every counter and flag, whatever is in flight.
    pub fn reset(&mut self) {
        self.grid.reset(&mut self.rng);
        self.session = Session::default();
        log::info!(
            "reset: {}x{} board, {} colours",
            self.grid.rows(),
            self.grid.cols(),
            self.grid.colors()
        );
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(grid: &Grid) -> Vec<CellPos> {
        grid.iter().filter(|(_, c)| c.matched).map(|(p, _)| p).collect()
    }

    /// 3x3 without any run of three.
    fn quiet_board() -> Grid {
        Grid::from_colors(5, &[&[0, 1, 2], &[1, 2, 3], &[2, 3, 4]])
    }

    fn tick_until_compaction(state: &mut GameState) -> Compaction {
        for _ in 0..=2 * GROWTH_FRAMES {
            if let Some(c) = state.tick().compaction {
                return c;
            }
        }
        panic!("no compaction within {} ticks", 2 * GROWTH_FRAMES);
    }

    #[test]
    fn test_detect_marks_top_row_only() {
        let mut grid = Grid::from_colors(5, &[&[0, 0, 0], &[1, 2, 3], &[2, 3, 1]]);
        let mut session = Session::default();
        assert!(detect(&mut grid, &mut session));
        assert_eq!(
            matched(&grid),
            vec![CellPos::new(0, 0), CellPos::new(0, 1), CellPos::new(0, 2)]
        );
        assert!(session.explosion_checked);
    }

    #[test]
    fn test_detect_marks_maximal_run() {
        let mut grid = Grid::from_colors(3, &[&[1, 0, 0, 0, 0, 2]]);
        let mut session = Session::default();
        detect(&mut grid, &mut session);
        let cols: Vec<usize> = matched(&grid).iter().map(|p| p.col).collect();
        assert_eq!(cols, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_detect_ignores_pairs() {
        let mut grid = Grid::from_colors(3, &[&[0, 0, 1, 1, 0, 2, 2]]);
        let mut session = Session::default();
        detect(&mut grid, &mut session);
        assert!(matched(&grid).is_empty());
    }

    #[test]
    fn test_detect_columns_and_crossing_runs() {
        let mut grid = Grid::from_colors(
            4,
            &[&[1, 2, 3], &[0, 0, 0], &[1, 0, 2], &[3, 0, 1]],
        );
        let mut session = Session::default();
        detect(&mut grid, &mut session);
        assert_eq!(
            matched(&grid),
            vec![
                CellPos::new(1, 0),
                CellPos::new(1, 1),
                CellPos::new(1, 2),
                CellPos::new(2, 1),
                CellPos::new(3, 1),
            ]
        );
    }

    #[test]
    fn test_detect_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut grid = Grid::new(9, 7, 3, &mut rng);
        let mut session = Session::default();
        detect(&mut grid, &mut session);
        let once = matched(&grid);
        session.explosion_checked = false;
        detect(&mut grid, &mut session);
        assert_eq!(matched(&grid), once);
    }

    #[test]
    fn test_detect_skipped_while_checked_or_sliding() {
        let mut grid = Grid::from_colors(3, &[&[0, 0, 0]]);
        let mut session = Session {
            sliding: true,
            ..Session::default()
        };
        assert!(!detect(&mut grid, &mut session));
        assert!(matched(&grid).is_empty());
        session.sliding = false;
        session.explosion_checked = true;
        assert!(!detect(&mut grid, &mut session));
        assert!(matched(&grid).is_empty());
    }

    #[test]
    fn test_compaction_bottom_cell_of_column() {
        let mut grid = quiet_board();
        let mut session = Session {
            growth_timer: GROWTH_FRAMES,
            ..Session::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        grid.set_matched(CellPos::new(2, 2));
        let report = compact_and_refill(&mut grid, &mut session, &mut rng);

        let expected = fall_offset_for(1, 3);
        assert_eq!(expected, 133);
        assert_eq!(grid[CellPos::new(2, 2)].color, TileColor(3));
        assert_eq!(grid[CellPos::new(1, 2)].color, TileColor(2));
        for row in 0..3 {
            assert_eq!(grid[CellPos::new(row, 2)].fall_offset, expected);
            assert_eq!(grid[CellPos::new(row, 0)].fall_offset, 0);
            assert_eq!(grid[CellPos::new(row, 1)].fall_offset, 0);
        }
        assert_eq!(report.refilled, vec![CellPos::new(0, 2)]);
        assert_eq!(report.cleared, 1);
        assert_eq!(report.awarded, 0);
        assert_eq!(session.score, 0);
        assert_eq!(session.growth_timer, 0);
        assert!(session.sliding);
        assert!(matched(&grid).is_empty());
    }

    #[test]
    fn test_compaction_preserves_order_of_survivors() {
        let mut grid = Grid::from_colors(5, &[&[0], &[1], &[2], &[3], &[4]]);
        grid.set_matched(CellPos::new(1, 0));
        grid.set_matched(CellPos::new(3, 0));
        let mut session = Session::default();
        let mut rng = StdRng::seed_from_u64(9);
        let report = compact_and_refill(&mut grid, &mut session, &mut rng);

        let colors: Vec<u8> = (2..5).map(|r| grid[CellPos::new(r, 0)].color.0).collect();
        assert_eq!(colors, vec![0, 2, 4]);
        assert_eq!(report.refilled, vec![CellPos::new(1, 0), CellPos::new(0, 0)]);
        assert_eq!(grid[CellPos::new(4, 0)].fall_offset, 0);
        assert_eq!(grid[CellPos::new(3, 0)].fall_offset, fall_offset_for(1, 5));
        for row in 0..3 {
            assert_eq!(grid[CellPos::new(row, 0)].fall_offset, fall_offset_for(2, 5));
        }
    }

    #[test]
    fn test_line_clear_scores_batch() {
        let grid = Grid::from_colors(5, &[&[0, 0, 0], &[1, 2, 3], &[2, 3, 1]]);
        let mut state = GameState::with_grid(grid, 11);
        let report = tick_until_compaction(&mut state);
        assert_eq!(report.cleared, 3);
        assert_eq!(report.awarded, 3);
        assert_eq!(state.session.score, 3);
        assert_eq!(report.refilled.len(), 3);
    }

    #[test]
    fn test_pulse_runs_for_growth_frames() {
        let grid = Grid::from_colors(5, &[&[0, 0, 0], &[1, 2, 3], &[2, 3, 1]]);
        let mut state = GameState::with_grid(grid, 11);
        for n in 1..=GROWTH_FRAMES {
            let feed = state.tick();
            assert!(feed.compaction.is_none());
            assert_eq!(feed.growth_timer, n);
            assert_eq!(feed.phase, Phase::Exploding);
        }
        assert!(state.tick().compaction.is_some());
    }

    #[test]
    fn test_pulse_timer_carries_into_next_cycle() {
        let grid = Grid::from_colors(5, &[&[0, 0, 0], &[1, 2, 3], &[2, 3, 1]]);
        let mut state = GameState::with_grid(grid, 11);
        let first = tick_until_compaction(&mut state);
        assert_eq!(first.cleared, 3);
        assert_eq!(state.session.growth_timer, 1);
        while state.session.sliding {
            state.tick();
        }
        assert_eq!(state.session.growth_timer, 1);

        // Swap in a board with no runs so the next cycle comes from a click alone.
        state.grid = quiet_board();
        state.tick();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.click(CellPos::new(0, 0)));
        for n in 2..=GROWTH_FRAMES {
            let feed = state.tick();
            assert!(feed.compaction.is_none());
            assert_eq!(feed.growth_timer, n);
        }
        let second = state.tick().compaction.expect("second cycle compacts");
        assert_eq!(second.cleared, 1);
    }

    #[test]
    fn test_click_clear_does_not_score() {
        let mut state = GameState::with_grid(quiet_board(), 5);
        state.tick();
        assert!(state.click(CellPos::new(1, 1)));
        let report = tick_until_compaction(&mut state);
        assert_eq!(report.cleared, 1);
        assert_eq!(report.awarded, 0);
        assert_eq!(state.session.score, 0);
        assert_eq!(state.session.moves, 1);
    }

    #[test]
    fn test_click_gated_by_idle_predicate() {
        let mut state = GameState::with_grid(quiet_board(), 5);
        // Detection has not run yet.
        assert!(!state.click(CellPos::new(2, 1)));
        assert_eq!(state.session.moves, 0);

        state.tick();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.click(CellPos::new(2, 1)));
        assert!(state.grid[CellPos::new(2, 1)].matched);
        assert_eq!(state.session.moves, 1);

        // Exploding.
        state.tick();
        assert!(!state.click(CellPos::new(0, 0)));
        assert!(!state.grid[CellPos::new(0, 0)].matched);

        // Settling.
        tick_until_compaction(&mut state);
        assert!(state.session.sliding);
        assert!(!state.click(CellPos::new(0, 0)));
        assert_eq!(state.session.moves, 1);
    }

    #[test]
    fn test_flags_drop_one_tick_after_settled() {
        let mut state = GameState::with_grid(quiet_board(), 5);
        state.tick();
        state.click(CellPos::new(2, 0));
        tick_until_compaction(&mut state);
        let mut guard = 0;
        while state.grid.settled_count() < state.grid.len() {
            assert!(state.session.sliding);
            assert!(state.session.explosion_checked);
            state.tick();
            guard += 1;
            assert!(guard < 1000, "fall offsets never drained");
        }
        assert!(state.session.sliding);
        state.tick();
        assert!(!state.session.sliding);
        assert!(!state.session.explosion_checked);
        assert_eq!(state.phase(), Phase::MatchPending);
    }

    #[test]
    fn test_feed_geometry() {
        let mut state = GameState::with_grid(Grid::from_colors(5, &[&[0, 0, 0], &[1, 2, 3]]), 1);
        let feed = state.tick();
        assert_eq!(feed.tiles.len(), 6);
        assert_eq!(feed.moves_text, "Moves: 0");
        assert_eq!(feed.score_text, "Score: 0");

        let base = 3.5 / 3.0;
        let plain = feed.tiles[4];
        assert_eq!(plain.pos, CellPos::new(1, 1));
        assert!(!plain.pulsing);
        assert!((plain.scale - base).abs() < 1e-6);
        assert!((plain.translation[0] - 0.0).abs() < 1e-5);
        assert!((plain.translation[1] - (10.0 - 9.5 * 1.5)).abs() < 1e-5);
        assert_eq!(plain.translation[2], -10.0);

        let hot = feed.tiles[0];
        assert!(hot.pulsing);
        assert!((hot.scale - base * 1.01).abs() < 1e-6);
    }

    #[test]
    fn test_angle_advances_and_resets() {
        let mut state = GameState::with_grid(quiet_board(), 2);
        for _ in 0..4 {
            state.tick();
        }
        assert!((state.session.angle - 2.0).abs() < 1e-6);
        state.session.angle = 359.75;
        state.tick();
        assert!(state.session.angle < 1.0);
        state.reset();
        assert_eq!(state.session.angle, 0.0);
    }

    #[test]
    fn test_reset_mid_animation() {
        let grid = Grid::from_colors(5, &[&[0, 0, 0], &[1, 2, 3], &[2, 3, 1]]);
        let mut state = GameState::with_grid(grid, 4);
        for _ in 0..10 {
            state.tick();
        }
        state.session.moves = 4;
        state.session.score = 9;
        state.reset();
        assert_eq!(state.session, Session::default());
        assert!(state.grid.iter().all(|(_, c)| !c.matched && c.fall_offset == 0));
        assert_eq!(state.phase(), Phase::MatchPending);
    }

    #[test]
    fn test_no_pulse_without_matches() {
        let mut state = GameState::with_grid(quiet_board(), 2);
        for _ in 0..GROWTH_FRAMES + 5 {
            let feed = state.tick();
            assert!(feed.compaction.is_none());
        }
        assert_eq!(state.session.growth_timer, 0);
        assert_eq!(state.phase(), Phase::Idle);
    }
}
