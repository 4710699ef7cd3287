//! App: terminal init, frame loop, key and mouse handling.

use crate::GameConfig;
use crate::game::GameState;
use crate::input::{Action, key_to_action, pointer_to_cell};
use crate::model::Mesh;
use crate::theme::Theme;
use crate::ui::{self, FadeTarget, FxState, View};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

pub struct App {
    config: GameConfig,
    theme: Theme,
    mesh: Mesh,
    state: GameState,
    /// Board window from the last drawn frame; clicks are mapped against it.
    board_area: Rect,
    /// Most recent left click (terminal column, row) since the last tick.
    pending_click: Option<(u16, u16)>,
    fx: FxState,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme, mesh: Mesh) -> Self {
        let state = GameState::new(&config.board);
        Self {
            config,
            theme,
            mesh,
            state,
            board_area: Rect::default(),
            pending_click: None,
            fx: FxState::default(),
        }
    }

    fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.frame_rate.max(1.0))
    }

    fn reset(&mut self) {
        self.state.reset();
        self.pending_click = None;
        if self.config.animation {
            self.fx.start(FadeTarget::Board);
        }
    }

    /// Apply the latest click, if any. Only idle boards take clicks.
    fn apply_click(&mut self) {
        let Some((column, row)) = self.pending_click.take() else {
            return;
        };
        let area = self.board_area;
        let Some(pos) = pointer_to_cell(
            column as f64 - area.x as f64 + 0.5,
            row as f64 - area.y as f64 + 0.5,
            area.width as f64,
            area.height as f64,
            self.config.board.rows,
            self.config.board.cols,
        ) else {
            return;
        };
        if self.state.click(pos) {
            log::debug!("click at {}x{} cleared ({}, {})", column, row, pos.row, pos.col);
        } else {
            log::trace!(
                "click at ({}, {}) ignored: board {}",
                pos.row,
                pos.col,
                self.state.phase().label()
            );
        }
    }

    fn handle_event(&mut self, ev: Event) -> ControlFlow<()> {
        match ev {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key_to_action(key) {
                Action::Quit => return ControlFlow::Break(()),
                Action::Reset => self.reset(),
                Action::None => {}
            },
            Event::Mouse(MouseEvent {
                kind: MouseEventKind::Down(MouseButton::Left),
                column,
                row,
                ..
            }) => self.pending_click = Some((column, row)),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        log::info!(
            "exiting after {} moves, score {}",
            self.state.session.moves,
            self.state.session.score
        );

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = self.frame_duration();
        loop {
            let frame_start = Instant::now();
            self.apply_click();
            let feed = self.state.tick();
            if self.config.animation {
                if let Some(compaction) = &feed.compaction {
                    if !compaction.refilled.is_empty() {
                        self.fx.start(FadeTarget::Cells(compaction.refilled.clone()));
                    }
                }
            }

            let view = View {
                theme: &self.theme,
                mesh: &self.mesh,
                rows: self.config.board.rows,
                cols: self.config.board.cols,
                colors: self.config.board.colors,
            };
            let fx = &mut self.fx;
            let mut board_area = self.board_area;
            terminal.draw(|f| board_area = ui::draw(f, &feed, &view, fx, frame_start))?;
            self.board_area = board_area;

            // Wait out the rest of the frame, handling input as it arrives.
            let deadline = frame_start + frame_duration;
            loop {
                let timeout = deadline.saturating_duration_since(Instant::now());
                if !event::poll(timeout)? {
                    break;
                }
                if self.handle_event(event::read()?).is_break() {
                    return Ok(());
                }
            }
        }
    }
}
