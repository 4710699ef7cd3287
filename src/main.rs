//! matchtui: match-3 tile puzzle in the terminal.

mod app;
mod game;
mod grid;
mod input;
mod model;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use game::BoardConfig;
use grid::{MAX_COLORS, MIN_COLORS};
use model::Mesh;
use simplelog::{LevelFilter, WriteLogger};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Options derived from CLI that affect the front end.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub board: BoardConfig,
    /// Target frames (and engine ticks) per second.
    pub frame_rate: f64,
    /// Fade effects on refill and reset.
    pub animation: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path, args.log_level.into())?;
    }

    // A broken model is fatal; report it before the terminal goes raw.
    let mesh = Mesh::load(&args.model)
        .with_context(|| format!("failed to load model {}", args.model.display()))?;

    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|err| {
        log::warn!("theme: {err}, using defaults");
        theme::Theme::default()
    });
    let config = GameConfig {
        board: BoardConfig {
            rows: args.rows as usize,
            cols: args.cols as usize,
            colors: args.colors,
            seed: args.seed,
        },
        frame_rate: args.frame_rate,
        animation: !args.no_animation,
    };
    log::info!(
        "starting {}x{} board, {} colours, seed {:?}",
        args.rows,
        args.cols,
        args.colors,
        args.seed
    );
    let mut app = App::new(config, theme, mesh);
    app.run()?;
    Ok(())
}

fn init_logging(path: &Path, level: LevelFilter) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    WriteLogger::init(
        level,
        simplelog::ConfigBuilder::new()
            .set_target_level(LevelFilter::Error)
            .build(),
        file,
    )
    .context("logger already initialised")?;
    Ok(())
}

/// Match-3 tile puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "matchtui",
    version,
    about = "Match-3 tile puzzle in the terminal. Runs of three or more equal tiles explode; tiles above fall into the gaps.",
    long_about = "matchtui renders a ROWS x COLS board of rotating tiles shaped by an OBJ model.\n\n\
        Runs of three or more equal colours in a row or column pulse, explode and score. \
        Tiles above fall down and new tiles drop in from the top.\n\n\
        When the board is idle, click a tile to blow it up on its own (costs a move, scores nothing).\n\n\
        CONTROLS:\n  Left click  Clear tile   R  Reset board   Q / Esc  Quit"
)]
pub struct Args {
    /// Board height in tiles.
    #[arg(value_name = "ROWS", value_parser = clap::value_parser!(u16).range(1..))]
    pub rows: u16,

    /// Board width in tiles.
    #[arg(value_name = "COLS", value_parser = clap::value_parser!(u16).range(1..))]
    pub cols: u16,

    /// Tile model (Wavefront OBJ, triangles with per-vertex normals).
    #[arg(value_name = "MODEL")]
    pub model: PathBuf,

    /// Number of tile colours.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range((MIN_COLORS as i64)..=(MAX_COLORS as i64)))]
    pub colors: u8,

    /// Fixed random seed (same seed, same boards).
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Target frames per second; the board advances one step per frame.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Disable fade effects on refill and reset.
    #[arg(long)]
    pub no_animation: bool,

    /// Write logs to this file (nothing is logged otherwise).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log verbosity for --log-file.
    #[arg(long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}
