//! CLI entry point for the board renderer

use board_renderer::host::HostTree;
use board_renderer::models::{PieceColor, PieceKind};
use board_renderer::overlay::{draw_screen_annotations, layout_screen, parse_annotations};
use board_renderer::pieces::IconSet;
use board_renderer::settings::Settings;
use board_renderer::{extractor, output, BoardMirror, Error, Result};
use clap::{Args, Parser, Subcommand};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "board-renderer")]
#[command(about = "Render a mirrored 3D chess board from a host board snapshot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Input {
    /// Host board snapshot (JSON)
    snapshot: PathBuf,

    /// Persisted settings object (JSON). Missing keys keep their defaults.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Directory of piece icons named like `wK.png`, `bN.png`
    #[arg(long)]
    icons: Option<PathBuf>,

    /// Annotation command, e.g. `-e2e4,d5`
    #[arg(short, long, allow_hyphen_values = true)]
    annotate: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one frame to PNG
    Render {
        #[command(flatten)]
        input: Input,

        #[arg(short, long, default_value = "board.png")]
        output: PathBuf,

        /// Animation clock in ms, for hover phase
        #[arg(short, long, default_value = "0")]
        time: f64,

        /// Draw the frame over a flat board instead of transparency
        #[arg(long)]
        backdrop: bool,
    },
    /// Render a hover animation to GIF
    Animate {
        #[command(flatten)]
        input: Input,

        #[arg(short, long, default_value = "board.gif")]
        output: PathBuf,

        #[arg(long, default_value = "60")]
        frames: u32,

        #[arg(long, default_value = "30")]
        fps: u32,
    },
    /// Print the pieces found in a snapshot
    List {
        snapshot: PathBuf,
    },
}

fn read_snapshot(path: &Path) -> Result<HostTree> {
    HostTree::from_json(&std::fs::read_to_string(path)?)
}

fn load_icons(dir: &Path, mirror: &mut BoardMirror) -> Result<()> {
    for color in [PieceColor::White, PieceColor::Black] {
        for kind in PieceKind::ALL {
            let tag = if color.is_white() { 'w' } else { 'b' };
            let path = dir.join(format!("{}{}.png", tag, kind.letter()));
            if !path.exists() {
                continue;
            }
            mirror.set_icon_png(color, kind, &std::fs::read(&path)?)?;
        }
    }
    Ok(())
}

fn prepare(input: &Input) -> Result<(BoardMirror, HostTree)> {
    let settings = match &input.settings {
        Some(path) => Settings::from_json(&std::fs::read_to_string(path)?)?,
        None => Settings {
            custom_board_enabled: true,
            parallax_index: 3,
            ..Settings::default()
        },
    };
    let tree = read_snapshot(&input.snapshot)?;

    let mut mirror = BoardMirror::new(settings, IconSet::procedural(128));
    if let Some(dir) = &input.icons {
        load_icons(dir, &mut mirror)?;
    }
    mirror.on_mutation(&tree, 0.0);
    if let Some(command) = &input.annotate {
        annotate(&mut mirror, command)?;
    }
    Ok((mirror, tree))
}

fn annotate(mirror: &mut BoardMirror, command: &str) -> Result<()> {
    if !mirror.set_annotation(command) {
        return Err(Error::Parse(format!(
            "'{}' is not an annotation command, expected a leading '-'",
            command
        )));
    }
    Ok(())
}

/// Flat board with the annotations drawn in 2D, for settings that need no 3D.
fn flat_render(mirror: &BoardMirror, tree: &HostTree, command: Option<&str>) -> Result<RgbaImage> {
    let extraction = extractor::extract(tree)
        .ok_or_else(|| Error::InvalidData("snapshot has no board".to_string()))?;
    let size = extraction.board_size.round() as u32;
    let mut image = output::flat_board(size);
    let annotations = command.and_then(parse_annotations).unwrap_or_default();
    let layout = layout_screen(&annotations, extraction.board_size, mirror.state().flipped);
    draw_screen_annotations(&mut image, &layout);
    Ok(image)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Render {
            input,
            output: path,
            time,
            backdrop,
        } => {
            let (mut mirror, tree) = prepare(&input)?;
            let image = if mirror.is_active() {
                let frame = mirror
                    .render_at(time)
                    .cloned()
                    .ok_or_else(|| Error::InvalidData("nothing was rendered".to_string()))?;
                if backdrop {
                    output::composite_over(&output::flat_board(frame.width()), &frame)?
                } else {
                    frame
                }
            } else {
                info!("settings need no 3D board, drawing a flat board");
                flat_render(&mirror, &tree, input.annotate.as_deref())?
            };
            output::export_png(&image, &path)?;
            info!(path = %path.display(), "rendered");
        }
        Command::Animate {
            input,
            output: path,
            frames,
            fps,
        } => {
            let (mut mirror, _) = prepare(&input)?;
            if !mirror.is_active() {
                return Err(Error::InvalidData(
                    "settings need no 3D board, nothing to animate".to_string(),
                ));
            }
            if !mirror.is_animating() {
                warn!("hover is off, every frame will be identical");
            }
            let step = 1000.0 / fps.max(1) as f64;
            let mut images = Vec::with_capacity(frames as usize);
            for i in 0..frames {
                if let Some(frame) = mirror.render_at(i as f64 * step) {
                    images.push(frame.clone());
                }
            }
            output::export_gif(&images, &path, step.round() as u16)?;
            info!(path = %path.display(), frames = images.len(), "animated");
        }
        Command::List { snapshot } => {
            let tree = read_snapshot(&snapshot)?;
            let extraction = extractor::extract(&tree)
                .ok_or_else(|| Error::InvalidData("snapshot has no board".to_string()))?;
            println!("{} at the bottom", extraction.player.as_str());
            for ((color, kind), squares) in extractor::group_by_color_and_kind(&extraction.facts) {
                let names: Vec<String> = squares.iter().map(|s| s.to_string()).collect();
                println!("{} {}: {}", color.as_str(), kind.as_str(), names.join(", "));
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}
