use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::{ColorSpaceMode, GpuPowerPreference, ImageSource, RenderState};

#[derive(Parser, Debug)]
#[command(
    name = "inkcrystal",
    author,
    version,
    about = "Animated before/after image comparison",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
    /// Log filter used when `RUST_LOG` is unset (e.g. `debug`).
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Configuration file; defaults to `<config dir>/config.toml` when present.
    #[arg(long, value_name = "FILE", env = "INKCRYSTAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// "Before" image: path, `http(s)://` URL or `data:` URI.
    #[arg(long, value_name = "SRC", value_parser = parse_source)]
    pub old: Option<ImageSource>,

    /// "After" image; defaults to the old image.
    #[arg(long, value_name = "SRC", value_parser = parse_source)]
    pub new: Option<ImageSource>,

    /// Initial window size in logical pixels (e.g. `800x1000`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Progress added per frame while crystallizing.
    #[arg(long, value_name = "STEP")]
    pub progress_step: Option<f32>,

    /// Pin the view to one state instead of running the enhancement sequence.
    #[arg(long, value_name = "STATE", value_parser = parse_state)]
    pub state: Option<RenderState>,

    /// GPU adapter preference: `low` or `high`.
    #[arg(long, value_name = "POWER", value_parser = parse_power)]
    pub power: Option<GpuPowerPreference>,

    /// Output color space handling: `auto`, `gamma`, or `linear`.
    #[arg(long, value_name = "MODE", value_parser = parse_color_space)]
    pub color_space: Option<ColorSpaceMode>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render one frame on the CPU and write it as PNG.
    Still(StillArgs),
}

#[derive(Parser, Debug)]
pub struct StillArgs {
    #[arg(long, value_name = "SRC", value_parser = parse_source)]
    pub old: ImageSource,

    #[arg(long, value_name = "SRC", value_parser = parse_source)]
    pub new: ImageSource,

    #[arg(long, value_name = "STATE", value_parser = parse_state, default_value = "interactive")]
    pub state: RenderState,

    /// Seconds since the animation started.
    #[arg(long, value_name = "SECONDS", default_value_t = 2.0)]
    pub time: f32,

    #[arg(long, value_name = "POSITION", default_value_t = 0.5)]
    pub slider: f32,

    /// Crystallize progress; defaults to the settled value for the state.
    #[arg(long, value_name = "PROGRESS")]
    pub progress: Option<f32>,

    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, default_value = "800x1000")]
    pub size: (u32, u32),

    /// Seconds to wait for each source to load.
    #[arg(long, value_name = "SECONDS", default_value_t = 20)]
    pub timeout: u64,

    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{value}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = w
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{value}'"))?;
    let height: u32 = h
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{value}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("size must be non-zero, got {width}x{height}"));
    }
    Ok((width, height))
}

pub fn parse_source(value: &str) -> Result<ImageSource, String> {
    ImageSource::parse(value)
}

pub fn parse_state(value: &str) -> Result<RenderState, String> {
    value.parse()
}

pub fn parse_power(value: &str) -> Result<GpuPowerPreference, String> {
    value.parse()
}

pub fn parse_color_space(value: &str) -> Result<ColorSpaceMode, String> {
    value.parse()
}
