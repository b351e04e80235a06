use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::loader::DEFAULT_FETCH_TIMEOUT;
use crate::progress::DEFAULT_PROGRESS_STEP;

/// Externally owned state of the comparison view.
///
/// The renderer never changes this value itself; it reads whatever the
/// controller reports at the start of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderState {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// Waiting for the enhanced image; ink effect over the old image.
    Breathing,
    /// Liquid wavefront revealing the new image.
    Crystallizing,
    /// Draggable before/after split.
    Interactive,
}

impl RenderState {
    pub const ALL: [RenderState; 4] = [
        RenderState::Idle,
        RenderState::Breathing,
        RenderState::Crystallizing,
        RenderState::Interactive,
    ];

    /// Human readable status line shown in the window title.
    pub fn status_label(self) -> &'static str {
        match self {
            RenderState::Idle => "Ready to Render",
            RenderState::Breathing => "Ink Breathing...",
            RenderState::Crystallizing => "Crystallizing...",
            RenderState::Interactive => "Compare",
        }
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::Idle => f.write_str("idle"),
            RenderState::Breathing => f.write_str("breathing"),
            RenderState::Crystallizing => f.write_str("crystallizing"),
            RenderState::Interactive => f.write_str("interactive"),
        }
    }
}

impl FromStr for RenderState {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(RenderState::Idle),
            "breathing" | "breath" => Ok(RenderState::Breathing),
            "crystallizing" | "crystal" => Ok(RenderState::Crystallizing),
            "interactive" | "compare" => Ok(RenderState::Interactive),
            other => Err(format!(
                "invalid render state '{other}'; expected idle, breathing, crystallizing or interactive"
            )),
        }
    }
}

/// Branch selector consumed by the fragment program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderMode {
    Breathing = 0,
    Crystallizing = 1,
    Interactive = 2,
}

impl ShaderMode {
    /// Integer written into the `mode` uniform.
    pub fn flag(self) -> i32 {
        self as i32
    }

    /// Inverse of [`ShaderMode::flag`]; unknown values fall through to the
    /// interactive branch exactly like the shader's final `else`.
    pub fn from_flag(flag: i32) -> Self {
        match flag {
            0 => ShaderMode::Breathing,
            1 => ShaderMode::Crystallizing,
            _ => ShaderMode::Interactive,
        }
    }
}

impl From<RenderState> for ShaderMode {
    /// Idle has no dedicated branch and shares the breathing program with a
    /// fully settled progress value.
    fn from(state: RenderState) -> Self {
        match state {
            RenderState::Idle | RenderState::Breathing => ShaderMode::Breathing,
            RenderState::Crystallizing => ShaderMode::Crystallizing,
            RenderState::Interactive => ShaderMode::Interactive,
        }
    }
}

/// Scalar inputs for one frame of the fragment program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub time: f32,
    pub slider: f32,
    pub mode: ShaderMode,
    pub progress: f32,
    /// Drawing surface size in physical pixels.
    pub resolution: (u32, u32),
}

impl FrameParams {
    /// Parameters for a still frame of `state`, using the settled progress
    /// value the render loop would report for it.
    pub fn still(state: RenderState, time: f32, slider: f32, resolution: (u32, u32)) -> Self {
        let progress = match state {
            RenderState::Breathing => 0.0,
            _ => 1.0,
        };
        Self {
            time,
            slider: slider.clamp(0.0, 1.0),
            mode: ShaderMode::from(state),
            progress,
            resolution,
        }
    }

    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = progress.clamp(0.0, 1.0);
        self
    }
}

/// Which of the two compared images a texture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Old,
    New,
}

impl TextureSlot {
    pub const BOTH: [TextureSlot; 2] = [TextureSlot::Old, TextureSlot::New];

    pub fn index(self) -> usize {
        match self {
            TextureSlot::Old => 0,
            TextureSlot::New => 1,
        }
    }
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureSlot::Old => f.write_str("old"),
            TextureSlot::New => f.write_str("new"),
        }
    }
}

/// Reference to an image the loader can resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    /// Local file, given either as a plain path or a `file://` URI.
    Path(PathBuf),
    /// Remote `http://` or `https://` resource.
    Url(String),
    /// Embedded `data:` URI carrying base64 encoded bytes.
    Data { mime: String, payload: String },
}

impl ImageSource {
    /// Parses a user supplied source string.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("image source must not be empty".into());
        }
        if let Some(rest) = trimmed.strip_prefix("data:") {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| "data URI is missing the ',' separator".to_string())?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or_else(|| "only base64 encoded data URIs are supported".to_string())?;
            return Ok(ImageSource::Data {
                mime: mime.to_string(),
                payload: payload.to_string(),
            });
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(ImageSource::Url(trimmed.to_string()));
        }
        if let Some(path) = trimmed.strip_prefix("file://") {
            return Ok(ImageSource::Path(PathBuf::from(path)));
        }
        Ok(ImageSource::Path(PathBuf::from(trimmed)))
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(path) => write!(f, "{}", path.display()),
            ImageSource::Url(url) => f.write_str(url),
            ImageSource::Data { mime, payload } => {
                write!(f, "data:{mime};base64,<{} bytes>", payload.len())
            }
        }
    }
}

impl FromStr for ImageSource {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ImageSource::parse(raw)
    }
}

/// The before/after pair; replacing it remounts the GPU state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcePair {
    pub old: ImageSource,
    pub new: ImageSource,
}

impl SourcePair {
    pub fn new(old: ImageSource, new: ImageSource) -> Self {
        Self { old, new }
    }

    pub fn get(&self, slot: TextureSlot) -> &ImageSource {
        match slot {
            TextureSlot::Old => &self.old,
            TextureSlot::New => &self.new,
        }
    }

    /// Same pair with the enhanced side swapped out.
    pub fn with_new(&self, new: ImageSource) -> Self {
        Self {
            old: self.old.clone(),
            new,
        }
    }
}

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Gamma-encoded output, which is how the images look in a browser canvas.
    #[default]
    Auto,
    /// Treat shader outputs/textures as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat shader outputs as linear and use sRGB swapchains/textures for conversion.
    Linear,
}

impl FromStr for ColorSpaceMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorSpaceMode::Auto),
            "gamma" => Ok(ColorSpaceMode::Gamma),
            "linear" | "srgb" => Ok(ColorSpaceMode::Linear),
            other => Err(format!(
                "invalid color space '{other}'; expected auto, gamma, or linear"
            )),
        }
    }
}

/// GPU adapter selection preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    /// Prefer integrated/low power GPUs.
    #[default]
    Low,
    /// Prefer discrete/high performance GPUs.
    High,
}

impl FromStr for GpuPowerPreference {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(GpuPowerPreference::Low),
            "high" => Ok(GpuPowerPreference::High),
            other => Err(format!("invalid power preference '{other}'; expected low or high")),
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors the resolved config file plus CLI flags: which
/// images to compare, how large the window starts, and how the GPU should be
/// driven.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Initial window size in logical pixels.
    pub window_size: (u32, u32),
    /// Window title prefix; the current state is appended.
    pub title: String,
    /// Images to compare.
    pub sources: SourcePair,
    /// Progress added per frame while crystallizing.
    pub progress_step: f32,
    /// Desired color handling for swapchain/textures.
    pub color_space: ColorSpaceMode,
    /// GPU adapter preference.
    pub power: GpuPowerPreference,
    /// Present with vsync (`Fifo`) when true.
    pub vsync: bool,
    /// Initial slider position.
    pub slider: f32,
    /// Upper bound for fetching a remote image.
    pub fetch_timeout: Duration,
}

impl RendererConfig {
    pub fn new(sources: SourcePair) -> Self {
        Self {
            window_size: (800, 1000),
            title: "Ink & Crystal".to_string(),
            sources,
            progress_step: DEFAULT_PROGRESS_STEP,
            color_space: ColorSpaceMode::default(),
            power: GpuPowerPreference::default(),
            vsync: true,
            slider: 0.5,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_maps_to_exactly_one_mode() {
        let modes: Vec<ShaderMode> = RenderState::ALL.iter().map(|s| ShaderMode::from(*s)).collect();
        assert_eq!(
            modes,
            vec![
                ShaderMode::Breathing,
                ShaderMode::Breathing,
                ShaderMode::Crystallizing,
                ShaderMode::Interactive
            ]
        );
        for mode in modes {
            assert_eq!(ShaderMode::from_flag(mode.flag()), mode);
        }
    }

    #[test]
    fn parses_sources() {
        assert_eq!(
            ImageSource::parse("file:///tmp/a.png").unwrap(),
            ImageSource::Path(PathBuf::from("/tmp/a.png"))
        );
        assert_eq!(
            ImageSource::parse("https://picsum.photos/800").unwrap(),
            ImageSource::Url("https://picsum.photos/800".into())
        );
        match ImageSource::parse("data:image/png;base64,AAAA").unwrap() {
            ImageSource::Data { mime, payload } => {
                assert_eq!(mime, "image/png");
                assert_eq!(payload, "AAAA");
            }
            other => panic!("unexpected source {other:?}"),
        }
        assert!(ImageSource::parse("data:image/png,raw").is_err());
        assert!(ImageSource::parse("   ").is_err());
    }

    #[test]
    fn parses_state_names() {
        assert_eq!("Crystal".parse::<RenderState>().unwrap(), RenderState::Crystallizing);
        assert!("sleeping".parse::<RenderState>().is_err());
    }
}
