//! Resolves configuration for a window run and hands it to the renderer.
//!
//! Precedence is CLI flag, then config file, then built-in default. Relative
//! source paths from the config file resolve against the file's directory.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use inkconfig::{ColorSpaceSetting, PowerSetting};
use renderer::{
    ColorSpaceMode, FixedState, GpuPowerPreference, ImageSource, Renderer, RendererConfig,
    SourcePair, StateController,
};
use sequencer::{PassthroughEnhancer, SequenceTimings, Sequencer};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::{load_config, LoadedConfig};

const DEFAULT_FILTER: &str =
    "warn,inkcrystal=info,renderer=info,sequencer=info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";

pub fn initialise_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::new(DEFAULT_FILTER),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let loaded = load_config(args.config.as_deref())?;
    let config = build_renderer_config(&args, &loaded)?;
    let controller = build_controller(&args, &loaded, &config)?;
    Renderer::new(config).run(controller)
}

fn build_controller(
    args: &RunArgs,
    loaded: &LoadedConfig,
    config: &RendererConfig,
) -> Result<Box<dyn StateController>> {
    let file = &loaded.config;
    if let Some(state) = args.state {
        tracing::info!(%state, "state pinned from command line");
        return Ok(Box::new(FixedState(state)));
    }
    let replacement = match file.enhance.replacement.as_deref() {
        Some(raw) => resolve_source(raw, loaded.base_dir.as_deref())?,
        None => config.sources.new.clone(),
    };
    let enhancer = PassthroughEnhancer::new(Some(replacement), file.enhance.latency());
    let timings = SequenceTimings::from(&file.sequence);
    tracing::debug!(?timings, "enhancement sequence configured");
    Ok(Box::new(Sequencer::new(
        config.sources.clone(),
        timings,
        enhancer,
    )))
}

pub(crate) fn build_renderer_config(args: &RunArgs, loaded: &LoadedConfig) -> Result<RendererConfig> {
    let file = &loaded.config;
    let base = loaded.base_dir.as_deref();

    let old = match (&args.old, file.sources.old.as_deref()) {
        (Some(source), _) => source.clone(),
        (None, Some(raw)) => resolve_source(raw, base)?,
        (None, None) => {
            return Err(anyhow!(
                "no old image given; pass --old or set sources.old in the config file"
            ))
        }
    };
    let new = match (&args.new, file.sources.new.as_deref()) {
        (Some(source), _) => source.clone(),
        (None, Some(raw)) => resolve_source(raw, base)?,
        (None, None) => {
            tracing::info!("no new image given; comparing the old image with itself");
            old.clone()
        }
    };

    let mut config = RendererConfig::new(SourcePair::new(old, new));
    config.window_size = args
        .size
        .unwrap_or((file.window.width, file.window.height));
    config.title = file.window.title.clone();
    config.progress_step = args.progress_step.unwrap_or(file.render.progress_step);
    if !(config.progress_step > 0.0 && config.progress_step <= 1.0) {
        return Err(anyhow!(
            "progress step must be in (0, 1], got {}",
            config.progress_step
        ));
    }
    config.color_space = args
        .color_space
        .unwrap_or(map_color_space(file.render.color_space));
    config.power = args.power.unwrap_or(map_power(file.render.power));
    config.vsync = file.render.vsync;
    config.slider = file.render.slider;
    config.fetch_timeout = file.render.fetch_timeout;
    Ok(config)
}

fn resolve_source(raw: &str, base: Option<&Path>) -> Result<ImageSource> {
    let source = ImageSource::parse(raw)
        .map_err(|err| anyhow!(err))
        .with_context(|| format!("invalid image source '{raw}'"))?;
    Ok(match (source, base) {
        (ImageSource::Path(path), Some(base)) if path.is_relative() => {
            ImageSource::Path(base.join(path))
        }
        (source, _) => source,
    })
}

fn map_color_space(setting: ColorSpaceSetting) -> ColorSpaceMode {
    match setting {
        ColorSpaceSetting::Auto => ColorSpaceMode::Auto,
        ColorSpaceSetting::Gamma => ColorSpaceMode::Gamma,
        ColorSpaceSetting::Linear => ColorSpaceMode::Linear,
    }
}

fn map_power(setting: PowerSetting) -> GpuPowerPreference {
    match setting {
        PowerSetting::Low => GpuPowerPreference::Low,
        PowerSetting::High => GpuPowerPreference::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkconfig::InkConfig;
    use std::path::PathBuf;

    fn loaded(toml: &str, base: Option<&str>) -> LoadedConfig {
        LoadedConfig {
            config: InkConfig::from_toml_str(toml).unwrap(),
            base_dir: base.map(PathBuf::from),
        }
    }

    #[test]
    fn file_sources_resolve_against_config_dir() {
        let file = loaded(
            "version = 1\n[sources]\nold = \"old.png\"\nnew = \"https://example.com/new.png\"\n",
            Some("/etc/ink"),
        );
        let config = build_renderer_config(&RunArgs::default(), &file).unwrap();
        assert_eq!(config.sources.old, ImageSource::Path("/etc/ink/old.png".into()));
        assert_eq!(
            config.sources.new,
            ImageSource::Url("https://example.com/new.png".into())
        );
    }

    #[test]
    fn cli_overrides_file() {
        let file = loaded(
            "version = 1\n[sources]\nold = \"old.png\"\n[render]\npower = \"high\"\nprogress_step = 0.02\n",
            None,
        );
        let args = RunArgs {
            old: Some(ImageSource::Path("cli.png".into())),
            size: Some((320, 240)),
            power: Some(GpuPowerPreference::Low),
            ..RunArgs::default()
        };
        let config = build_renderer_config(&args, &file).unwrap();
        assert_eq!(config.sources.old, ImageSource::Path("cli.png".into()));
        assert_eq!(config.sources.new, ImageSource::Path("cli.png".into()));
        assert_eq!(config.window_size, (320, 240));
        assert_eq!(config.power, GpuPowerPreference::Low);
        assert_eq!(config.progress_step, 0.02);
    }

    #[test]
    fn missing_old_source_is_an_error() {
        let file = loaded("version = 1", None);
        assert!(build_renderer_config(&RunArgs::default(), &file).is_err());
    }

    #[test]
    fn new_defaults_to_old() {
        let file = loaded("version = 1", None);
        let args = RunArgs {
            old: Some(ImageSource::Path("a.png".into())),
            ..RunArgs::default()
        };
        let config = build_renderer_config(&args, &file).unwrap();
        assert_eq!(config.sources.old, config.sources.new);
    }

    #[test]
    fn rejects_bad_progress_step_from_cli() {
        let file = loaded("version = 1", None);
        let args = RunArgs {
            old: Some(ImageSource::Path("a.png".into())),
            progress_step: Some(0.0),
            ..RunArgs::default()
        };
        assert!(build_renderer_config(&args, &file).is_err());
    }
}
