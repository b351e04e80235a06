use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpaceSetting {
    #[default]
    Auto,
    Gamma,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InkConfig {
    pub version: u32,
    #[serde(default)]
    pub sources: SourcesSection,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub sequence: SequenceSection,
    #[serde(default)]
    pub enhance: EnhanceSection,
}

/// Image sources as written in the file: paths, `http(s)://` URLs or
/// `data:` URIs. Relative paths are resolved by the caller.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourcesSection {
    pub old: Option<String>,
    pub new: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowSection {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderSection {
    #[serde(default = "default_progress_step")]
    pub progress_step: f32,
    #[serde(default)]
    pub color_space: ColorSpaceSetting,
    #[serde(default)]
    pub power: PowerSetting,
    #[serde(default = "default_vsync")]
    pub vsync: bool,
    #[serde(default = "default_slider")]
    pub slider: f32,
    #[serde(
        default = "default_fetch_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub fetch_timeout: Duration,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            progress_step: default_progress_step(),
            color_space: ColorSpaceSetting::default(),
            power: PowerSetting::default(),
            vsync: default_vsync(),
            slider: default_slider(),
            fetch_timeout: default_fetch_timeout(),
        }
    }
}

/// Timing of the enhancement sequence driven by the controller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SequenceSection {
    #[serde(default = "default_breathing", deserialize_with = "deserialize_duration")]
    pub breathing: Duration,
    #[serde(
        default = "default_crystallize",
        deserialize_with = "deserialize_duration"
    )]
    pub crystallize: Duration,
}

impl Default for SequenceSection {
    fn default() -> Self {
        Self {
            breathing: default_breathing(),
            crystallize: default_crystallize(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnhanceSection {
    /// Source handed back by the stub enhancer; the reference itself when
    /// unset.
    pub replacement: Option<String>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub latency: Option<Duration>,
}

impl EnhanceSection {
    pub fn latency(&self) -> Duration {
        self.latency.unwrap_or_default()
    }
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    1000
}

fn default_title() -> String {
    "Ink & Crystal".to_string()
}

fn default_progress_step() -> f32 {
    0.015
}

fn default_vsync() -> bool {
    true
}

fn default_slider() -> f32 {
    0.5
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_breathing() -> Duration {
    Duration::from_secs(3)
}

fn default_crystallize() -> Duration {
    Duration::from_millis(1500)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer)?
        .ok_or_else(|| de::Error::custom("expected a duration"))
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl Default for InkConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            sources: SourcesSection::default(),
            window: WindowSection::default(),
            render: RenderSection::default(),
            sequence: SequenceSection::default(),
            enhance: EnhanceSection::default(),
        }
    }
}

impl InkConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: InkConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        for (name, value) in [
            ("sources.old", &self.sources.old),
            ("sources.new", &self.sources.new),
            ("enhance.replacement", &self.enhance.replacement),
        ] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!("{name} may not be empty")));
                }
            }
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        let step = self.render.progress_step;
        if !step.is_finite() || step <= 0.0 || step > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "render.progress_step must be in (0, 1], got {step}"
            )));
        }

        let slider = self.render.slider;
        if !(0.0..=1.0).contains(&slider) {
            return Err(ConfigError::Invalid(format!(
                "render.slider must be in [0, 1], got {slider}"
            )));
        }

        if self.render.fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "render.fetch_timeout must be greater than zero".into(),
            ));
        }

        if self.sequence.crystallize.is_zero() {
            return Err(ConfigError::Invalid(
                "sequence.crystallize must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
