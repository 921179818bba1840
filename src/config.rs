use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use bandscope::engine::control::ScriptedControls;
use bandscope::render::color::ColorMapKind;
use bandscope::ControlEvent;

use crate::cli::{self, MappingKind};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub bands: BandsConfig,
    #[serde(default)]
    pub spectrogram: SpectrogramConfig,
    #[serde(default)]
    pub controls: Vec<ControlEntry>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    pub font: Option<PathBuf>,
    pub font_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_min_db")]
    pub min_db: f32,
    #[serde(default = "default_max_db")]
    pub max_db: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BandsConfig {
    pub threshold: f32,
    pub labels: Vec<String>,
    pub minimums: Vec<f32>,
    pub ceiling_hz: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    pub mapping: MappingKind,
    pub ceiling_hz: f32,
    pub color_map: ColorMapKind,
    pub reverse_gradient: bool,
    /// `#rrggbb`
    pub background: String,
    pub frequency_ticks: Vec<f32>,
    pub time_tick_seconds: f32,
    pub left_margin: u32,
    pub bottom_margin: u32,
}

/// One scripted control change, released at `at` seconds.
/// Either `threshold`, or `band` together with `min_hz`.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlEntry {
    pub at: f32,
    pub threshold: Option<f32>,
    pub band: Option<usize>,
    pub min_hz: Option<f32>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
            pix_fmt: default_pix_fmt(),
            font: None,
            font_url: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            min_db: default_min_db(),
            max_db: default_max_db(),
        }
    }
}

impl Default for BandsConfig {
    fn default() -> Self {
        Self {
            threshold: cli::DEFAULT_THRESHOLD,
            labels: Vec::new(),
            minimums: Vec::new(),
            ceiling_hz: bandscope::engine::bands::DEFAULT_CEILING_HZ,
        }
    }
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            mapping: MappingKind::Nyquist,
            ceiling_hz: cli::DEFAULT_FIXED_CEILING_HZ,
            color_map: ColorMapKind::VerticalGradient,
            reverse_gradient: false,
            background: "#000000".into(),
            frequency_ticks: bandscope::render::axes::DEFAULT_FREQUENCY_TICKS.to_vec(),
            time_tick_seconds: 1.0,
            left_margin: 40,
            bottom_margin: 20,
        }
    }
}

fn default_width() -> u32 { cli::DEFAULT_WIDTH }
fn default_height() -> u32 { cli::DEFAULT_HEIGHT }
fn default_fps() -> u32 { cli::DEFAULT_FPS }
fn default_crf() -> u32 { cli::DEFAULT_CRF }
fn default_codec() -> String { cli::DEFAULT_CODEC.into() }
fn default_pix_fmt() -> String { cli::DEFAULT_PIX_FMT.into() }
fn default_fft_size() -> usize { cli::DEFAULT_FFT_SIZE }
fn default_smoothing() -> f32 { cli::DEFAULT_SMOOTHING }
fn default_min_db() -> f32 { -100.0 }
fn default_max_db() -> f32 { -30.0 }

impl ControlEntry {
    pub fn to_event(&self) -> Option<ControlEvent> {
        match (self.threshold, self.band, self.min_hz) {
            (Some(value), None, None) => Some(ControlEvent::SetThreshold(value)),
            (None, Some(index), Some(hz)) => Some(ControlEvent::SetBandMinimum { index, hz }),
            _ => None,
        }
    }
}

impl Config {
    /// Scripted control surface from the `[[controls]]` entries; malformed entries are skipped.
    pub fn control_script(&self) -> ScriptedControls {
        let events = self
            .controls
            .iter()
            .filter_map(|entry| match entry.to_event() {
                Some(event) => Some((entry.at, event)),
                None => {
                    log::warn!("Ignoring control entry at {}s: {:?}", entry.at, entry);
                    None
                }
            })
            .collect();
        ScriptedControls::new(events)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config: {}", path.display()))
}

/// Explicit path, then ./bandscope.toml, ~/.config/bandscope/config.toml, platform config dir.
pub fn discover_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("bandscope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("bandscope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("bandscope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
