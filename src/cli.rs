use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

use bandscope::render::color::ColorMapKind;
use bandscope::{MappingPolicy, ViewMode};

pub const DEFAULT_OUTPUT: &str = "output.mp4";
pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;
pub const DEFAULT_FPS: u32 = 60;
pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const DEFAULT_THRESHOLD: f32 = 50.0;
pub const DEFAULT_FIXED_CEILING_HZ: f32 = 10_000.0;
pub const DEFAULT_CODEC: &str = "libx264";
pub const DEFAULT_PIX_FMT: &str = "yuv420p";
pub const DEFAULT_CRF: u32 = 18;

/// Vertical mapping policy as chosen on the command line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MappingKind {
    /// Full height spans 0 Hz to Nyquist
    #[default]
    Nyquist,
    /// Full height spans 0 Hz to --ceiling-hz
    Fixed,
}

impl MappingKind {
    pub fn policy(self, ceiling_hz: f32) -> MappingPolicy {
        match self {
            MappingKind::Nyquist => MappingPolicy::NyquistRelative,
            MappingKind::Fixed => MappingPolicy::FixedCeiling { ceiling_hz },
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "bandscope", about = "Band activation and scrolling spectrograms from audio files")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Output file: video in spectrogram mode, JSON lines in bands mode ("-" for stdout)
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// What to produce from the spectral frames
    #[arg(short, long, value_enum, default_value_t = ViewMode::Spectrogram)]
    pub mode: ViewMode,

    /// Output width in pixels, margins included
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    /// Output height in pixels, margins included
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,

    /// Ticks per second; one spectral frame and one spectrogram column per tick
    #[arg(long, default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    /// FFT size (power of two); frames carry half as many bins
    #[arg(long, default_value_t = DEFAULT_FFT_SIZE)]
    pub fft_size: usize,

    /// Temporal smoothing between frames (0.0-1.0)
    #[arg(long, default_value_t = DEFAULT_SMOOTHING)]
    pub smoothing: f32,

    /// Activation threshold on the 0-255 energy scale
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f32,

    /// Frequency-to-row mapping
    #[arg(long, value_enum, default_value_t = MappingKind::Nyquist)]
    pub mapping: MappingKind,

    /// Top of the plot in Hz when --mapping fixed
    #[arg(long, default_value_t = DEFAULT_FIXED_CEILING_HZ)]
    pub ceiling_hz: f32,

    /// Spectrogram colour map
    #[arg(long, value_enum, default_value_t = ColorMapKind::VerticalGradient)]
    pub color_map: ColorMapKind,

    /// Flip the gradient direction
    #[arg(long)]
    pub reverse_gradient: bool,

    /// TTF/OTF font for axis labels
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Download the label font from this URL
    #[arg(long)]
    pub font_url: Option<String>,

    /// Pace ticks in real time instead of as fast as possible
    #[arg(long)]
    pub realtime: bool,

    /// Config file (defaults: ./bandscope.toml, ~/.config/bandscope/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// FFmpeg video codec
    #[arg(long, default_value = DEFAULT_CODEC)]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = DEFAULT_PIX_FMT)]
    pub pix_fmt: String,

    /// CRF quality (0-51, lower = better)
    #[arg(long, default_value_t = DEFAULT_CRF)]
    pub crf: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cli = Cli::try_parse_from(["bandscope", "in.wav"]).unwrap();
        assert_eq!(cli.mode, ViewMode::Spectrogram);
        assert_eq!(cli.width, DEFAULT_WIDTH);
        assert_eq!(cli.mapping, MappingKind::Nyquist);
        assert_eq!(cli.color_map, ColorMapKind::VerticalGradient);
        assert!(!cli.realtime);
    }

    #[test]
    fn fixed_mapping_defaults_to_ten_kilohertz() {
        let cli = Cli::try_parse_from(["bandscope", "in.wav", "--mapping", "fixed"]).unwrap();
        assert_eq!(
            cli.mapping.policy(cli.ceiling_hz),
            MappingPolicy::FixedCeiling { ceiling_hz: 10_000.0 }
        );
    }

    #[test]
    fn value_enums_use_kebab_case() {
        let cli = Cli::try_parse_from([
            "bandscope",
            "in.wav",
            "--mode",
            "bands",
            "--mapping",
            "fixed",
            "--ceiling-hz",
            "8000",
            "--color-map",
            "amplitude-gradient",
        ])
        .unwrap();
        assert_eq!(cli.mode, ViewMode::Bands);
        assert_eq!(
            cli.mapping.policy(cli.ceiling_hz),
            MappingPolicy::FixedCeiling { ceiling_hz: 8000.0 }
        );
        assert_eq!(cli.color_map, ColorMapKind::AmplitudeGradient);
    }
}
