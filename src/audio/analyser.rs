use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use std::ops::Range;

use super::decode::PcmBuffer;
use crate::engine::source::{SpectralFrame, SpectralSource};
use crate::error::{EngineError, Result};

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32_768;
/// Ticks transformed per parallel batch; bounds the resident spectra.
pub const BATCH_TICKS: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalyserSettings {
    /// Power of two; frames carry half as many bins
    pub fft_size: usize,
    /// Weight of the previous frame, 0.0-1.0
    pub smoothing: f32,
    /// Level mapped to byte 0
    pub min_db: f32,
    /// Level mapped to byte 255
    pub max_db: f32,
    pub fps: u32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
            fps: 60,
        }
    }
}

/// Spectral source over a decoded clip, one frame per tick at `fps`.
///
/// Windowed FFT magnitudes are computed in parallel, [`BATCH_TICKS`] ticks at a
/// time, when the cursor runs past the current batch. Temporal smoothing and
/// byte scaling happen as frames are pulled, since each frame depends on the
/// one before it.
pub struct AnalyserSource {
    settings: AnalyserSettings,
    sample_rate: u32,
    samples: Vec<f32>,
    window: Vec<f32>,
    total_ticks: usize,
    batch: Vec<Vec<f32>>,
    batch_start: usize,
    smoothed: Vec<f32>,
    frame: SpectralFrame,
    cursor: usize,
}

impl AnalyserSource {
    pub fn new(pcm: PcmBuffer, settings: AnalyserSettings) -> Result<Self> {
        let fft_size = settings.fft_size;
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(EngineError::InvalidFftSize(fft_size));
        }
        if pcm.sample_rate == 0 {
            return Err(EngineError::SourceUnavailable("sample rate is zero".into()));
        }
        let mut settings = settings;
        settings.fps = settings.fps.max(1);
        settings.smoothing = settings.smoothing.clamp(0.0, 1.0);
        if !(settings.max_db > settings.min_db) {
            log::warn!(
                "Ignoring decibel range [{}, {}], using defaults",
                settings.min_db,
                settings.max_db
            );
            let defaults = AnalyserSettings::default();
            settings.min_db = defaults.min_db;
            settings.max_db = defaults.max_db;
        }

        let total_ticks = (pcm.duration() * settings.fps as f32).ceil() as usize;
        log::info!(
            "Analyser ready: {} ticks, fft_size={}, smoothing={:.2}, range=[{}, {}] dB",
            total_ticks,
            fft_size,
            settings.smoothing,
            settings.min_db,
            settings.max_db
        );

        let bins = fft_size / 2;
        Ok(Self {
            settings,
            sample_rate: pcm.sample_rate,
            samples: pcm.samples,
            window: blackman_window(fft_size),
            total_ticks,
            batch: Vec::new(),
            batch_start: 0,
            smoothed: vec![0.0; bins],
            frame: SpectralFrame::filled(bins, 0),
            cursor: 0,
        })
    }

    pub fn settings(&self) -> &AnalyserSettings {
        &self.settings
    }

    /// Frames the clip yields in total
    pub fn frames_total(&self) -> usize {
        self.total_ticks
    }

    /// Frames already handed out
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Magnitude spectra currently held in memory
    pub fn resident_frames(&self) -> usize {
        self.batch.len()
    }

    fn refill(&mut self) {
        let end = (self.cursor + BATCH_TICKS).min(self.total_ticks);
        log::trace!("Analysing ticks {}..{}", self.cursor, end);
        self.batch = window_magnitudes(
            &self.samples,
            &self.window,
            self.samples_per_tick(),
            self.cursor..end,
        );
        self.batch_start = self.cursor;
    }

    fn samples_per_tick(&self) -> f64 {
        self.sample_rate as f64 / self.settings.fps as f64
    }
}

impl SpectralSource for AnalyserSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_length(&self) -> usize {
        self.settings.fft_size / 2
    }

    fn get_frame(&mut self) -> Option<&SpectralFrame> {
        if self.cursor >= self.total_ticks {
            return None;
        }
        if self.cursor >= self.batch_start + self.batch.len() {
            self.refill();
        }
        let current = self.batch.get(self.cursor - self.batch_start)?;
        self.cursor += 1;

        smooth_into(&mut self.smoothed, &mut self.frame.bins, current, &self.settings);
        Some(&self.frame)
    }
}

/// Folds `magnitudes` into the running average and rescales it to bytes.
fn smooth_into(smoothed: &mut [f32], bytes: &mut [u8], magnitudes: &[f32], settings: &AnalyserSettings) {
    let tau = settings.smoothing;
    let scale = 255.0 / (settings.max_db - settings.min_db);
    for ((smoothed, &magnitude), byte) in smoothed.iter_mut().zip(magnitudes).zip(bytes.iter_mut()) {
        *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        let db = 20.0 * smoothed.log10();
        *byte = ((db - settings.min_db) * scale).floor().clamp(0.0, 255.0) as u8;
    }
}

/// `|X[k]| / N` of the Blackman-windowed block ending at each tick in `ticks`.
fn window_magnitudes(
    samples: &[f32],
    window: &[f32],
    samples_per_tick: f64,
    ticks: Range<usize>,
) -> Vec<Vec<f32>> {
    let size = window.len();

    ticks
        .into_par_iter()
        .map_init(
            || FftPlanner::<f32>::new().plan_fft_forward(size),
            |fft, tick| {
                let end = (tick as f64 * samples_per_tick).round() as i64;
                let start = end - size as i64;
                let mut buffer: Vec<Complex<f32>> = (0..size)
                    .map(|i| {
                        let idx = start + i as i64;
                        let sample = if idx >= 0 {
                            samples.get(idx as usize).copied().unwrap_or(0.0)
                        } else {
                            0.0
                        };
                        Complex::new(sample * window[i], 0.0)
                    })
                    .collect();
                fft.process(&mut buffer);
                buffer[..size / 2]
                    .iter()
                    .map(|c| c.norm() / size as f32)
                    .collect()
            },
        )
        .collect()
}

fn blackman_window(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / n;
            A0 - A1 * phase.cos() + A2 * (2.0 * phase).cos()
        })
        .collect()
}
