use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How frequencies are laid out along the vertical axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum MappingPolicy {
    /// Top of the drawable area is the Nyquist frequency of the source
    #[default]
    NyquistRelative,
    /// Top of the drawable area is a fixed frequency, whatever the device sample rate
    FixedCeiling { ceiling_hz: f32 },
}

/// Converts frequencies to bin indices and pixel rows.
///
/// Built once when the spectral source is attached and never changed afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencyMapper {
    sample_rate: u32,
    frame_length: usize,
    drawable_height: u32,
    policy: MappingPolicy,
}

impl FrequencyMapper {
    pub fn new(
        sample_rate: u32,
        frame_length: usize,
        drawable_height: u32,
        policy: MappingPolicy,
    ) -> Self {
        Self {
            sample_rate,
            frame_length,
            drawable_height,
            policy,
        }
    }

    pub fn policy(&self) -> MappingPolicy {
        self.policy
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn drawable_height(&self) -> u32 {
        self.drawable_height
    }

    pub fn nyquist_hz(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Frequency shown at the top row of the drawable area
    pub fn ceiling_hz(&self) -> f32 {
        match self.policy {
            MappingPolicy::NyquistRelative => self.nyquist_hz(),
            MappingPolicy::FixedCeiling { ceiling_hz } => ceiling_hz,
        }
    }

    /// Bin nearest to `freq_hz`, clamped to `[0, frame_length)`.
    pub fn index_for_frequency(&self, freq_hz: f32) -> usize {
        if self.frame_length == 0 {
            return 0;
        }
        self.raw_index(freq_hz).min(self.frame_length - 1)
    }

    /// Centre frequency of bin `index`
    pub fn frequency_for_index(&self, index: usize) -> f32 {
        if self.frame_length == 0 {
            return 0.0;
        }
        index as f32 * self.nyquist_hz() / self.frame_length as f32
    }

    /// Half-open bin range covering `[min_hz, max_hz)`, clamped to the frame.
    /// Inverted or zero-width frequency ranges give an empty range.
    pub fn bin_range(&self, min_hz: f32, max_hz: f32) -> Range<usize> {
        let start = self.raw_index(min_hz).min(self.frame_length);
        let end = self.raw_index(max_hz).min(self.frame_length);
        if start >= end {
            start..start
        } else {
            start..end
        }
    }

    /// Pixel row for `freq_hz` (0 Hz on the bottom row), or `None` when the
    /// frequency lies above the ceiling. Callers skip `None`, never clamp it.
    pub fn y_for_frequency(&self, freq_hz: f32) -> Option<u32> {
        if !(freq_hz >= 0.0) || freq_hz > self.ceiling_hz() {
            return None;
        }
        match self.policy {
            MappingPolicy::NyquistRelative => self.y_for_bin(self.index_for_frequency(freq_hz)),
            MappingPolicy::FixedCeiling { ceiling_hz } => self.row_for_fraction(freq_hz / ceiling_hz),
        }
    }

    /// Pixel row for bin `index`, or `None` when the bin falls outside the drawable area.
    pub fn y_for_bin(&self, index: usize) -> Option<u32> {
        if index >= self.frame_length {
            return None;
        }
        match self.policy {
            MappingPolicy::NyquistRelative => {
                self.row_for_fraction(index as f32 / self.frame_length as f32)
            }
            MappingPolicy::FixedCeiling { ceiling_hz } => {
                let freq = self.frequency_for_index(index);
                if freq > ceiling_hz {
                    return None;
                }
                self.row_for_fraction(freq / ceiling_hz)
            }
        }
    }

    fn raw_index(&self, freq_hz: f32) -> usize {
        let nyquist = self.nyquist_hz();
        if !(freq_hz > 0.0) || nyquist <= 0.0 {
            return 0;
        }
        (freq_hz / nyquist * self.frame_length as f32).round() as usize
    }

    fn row_for_fraction(&self, fraction: f32) -> Option<u32> {
        if self.drawable_height == 0 || !(0.0..=1.0).contains(&fraction) {
            return None;
        }
        let span = (self.drawable_height - 1) as f32;
        Some(self.drawable_height - 1 - (fraction * span).round() as u32)
    }
}
