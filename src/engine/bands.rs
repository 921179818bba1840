use serde::{Deserialize, Serialize};

use super::mapping::FrequencyMapper;
use super::source::SpectralFrame;
use crate::error::{EngineError, Result};

/// Upper edge of the highest band unless configured otherwise
pub const DEFAULT_CEILING_HZ: f32 = 6000.0;

/// Half-open frequency interval `[min_hz, max_hz)` evaluated for average energy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub id: usize,
    pub label: String,
    pub min_hz: f32,
    pub max_hz: f32,
}

/// Per-tick result for one band
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BandState {
    pub band_id: usize,
    pub label: String,
    pub min_hz: f32,
    pub max_hz: f32,
    pub average_energy: f32,
    pub active: bool,
}

/// Ordered bands partitioning `[bands[0].min_hz, ceiling_hz)` without gaps or overlaps.
///
/// Bands are created once; only their bounds change afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct BandSet {
    bands: Vec<Band>,
    ceiling_hz: f32,
}

impl BandSet {
    /// Builds the bands from per-band minimums (any order) and a fixed ceiling.
    pub fn from_minimums(labels: &[String], minimums: &[f32], ceiling_hz: f32) -> Result<Self> {
        if labels.len() != minimums.len() {
            return Err(EngineError::BandCountMismatch {
                expected: labels.len(),
                actual: minimums.len(),
            });
        }
        let bands = labels
            .iter()
            .enumerate()
            .map(|(id, label)| Band {
                id,
                label: label.clone(),
                min_hz: 0.0,
                max_hz: 0.0,
            })
            .collect();
        let mut set = Self { bands, ceiling_hz };
        set.update_boundaries(minimums)?;
        Ok(set)
    }

    /// The five electrode bands: 200-400, 400-800, 800-1600, 1600-3200, 3200-6000 Hz
    pub fn electrodes() -> Self {
        let labels: Vec<String> = (1..=5).map(|i| format!("electrode{}", i)).collect();
        let mut bands: Vec<Band> = labels
            .into_iter()
            .enumerate()
            .map(|(id, label)| Band {
                id,
                label,
                min_hz: 0.0,
                max_hz: 0.0,
            })
            .collect();
        let edges = [200.0, 400.0, 800.0, 1600.0, 3200.0, DEFAULT_CEILING_HZ];
        for (band, pair) in bands.iter_mut().zip(edges.windows(2)) {
            band.min_hz = pair[0];
            band.max_hz = pair[1];
        }
        Self {
            bands,
            ceiling_hz: DEFAULT_CEILING_HZ,
        }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn ceiling_hz(&self) -> f32 {
        self.ceiling_hz
    }

    /// Regenerates every band's bounds from one minimum per band.
    ///
    /// Minimums are sorted ascending; band `i` spans `sorted[i]..sorted[i + 1]`
    /// and the last band ends at the fixed ceiling. Equal minimums give
    /// zero-width bands. The set is left untouched on error.
    pub fn update_boundaries(&mut self, minimums: &[f32]) -> Result<()> {
        if minimums.len() != self.bands.len() {
            return Err(EngineError::BandCountMismatch {
                expected: self.bands.len(),
                actual: minimums.len(),
            });
        }

        let mut sorted = minimums.to_vec();
        sorted.sort_by(f32::total_cmp);

        let count = sorted.len();
        for (i, band) in self.bands.iter_mut().enumerate() {
            band.min_hz = sorted[i];
            band.max_hz = if i + 1 < count {
                sorted[i + 1]
            } else {
                self.ceiling_hz
            };
        }
        Ok(())
    }

    /// Current band minimums in band order
    pub fn minimums(&self) -> Vec<f32> {
        self.bands.iter().map(|b| b.min_hz).collect()
    }
}

/// Mean of `frame` over the bins covering `[min_hz, max_hz)`; 0 when the range is empty.
pub fn average_energy(frame: &SpectralFrame, mapper: &FrequencyMapper, min_hz: f32, max_hz: f32) -> f32 {
    let range = mapper.bin_range(min_hz, max_hz);
    let end = range.end.min(frame.len());
    let start = range.start.min(end);
    let slice = &frame.bins[start..end];
    if slice.is_empty() {
        return 0.0;
    }
    let sum: u32 = slice.iter().map(|&b| b as u32).sum();
    sum as f32 / slice.len() as f32
}

/// One state per band; a band is active when its average is strictly above `threshold`.
pub fn aggregate(
    frame: &SpectralFrame,
    bands: &BandSet,
    mapper: &FrequencyMapper,
    threshold: f32,
) -> Vec<BandState> {
    bands
        .bands()
        .iter()
        .map(|band| {
            let average = average_energy(frame, mapper, band.min_hz, band.max_hz);
            BandState {
                band_id: band.id,
                label: band.label.clone(),
                min_hz: band.min_hz,
                max_hz: band.max_hz,
                average_energy: average,
                active: average > threshold,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mapping::MappingPolicy;

    fn mapper() -> FrequencyMapper {
        FrequencyMapper::new(44_100, 1024, 256, MappingPolicy::NyquistRelative)
    }

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("b{}", i)).collect()
    }

    fn assert_partition(set: &BandSet) {
        let bands = set.bands();
        for pair in bands.windows(2) {
            assert_eq!(pair[0].max_hz, pair[1].min_hz);
        }
        assert_eq!(bands.last().unwrap().max_hz, set.ceiling_hz());
    }

    #[test]
    fn unsorted_minimums_become_contiguous_bands() {
        let set = BandSet::from_minimums(&labels(5), &[800.0, 200.0, 1600.0, 400.0, 3200.0], 6000.0)
            .unwrap();
        let ranges: Vec<(f32, f32)> = set.bands().iter().map(|b| (b.min_hz, b.max_hz)).collect();
        assert_eq!(
            ranges,
            vec![
                (200.0, 400.0),
                (400.0, 800.0),
                (800.0, 1600.0),
                (1600.0, 3200.0),
                (3200.0, 6000.0)
            ]
        );
        assert_partition(&set);
    }

    #[test]
    fn partition_holds_for_arbitrary_inputs() {
        let inputs: [&[f32]; 4] = [
            &[5000.0, 10.0, 2500.0],
            &[100.0, 100.0, 100.0, 100.0],
            &[7000.0, 20.0],
            &[0.0],
        ];
        for minimums in inputs {
            let set = BandSet::from_minimums(&labels(minimums.len()), minimums, 6000.0).unwrap();
            assert_partition(&set);
        }
    }

    #[test]
    fn band_identity_survives_updates() {
        let mut set = BandSet::electrodes();
        set.update_boundaries(&[100.0, 300.0, 500.0, 700.0, 900.0]).unwrap();
        let ids: Vec<usize> = set.bands().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(set.bands()[0].label, "electrode1");
    }

    #[test]
    fn wrong_minimum_count_is_rejected_without_changes() {
        let mut set = BandSet::electrodes();
        let before = set.clone();
        let err = set.update_boundaries(&[100.0, 200.0]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::BandCountMismatch { expected: 5, actual: 2 }
        ));
        assert_eq!(set, before);
    }

    #[test]
    fn duplicate_minimums_give_zero_width_band_with_zero_energy() {
        let set = BandSet::from_minimums(&labels(3), &[400.0, 400.0, 1000.0], 6000.0).unwrap();
        assert_eq!(set.bands()[0].min_hz, set.bands()[0].max_hz);

        let frame = SpectralFrame::filled(1024, 255);
        let states = aggregate(&frame, &set, &mapper(), 0.0);
        assert_eq!(states[0].average_energy, 0.0);
        assert!(!states[0].active);
        assert!(states[1].active);
    }

    #[test]
    fn silent_frame_activates_nothing() {
        let frame = SpectralFrame::filled(1024, 0);
        for state in aggregate(&frame, &BandSet::electrodes(), &mapper(), 1.0) {
            assert_eq!(state.average_energy, 0.0);
            assert!(!state.active);
        }
    }

    #[test]
    fn threshold_comparison_is_strict() {
        let frame = SpectralFrame::filled(1024, 50);
        let states = aggregate(&frame, &BandSet::electrodes(), &mapper(), 50.0);
        assert!(states.iter().all(|s| s.average_energy == 50.0 && !s.active));
    }

    #[test]
    fn average_covers_only_band_bins() {
        let m = mapper();
        let mut bins = vec![0u8; 1024];
        // 200..400 Hz is bins 9..19
        for b in &mut bins[9..19] {
            *b = 100;
        }
        bins[19] = 255;
        let frame = SpectralFrame::new(bins);
        assert_eq!(average_energy(&frame, &m, 200.0, 400.0), 100.0);
    }

    #[test]
    fn range_outside_frame_is_empty() {
        let short = SpectralFrame::filled(8, 200);
        assert_eq!(average_energy(&short, &mapper(), 3000.0, 6000.0), 0.0);
    }
}
