use serde::{Deserialize, Serialize};

use super::bands::BandSet;
use crate::error::{EngineError, Result};

pub const THRESHOLD_MIN: f32 = 0.0;
pub const THRESHOLD_MAX: f32 = 255.0;
pub const DEFAULT_THRESHOLD: f32 = 50.0;

/// Change notification from the control surface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlEvent {
    SetThreshold(f32),
    SetBandMinimum { index: usize, hz: f32 },
}

/// Session-wide tunables shared by the tick loop and the control surface.
///
/// `slider_minimums` keeps the raw per-band values in slider order; the band
/// set is always rebuilt from all of them at once.
#[derive(Clone, Debug)]
pub struct ControlState {
    threshold: f32,
    slider_minimums: Vec<f32>,
    bands: BandSet,
}

impl ControlState {
    pub fn new(bands: BandSet, threshold: f32) -> Self {
        Self {
            threshold: clamp_threshold(threshold),
            slider_minimums: bands.minimums(),
            bands,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn bands(&self) -> &BandSet {
        &self.bands
    }

    pub fn set_threshold(&mut self, value: f32) {
        self.threshold = clamp_threshold(value);
        log::debug!("Threshold set to {:.0}", self.threshold);
    }

    pub fn set_band_minimum(&mut self, index: usize, hz: f32) -> Result<()> {
        let count = self.slider_minimums.len();
        let slot = self
            .slider_minimums
            .get_mut(index)
            .ok_or(EngineError::BandIndexOutOfRange { index, count })?;
        *slot = hz;
        self.bands.update_boundaries(&self.slider_minimums)?;
        log::debug!(
            "Band slider {} set to {:.0} Hz, bands now {:?}",
            index,
            hz,
            self.bands
                .bands()
                .iter()
                .map(|b| (b.min_hz, b.max_hz))
                .collect::<Vec<_>>()
        );
        Ok(())
    }

    pub fn apply(&mut self, event: &ControlEvent) -> Result<()> {
        match *event {
            ControlEvent::SetThreshold(value) => {
                self.set_threshold(value);
                Ok(())
            }
            ControlEvent::SetBandMinimum { index, hz } => self.set_band_minimum(index, hz),
        }
    }
}

fn clamp_threshold(value: f32) -> f32 {
    if value.is_nan() {
        return THRESHOLD_MIN;
    }
    value.clamp(THRESHOLD_MIN, THRESHOLD_MAX)
}

/// Source of control events, drained once per tick before the frame is analysed.
pub trait ControlSurface {
    fn poll(&mut self, time: f32) -> Vec<ControlEvent>;
}

/// Control surface replaying events at fixed timestamps (seconds).
#[derive(Clone, Debug, Default)]
pub struct ScriptedControls {
    events: Vec<(f32, ControlEvent)>,
    next: usize,
}

impl ScriptedControls {
    pub fn new(mut events: Vec<(f32, ControlEvent)>) -> Self {
        events.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { events, next: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.events.len() - self.next
    }
}

impl ControlSurface for ScriptedControls {
    fn poll(&mut self, time: f32) -> Vec<ControlEvent> {
        let due = self.events[self.next..].partition_point(|(at, _)| *at <= time);
        let released: Vec<ControlEvent> = self.events[self.next..self.next + due]
            .iter()
            .map(|(_, event)| event.clone())
            .collect();
        self.next += due;
        released
    }
}
