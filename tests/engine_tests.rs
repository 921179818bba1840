use std::collections::VecDeque;
use std::ops::ControlFlow;

use approx::assert_relative_eq;
use bandscope::engine::control::DEFAULT_THRESHOLD;
use bandscope::engine::scheduler::{run_ticks, OfflineClock};
use bandscope::render::canvas::{Rgba, RgbaCanvas};
use bandscope::{
    BandSet, ControlEvent, ControlState, ControlSurface, Engine, EngineError, EngineSettings,
    FrequencyMapper, MappingPolicy, ScriptedControls, SpectralFrame, SpectralSource, ViewMode,
};

/// Replays a fixed queue of frames, then reports no frame.
struct Synthetic {
    sample_rate: u32,
    frame_length: usize,
    queue: VecDeque<SpectralFrame>,
    current: SpectralFrame,
}

impl Synthetic {
    fn new(sample_rate: u32, frame_length: usize, frames: Vec<SpectralFrame>) -> Self {
        Self {
            sample_rate,
            frame_length,
            queue: frames.into(),
            current: SpectralFrame::default(),
        }
    }

    fn constant(value: u8, ticks: usize) -> Self {
        Self::new(44_100, 1024, vec![SpectralFrame::filled(1024, value); ticks])
    }
}

impl SpectralSource for Synthetic {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn get_frame(&mut self) -> Option<&SpectralFrame> {
        self.current = self.queue.pop_front()?;
        Some(&self.current)
    }
}

fn bands_engine(threshold: f32) -> Engine<Synthetic> {
    let settings = EngineSettings {
        view: ViewMode::Bands,
        ..EngineSettings::default()
    };
    Engine::new(settings, ControlState::new(BandSet::electrodes(), threshold))
}

#[test]
fn loud_frame_activates_every_electrode() {
    let mut engine = bands_engine(DEFAULT_THRESHOLD);
    engine.start(|| Ok::<_, String>(Synthetic::constant(60, 1))).unwrap();

    let states = engine.tick().band_states.unwrap();
    assert_eq!(states.len(), 5);
    for state in &states {
        assert_relative_eq!(state.average_energy, 60.0);
        assert!(state.active);
    }
}

#[test]
fn quiet_frame_activates_nothing() {
    let mut engine = bands_engine(DEFAULT_THRESHOLD);
    engine.start(|| Ok::<_, String>(Synthetic::constant(40, 1))).unwrap();

    let states = engine.tick().band_states.unwrap();
    assert!(states.iter().all(|s| !s.active));
    assert!(states.iter().all(|s| s.average_energy == 40.0));
}

#[test]
fn energy_equal_to_threshold_is_inactive() {
    let mut engine = bands_engine(50.0);
    engine.start(|| Ok::<_, String>(Synthetic::constant(50, 1))).unwrap();
    assert!(engine.tick().band_states.unwrap().iter().all(|s| !s.active));
}

#[test]
fn unsorted_slider_values_yield_ordered_bands() {
    let mut engine = bands_engine(DEFAULT_THRESHOLD);
    let sliders = [800.0, 200.0, 1600.0, 400.0, 3200.0];
    for (index, &hz) in sliders.iter().enumerate() {
        engine
            .apply_control(&ControlEvent::SetBandMinimum { index, hz })
            .unwrap();
    }

    let bounds: Vec<(f32, f32)> = engine
        .controls()
        .bands()
        .bands()
        .iter()
        .map(|b| (b.min_hz, b.max_hz))
        .collect();
    assert_eq!(
        bounds,
        vec![
            (200.0, 400.0),
            (400.0, 800.0),
            (800.0, 1600.0),
            (1600.0, 3200.0),
            (3200.0, 6000.0),
        ]
    );
}

#[test]
fn band_energy_follows_its_bins() {
    // 44.1 kHz, 1024 bins: 200-400 Hz covers bins 9..19
    let mapper = FrequencyMapper::new(44_100, 1024, 280, MappingPolicy::NyquistRelative);
    let range = mapper.bin_range(200.0, 400.0);
    let mut bins = vec![0u8; 1024];
    for bin in range {
        bins[bin] = 200;
    }

    let mut engine = bands_engine(DEFAULT_THRESHOLD);
    engine
        .start(|| Ok::<_, String>(Synthetic::new(44_100, 1024, vec![SpectralFrame::new(bins)])))
        .unwrap();
    let states = engine.tick().band_states.unwrap();
    assert!(states[0].active);
    assert_relative_eq!(states[0].average_energy, 200.0);
    assert!(states[1..].iter().all(|s| !s.active));
}

#[test]
fn scripted_threshold_change_lands_between_ticks() {
    let mut engine = bands_engine(DEFAULT_THRESHOLD);
    engine.start(|| Ok::<_, String>(Synthetic::constant(60, 4))).unwrap();
    let mut script = ScriptedControls::new(vec![(2.0, ControlEvent::SetThreshold(80.0))]);

    let mut activity = Vec::new();
    run_ticks(&mut OfflineClock::new(4), |tick| {
        for event in script.poll(tick as f32) {
            engine.apply_control(&event)?;
        }
        let states = engine.tick().band_states.unwrap_or_default();
        activity.push(states.iter().all(|s| s.active));
        Ok::<_, EngineError>(ControlFlow::Continue(()))
    })
    .unwrap();

    assert_eq!(activity, vec![true, true, false, false]);
}

#[test]
fn spectrogram_keeps_exactly_one_column_per_tick() {
    let width = 8u32;
    let height = 16u32;
    let settings = EngineSettings {
        view: ViewMode::Spectrogram,
        width,
        height,
        left_margin: 0,
        bottom_margin: 0,
        color_map: bandscope::render::color::ColorMapKind::Hsl,
        ..EngineSettings::default()
    };
    let frames: Vec<SpectralFrame> = (0..width + 3)
        .map(|k| SpectralFrame::filled(8, (k * 20 + 20) as u8))
        .collect();
    let mut engine = Engine::new(settings, ControlState::new(BandSet::electrodes(), 50.0));
    engine
        .start(|| Ok::<_, String>(Synthetic::new(8000, 8, frames)))
        .unwrap();

    let mut painted_columns = Vec::new();
    for _ in 0..width + 3 {
        let report = engine.tick();
        assert_eq!(report.pixels_painted, 8);
        let image = engine.compositor().image();
        painted_columns.push(
            (0..height)
                .map(|y| image.pixel(width - 1, y).unwrap())
                .collect::<Vec<Rgba>>(),
        );
    }

    // after width + 3 ticks, column x holds the frame from tick x + 3
    let image = engine.compositor().image();
    for x in 0..width {
        let column: Vec<Rgba> = (0..height).map(|y| image.pixel(x, y).unwrap()).collect();
        assert_eq!(column, painted_columns[(x + 3) as usize]);
    }
    assert_eq!(engine.compositor().columns_written(), (width + 3) as u64);
}

#[test]
fn fixed_ceiling_skips_high_bins() {
    let settings = EngineSettings {
        view: ViewMode::Spectrogram,
        mapping: MappingPolicy::FixedCeiling { ceiling_hz: 2000.0 },
        width: 4,
        height: 10,
        left_margin: 0,
        bottom_margin: 0,
        ..EngineSettings::default()
    };
    let mut engine = Engine::new(settings, ControlState::new(BandSet::electrodes(), 50.0));
    // 8 bins at 500 Hz spacing: 0..=2000 Hz are bins 0..=4
    engine
        .start(|| Ok::<_, String>(Synthetic::new(8000, 8, vec![SpectralFrame::filled(8, 255)])))
        .unwrap();
    assert_eq!(engine.tick().pixels_painted, 5);
}

#[test]
fn unavailable_source_never_paints() {
    let mut engine: Engine<Synthetic> = Engine::new(
        EngineSettings::default(),
        ControlState::new(BandSet::electrodes(), 50.0),
    );
    let err = engine
        .start(|| Err::<Synthetic, _>("device busy"))
        .unwrap_err();
    assert!(matches!(err, EngineError::SourceUnavailable(_)));

    let mut out = RgbaCanvas::new(640, 300, Rgba::BLACK);
    for _ in 0..3 {
        let report = engine.tick_and_render(&mut out);
        assert!(!report.frame_received);
        assert_eq!(report.pixels_painted, 0);
    }
    assert!(!engine.is_running());
    assert!(out.pixels().iter().all(|&p| p == Rgba::BLACK));
}

#[test]
fn output_frame_has_axes_but_image_history_does_not() {
    let settings = EngineSettings {
        view: ViewMode::Spectrogram,
        width: 200,
        height: 120,
        ..EngineSettings::default()
    };
    let mut engine = Engine::new(settings, ControlState::new(BandSet::electrodes(), 50.0));
    engine
        .start(|| Ok::<_, String>(Synthetic::constant(0, 30)))
        .unwrap();

    let mut out = RgbaCanvas::new(200, 120, Rgba::BLACK);
    for _ in 0..30 {
        engine.tick_and_render(&mut out);
    }

    let plot = engine.layout().plot;
    // y axis sits just left of the plot area
    assert_ne!(out.pixel((plot.x - 1) as u32, 10), Some(Rgba::BLACK));
    // silent input leaves the spectrogram image at background everywhere
    assert!(engine
        .compositor()
        .image()
        .pixels()
        .iter()
        .all(|&p| p == Rgba::BLACK));
}
