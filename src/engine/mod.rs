//! Frame-driven analysis engine: pulls one spectral frame per tick and feeds
//! either the band aggregator or the scroll compositor.

pub mod bands;
pub mod control;
pub mod mapping;
pub mod scheduler;
pub mod source;

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::error::{EngineError, Result};
use crate::render::axes::{AxisRenderer, AxisStyle, PlotLayout};
use crate::render::canvas::{Canvas, Rgba};
use crate::render::color::{ColorMap, ColorMapKind};
use crate::render::compositor::ScrollCompositor;
use bands::BandState;
use control::{ControlEvent, ControlState};
use mapping::{FrequencyMapper, MappingPolicy};
use source::SpectralSource;

/// Which front end consumes the frames
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    /// Scrolling time-frequency image
    #[default]
    Spectrogram,
    /// Per-band activation states
    Bands,
}

/// Session settings, fixed once the engine is built
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub view: ViewMode,
    pub mapping: MappingPolicy,
    pub width: u32,
    pub height: u32,
    pub left_margin: u32,
    pub bottom_margin: u32,
    pub background: Rgba,
    pub color_map: ColorMapKind,
    pub reverse_gradient: bool,
    pub frequency_ticks: Vec<f32>,
    pub time_tick_seconds: f32,
    pub fps: u32,
    pub axis_style: AxisStyle,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            view: ViewMode::Spectrogram,
            mapping: MappingPolicy::NyquistRelative,
            width: 640,
            height: 300,
            left_margin: 40,
            bottom_margin: 20,
            background: Rgba::BLACK,
            color_map: ColorMapKind::VerticalGradient,
            reverse_gradient: false,
            frequency_ticks: crate::render::axes::DEFAULT_FREQUENCY_TICKS.to_vec(),
            time_tick_seconds: 1.0,
            fps: 60,
            axis_style: AxisStyle::default(),
        }
    }
}

/// Outcome of one tick
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// Whether the source delivered a frame this tick
    pub frame_received: bool,
    /// Set in bands mode when a frame arrived
    pub band_states: Option<Vec<BandState>>,
    /// Spectrogram pixels painted this tick
    pub pixels_painted: usize,
}

enum EngineState<S> {
    Uninitialized,
    Running { source: S, mapper: FrequencyMapper },
}

pub struct Engine<S> {
    settings: EngineSettings,
    controls: ControlState,
    layout: PlotLayout,
    compositor: ScrollCompositor,
    axes: AxisRenderer,
    colors: Box<dyn ColorMap>,
    state: EngineState<S>,
    ticks: u64,
}

impl<S: SpectralSource> Engine<S> {
    /// Builds an uninitialized engine with a background-filled image.
    pub fn new(settings: EngineSettings, controls: ControlState) -> Self {
        let layout = PlotLayout::new(
            settings.width,
            settings.height,
            settings.left_margin,
            settings.bottom_margin,
        );
        let compositor =
            ScrollCompositor::new(layout.plot.width, layout.plot.height, settings.background);
        let axes = AxisRenderer::new(
            settings.frequency_ticks.clone(),
            settings.time_tick_seconds,
            settings.fps,
            settings.axis_style,
        );
        let colors = settings
            .color_map
            .build(settings.reverse_gradient, settings.background);
        Self {
            settings,
            controls,
            layout,
            compositor,
            axes,
            colors,
            state: EngineState::Uninitialized,
            ticks: 0,
        }
    }

    /// Attaches the spectral source. Runs `acquire` once; on failure the engine
    /// stays uninitialized and the error is reported here and nowhere else.
    pub fn start<F, E>(&mut self, acquire: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<S, E>,
        E: Display,
    {
        if self.is_running() {
            return Err(EngineError::AlreadyRunning);
        }

        let source = acquire().map_err(|e| {
            log::error!("Failed to acquire spectral source: {}", e);
            EngineError::SourceUnavailable(e.to_string())
        })?;
        if source.frame_length() == 0 || source.sample_rate() == 0 {
            log::error!(
                "Spectral source is unusable: sample_rate={}, frame_length={}",
                source.sample_rate(),
                source.frame_length()
            );
            return Err(EngineError::SourceUnavailable(
                "source reports an empty spectrum".into(),
            ));
        }

        let mapper = FrequencyMapper::new(
            source.sample_rate(),
            source.frame_length(),
            self.layout.plot.height,
            self.settings.mapping,
        );
        log::info!(
            "Engine running: {} Hz, {} bins, view={:?}, mapping={:?}, ceiling={:.0} Hz",
            source.sample_rate(),
            source.frame_length(),
            self.settings.view,
            self.settings.mapping,
            mapper.ceiling_hz()
        );
        self.state = EngineState::Running { source, mapper };
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, EngineState::Running { .. })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn controls(&self) -> &ControlState {
        &self.controls
    }

    pub fn layout(&self) -> &PlotLayout {
        &self.layout
    }

    pub fn compositor(&self) -> &ScrollCompositor {
        &self.compositor
    }

    pub fn mapper(&self) -> Option<&FrequencyMapper> {
        match &self.state {
            EngineState::Running { mapper, .. } => Some(mapper),
            EngineState::Uninitialized => None,
        }
    }

    pub fn source(&self) -> Option<&S> {
        match &self.state {
            EngineState::Running { source, .. } => Some(source),
            EngineState::Uninitialized => None,
        }
    }

    /// Ticks run since the source was attached
    pub fn elapsed_ticks(&self) -> u64 {
        self.ticks
    }

    /// Applies a control-surface change between ticks.
    pub fn apply_control(&mut self, event: &ControlEvent) -> Result<()> {
        self.controls.apply(event)
    }

    /// Pulls one frame and runs the active front end. Does nothing until started.
    pub fn tick(&mut self) -> TickReport {
        let EngineState::Running { source, mapper } = &mut self.state else {
            return TickReport::default();
        };

        let tick = self.ticks;
        self.ticks += 1;

        let Some(frame) = source.get_frame() else {
            log::trace!("Tick {}: no frame", tick);
            return TickReport {
                tick,
                ..TickReport::default()
            };
        };

        match self.settings.view {
            ViewMode::Bands => {
                let states = bands::aggregate(
                    frame,
                    self.controls.bands(),
                    mapper,
                    self.controls.threshold(),
                );
                TickReport {
                    tick,
                    frame_received: true,
                    band_states: Some(states),
                    pixels_painted: 0,
                }
            }
            ViewMode::Spectrogram => {
                let painted =
                    self.compositor
                        .advance_and_paint(frame, mapper, self.colors.as_ref());
                TickReport {
                    tick,
                    frame_received: true,
                    band_states: None,
                    pixels_painted: painted,
                }
            }
        }
    }

    /// Composes the output canvas: background, spectrogram image in the plot
    /// area, then axes on top so they never reach the image history.
    pub fn render<C: Canvas + ?Sized>(&self, output: &mut C) {
        let (width, height) = output.size();
        output.fill_rect(
            crate::render::canvas::Rect::new(0, 0, width, height),
            self.settings.background,
        );
        let plot = self.layout.plot;
        output.put_pixels(plot.x, plot.y, &self.compositor.snapshot());

        if let EngineState::Running { mapper, .. } = &self.state {
            let minimums = self.controls.bands().minimums();
            self.axes.draw(
                output,
                &self.layout,
                mapper,
                self.compositor.columns_written(),
                &minimums,
            );
        }
    }

    /// One full tick: analysis first, then composition.
    pub fn tick_and_render<C: Canvas + ?Sized>(&mut self, output: &mut C) -> TickReport {
        let report = self.tick();
        self.render(output);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bands::BandSet;
    use crate::engine::control::DEFAULT_THRESHOLD;
    use crate::engine::source::SpectralFrame;
    use crate::render::canvas::RgbaCanvas;

    struct Repeating {
        frame: SpectralFrame,
        sample_rate: u32,
        misses: u32,
    }

    impl SpectralSource for Repeating {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn frame_length(&self) -> usize {
            self.frame.len()
        }

        fn get_frame(&mut self) -> Option<&SpectralFrame> {
            if self.misses > 0 {
                self.misses -= 1;
                return None;
            }
            Some(&self.frame)
        }
    }

    fn source(value: u8) -> Repeating {
        Repeating {
            frame: SpectralFrame::filled(1024, value),
            sample_rate: 44_100,
            misses: 0,
        }
    }

    fn engine(view: ViewMode) -> Engine<Repeating> {
        let settings = EngineSettings {
            view,
            width: 80,
            height: 50,
            left_margin: 10,
            bottom_margin: 10,
            ..EngineSettings::default()
        };
        Engine::new(settings, ControlState::new(BandSet::electrodes(), DEFAULT_THRESHOLD))
    }

    #[test]
    fn uninitialized_engine_ticks_without_effect() {
        let mut e = engine(ViewMode::Spectrogram);
        assert!(!e.is_running());
        assert_eq!(e.tick(), TickReport::default());
        assert_eq!(e.compositor().columns_written(), 0);
        assert_eq!(e.elapsed_ticks(), 0);
    }

    #[test]
    fn failed_acquisition_leaves_engine_uninitialized() {
        let mut e = engine(ViewMode::Bands);
        let err = e.start(|| Err::<Repeating, _>("permission denied")).unwrap_err();
        assert!(matches!(err, EngineError::SourceUnavailable(ref msg) if msg == "permission denied"));
        assert!(!e.is_running());
        assert!(e.mapper().is_none());
    }

    #[test]
    fn empty_source_is_rejected() {
        let mut e = engine(ViewMode::Bands);
        let err = e
            .start(|| {
                Ok::<_, String>(Repeating {
                    frame: SpectralFrame::default(),
                    sample_rate: 44_100,
                    misses: 0,
                })
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::SourceUnavailable(_)));
        assert!(!e.is_running());
    }

    #[test]
    fn start_is_one_way() {
        let mut e = engine(ViewMode::Bands);
        e.start(|| Ok::<_, String>(source(0))).unwrap();
        let mut called = false;
        let err = e
            .start(|| {
                called = true;
                Ok::<_, String>(source(0))
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyRunning));
        assert!(!called);
        assert!(e.is_running());
    }

    #[test]
    fn missing_frame_produces_no_update() {
        let mut e = engine(ViewMode::Spectrogram);
        e.start(|| {
            Ok::<_, String>(Repeating {
                misses: 1,
                ..source(200)
            })
        })
        .unwrap();
        let first = e.tick();
        assert_eq!(first.tick, 0);
        assert!(!first.frame_received);
        assert_eq!(e.compositor().columns_written(), 0);

        let second = e.tick();
        assert_eq!(second.tick, 1);
        assert!(second.frame_received);
        assert!(second.pixels_painted > 0);
        assert_eq!(e.compositor().columns_written(), 1);
    }

    #[test]
    fn threshold_change_applies_on_next_tick() {
        let mut e = engine(ViewMode::Bands);
        e.start(|| Ok::<_, String>(source(60))).unwrap();
        let states = e.tick().band_states.unwrap();
        assert!(states.iter().all(|s| s.active));

        e.apply_control(&ControlEvent::SetThreshold(70.0)).unwrap();
        let states = e.tick().band_states.unwrap();
        assert!(states.iter().all(|s| !s.active));
    }

    #[test]
    fn render_keeps_axes_out_of_image_history() {
        let mut e = engine(ViewMode::Spectrogram);
        e.start(|| Ok::<_, String>(source(0))).unwrap();
        let mut out = RgbaCanvas::new(80, 50, Rgba::BLACK);
        for _ in 0..5 {
            e.tick_and_render(&mut out);
        }
        // silent frames leave the image untouched even though markers were drawn over it
        assert!(e
            .compositor()
            .image()
            .pixels()
            .iter()
            .all(|&p| p == Rgba::BLACK));
        // axis line drawn on the output
        assert_ne!(out.pixel(9, 5), Some(Rgba::BLACK));
    }

    #[test]
    fn time_ticks_follow_painted_columns_not_ticks() {
        let mut e = engine(ViewMode::Spectrogram);
        e.start(|| {
            Ok::<_, String>(Repeating {
                misses: 60,
                ..source(0)
            })
        })
        .unwrap();
        let mut out = RgbaCanvas::new(80, 50, Rgba::BLACK);
        // plot is 70x40 at x = 10; the -1 s tick sits 60 columns left of now, at x = 19
        let one_second_mark = |out: &RgbaCanvas| out.pixel(19, 43);

        for _ in 0..61 {
            e.tick_and_render(&mut out);
        }
        assert_eq!(e.elapsed_ticks(), 61);
        assert_eq!(e.compositor().columns_written(), 1);
        assert_eq!(one_second_mark(&out), Some(Rgba::BLACK));

        for _ in 0..60 {
            e.tick_and_render(&mut out);
        }
        assert_eq!(e.compositor().columns_written(), 61);
        assert_ne!(one_second_mark(&out), Some(Rgba::BLACK));
    }
}
