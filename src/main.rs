mod cli;
mod config;
mod encode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::ops::ControlFlow;
use std::path::Path;

use bandscope::audio::analyser::{AnalyserSettings, AnalyserSource};
use bandscope::audio::decode::decode_file;
use bandscope::engine::scheduler::{run_ticks, FrameClock, OfflineClock, RealtimeClock};
use bandscope::output::open_band_output;
use bandscope::render::axes::AxisStyle;
use bandscope::render::canvas::{Rgba, RgbaCanvas};
use bandscope::render::color::ColorMapKind;
use bandscope::render::text::{load_font_from_url, TextOverlay};
use bandscope::{
    BandSet, ControlState, ControlSurface, Engine, EngineSettings, ScriptedControls, ViewMode,
};

use cli::{Cli, MappingKind};
use config::Config;
use encode::ffmpeg::{EncoderSettings, FfmpegEncoder};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let cfg = match config::discover_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) => {
                log::warn!("{:#}", err);
                Config::default()
            }
        },
        None => Config::default(),
    };
    merge_config(&mut cli, &cfg);

    let input = cli.input.clone().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("bandscope");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", cli.output.display());
    log::info!("Mode: {:?}, {}x{} @ {}fps", cli.mode, cli.width, cli.height, cli.fps);

    let background = Rgba::from_hex(&cfg.spectrogram.background).unwrap_or_else(|| {
        log::warn!("Invalid background colour {:?}, using black", cfg.spectrogram.background);
        Rgba::BLACK
    });
    let axis_style = AxisStyle::default();
    let settings = EngineSettings {
        view: cli.mode,
        mapping: cli.mapping.policy(cli.ceiling_hz),
        width: cli.width,
        height: cli.height,
        left_margin: cfg.spectrogram.left_margin,
        bottom_margin: cfg.spectrogram.bottom_margin,
        background,
        color_map: cli.color_map,
        reverse_gradient: cli.reverse_gradient,
        frequency_ticks: cfg.spectrogram.frequency_ticks.clone(),
        time_tick_seconds: cfg.spectrogram.time_tick_seconds,
        fps: cli.fps,
        axis_style,
    };

    let controls = ControlState::new(build_bands(&cfg)?, cli.threshold);
    let mut engine: Engine<AnalyserSource> = Engine::new(settings, controls);

    let analyser = AnalyserSettings {
        fft_size: cli.fft_size,
        smoothing: cli.smoothing,
        min_db: cfg.analysis.min_db,
        max_db: cfg.analysis.max_db,
        fps: cli.fps,
    };
    engine
        .start(|| -> Result<AnalyserSource> {
            let pcm = decode_file(&input)?;
            Ok(AnalyserSource::new(pcm, analyser)?)
        })
        .context("Could not start analysis")?;

    let total_ticks = engine.source().map_or(0, |s| s.frames_total()) as u64;
    let mut clock: Box<dyn FrameClock> = if cli.realtime {
        Box::new(RealtimeClock::new(cli.fps).with_budget(total_ticks))
    } else {
        Box::new(OfflineClock::new(total_ticks))
    };
    let mut script = cfg.control_script();

    let pb = ProgressBar::new(total_ticks);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ticks ({eta} remaining)")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    let ran = match cli.mode {
        ViewMode::Spectrogram => {
            render_video(&cli, &input, &mut engine, clock.as_mut(), &mut script, &pb, axis_style)?
        }
        ViewMode::Bands => {
            write_band_states(&cli, &mut engine, clock.as_mut(), &mut script, &pb)?
        }
    };

    pb.finish_with_message("done");
    log::info!("Done! {} ticks, output: {}", ran, cli.output.display());
    Ok(())
}

/// Config values apply only where the CLI is still at its default.
fn merge_config(cli: &mut Cli, cfg: &Config) {
    if cli.width == cli::DEFAULT_WIDTH { cli.width = cfg.output.width; }
    if cli.height == cli::DEFAULT_HEIGHT { cli.height = cfg.output.height; }
    if cli.fps == cli::DEFAULT_FPS { cli.fps = cfg.output.fps; }
    if cli.crf == cli::DEFAULT_CRF { cli.crf = cfg.output.crf; }
    if cli.codec == cli::DEFAULT_CODEC { cli.codec = cfg.output.codec.clone(); }
    if cli.pix_fmt == cli::DEFAULT_PIX_FMT { cli.pix_fmt = cfg.output.pix_fmt.clone(); }
    if cli.fft_size == cli::DEFAULT_FFT_SIZE { cli.fft_size = cfg.analysis.fft_size; }
    if cli.smoothing == cli::DEFAULT_SMOOTHING { cli.smoothing = cfg.analysis.smoothing; }
    if cli.threshold == cli::DEFAULT_THRESHOLD { cli.threshold = cfg.bands.threshold; }
    if cli.mapping == MappingKind::Nyquist { cli.mapping = cfg.spectrogram.mapping; }
    if cli.ceiling_hz == cli::DEFAULT_FIXED_CEILING_HZ { cli.ceiling_hz = cfg.spectrogram.ceiling_hz; }
    if cli.color_map == ColorMapKind::VerticalGradient { cli.color_map = cfg.spectrogram.color_map; }
    if !cli.reverse_gradient { cli.reverse_gradient = cfg.spectrogram.reverse_gradient; }
    if cli.font.is_none() {
        cli.font = cfg.output.font.clone();
    }
    if cli.font_url.is_none() {
        cli.font_url = cfg.output.font_url.clone();
    }
}

fn build_bands(cfg: &Config) -> Result<BandSet> {
    if cfg.bands.minimums.is_empty() {
        return Ok(BandSet::electrodes());
    }
    let labels: Vec<String> = if cfg.bands.labels.is_empty() {
        (1..=cfg.bands.minimums.len()).map(|i| format!("band{}", i)).collect()
    } else {
        cfg.bands.labels.clone()
    };
    BandSet::from_minimums(&labels, &cfg.bands.minimums, cfg.bands.ceiling_hz)
        .context("Invalid [bands] section")
}

/// Releases due scripted events before the tick that follows them.
fn apply_due_controls(engine: &mut Engine<AnalyserSource>, script: &mut ScriptedControls, time: f32) {
    for event in script.poll(time) {
        if let Err(err) = engine.apply_control(&event) {
            log::warn!("Control event {:?} rejected: {}", event, err);
        }
    }
}

fn load_font(cli: &Cli, size: f32) -> Option<TextOverlay> {
    let loaded = if let Some(ref path) = cli.font {
        TextOverlay::from_file(path, size)
    } else if let Some(ref url) = cli.font_url {
        load_font_from_url(url).and_then(|bytes| TextOverlay::from_bytes(&bytes, size))
    } else {
        log::info!("No font configured, axis labels are skipped");
        return None;
    };
    match loaded {
        Ok(overlay) => Some(overlay),
        Err(err) => {
            log::warn!("Failed to load font: {:#}", err);
            None
        }
    }
}

fn render_video(
    cli: &Cli,
    input: &Path,
    engine: &mut Engine<AnalyserSource>,
    clock: &mut dyn FrameClock,
    script: &mut ScriptedControls,
    pb: &ProgressBar,
    axis_style: AxisStyle,
) -> Result<u64> {
    let mut canvas = RgbaCanvas::new(cli.width, cli.height, engine.settings().background);
    if let Some(overlay) = load_font(cli, axis_style.label_size) {
        canvas = canvas.with_text(overlay);
    }

    let mut encoder = FfmpegEncoder::spawn(
        &cli.output,
        input,
        &EncoderSettings {
            width: cli.width,
            height: cli.height,
            fps: cli.fps,
            codec: cli.codec.clone(),
            pix_fmt: cli.pix_fmt.clone(),
            crf: cli.crf,
        },
    )?;

    let fps = cli.fps.max(1) as f32;
    let ran = run_ticks(clock, |tick| -> Result<ControlFlow<()>> {
        apply_due_controls(engine, script, tick as f32 / fps);
        engine.tick_and_render(&mut canvas);
        encoder.write_frame(canvas.as_bytes())?;
        pb.inc(1);
        Ok(ControlFlow::Continue(()))
    })?;

    log::info!("Finishing encoding...");
    encoder.finish()?;
    Ok(ran)
}

fn write_band_states(
    cli: &Cli,
    engine: &mut Engine<AnalyserSource>,
    clock: &mut dyn FrameClock,
    script: &mut ScriptedControls,
    pb: &ProgressBar,
) -> Result<u64> {
    let mut writer = open_band_output(&cli.output)?;
    let fps = cli.fps.max(1) as f32;

    let ran = run_ticks(clock, |tick| -> Result<ControlFlow<()>> {
        let time = tick as f32 / fps;
        apply_due_controls(engine, script, time);
        let report = engine.tick();
        if let Some(states) = report.band_states {
            writer.write(report.tick, time, &states)?;
        }
        pb.inc(1);
        Ok(ControlFlow::Continue(()))
    })?;

    log::info!("Wrote {} band records", writer.lines());
    writer.finish()?;
    Ok(ran)
}
