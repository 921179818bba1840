use super::canvas::{Canvas, Rect, Rgba};
use crate::engine::mapping::FrequencyMapper;

pub const DEFAULT_FREQUENCY_TICKS: [f32; 4] = [0.0, 1000.0, 2000.0, 4000.0];
const TICK_LENGTH: i32 = 5;
const LABEL_GAP: i32 = 2;

/// Output canvas split into the spectrogram plot and the label margins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlotLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub plot: Rect,
}

impl PlotLayout {
    /// Plot fills everything right of `left_margin` and above `bottom_margin`.
    pub fn new(canvas_width: u32, canvas_height: u32, left_margin: u32, bottom_margin: u32) -> Self {
        let left = left_margin.min(canvas_width);
        let bottom = bottom_margin.min(canvas_height);
        Self {
            canvas_width,
            canvas_height,
            plot: Rect::new(left as i32, 0, canvas_width - left, canvas_height - bottom),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AxisStyle {
    pub line: Rgba,
    pub label: Rgba,
    /// Nominal label height; placement falls back to it when the canvas cannot measure text
    pub label_size: f32,
}

impl Default for AxisStyle {
    fn default() -> Self {
        Self {
            line: Rgba::rgba(255, 255, 255, 204),
            label: Rgba::WHITE,
            label_size: 10.0,
        }
    }
}

/// Draws calibration marks over the output canvas.
///
/// Holds no per-tick state; everything it needs arrives with `draw`.
#[derive(Clone, Debug)]
pub struct AxisRenderer {
    frequency_ticks: Vec<f32>,
    time_tick_seconds: f32,
    fps: f32,
    style: AxisStyle,
}

impl AxisRenderer {
    pub fn new(frequency_ticks: Vec<f32>, time_tick_seconds: f32, fps: u32, style: AxisStyle) -> Self {
        Self {
            frequency_ticks,
            time_tick_seconds,
            fps: fps.max(1) as f32,
            style,
        }
    }

    /// `(hz, row)` for every configured tick at or below the ceiling, plus the ceiling itself
    pub fn frequency_ticks(&self, mapper: &FrequencyMapper) -> Vec<(f32, u32)> {
        let ceiling = mapper.ceiling_hz().round();
        let mut freqs: Vec<f32> = self
            .frequency_ticks
            .iter()
            .copied()
            .filter(|&f| f < ceiling)
            .chain(std::iter::once(ceiling))
            .collect();
        freqs.sort_by(f32::total_cmp);
        freqs.dedup();
        freqs
            .into_iter()
            .filter_map(|f| mapper.y_for_frequency(f.min(mapper.ceiling_hz())).map(|y| (f, y)))
            .collect()
    }

    /// `(seconds_ago, column)` for ticks inside the plot and inside recorded history.
    /// The rightmost column is now; one column per painted frame.
    pub fn time_ticks(&self, plot_width: u32, elapsed_columns: u64) -> Vec<(f32, u32)> {
        if plot_width == 0 || !(self.time_tick_seconds > 0.0) {
            return Vec::new();
        }
        let rightmost = plot_width - 1;
        let mut ticks = Vec::new();
        let mut n = 0u32;
        loop {
            let seconds = n as f32 * self.time_tick_seconds;
            let offset = (seconds * self.fps).round() as u64;
            if offset > rightmost as u64 || offset > elapsed_columns {
                break;
            }
            ticks.push((seconds, rightmost - offset as u32));
            n += 1;
        }
        ticks
    }

    /// `0 s`, `-2 s`, `-1.5 s`: as many decimals as the tick step needs
    pub fn time_label(&self, seconds: f32) -> String {
        if seconds == 0.0 {
            return "0 s".to_string();
        }
        let decimals = (0..3)
            .find(|&d| {
                let scaled = self.time_tick_seconds * 10f32.powi(d);
                (scaled - scaled.round()).abs() < 1e-3
            })
            .unwrap_or(3) as usize;
        format!("-{:.*} s", decimals, seconds)
    }

    /// Axis lines, frequency and time ticks with labels, and a marker at each band minimum.
    pub fn draw<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        layout: &PlotLayout,
        mapper: &FrequencyMapper,
        elapsed_columns: u64,
        band_minimums: &[f32],
    ) {
        let plot = layout.plot;
        if plot.is_empty() {
            return;
        }
        let axis_x = plot.x - 1;
        let axis_y = plot.bottom();
        let right = plot.right() - 1;
        let half_label = (self.style.label_size / 2.0).round() as i32;

        canvas.stroke_line((axis_x, plot.y), (axis_x, axis_y), self.style.line);
        canvas.stroke_line((axis_x, axis_y), (layout.canvas_width as i32 - 1, axis_y), self.style.line);

        // frequency labels end just left of their tick, vertically centred on it
        for (hz, row) in self.frequency_ticks(mapper) {
            let y = plot.y + row as i32;
            canvas.stroke_line((axis_x - TICK_LENGTH, y), (axis_x, y), self.style.line);
            let label = format!("{} Hz", hz as u32);
            let at = match canvas.measure_text(&label) {
                Some((width, height)) => (
                    (axis_x - TICK_LENGTH - LABEL_GAP - width as i32).max(0),
                    y - height as i32 / 2,
                ),
                None => (LABEL_GAP, y - half_label),
            };
            canvas.draw_text(&label, at, self.style.label);
        }

        let label_top = axis_y + TICK_LENGTH + 1;
        for (seconds, column) in self.time_ticks(plot.width, elapsed_columns) {
            let x = plot.x + column as i32;
            canvas.stroke_line((x, axis_y), (x, axis_y + TICK_LENGTH), self.style.line);
            let label = self.time_label(seconds);
            // centred under the tick, pulled back inside the canvas at the right edge
            let left = match canvas.measure_text(&label) {
                Some((width, _)) => {
                    (x - width as i32 / 2).min(layout.canvas_width as i32 - width as i32)
                }
                None => x - half_label * 2,
            };
            canvas.draw_text(&label, (left, label_top), self.style.label);
        }

        for &min_hz in band_minimums {
            let Some(row) = mapper.y_for_frequency(min_hz) else {
                continue;
            };
            let y = plot.y + row as i32;
            canvas.stroke_line((right, y), (right - (TICK_LENGTH - 1), y), self.style.line);
        }
    }
}
