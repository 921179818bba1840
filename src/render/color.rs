use serde::{Deserialize, Serialize};

use super::canvas::Rgba;

/// What a colour map gets to know about the pixel being painted
#[derive(Clone, Copy, Debug)]
pub struct ColorContext {
    /// Bin magnitude scaled to 0.0-1.0
    pub amplitude: f32,
    /// Row position, 0.0 at the bottom of the plot and 1.0 at the top
    pub height_fraction: f32,
}

pub trait ColorMap {
    /// Colour for one spectrogram pixel; brightness never decreases with amplitude.
    fn color(&self, context: &ColorContext) -> Rgba;
}

/// Colour stop positions are 0.0-1.0
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    stops: Vec<(f32, Rgba)>,
}

impl Gradient {
    pub fn new(mut stops: Vec<(f32, Rgba)>) -> Self {
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { stops }
    }

    /// Dark blue through cyan to yellow
    pub fn ocean() -> Self {
        Self::new(vec![
            (0.0, Rgba::rgb(0x00, 0x00, 0x8b)),
            (0.25, Rgba::rgb(0x00, 0x8b, 0x8b)),
            (0.5, Rgba::rgb(0x00, 0xce, 0xd1)),
            (0.75, Rgba::rgb(0xad, 0xff, 0x2f)),
            (1.0, Rgba::rgb(0xff, 0xff, 0x00)),
        ])
    }

    /// Black through purple and orange to pale yellow
    pub fn inferno() -> Self {
        Self::new(vec![
            (0.0, Rgba::rgb(0x00, 0x00, 0x04)),
            (0.25, Rgba::rgb(0x42, 0x0a, 0x68)),
            (0.5, Rgba::rgb(0x93, 0x26, 0x67)),
            (0.75, Rgba::rgb(0xf3, 0x76, 0x1b)),
            (1.0, Rgba::rgb(0xfc, 0xff, 0xa4)),
        ])
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.stops.iter().map(|&(pos, color)| (1.0 - pos, color)).collect())
    }

    pub fn sample(&self, position: f32) -> Rgba {
        let (Some(first), Some(last)) = (self.stops.first(), self.stops.last()) else {
            return Rgba::BLACK;
        };
        let position = position.clamp(0.0, 1.0);
        if position <= first.0 {
            return first.1;
        }
        if position >= last.0 {
            return last.1;
        }
        let upper = self.stops.partition_point(|(pos, _)| *pos <= position);
        let (lo_pos, lo) = self.stops[upper - 1];
        let (hi_pos, hi) = self.stops[upper];
        let span = hi_pos - lo_pos;
        if span <= 0.0 {
            return hi;
        }
        lo.lerp(hi, (position - lo_pos) / span)
    }
}

/// Gradient laid out along the frequency axis, faded in over the background by amplitude
pub struct VerticalGradient {
    pub gradient: Gradient,
    pub background: Rgba,
}

impl ColorMap for VerticalGradient {
    fn color(&self, context: &ColorContext) -> Rgba {
        self.gradient
            .sample(context.height_fraction)
            .blend_over(self.background, context.amplitude)
    }
}

/// Gradient looked up by amplitude alone
pub struct AmplitudeGradient {
    pub gradient: Gradient,
}

impl ColorMap for AmplitudeGradient {
    fn color(&self, context: &ColorContext) -> Rgba {
        self.gradient.sample(context.amplitude)
    }
}

/// Hue falls from blue towards red while lightness rises from black
pub struct HslHeat;

impl ColorMap for HslHeat {
    fn color(&self, context: &ColorContext) -> Rgba {
        let amplitude = context.amplitude.clamp(0.0, 1.0);
        let hue = (1.0 - amplitude) * 240.0;
        let lightness = amplitude * 0.5;
        hsl_to_rgb(hue, 1.0, lightness)
    }
}

/// `hue` in degrees, `saturation` and `lightness` in 0.0-1.0
pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> Rgba {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let h = (hue.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba::rgb(to_byte(r), to_byte(g), to_byte(b))
}

/// Colour map selection as written in config files and on the command line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMapKind {
    #[default]
    VerticalGradient,
    AmplitudeGradient,
    Hsl,
}

impl ColorMapKind {
    /// `reverse_gradient` flips the vertical gradient so high frequencies get the dark end.
    /// Amplitude-driven maps ignore it, they must stay brighter for louder bins.
    pub fn build(self, reverse_gradient: bool, background: Rgba) -> Box<dyn ColorMap> {
        match self {
            ColorMapKind::VerticalGradient => {
                let gradient = if reverse_gradient {
                    Gradient::ocean().reversed()
                } else {
                    Gradient::ocean()
                };
                Box::new(VerticalGradient {
                    gradient,
                    background,
                })
            }
            ColorMapKind::AmplitudeGradient => Box::new(AmplitudeGradient {
                gradient: Gradient::inferno(),
            }),
            ColorMapKind::Hsl => Box::new(HslHeat),
        }
    }
}
