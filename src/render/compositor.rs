use super::canvas::{Canvas, PixelBlock, Rect, Rgba, RgbaCanvas};
use super::color::{ColorContext, ColorMap};
use crate::engine::mapping::FrequencyMapper;
use crate::engine::source::SpectralFrame;

/// Owns the spectrogram image: time runs left to right, frequency bottom to top.
///
/// Each tick shifts the whole image one column left and paints the newest
/// frame into the rightmost column. Columns are never reordered.
pub struct ScrollCompositor {
    image: RgbaCanvas,
    background: Rgba,
    columns_written: u64,
}

impl ScrollCompositor {
    pub fn new(width: u32, height: u32, background: Rgba) -> Self {
        Self {
            image: RgbaCanvas::new(width, height, background),
            background,
            columns_written: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.size().0
    }

    pub fn height(&self) -> u32 {
        self.image.size().1
    }

    /// Frames painted since creation
    pub fn columns_written(&self) -> u64 {
        self.columns_written
    }

    pub fn image(&self) -> &RgbaCanvas {
        &self.image
    }

    /// Copy of the whole image, for blitting onto an output canvas
    pub fn snapshot(&self) -> PixelBlock {
        let (width, height) = self.image.size();
        self.image.get_pixels(Rect::new(0, 0, width, height))
    }

    /// Scrolls one column and paints `frame` into the freed rightmost column.
    /// Returns the number of pixels painted; bins outside the drawable range are skipped.
    pub fn advance_and_paint(
        &mut self,
        frame: &SpectralFrame,
        mapper: &FrequencyMapper,
        colors: &dyn ColorMap,
    ) -> usize {
        let (width, height) = self.image.size();
        if width == 0 || height == 0 {
            return 0;
        }

        // single block copy of columns [1, width) to [0, width - 1)
        if width > 1 {
            let shifted = self.image.get_pixels(Rect::new(1, 0, width - 1, height));
            self.image.put_pixels(0, 0, &shifted);
        }
        let column = (width - 1) as i32;
        self.image
            .fill_rect(Rect::new(column, 0, 1, height), self.background);

        let top = (height - 1).max(1) as f32;
        let mut painted = 0;
        for (bin, &value) in frame.bins.iter().enumerate() {
            let Some(row) = mapper.y_for_bin(bin) else {
                continue;
            };
            let context = ColorContext {
                amplitude: value as f32 / 255.0,
                height_fraction: 1.0 - row as f32 / top,
            };
            self.image.set_pixel(column, row as i32, colors.color(&context));
            painted += 1;
        }

        self.columns_written += 1;
        painted
    }
}
