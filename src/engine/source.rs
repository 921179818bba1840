/// One tick's worth of spectrum: byte magnitudes (0-255), one per frequency bin.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpectralFrame {
    pub bins: Vec<u8>,
}

impl SpectralFrame {
    pub fn new(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    /// Frame with every bin set to `value`
    pub fn filled(len: usize, value: u8) -> Self {
        Self { bins: vec![value; len] }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Producer of spectral frames. Sample rate and frame length are fixed for the session.
pub trait SpectralSource {
    fn sample_rate(&self) -> u32;

    /// Number of bins in every frame (half the FFT size)
    fn frame_length(&self) -> usize;

    /// Most recent frame, or `None` if no frame is available this tick.
    /// Called at most once per tick.
    fn get_frame(&mut self) -> Option<&SpectralFrame>;
}

impl<S: SpectralSource + ?Sized> SpectralSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn frame_length(&self) -> usize {
        (**self).frame_length()
    }

    fn get_frame(&mut self) -> Option<&SpectralFrame> {
        (**self).get_frame()
    }
}
