//! Error types for the analysis engine

/// Error type for engine operations
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The spectral source could not be acquired; the engine stays uninitialized
    #[error("Spectral source unavailable: {0}")]
    SourceUnavailable(String),

    /// `start` was called on an engine that already has a source attached
    #[error("Engine is already running")]
    AlreadyRunning,

    /// The number of supplied band minimums does not match the configured band count
    #[error("Expected {expected} band minimums, got {actual}")]
    BandCountMismatch { expected: usize, actual: usize },

    /// A control event addressed a band that does not exist
    #[error("Band index {index} out of range ({count} bands configured)")]
    BandIndexOutOfRange { index: usize, count: usize },

    /// FFT size is not a power of two or is too small to analyse
    #[error("Invalid FFT size {0}: must be a power of two >= 32")]
    InvalidFftSize(usize),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
