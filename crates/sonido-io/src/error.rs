//! Error taxonomy for the host-API audio backend.
//!
//! Mirrors the error codes a PortAudio-style host API exposes (§6/§7 of the
//! design): parameter-validation errors return synchronously from `open`;
//! platform errors during unit setup carry the originating source location;
//! realtime errors never reach this type at all — they degrade into xrun
//! flags instead (see [`crate::buffer_processor::XrunFlags`]).

/// Errors produced by the host-API backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No audio device available on the system.
    #[error("no audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// A requested channel count is invalid for the device or out of range.
    #[error("invalid channel count: {0}")]
    InvalidChannelCount(String),

    /// A `StreamFlags` combination is invalid (e.g. conflicting quality bits).
    #[error("invalid stream flag: {0}")]
    InvalidFlag(String),

    /// The requested sample format is not supported (only interleaved f32
    /// reaches the realtime path; see invariant §3.4).
    #[error("unsupported sample format: {0}")]
    SampleFormatNotSupported(String),

    /// The requested sample rate could not be honored under the active
    /// `StreamFlags` (e.g. `FailIfConversionRequired` was set).
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(String),

    /// A platform/backend error surfaced during stream setup, carrying the
    /// originating source location for diagnosis (§4.2, final paragraph).
    #[error("unanticipated host error at {file}:{line}: {message}")]
    UnanticipatedHostError {
        message: String,
        file: &'static str,
        line: u32,
    },

    /// Generic stream setup/runtime error not otherwise classified.
    #[error("audio stream error: {0}")]
    Stream(String),
}

impl Error {
    /// Wrap a backend error with the call site, matching the distilled
    /// spec's "source line" diagnostic requirement for platform errors.
    #[track_caller]
    pub(crate) fn host(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Error::UnanticipatedHostError {
            message: message.into(),
            file: loc.file(),
            line: loc.line(),
        }
    }
}

/// Convenience result type for the host-API backend.
pub type Result<T> = std::result::Result<T, Error>;
