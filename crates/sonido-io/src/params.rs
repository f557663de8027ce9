//! Parameter and configuration types shared across the host-API backend.

use crate::device::DeviceId;

/// Sample format a client declares for one endpoint.
///
/// Only [`SampleFormat::F32`] reaches the realtime path unconverted — the
/// host side is always interleaved 32-bit float (invariant §3.4). Other
/// variants exist so [`crate::Error::SampleFormatNotSupported`] can name
/// what was rejected; non-PCM formats are a declared Non-goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    F32,
    I16,
    I32,
}

impl SampleFormat {
    pub fn is_supported(self) -> bool {
        matches!(self, SampleFormat::F32)
    }
}

/// Per-endpoint parameters supplied to `open_stream`.
#[derive(Debug, Clone)]
pub struct StreamParameters {
    pub device: DeviceId,
    pub channel_count: u16,
    pub sample_format: SampleFormat,
    /// Suggested latency in seconds, used by §4.2.4's frames-per-buffer formula.
    pub suggested_latency: f64,
}

/// Frames-per-buffer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramesPerBuffer {
    Unspecified,
    Frames(u32),
}

/// Resampler quality, taken from the stream-info quality bits (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SrcQuality {
    Min,
    Low,
    Medium,
    High,
    #[default]
    Max,
}

/// Host-API-specific stream flags (§6 "Stream-info flag bits consumed").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFlags {
    /// Default policy: don't take exclusive control of shared devices.
    pub play_nice: bool,
    /// Allow negotiation to change the device's own sample rate.
    pub change_device_parameters: bool,
    /// Reject the open instead of inserting an SRC when rates differ.
    pub fail_if_conversion_required: bool,
    pub quality: SrcQuality,
}

impl Default for StreamFlags {
    fn default() -> Self {
        Self {
            play_nice: true,
            change_device_parameters: false,
            fail_if_conversion_required: false,
            quality: SrcQuality::Max,
        }
    }
}

/// Outcome a client callback (or [`crate::BufferProcessor`]) returns after
/// processing one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult {
    Continue,
    Complete,
    Abort,
}

/// Stream-relative timing handed to the buffer processor at the start of
/// each callback invocation (§4.5 "Timing").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInfo {
    pub input_buffer_adc_time: f64,
    pub output_buffer_dac_time: f64,
    pub current_time: f64,
}

impl TimeInfo {
    pub const ZERO: TimeInfo = TimeInfo {
        input_buffer_adc_time: 0.0,
        output_buffer_dac_time: 0.0,
        current_time: 0.0,
    };
}
