//! Device/format negotiator (C2, §4.2).
//!
//! Turns a pair of [`StreamParameters`] plus a requested
//! [`FramesPerBuffer`]/sample rate into a concrete [`NegotiatedFormat`] that
//! both sides of the stream agree to run at, clamped against what the
//! resolved `cpal::Device`s actually report. Mirrors AUHAL's
//! `AudioStreamBasicDescription` negotiation in
//! `examples/original_source/src/hostapi/coreaudio/pa_mac_core.c`
//! (`FindDeviceBufferSize`, `RequestStreamFormat`) without the AudioUnit
//! property-listener plumbing cpal already owns internally.

use crate::device::{DeviceInfo, Range, default_device, list_devices};
use crate::params::{FramesPerBuffer, StreamFlags, StreamParameters};
use crate::{Error, Result};

/// Frames-per-buffer floor below which a target is clamped up to the
/// device's own minimum (§4.2.4).
const MIN_REASONABLE_FRAMES: u32 = 64;
/// Ceiling applied to an unconstrained target when the device's own max
/// is larger (§4.2.4).
const MAX_REASONABLE_FRAMES: u32 = 1024;

/// Agreed-upon format both stream halves run at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegotiatedFormat {
    pub sample_rate: u32,
    pub frames_per_buffer: u32,
    pub input_channels: u16,
    pub output_channels: u16,
    /// `true` when the negotiated rate differs from at least one side's
    /// device default and an SRC (C3) must be inserted.
    pub needs_src: bool,
    /// The device(s)' own native/default rate. When `needs_src` is set, the
    /// platform stream(s) are driven at this rate and [`crate::src_adapter::SrcAdapter`]
    /// bridges to `sample_rate`, rather than asking the hardware to retune.
    pub device_default_rate: u32,
}

/// Negotiate a format for a (possibly half-duplex) stream.
///
/// `requested_sample_rate` of `0.0` means "use the input device's default,
/// falling back to the output device's".
pub fn negotiate(
    input: Option<(&StreamParameters, &DeviceInfo)>,
    output: Option<(&StreamParameters, &DeviceInfo)>,
    frames_per_buffer: FramesPerBuffer,
    requested_sample_rate: f64,
    flags: StreamFlags,
) -> Result<NegotiatedFormat> {
    if input.is_none() && output.is_none() {
        return Err(Error::Stream(
            "at least one of input/output parameters is required".into(),
        ));
    }

    let device_default_rate = output
        .map(|(_, info)| info.default_sample_rate)
        .or_else(|| input.map(|(_, info)| info.default_sample_rate))
        .unwrap_or(48_000);

    let target_rate = if requested_sample_rate > 0.0 {
        requested_sample_rate.round() as u32
    } else {
        device_default_rate
    };

    let sample_rate = resolve_sample_rate(target_rate, input, output, flags)?;
    let needs_src = sample_rate != device_default_rate;
    if needs_src && flags.fail_if_conversion_required {
        return Err(Error::InvalidSampleRate(format!(
            "requested rate {target_rate} requires conversion from device default {device_default_rate}, \
             but fail_if_conversion_required is set"
        )));
    }

    let latency = output
        .map(|(p, _)| p.suggested_latency)
        .or_else(|| input.map(|(p, _)| p.suggested_latency))
        .unwrap_or(0.01);

    let buffer_range = combined_buffer_range(input, output);
    let frames = match frames_per_buffer {
        FramesPerBuffer::Frames(n) => buffer_range.clamp(n),
        FramesPerBuffer::Unspecified => suggested_frames(latency, sample_rate, buffer_range),
    };

    Ok(NegotiatedFormat {
        sample_rate,
        frames_per_buffer: frames,
        input_channels: input.map(|(p, _)| p.channel_count).unwrap_or(0),
        output_channels: output.map(|(p, _)| p.channel_count).unwrap_or(0),
        needs_src,
        device_default_rate,
    })
}

/// Frames-per-buffer formula from §4.2.4:
/// `target = max(64, suggestedLatency * sampleRate / 2)`, then clamped into
/// the device's reported range, with a `1024` ceiling applied only when the
/// device itself doesn't already cap lower.
fn suggested_frames(suggested_latency: f64, sample_rate: u32, range: Range<u32>) -> u32 {
    let raw = (suggested_latency * sample_rate as f64 / 2.0).round();
    let target = raw.max(MIN_REASONABLE_FRAMES as f64) as u32;
    let target = if target <= MIN_REASONABLE_FRAMES {
        target.max(range.min)
    } else {
        target.min(range.max.min(MAX_REASONABLE_FRAMES))
    };
    range.clamp(target)
}

fn combined_buffer_range(
    input: Option<(&StreamParameters, &DeviceInfo)>,
    output: Option<(&StreamParameters, &DeviceInfo)>,
) -> Range<u32> {
    let ranges: Vec<Range<u32>> = [input, output]
        .into_iter()
        .flatten()
        .map(|(_, info)| info.buffer_size_range)
        .collect();
    ranges.into_iter().fold(
        Range {
            min: 0,
            max: u32::MAX,
        },
        |acc, r| Range {
            min: acc.min.max(r.min),
            max: acc.max.min(r.max),
        },
    )
}

fn resolve_sample_rate(
    target: u32,
    input: Option<(&StreamParameters, &DeviceInfo)>,
    output: Option<(&StreamParameters, &DeviceInfo)>,
    flags: StreamFlags,
) -> Result<u32> {
    let ranges: Vec<Range<u32>> = [input, output]
        .into_iter()
        .flatten()
        .map(|(_, info)| info.sample_rate_range)
        .collect();

    if !flags.change_device_parameters {
        // Devices can't be retuned; accept the target only if every device
        // already supports it, otherwise fall back to the shared default.
        let all_support = ranges.iter().all(|r| target >= r.min && target <= r.max);
        if all_support {
            return Ok(target);
        }
        let fallback = output
            .map(|(_, info)| info.default_sample_rate)
            .or_else(|| input.map(|(_, info)| info.default_sample_rate))
            .unwrap_or(target);
        return Ok(fallback);
    }

    for r in &ranges {
        if target < r.min || target > r.max {
            return Err(Error::InvalidSampleRate(format!(
                "{target} Hz is outside a device's supported range {}..={}",
                r.min, r.max
            )));
        }
    }
    Ok(target)
}

/// Resolve [`crate::device::DeviceId::Default`] parameters into a concrete
/// [`DeviceInfo`] for the requested direction.
pub fn resolve_device_info(params: &StreamParameters, want_input: bool) -> Result<DeviceInfo> {
    use crate::device::DeviceId;
    match &params.device {
        DeviceId::Default => {
            let (input, output) = default_device()?;
            let info = if want_input { input } else { output };
            info.ok_or(Error::NoDevice)
        }
        DeviceId::Named(name) => list_devices()?
            .into_iter()
            .find(|d| d.name.to_lowercase().contains(&name.to_lowercase()))
            .ok_or_else(|| Error::DeviceNotFound(name.clone())),
    }
}
