//! Device enumeration (external collaborator, §1 "Out of scope").
//!
//! The runtime needs *some* concrete source of [`DeviceInfo`]; this module
//! keeps it minimal, backed by `cpal`. It is deliberately thin: name,
//! direction, default sample rate, and the min/max buffer-size and
//! sample-rate ranges §4.2's negotiator reads.

use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait};

/// Identifies a device independent of any particular `cpal::Host` session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceId {
    /// Use the platform's current default input/output device.
    Default,
    /// Match by (case-insensitive, substring) name.
    Named(String),
}

/// A closed interval of device-reported values, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

impl<T: Ord + Copy> Range<T> {
    pub fn clamp(self, value: T) -> T {
        value.clamp(self.min, self.max)
    }
}

/// Everything the negotiator (§4.2) needs to know about one direction of a
/// device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_sample_rate: u32,
    pub default_low_input_latency: f64,
    pub default_low_output_latency: f64,
    pub buffer_size_range: Range<u32>,
    pub sample_rate_range: Range<u32>,
}

/// List every device the default host reports, merging input/output
/// capabilities for devices that support both.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let mut devices: Vec<DeviceInfo> = Vec::new();

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Some(info) = probe_input(&device) {
                devices.push(info);
            }
        }
    }

    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            let Ok(name) = device.name() else { continue };
            if let Some(existing) = devices.iter_mut().find(|d| d.name == name) {
                merge_output(existing, &device);
            } else if let Some(info) = probe_output(&device) {
                devices.push(info);
            }
        }
    }

    Ok(devices)
}

/// Get the default input/output device info, if any.
pub fn default_device() -> Result<(Option<DeviceInfo>, Option<DeviceInfo>)> {
    let host = cpal::default_host();
    let input = host.default_input_device().and_then(|d| probe_input(&d));
    let output = host
        .default_output_device()
        .and_then(|d| probe_output(&d));
    Ok((input, output))
}

pub(crate) fn resolve_input(id: &DeviceId) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match id {
        DeviceId::Default => host.default_input_device().ok_or(Error::NoDevice),
        DeviceId::Named(name) => {
            let devices = host
                .input_devices()
                .map_err(|e| Error::Stream(e.to_string()))?;
            find_matching(devices, name).ok_or_else(|| Error::DeviceNotFound(name.clone()))
        }
    }
}

pub(crate) fn resolve_output(id: &DeviceId) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match id {
        DeviceId::Default => host.default_output_device().ok_or(Error::NoDevice),
        DeviceId::Named(name) => {
            let devices = host
                .output_devices()
                .map_err(|e| Error::Stream(e.to_string()))?;
            find_matching(devices, name).ok_or_else(|| Error::DeviceNotFound(name.clone()))
        }
    }
}

fn find_matching(devices: impl Iterator<Item = cpal::Device>, name: &str) -> Option<cpal::Device> {
    let needle = name.to_lowercase();
    devices.into_iter().find(|d| {
        d.name()
            .map(|n| n.to_lowercase().contains(&needle))
            .unwrap_or(false)
    })
}

fn probe_input(device: &cpal::Device) -> Option<DeviceInfo> {
    let name = device.name().ok()?;
    let default_cfg = device.default_input_config().ok();
    let (buffer_size_range, sample_rate_range) = config_ranges(device.supported_input_configs().ok());
    Some(DeviceInfo {
        name,
        is_input: true,
        is_output: device.default_output_config().is_ok(),
        max_input_channels: default_cfg.as_ref().map(|c| c.channels()).unwrap_or(0),
        max_output_channels: 0,
        default_sample_rate: default_cfg.map(|c| c.sample_rate()).unwrap_or(48_000),
        default_low_input_latency: 0.01,
        default_low_output_latency: 0.01,
        buffer_size_range,
        sample_rate_range,
    })
}

fn probe_output(device: &cpal::Device) -> Option<DeviceInfo> {
    let name = device.name().ok()?;
    let default_cfg = device.default_output_config().ok();
    let (buffer_size_range, sample_rate_range) =
        config_ranges(device.supported_output_configs().ok());
    Some(DeviceInfo {
        name,
        is_input: device.default_input_config().is_ok(),
        is_output: true,
        max_input_channels: 0,
        max_output_channels: default_cfg.as_ref().map(|c| c.channels()).unwrap_or(0),
        default_sample_rate: default_cfg.map(|c| c.sample_rate()).unwrap_or(48_000),
        default_low_input_latency: 0.01,
        default_low_output_latency: 0.01,
        buffer_size_range,
        sample_rate_range,
    })
}

fn merge_output(existing: &mut DeviceInfo, device: &cpal::Device) {
    existing.is_output = true;
    if let Ok(cfg) = device.default_output_config() {
        existing.max_output_channels = cfg.channels();
    }
}

fn config_ranges(
    configs: Option<impl Iterator<Item = cpal::SupportedStreamConfigRange>>,
) -> (Range<u32>, Range<u32>) {
    let mut buffer = Range { min: 32, max: 4096 };
    let mut rate = Range {
        min: 8_000,
        max: 192_000,
    };
    if let Some(iter) = configs {
        let mut saw_any = false;
        let (mut buf_min, mut buf_max) = (u32::MAX, 0u32);
        let (mut rate_min, mut rate_max) = (u32::MAX, 0u32);
        for cfg in iter {
            saw_any = true;
            if let cpal::SupportedBufferSize::Range { min, max } = cfg.buffer_size() {
                buf_min = buf_min.min(*min);
                buf_max = buf_max.max(*max);
            }
            rate_min = rate_min.min(cfg.min_sample_rate());
            rate_max = rate_max.max(cfg.max_sample_rate());
        }
        if saw_any {
            if buf_min <= buf_max {
                buffer = Range {
                    min: buf_min,
                    max: buf_max,
                };
            }
            rate = Range {
                min: rate_min,
                max: rate_max,
            };
        }
    }
    (buffer, rate)
}
