//! Open/Close orchestrator with rollback (C6, §4.6).
//!
//! Allocates, in order: the ring buffer and its pre-advance, the SRC adapter
//! (when negotiation determined one is needed), the buffer processor, and
//! finally the platform (`cpal`) streams for whichever sides are requested.
//! A failure building either platform stream drops whatever was already
//! built (tearing down its `cpal::Stream`) and terminates the buffer
//! processor before the error propagates — the same build-then-unwind-on-
//! failure shape `examples/ampactor-sonido/crates/sonido-io/src/cpal_backend.rs`
//! uses when wiring up a `cpal::Stream`.
//!
//! When SRC is needed, the platform stream(s) are opened at the device's own
//! native rate (`negotiated.device_default_rate`) rather than the negotiated
//! stream rate — real hardware is rarely retuned on the fly, so the SRC
//! bridges native rate to stream rate in software, matching `pa_mac_core.c`'s
//! own treatment of a hardware clock it doesn't control.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Mutex;

use cpal::traits::DeviceTrait;

use crate::buffer_processor::{BufferProcessor, BufferProcessorConfig, HostBufferSizeMode};
use crate::callback::{self, CallbackMode, StreamInner};
use crate::cpu_load::CpuLoadMeter;
use crate::device::resolve_input as resolve_input_device;
use crate::device::resolve_output as resolve_output_device;
use crate::negotiate::{NegotiatedFormat, negotiate, resolve_device_info};
use crate::params::{FramesPerBuffer, StreamFlags, StreamParameters};
use crate::ring::ring_buffer;
use crate::src_adapter::SrcAdapter;
use crate::stream::Stream;
use crate::{Error, Result};

/// Everything `open_stream` needs: at least one of `input`/`output`.
pub struct OpenStreamConfig {
    pub input: Option<StreamParameters>,
    pub output: Option<StreamParameters>,
    pub sample_rate: f64,
    pub frames_per_buffer: FramesPerBuffer,
    pub flags: StreamFlags,
}

/// Open and fully wire up a stream, or roll back everything allocated so far
/// on the first failure (§4.6 "Rollback on partial failure").
pub fn open_stream(
    config: OpenStreamConfig,
    processor: Box<dyn BufferProcessor>,
) -> Result<Stream> {
    if config.input.is_none() && config.output.is_none() {
        return Err(Error::Stream(
            "open_stream requires at least one of input/output".into(),
        ));
    }

    let input_info = match &config.input {
        Some(p) => Some(resolve_device_info(p, true)?),
        None => None,
    };
    let output_info = match &config.output {
        Some(p) => Some(resolve_device_info(p, false)?),
        None => None,
    };

    let negotiated = negotiate(
        config.input.as_ref().zip(input_info.as_ref()),
        config.output.as_ref().zip(output_info.as_ref()),
        config.frames_per_buffer,
        config.sample_rate,
        config.flags,
    )?;

    let mode = match (&config.input, &config.output) {
        (Some(_), Some(_)) => CallbackMode::Duplex {
            with_src: negotiated.needs_src,
        },
        (Some(_), None) => CallbackMode::CaptureOnly {
            with_src: negotiated.needs_src,
        },
        (None, Some(_)) => CallbackMode::RenderOnly,
        (None, None) => unreachable!("checked above"),
    };

    let ring_capacity =
        negotiated.frames_per_buffer as usize * negotiated.input_channels.max(1) as usize * 4;
    let (mut ring_producer, ring_consumer) = ring_buffer(ring_capacity.max(64));
    callback::pre_advance_ring(&mut ring_producer);

    let src = if negotiated.needs_src {
        Some(
            SrcAdapter::new(
                negotiated.device_default_rate,
                negotiated.sample_rate,
                negotiated.input_channels.max(1),
                negotiated.frames_per_buffer as usize,
            )
            .map_err(Error::host)?,
        )
    } else {
        None
    };
    let src_scratch_len = negotiated.frames_per_buffer as usize * negotiated.input_channels.max(1) as usize;

    let mut boxed_processor = processor;
    boxed_processor.initialize(BufferProcessorConfig {
        input_channels: negotiated.input_channels,
        output_channels: negotiated.output_channels,
        sample_rate: negotiated.sample_rate as f64,
        frames_per_user_callback: negotiated.frames_per_buffer as usize,
        max_host_frames: negotiated.frames_per_buffer as usize,
        host_buffer_size_mode: HostBufferSizeMode::Bounded(negotiated.frames_per_buffer as usize),
    });
    let inner = Arc::new(StreamInner {
        mode,
        xruns: AtomicU64::new(0),
        input_underflow: AtomicBool::new(false),
        input_overflow: AtomicBool::new(false),
        output_underflow: AtomicBool::new(false),
        output_overflow: AtomicBool::new(false),
        is_time_set: AtomicBool::new(false),
        start_time: Mutex::new(None),
        sample_rate: negotiated.sample_rate as f64,
        channels_in: negotiated.input_channels,
        channels_out: negotiated.output_channels,
        cpu_load: Mutex::new(CpuLoadMeter::new(negotiated.sample_rate as f64)),
        processor: Mutex::new(boxed_processor),
        ring_producer: Mutex::new(Some(ring_producer)),
        ring_consumer: Mutex::new(Some(ring_consumer)),
        src: Mutex::new(src),
        src_scratch: Mutex::new(vec![0.0; src_scratch_len]),
        user_abort: AtomicBool::new(false),
        callback_stopped: AtomicBool::new(false),
    });

    // Rollback on failure: a partially-built stream's already-created side
    // is dropped (tearing down its platform stream) and the buffer
    // processor is terminated before the error propagates (§4.6).
    let input_stream = match &config.input {
        Some(params) => match build_input_stream(params, &negotiated, Arc::clone(&inner)) {
            Ok(s) => Some(s),
            Err(e) => {
                inner.processor.lock().unwrap().terminate();
                return Err(e);
            }
        },
        None => None,
    };

    let output_stream = match &config.output {
        Some(params) => match build_output_stream(params, &negotiated, Arc::clone(&inner)) {
            Ok(s) => Some(s),
            Err(e) => {
                drop(input_stream);
                inner.processor.lock().unwrap().terminate();
                return Err(e);
            }
        },
        None => None,
    };

    Ok(Stream::new(inner, input_stream, output_stream))
}

/// The rate to actually open a `cpal` stream at: the device's own native
/// rate when an SRC is bridging to the negotiated stream rate, otherwise the
/// negotiated rate itself.
fn platform_rate(negotiated: &NegotiatedFormat) -> u32 {
    if negotiated.needs_src {
        negotiated.device_default_rate
    } else {
        negotiated.sample_rate
    }
}

fn build_input_stream(
    params: &StreamParameters,
    negotiated: &NegotiatedFormat,
    inner: Arc<StreamInner>,
) -> Result<cpal::Stream> {
    let device = resolve_input_device(&params.device)?;
    let config = cpal::StreamConfig {
        channels: negotiated.input_channels,
        sample_rate: platform_rate(negotiated),
        buffer_size: cpal::BufferSize::Fixed(negotiated.frames_per_buffer),
    };
    device
        .build_input_stream(
            &config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                callback::on_capture(&inner, data);
            },
            |err| tracing::error!(error = %err, "input stream error"),
            None,
        )
        .map_err(|e| Error::host(e.to_string()))
}

fn build_output_stream(
    params: &StreamParameters,
    negotiated: &NegotiatedFormat,
    inner: Arc<StreamInner>,
) -> Result<cpal::Stream> {
    let device = resolve_output_device(&params.device)?;
    let config = cpal::StreamConfig {
        channels: negotiated.output_channels,
        sample_rate: platform_rate(negotiated),
        buffer_size: cpal::BufferSize::Fixed(negotiated.frames_per_buffer),
    };
    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                callback::on_render(&inner, data);
            },
            |err| tracing::error!(error = %err, "output stream error"),
            None,
        )
        .map_err(|e| Error::host(e.to_string()))
}
