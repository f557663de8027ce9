//! Host-API audio backend: device negotiation, realtime callback dispatch,
//! and full/half-duplex PCM stream runtime.
//!
//! This crate plays the role AUHAL/CoreAudio's host-API implementation
//! plays inside PortAudio — bridging a portable, callback-driven stream API
//! to a platform audio engine (here, `cpal`) — rather than being the engine
//! itself. The pieces, in the order a stream's lifecycle touches them:
//!
//! - [`ring`]: the lock-free SPSC ring buffer bridging capture and render.
//! - [`device`] / [`negotiate`]: device enumeration and format negotiation.
//! - [`src_adapter`]: pull-model sample-rate conversion when rates differ.
//! - [`buffer_processor`]: the client-facing per-block processing interface.
//! - [`callback`]: the realtime capture/render entry points themselves.
//! - [`stream`]: the `Stream` handle and its Start/Stop/Abort state machine.
//! - [`open`]: the `open_stream` orchestrator tying all of the above together.
//! - [`blocking`]: a synchronous read/write facade over the same ring.
//!
//! [`wav`] is unrelated to the realtime path — a standalone WAV codec kept
//! for offline rendering and the `sonido-cli` demo.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sonido_io::{
//!     CallbackBufferProcessor, CallbackResult, DeviceId, FramesPerBuffer, OpenStreamConfig,
//!     SampleFormat, StreamFlags, StreamParameters, open_stream,
//! };
//!
//! let output = StreamParameters {
//!     device: DeviceId::Default,
//!     channel_count: 2,
//!     sample_format: SampleFormat::F32,
//!     suggested_latency: 0.02,
//! };
//!
//! let processor = Box::new(CallbackBufferProcessor::new(|_input, output, _time| {
//!     output.fill(0.0);
//!     CallbackResult::Continue
//! }));
//!
//! let mut stream = open_stream(
//!     OpenStreamConfig {
//!         input: None,
//!         output: Some(output),
//!         sample_rate: 0.0,
//!         frames_per_buffer: FramesPerBuffer::Unspecified,
//!         flags: StreamFlags::default(),
//!     },
//!     processor,
//! )?;
//! stream.start()?;
//! # Ok::<(), sonido_io::Error>(())
//! ```

mod blocking;
mod buffer_processor;
mod callback;
mod cpu_load;
mod device;
mod error;
mod negotiate;
mod open;
mod params;
mod ring;
mod src_adapter;
mod stream;
mod wav;

pub use blocking::{BlockingReader, BlockingWriter};
pub use buffer_processor::{
    BufferIo, BufferProcessor, BufferProcessorConfig, BufferProcessorOutcome,
    CallbackBufferProcessor, HostBufferSizeMode, InputSpan, XrunFlags,
};
pub use callback::CallbackMode;
pub use device::{DeviceId, DeviceInfo, Range, default_device, list_devices};
pub use error::{Error, Result};
pub use negotiate::{NegotiatedFormat, negotiate};
pub use open::{OpenStreamConfig, open_stream};
pub use params::{
    CallbackResult, FramesPerBuffer, SampleFormat, SrcQuality, StreamFlags, StreamParameters,
    TimeInfo,
};
pub use ring::{ReadRegions, RingConsumer, RingProducer, ring_buffer};
pub use src_adapter::{PullOutcome, SrcAdapter};
pub use stream::{Stream, StreamState};
pub use wav::{
    StereoSamples, WavFormat, WavInfo, WavSpec, read_wav, read_wav_info, read_wav_stereo,
    write_wav, write_wav_stereo,
};
