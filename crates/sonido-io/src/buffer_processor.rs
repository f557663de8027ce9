//! The buffer-processor interface (C7, §6).
//!
//! Treated by the rest of the runtime as an external black box: it adapts
//! between the client's declared format/interleave/frames-per-callback and
//! the host's packed-float layout. This module defines the trait the
//! realtime callback (§4.5) dispatches into, plus one concrete, minimal
//! implementation ([`CallbackBufferProcessor`]) that performs no format
//! conversion of its own (client format is already host format: interleaved
//! f32) and simply hands spans to a plain client closure. That's the
//! smallest concrete C7 instance that still exercises every operation C5/C6
//! depend on.
//!
//! The granular `Begin…/Set*…/End` sequence the distilled spec names is
//! collapsed here into a single [`BufferProcessor::run`] call scoped to one
//! callback invocation — `Set2ndInputFrameCount` /
//! `Set2ndInterleavedInputChannels` become the [`InputSpan::Split`] variant.
//! Spreading that sequence across stateful setter calls would require
//! storing borrowed slices on `self` past the borrow that produced them,
//! which is exactly the pattern PortAudio's C implementation needs `void*`
//! and manual lifetime discipline for; collapsing it into one call keeps the
//! same information with no `unsafe`.

use crate::params::{CallbackResult, TimeInfo};

/// Bitset of xrun flags, read-and-cleared once per callback invocation
/// (§3 `xrunFlags`, §5 "Ordering guarantees").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XrunFlags {
    pub input_underflow: bool,
    pub input_overflow: bool,
    pub output_underflow: bool,
    pub output_overflow: bool,
}

impl XrunFlags {
    pub fn any(self) -> bool {
        self.input_underflow || self.input_overflow || self.output_underflow || self.output_overflow
    }

    pub fn merge(&mut self, other: XrunFlags) {
        self.input_underflow |= other.input_underflow;
        self.input_overflow |= other.input_overflow;
        self.output_underflow |= other.output_underflow;
        self.output_overflow |= other.output_overflow;
    }
}

/// The input side of one callback invocation: either absent, a single
/// contiguous span, or split across the ring buffer's wraparound boundary.
pub enum InputSpan<'a> {
    Single(&'a [f32]),
    Split(&'a [f32], &'a [f32]),
}

impl<'a> InputSpan<'a> {
    pub fn frame_len(&self, channels: u16) -> usize {
        let samples = match self {
            InputSpan::Single(s) => s.len(),
            InputSpan::Split(a, b) => a.len() + b.len(),
        };
        samples / channels.max(1) as usize
    }
}

/// Everything one callback invocation needs to pass to the processor.
pub struct BufferIo<'a> {
    pub input: Option<InputSpan<'a>>,
    pub output: Option<&'a mut [f32]>,
    pub frames: usize,
}

/// How many host frames the buffer processor should plan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostBufferSizeMode {
    /// The host always calls with exactly this many frames.
    Bounded(usize),
    /// The host may call with a variable frame count (an SRC is in play).
    Unknown,
}

/// Static configuration handed to `initialize` once at Open (§6 `Initialize`).
#[derive(Debug, Clone)]
pub struct BufferProcessorConfig {
    pub input_channels: u16,
    pub output_channels: u16,
    pub sample_rate: f64,
    pub frames_per_user_callback: usize,
    pub max_host_frames: usize,
    pub host_buffer_size_mode: HostBufferSizeMode,
}

/// Outcome of one [`BufferProcessor::run`] call.
#[derive(Debug, Clone, Copy)]
pub struct BufferProcessorOutcome {
    pub frames_processed: usize,
    pub result: CallbackResult,
}

/// External collaborator (C7): converts between client format/interleave
/// and the host's packed f32 layout, and dispatches to the client callback.
pub trait BufferProcessor: Send {
    fn initialize(&mut self, config: BufferProcessorConfig);

    /// Run one Begin → Set* → End cycle for this callback invocation.
    fn run(&mut self, time_info: TimeInfo, xruns: XrunFlags, io: BufferIo<'_>) -> BufferProcessorOutcome;

    fn reset(&mut self);
    fn terminate(&mut self);

    fn input_latency(&self) -> f64 {
        0.0
    }

    fn output_latency(&self) -> f64 {
        0.0
    }
}

/// Adapts a plain `FnMut` client closure into a [`BufferProcessor`].
///
/// The closure receives `(input, output, time_info)` and returns a
/// [`CallbackResult`]. `input` is `&[]` when no input side is configured.
pub struct CallbackBufferProcessor<F> {
    callback: F,
    config: Option<BufferProcessorConfig>,
    scratch_in: Vec<f32>,
}

impl<F> CallbackBufferProcessor<F>
where
    F: FnMut(&[f32], &mut [f32], TimeInfo) -> CallbackResult + Send,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            config: None,
            scratch_in: Vec::new(),
        }
    }
}

impl<F> BufferProcessor for CallbackBufferProcessor<F>
where
    F: FnMut(&[f32], &mut [f32], TimeInfo) -> CallbackResult + Send,
{
    fn initialize(&mut self, config: BufferProcessorConfig) {
        self.scratch_in = vec![0.0; config.max_host_frames * config.input_channels.max(1) as usize];
        self.config = Some(config);
    }

    fn run(&mut self, time_info: TimeInfo, _xruns: XrunFlags, io: BufferIo<'_>) -> BufferProcessorOutcome {
        let input: &[f32] = match &io.input {
            None => &[],
            Some(InputSpan::Single(s)) => s,
            Some(InputSpan::Split(a, b)) => {
                let needed = a.len() + b.len();
                if self.scratch_in.len() < needed {
                    self.scratch_in.resize(needed, 0.0);
                }
                self.scratch_in[..a.len()].copy_from_slice(a);
                self.scratch_in[a.len()..needed].copy_from_slice(b);
                &self.scratch_in[..needed]
            }
        };

        let mut empty_out: [f32; 0] = [];
        let output: &mut [f32] = io.output.unwrap_or(&mut empty_out);
        let result = (self.callback)(input, output, time_info);

        BufferProcessorOutcome {
            frames_processed: io.frames,
            result,
        }
    }

    fn reset(&mut self) {
        self.scratch_in.fill(0.0);
    }

    fn terminate(&mut self) {
        self.scratch_in.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_input_is_joined_before_reaching_the_callback() {
        let mut seen = Vec::new();
        let mut proc = CallbackBufferProcessor::new(|input, output, _t| {
            seen.extend_from_slice(input);
            output.fill(0.0);
            CallbackResult::Continue
        });
        proc.initialize(BufferProcessorConfig {
            input_channels: 1,
            output_channels: 1,
            sample_rate: 48_000.0,
            frames_per_user_callback: 4,
            max_host_frames: 4,
            host_buffer_size_mode: HostBufferSizeMode::Bounded(4),
        });

        let a = [1.0f32, 2.0];
        let b = [3.0f32, 4.0];
        let mut out = [0.0f32; 4];
        let outcome = proc.run(
            TimeInfo::ZERO,
            XrunFlags::default(),
            BufferIo {
                input: Some(InputSpan::Split(&a, &b)),
                output: Some(&mut out),
                frames: 4,
            },
        );
        assert_eq!(seen, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(outcome.frames_processed, 4);
    }
}
