//! Realtime I/O callback dispatch (C5, §4.5).
//!
//! `pa_mac_core.c`'s `AudioIOProc` branches on which bus(es) fired and
//! whether an SRC sits in the path. cpal hands us one `cpal::Stream` per
//! direction rather than one shared AudioUnit callback for both, so the four
//! dispatch modes below are the shapes this crate can actually reach through
//! cpal, not a literal transcription of AUHAL's bus numbers — see
//! `SPEC_FULL.md` §9 for the Case A/B merge this implies.
//!
//! Each `on_*` entry point is the closure body handed to
//! `cpal::Device::build_input_stream` / `build_output_stream`; none of it
//! allocates, locks, or blocks, matching §5's realtime ordering guarantees.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use std::sync::Mutex;

use crate::buffer_processor::{BufferIo, BufferProcessor, InputSpan, XrunFlags};
use crate::cpu_load::CpuLoadMeter;
use crate::params::{CallbackResult, TimeInfo};
use crate::ring::{PRE_ADVANCE_DENOMINATOR, RingConsumer, RingProducer};
use crate::src_adapter::{PullOutcome, SrcAdapter};

/// Which of the four shapes this stream's realtime path takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackMode {
    /// Capture and render on separate device callbacks, bridged by the ring
    /// (§4.5 Case B/C, merged per the cpal limitation documented in
    /// `SPEC_FULL.md`). `with_src` routes the render side through
    /// [`StreamInner::src`] instead of reading the ring directly.
    Duplex { with_src: bool },
    /// Input-only stream; render side absent. `with_src` routes the capture
    /// side through [`StreamInner::src`] (§4.5 "Capture + simplex + SRC").
    CaptureOnly { with_src: bool },
    /// Output-only stream; capture side absent.
    RenderOnly,
}

/// State shared between the capture and render realtime threads and the
/// non-realtime [`crate::stream::Stream`] handle. Every field here is either
/// atomic or behind a lock that's never held across a blocking call, so
/// `on_capture`/`on_render` stay wait-free except for the client callback
/// itself.
pub struct StreamInner {
    pub mode: CallbackMode,
    pub xruns: AtomicU64,
    pub input_underflow: AtomicBool,
    pub input_overflow: AtomicBool,
    pub output_underflow: AtomicBool,
    pub output_overflow: AtomicBool,
    pub is_time_set: AtomicBool,
    pub start_time: Mutex<Option<Instant>>,
    pub sample_rate: f64,
    pub channels_in: u16,
    pub channels_out: u16,
    pub cpu_load: Mutex<CpuLoadMeter>,
    pub processor: Mutex<Box<dyn BufferProcessor>>,
    pub ring_producer: Mutex<Option<RingProducer>>,
    pub ring_consumer: Mutex<Option<RingConsumer>>,
    /// Pull-model SRC (C3) bridging the ring's native device rate to
    /// `sample_rate`, present only when negotiation set `needs_src`.
    pub src: Mutex<Option<SrcAdapter>>,
    /// Preallocated scratch the SRC writes its converted block into, sized
    /// once at Open so `on_capture`/`on_render` never allocate.
    pub src_scratch: Mutex<Vec<f32>>,
    pub user_abort: AtomicBool,
    pub callback_stopped: AtomicBool,
}

impl StreamInner {
    fn pack_xruns(&self) -> XrunFlags {
        XrunFlags {
            input_underflow: self.input_underflow.swap(false, Ordering::AcqRel),
            input_overflow: self.input_overflow.swap(false, Ordering::AcqRel),
            output_underflow: self.output_underflow.swap(false, Ordering::AcqRel),
            output_overflow: self.output_overflow.swap(false, Ordering::AcqRel),
        }
    }

    fn note_time_if_unset(&self) {
        if !self.is_time_set.swap(true, Ordering::AcqRel) {
            *self.start_time.lock().unwrap() = Some(Instant::now());
        }
    }

    fn time_info(&self) -> TimeInfo {
        let elapsed = self
            .start_time
            .lock().unwrap()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        TimeInfo {
            input_buffer_adc_time: elapsed,
            output_buffer_dac_time: elapsed,
            current_time: elapsed,
        }
    }

    fn apply_result(&self, result: CallbackResult) {
        match result {
            CallbackResult::Continue => {}
            CallbackResult::Complete => {
                self.callback_stopped.store(true, Ordering::Release);
            }
            CallbackResult::Abort => {
                self.callback_stopped.store(true, Ordering::Release);
                self.user_abort.store(true, Ordering::Release);
            }
        }
    }

    fn stopped(&self) -> bool {
        self.callback_stopped.load(Ordering::Acquire)
    }
}

/// Capture-side entry point: pushes interleaved input samples into the ring
/// (Duplex) or straight into the client callback (CaptureOnly).
///
/// Case A from `pa_mac_core.c` (same AudioUnit serving both buses with zero
/// ring hop) has no cpal equivalent; `CallbackMode::Duplex` always goes
/// through the ring, just with a smaller pre-advance when the caller already
/// knows input and output share a device (see `crate::open`).
pub fn on_capture(inner: &Arc<StreamInner>, input: &[f32]) {
    if inner.stopped() {
        return;
    }
    inner.note_time_if_unset();

    match inner.mode {
        CallbackMode::RenderOnly => {}
        CallbackMode::Duplex { .. } => {
            let mut guard = inner.ring_producer.lock().unwrap();
            if let Some(producer) = guard.as_mut() {
                let written = producer.write_samples(input);
                if written < input.len() {
                    inner.input_overflow.store(true, Ordering::Release);
                }
            }
        }
        CallbackMode::CaptureOnly { with_src: false } => {
            inner.cpu_load.lock().unwrap().begin();
            let xruns = inner.pack_xruns();
            let time = inner.time_info();
            let mut out_unused: [f32; 0] = [];
            let outcome = inner.processor.lock().unwrap().run(
                time,
                xruns,
                BufferIo {
                    input: Some(InputSpan::Single(input)),
                    output: Some(&mut out_unused),
                    frames: input.len() / inner.channels_in.max(1) as usize,
                },
            );
            inner.cpu_load.lock().unwrap().end(outcome.frames_processed);
            inner.apply_result(outcome.result);
        }
        CallbackMode::CaptureOnly { with_src: true } => {
            let mut producer_guard = inner.ring_producer.lock().unwrap();
            if let Some(producer) = producer_guard.as_mut() {
                let written = producer.write_samples(input);
                if written < input.len() {
                    inner.input_overflow.store(true, Ordering::Release);
                }
            }
            drop(producer_guard);

            let mut scratch = inner.src_scratch.lock().unwrap();
            let mut consumer_guard = inner.ring_consumer.lock().unwrap();
            let mut src_guard = inner.src.lock().unwrap();
            let starved = match (consumer_guard.as_mut(), src_guard.as_mut()) {
                (Some(consumer), Some(adapter)) => {
                    adapter.pull(consumer, &mut scratch) == PullOutcome::Starved
                }
                _ => {
                    scratch.fill(0.0);
                    true
                }
            };
            drop(consumer_guard);
            drop(src_guard);
            if starved {
                inner.input_underflow.store(true, Ordering::Release);
            }

            inner.cpu_load.lock().unwrap().begin();
            let xruns = inner.pack_xruns();
            let time = inner.time_info();
            let frames = scratch.len() / inner.channels_in.max(1) as usize;
            let mut out_unused: [f32; 0] = [];
            let outcome = inner.processor.lock().unwrap().run(
                time,
                xruns,
                BufferIo {
                    input: Some(InputSpan::Single(&scratch)),
                    output: Some(&mut out_unused),
                    frames,
                },
            );
            inner.cpu_load.lock().unwrap().end(outcome.frames_processed);
            inner.apply_result(outcome.result);
        }
    }
}

/// Render-side entry point: pulls from the ring (Duplex) or drives the
/// client callback directly (RenderOnly), always leaving `output` fully
/// written — matching §4.5's "never leave an uninitialized tail" guarantee.
pub fn on_render(inner: &Arc<StreamInner>, output: &mut [f32]) {
    if inner.stopped() || inner.user_abort.load(Ordering::Acquire) {
        output.fill(0.0);
        return;
    }
    inner.note_time_if_unset();

    match inner.mode {
        CallbackMode::CaptureOnly { .. } => {
            output.fill(0.0);
        }
        CallbackMode::Duplex { with_src: true } => {
            let frames = output.len() / inner.channels_out.max(1) as usize;
            let xruns = inner.pack_xruns();
            let time = inner.time_info();

            let mut scratch = inner.src_scratch.lock().unwrap();
            let mut consumer_guard = inner.ring_consumer.lock().unwrap();
            let mut src_guard = inner.src.lock().unwrap();
            let starved = match (consumer_guard.as_mut(), src_guard.as_mut()) {
                (Some(consumer), Some(adapter)) => {
                    adapter.pull(consumer, &mut scratch) == PullOutcome::Starved
                }
                _ => {
                    scratch.fill(0.0);
                    true
                }
            };
            drop(consumer_guard);
            drop(src_guard);

            inner.cpu_load.lock().unwrap().begin();
            let outcome = inner.processor.lock().unwrap().run(
                time,
                xruns,
                BufferIo {
                    input: Some(InputSpan::Single(&scratch)),
                    output: Some(output),
                    frames,
                },
            );
            inner.cpu_load.lock().unwrap().end(outcome.frames_processed);
            drop(scratch);

            if starved {
                inner.input_underflow.store(true, Ordering::Release);
            }
            inner.apply_result(outcome.result);
        }
        CallbackMode::Duplex { with_src: false } => {
            let frames = output.len() / inner.channels_out.max(1) as usize;
            let requested_samples = frames * inner.channels_in.max(1) as usize;
            let xruns = inner.pack_xruns();

            let mut guard = inner.ring_consumer.lock().unwrap();
            let Some(consumer) = guard.as_mut() else {
                output.fill(0.0);
                return;
            };
            let regions = consumer.read_regions(requested_samples);
            let available = regions.len();
            let starved = available < requested_samples;
            let (a, b) = regions.regions();
            let time = inner.time_info();

            inner.cpu_load.lock().unwrap().begin();
            let outcome = inner.processor.lock().unwrap().run(
                time,
                xruns,
                BufferIo {
                    input: Some(InputSpan::Split(a, b)),
                    output: Some(output),
                    frames,
                },
            );
            regions.commit(available);
            inner.cpu_load.lock().unwrap().end(outcome.frames_processed);
            drop(guard);

            if starved {
                inner.input_underflow.store(true, Ordering::Release);
            }
            inner.apply_result(outcome.result);
        }
        CallbackMode::RenderOnly => {
            let frames = output.len() / inner.channels_out.max(1) as usize;
            let xruns = inner.pack_xruns();
            let time = inner.time_info();
            inner.cpu_load.lock().unwrap().begin();
            let outcome = inner.processor.lock().unwrap().run(
                time,
                xruns,
                BufferIo {
                    input: None,
                    output: Some(output),
                    frames,
                },
            );
            inner.cpu_load.lock().unwrap().end(outcome.frames_processed);
            inner.apply_result(outcome.result);
        }
    }
}

/// Pre-advance the ring's write index by `capacity / PRE_ADVANCE_DENOMINATOR`
/// samples of silence immediately after allocation (§4.1), absorbing the
/// jitter between the capture and render callbacks starting up.
pub fn pre_advance_ring(producer: &mut RingProducer) {
    let advance = producer.capacity() / PRE_ADVANCE_DENOMINATOR;
    producer.advance_write_index(advance);
}
