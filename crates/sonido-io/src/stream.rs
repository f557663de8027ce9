//! Stream object and state machine (C4, §4.4).
//!
//! Mirrors the lifecycle `Pa_StartStream` / `Pa_StopStream` / `Pa_AbortStream`
//! / `Pa_IsStreamStopped` / `Pa_IsStreamActive` drive in the original, backed
//! here by a pair of `cpal::Stream` handles plus the [`StreamInner`] realtime
//! state the callbacks in [`crate::callback`] read and write.
//!
//! State transitions: `Stopped -> Active` on `start`, `Active -> Stopping`
//! on `stop`/`abort` while cpal tears the platform stream down, and
//! `Active -> CallbackStopped` when the client callback itself returns
//! `Complete`/`Abort` (§4.4 "Callback-initiated stop").

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::StreamTrait;

use crate::buffer_processor::XrunFlags;
use crate::callback::{StreamInner, pre_advance_ring};
use crate::{Error, Result};

/// Upper bound `stop` waits for the ring to drain before pausing the
/// platform streams regardless (guards against a `BlockingWriter` caller
/// that queued data and then stopped polling).
const DRAIN_TIMEOUT: Duration = Duration::from_millis(150);
/// Poll interval while waiting for the ring to drain, matching
/// `crate::blocking`'s own polling cadence.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_micros(200);

/// Observable lifecycle state of a [`Stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    Active,
    Stopping,
    /// The client callback returned `Complete`/`Abort`; the platform stream
    /// is still technically running until `stop`/`abort` tears it down, but
    /// no more client work happens (§4.4).
    CallbackStopped,
}

/// An open, negotiated audio stream. Exposes the lifecycle operations listed
/// under "Exposed to the host-API dispatcher" (§6): `Start`, `Stop`, `Abort`,
/// `IsStopped`, `IsActive`, `GetStreamTime`, `GetStreamCpuLoad`.
pub struct Stream {
    pub(crate) inner: Arc<StreamInner>,
    pub(crate) input_stream: Option<cpal::Stream>,
    pub(crate) output_stream: Option<cpal::Stream>,
    state: StreamState,
}

impl Stream {
    pub(crate) fn new(
        inner: Arc<StreamInner>,
        input_stream: Option<cpal::Stream>,
        output_stream: Option<cpal::Stream>,
    ) -> Self {
        Self {
            inner,
            input_stream,
            output_stream,
            state: StreamState::Stopped,
        }
    }

    /// Begin realtime processing. Platform streams are played in
    /// input-then-output order so the capture side is already feeding the
    /// ring before the render callback's first invocation (§4.4 "Start
    /// ordering": "start input unit first, then output unit if distinct").
    pub fn start(&mut self) -> Result<()> {
        if self.state == StreamState::Active {
            return Ok(());
        }
        self.inner.callback_stopped.store(false, Ordering::Release);
        self.inner.user_abort.store(false, Ordering::Release);
        self.inner.is_time_set.store(false, Ordering::Release);
        self.inner.cpu_load.lock().unwrap().reset();
        self.inner.processor.lock().unwrap().reset();
        if let Some(adapter) = self.inner.src.lock().unwrap().as_mut() {
            adapter.reset();
        }

        if let Some(input) = &self.input_stream {
            input.play().map_err(|e| Error::host(e.to_string()))?;
        }
        if let Some(output) = &self.output_stream {
            output.play().map_err(|e| Error::host(e.to_string()))?;
        }
        self.state = StreamState::Active;
        Ok(())
    }

    /// Stop gracefully: waits (bounded by [`DRAIN_TIMEOUT`]) for whatever a
    /// `BlockingWriter` already queued on the ring to be consumed by the
    /// still-running render callback, since cpal has no explicit drain
    /// primitive of its own. Only once the ring is empty (or the timeout
    /// elapses) does it pause both directions, flush the ring, and
    /// re-pre-advance it so a subsequent `start` behaves exactly like the
    /// first one (§4.4 "Stop": "flush and re-pre-advance the ring buffer").
    pub fn stop(&mut self) -> Result<()> {
        self.drain_ring();
        self.pause_streams()?;
        self.flush_and_repreadvance_ring();
        self.state = StreamState::Stopped;
        Ok(())
    }

    /// Stop immediately, discarding any buffered frames (§4.4 "Abort").
    pub fn abort(&mut self) -> Result<()> {
        self.inner.user_abort.store(true, Ordering::Release);
        self.pause_streams()?;
        self.flush_and_repreadvance_ring();
        self.state = StreamState::Stopped;
        Ok(())
    }

    /// Block, up to [`DRAIN_TIMEOUT`], while the ring still holds samples a
    /// `BlockingWriter` queued for the render callback to pick up. `abort`
    /// skips this and discards immediately instead (§4.4 "Abort").
    fn drain_ring(&self) {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        loop {
            let remaining = self
                .inner
                .ring_consumer
                .lock()
                .unwrap()
                .as_ref()
                .map(|c| c.read_available())
                .unwrap_or(0);
            if remaining == 0 || Instant::now() >= deadline {
                break;
            }
            thread::sleep(DRAIN_POLL_INTERVAL);
        }
    }

    fn flush_and_repreadvance_ring(&self) {
        if let Some(consumer) = self.inner.ring_consumer.lock().unwrap().as_mut() {
            consumer.flush();
        }
        if let Some(producer) = self.inner.ring_producer.lock().unwrap().as_mut() {
            pre_advance_ring(producer);
        }
    }

    fn pause_streams(&mut self) -> Result<()> {
        self.state = StreamState::Stopping;
        if let Some(input) = &self.input_stream {
            input.pause().map_err(|e| Error::host(e.to_string()))?;
        }
        if let Some(output) = &self.output_stream {
            output.pause().map_err(|e| Error::host(e.to_string()))?;
        }
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state, StreamState::Stopped)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, StreamState::Active)
            && !self.inner.callback_stopped.load(Ordering::Acquire)
    }

    pub fn state(&self) -> StreamState {
        if self.state == StreamState::Active && self.inner.callback_stopped.load(Ordering::Acquire) {
            StreamState::CallbackStopped
        } else {
            self.state
        }
    }

    /// Seconds elapsed since the first realtime callback fired, or `0.0`
    /// before the stream has produced one (§6 `GetStreamTime`). Always
    /// non-negative and monotonically nondecreasing.
    pub fn get_stream_time(&self) -> f64 {
        self.inner
            .start_time
            .lock()
            .unwrap()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Smoothed fraction of the callback's time budget spent processing
    /// (§6 `GetStreamCpuLoad`), in `[0.0, 1.0]`.
    pub fn get_stream_cpu_load(&self) -> f64 {
        self.inner.cpu_load.lock().unwrap().value()
    }

    /// Cumulative xrun flags observed since the stream was last started,
    /// without clearing them (diagnostic/testing hook; §3 `xrunFlags`).
    pub fn xrun_flags(&self) -> XrunFlags {
        XrunFlags {
            input_underflow: self.inner.input_underflow.load(Ordering::Acquire),
            input_overflow: self.inner.input_overflow.load(Ordering::Acquire),
            output_underflow: self.inner.output_underflow.load(Ordering::Acquire),
            output_overflow: self.inner.output_overflow.load(Ordering::Acquire),
        }
    }

    /// A blocking read facade over this stream's input ring, for clients
    /// that would rather poll than register a callback.
    pub fn blocking_reader(&self) -> crate::blocking::BlockingReader {
        crate::blocking::BlockingReader::new(Arc::clone(&self.inner))
    }

    /// A blocking write facade over this stream's output ring.
    pub fn blocking_writer(&self) -> crate::blocking::BlockingWriter {
        crate::blocking::BlockingWriter::new(Arc::clone(&self.inner))
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        let _ = self.abort();
    }
}
