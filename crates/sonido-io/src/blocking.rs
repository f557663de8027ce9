//! Blocking read/write facade (§6 "Exposed to the host-API dispatcher":
//! `Read`, `Write`, `GetReadAvailable`, `GetWriteAvailable`).
//!
//! A thin synchronous wrapper over the same ring buffer the realtime
//! callback drives, for callers that want a blocking-I/O stream rather than
//! a callback-driven one (PortAudio's "blocking read/write" stream style,
//! layered on top of the same realtime core rather than a separate code
//! path).

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use crate::callback::StreamInner;

/// Polling interval while waiting for the ring to have enough data/space.
/// Chosen to be much shorter than a typical buffer's duration at any
/// reasonable sample rate and buffer size, trading a small amount of CPU
/// for not needing a condvar wired through the realtime callback.
const POLL_INTERVAL: Duration = Duration::from_micros(200);

/// Blocking facade over a duplex or capture-only stream's input ring.
pub struct BlockingReader {
    inner: Arc<StreamInner>,
}

impl BlockingReader {
    pub(crate) fn new(inner: Arc<StreamInner>) -> Self {
        Self { inner }
    }

    /// Samples currently available to read without blocking.
    pub fn read_available(&self) -> usize {
        self.inner
            .ring_consumer
            .lock()
            .unwrap()
            .as_ref()
            .map(|c| c.read_available())
            .unwrap_or(0)
    }

    /// Block until `buf` is fully populated or the stream stops.
    pub fn read(&self, buf: &mut [f32]) -> usize {
        let mut filled = 0;
        while filled < buf.len() {
            if self.inner.callback_stopped.load(Ordering::Acquire) {
                break;
            }
            let mut guard = self.inner.ring_consumer.lock().unwrap();
            let Some(consumer) = guard.as_mut() else {
                break;
            };
            let want = buf.len() - filled;
            let regions = consumer.read_regions(want);
            let got = regions.len();
            if got == 0 {
                drop(guard);
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            let (a, b) = regions.regions();
            buf[filled..filled + a.len()].copy_from_slice(a);
            buf[filled + a.len()..filled + got].copy_from_slice(b);
            regions.commit(got);
            filled += got;
        }
        filled
    }
}

/// Blocking facade over a duplex or render-only stream's output ring.
pub struct BlockingWriter {
    inner: Arc<StreamInner>,
}

impl BlockingWriter {
    pub(crate) fn new(inner: Arc<StreamInner>) -> Self {
        Self { inner }
    }

    /// Free slots currently available to write without blocking.
    pub fn write_available(&self) -> usize {
        self.inner
            .ring_producer
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.write_available())
            .unwrap_or(0)
    }

    /// Block until all of `data` has been queued or the stream stops.
    pub fn write(&self, data: &[f32]) -> usize {
        let mut sent = 0;
        while sent < data.len() {
            if self.inner.callback_stopped.load(Ordering::Acquire) {
                break;
            }
            let mut guard = self.inner.ring_producer.lock().unwrap();
            let Some(producer) = guard.as_mut() else {
                break;
            };
            let written = producer.write_samples(&data[sent..]);
            drop(guard);
            if written == 0 {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            sent += written;
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_processor::{
        BufferProcessor, BufferProcessorConfig, CallbackBufferProcessor, HostBufferSizeMode,
    };
    use crate::callback::CallbackMode;
    use crate::cpu_load::CpuLoadMeter;
    use crate::params::CallbackResult;
    use crate::ring::ring_buffer;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64};

    fn bare_inner() -> Arc<StreamInner> {
        let (producer, consumer) = ring_buffer(1024);
        let mut processor = CallbackBufferProcessor::new(|_i, o, _t| {
            o.fill(0.0);
            CallbackResult::Continue
        });
        processor.initialize(BufferProcessorConfig {
            input_channels: 1,
            output_channels: 1,
            sample_rate: 48_000.0,
            frames_per_user_callback: 64,
            max_host_frames: 64,
            host_buffer_size_mode: HostBufferSizeMode::Bounded(64),
        });
        Arc::new(StreamInner {
            mode: CallbackMode::Duplex { with_src: false },
            xruns: AtomicU64::new(0),
            input_underflow: AtomicBool::new(false),
            input_overflow: AtomicBool::new(false),
            output_underflow: AtomicBool::new(false),
            output_overflow: AtomicBool::new(false),
            is_time_set: AtomicBool::new(false),
            start_time: Mutex::new(None),
            sample_rate: 48_000.0,
            channels_in: 1,
            channels_out: 1,
            cpu_load: Mutex::new(CpuLoadMeter::new(48_000.0)),
            processor: Mutex::new(Box::new(processor)),
            ring_producer: Mutex::new(Some(producer)),
            ring_consumer: Mutex::new(Some(consumer)),
            src: Mutex::new(None),
            src_scratch: Mutex::new(Vec::new()),
            user_abort: AtomicBool::new(false),
            callback_stopped: AtomicBool::new(false),
        })
    }

    #[test]
    fn write_then_read_round_trips() {
        let inner = bare_inner();
        let writer = BlockingWriter::new(Arc::clone(&inner));
        let reader = BlockingReader::new(Arc::clone(&inner));

        let data = vec![1.0f32, 2.0, 3.0, 4.0];
        assert_eq!(writer.write(&data), 4);
        let mut out = vec![0.0f32; 4];
        assert_eq!(reader.read(&mut out), 4);
        assert_eq!(out, data);
    }

    #[test]
    fn read_stops_when_callback_stopped_flag_is_set() {
        let inner = bare_inner();
        inner.callback_stopped.store(true, Ordering::Release);
        let reader = BlockingReader::new(inner);
        let mut out = vec![0.0f32; 4];
        assert_eq!(reader.read(&mut out), 0);
    }
}
