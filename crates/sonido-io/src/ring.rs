//! Lock-free SPSC ring buffer (C1).
//!
//! The original PortAudio implementation (`pa_ringbuffer.c`, consumed by
//! `examples/original_source/src/hostapi/coreaudio/pa_mac_core.c` as
//! `RingBuffer_Write` / `RingBuffer_GetReadRegions` /
//! `RingBuffer_AdvanceReadIndex` / `RingBuffer_AdvanceWriteIndex` /
//! `RingBuffer_Flush`) is a hand-rolled byte FIFO with atomic head/tail
//! indices. This port keeps the same named operations and the same
//! two-region zero-copy read contract, but is built on [`rtrb`] rather than
//! reimplementing atomic index arithmetic — `rtrb` is the lock-free SPSC
//! ring buffer already used for exactly this purpose elsewhere in the
//! example pack (the `dataO1-Mesh` and `Pey-K-Cordia` repos both depend on
//! it specifically for "lock-free ring buffer for real-time audio, no
//! allocation in callback"), and its chunk API gives the same "peek two
//! regions, then commit a prefix" protocol `GetReadRegions` /
//! `AdvanceReadIndex` describe.
//!
//! The element type is `f32` rather than raw bytes: the host side is always
//! interleaved 32-bit float (invariant §3.4), so counting in samples avoids
//! a parallel "divide by 4 everywhere" bookkeeping layer the original C
//! carries only because it predates a typed ring buffer.

use rtrb::{Consumer, Producer, RingBuffer as RtrbRing, chunks::ChunkError};

/// Fraction of the ring's capacity the write index is pre-advanced by after
/// allocation (§4.1 "Write-index pre-advance").
pub const PRE_ADVANCE_DENOMINATOR: usize = 4;

/// Producing half of the ring (owned by the capture callback).
pub struct RingProducer {
    inner: Producer<f32>,
    capacity: usize,
}

/// Consuming half of the ring (owned by the render callback or the SRC pull
/// supplier).
pub struct RingConsumer {
    inner: Consumer<f32>,
    capacity: usize,
}

/// Create a power-of-two-capacity ring buffer and split it into its
/// producer/consumer halves.
///
/// `capacity_samples` is rounded up to the next power of two, matching the
/// original's mask-based wraparound requirement.
pub fn ring_buffer(capacity_samples: usize) -> (RingProducer, RingConsumer) {
    let capacity = capacity_samples.next_power_of_two().max(2);
    let (producer, consumer) = RtrbRing::<f32>::new(capacity);
    (
        RingProducer {
            inner: producer,
            capacity,
        },
        RingConsumer {
            inner: consumer,
            capacity,
        },
    )
}

impl RingProducer {
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Non-blocking query: free slots available to write.
    pub fn write_available(&self) -> usize {
        self.inner.slots()
    }

    /// Copy up to `src.len()` samples into the ring. Returns the number
    /// actually written; a short write indicates overflow (the caller sets
    /// `inputOverflow`).
    pub fn write_samples(&mut self, src: &[f32]) -> usize {
        let n = src.len().min(self.inner.slots());
        if n == 0 {
            return 0;
        }
        match self.inner.write_chunk_uninit(n) {
            Ok(chunk) => chunk.fill_from_iter(src[..n].iter().copied()),
            Err(ChunkError::TooFewSlots(available)) => {
                if available == 0 {
                    return 0;
                }
                match self.inner.write_chunk_uninit(available) {
                    Ok(chunk) => chunk.fill_from_iter(src[..available].iter().copied()),
                    Err(_) => 0,
                }
            }
        }
    }

    /// Advance the write index by `n` samples of silence without real data.
    /// Used once after allocation (pre-advance) and after `Flush` on Stop.
    pub fn advance_write_index(&mut self, n: usize) -> usize {
        let n = n.min(self.inner.slots());
        if n == 0 {
            return 0;
        }
        match self.inner.write_chunk_uninit(n) {
            Ok(chunk) => chunk.fill_from_iter(std::iter::repeat(0.0f32).take(n)),
            Err(_) => 0,
        }
    }
}

/// Up to two contiguous borrowed regions from a `GetReadRegions` query.
/// Dropping without calling [`ReadRegions::commit`] leaves the consumer's
/// read index unmoved (a pure peek).
pub struct ReadRegions<'a> {
    chunk: Option<rtrb::chunks::ReadChunk<'a, f32>>,
    len: usize,
}

impl<'a> ReadRegions<'a> {
    /// The two contiguous spans making up this read, in order. The second
    /// span is non-empty only when the read wrapped the ring's backing
    /// storage.
    pub fn regions(&self) -> (&[f32], &[f32]) {
        match &self.chunk {
            Some(chunk) => chunk.as_slices(),
            None => (&[], &[]),
        }
    }

    /// Total samples available across both regions.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Commit that `n` of these samples were consumed, advancing the read
    /// index. `n` must be `<= len()`.
    pub fn commit(mut self, n: usize) {
        if let Some(chunk) = self.chunk.take() {
            chunk.commit(n.min(self.len));
        }
    }
}

impl RingConsumer {
    /// Non-blocking query: samples available to read.
    pub fn read_available(&self) -> usize {
        self.inner.slots()
    }

    /// Borrow up to `min(req, read_available())` samples as zero-copy
    /// regions. The caller decides how much of the return value to commit.
    pub fn read_regions(&mut self, req: usize) -> ReadRegions<'_> {
        let n = req.min(self.inner.slots());
        if n == 0 {
            return ReadRegions {
                chunk: None,
                len: 0,
            };
        }
        match self.inner.read_chunk(n) {
            Ok(chunk) => ReadRegions {
                chunk: Some(chunk),
                len: n,
            },
            Err(_) => ReadRegions {
                chunk: None,
                len: 0,
            },
        }
    }

    /// Drop every buffered sample. Only legal when no realtime callback is
    /// running (§4.1).
    pub fn flush(&mut self) {
        let available = self.inner.slots();
        if available == 0 {
            return;
        }
        if let Ok(chunk) = self.inner.read_chunk(available) {
            chunk.commit_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_contiguous_write() {
        let (mut p, mut c) = ring_buffer(64);
        let data = [1.0f32, 2.0, 3.0, 4.0];
        assert_eq!(p.write_samples(&data), 4);
        let regions = c.read_regions(4);
        assert_eq!(regions.len(), 4);
        let (a, b) = regions.regions();
        let joined: Vec<f32> = a.iter().chain(b.iter()).copied().collect();
        assert_eq!(joined, data);
        regions.commit(4);
        assert_eq!(c.read_available(), 0);
    }

    #[test]
    fn short_write_reports_actual_count() {
        let (mut p, _c) = ring_buffer(4);
        let data = [0.0f32; 10];
        let written = p.write_samples(&data);
        assert!(written <= 4);
    }

    #[test]
    fn peek_without_commit_does_not_advance() {
        let (mut p, mut c) = ring_buffer(16);
        p.write_samples(&[1.0, 2.0, 3.0]);
        {
            let regions = c.read_regions(2);
            assert_eq!(regions.len(), 2);
            // dropped without commit
        }
        assert_eq!(c.read_available(), 3);
    }

    #[test]
    fn partial_commit_leaves_remainder_readable() {
        let (mut p, mut c) = ring_buffer(16);
        p.write_samples(&[1.0, 2.0, 3.0, 4.0]);
        let regions = c.read_regions(4);
        regions.commit(2);
        assert_eq!(c.read_available(), 2);
        let regions = c.read_regions(2);
        let (a, b) = regions.regions();
        let joined: Vec<f32> = a.iter().chain(b.iter()).copied().collect();
        assert_eq!(joined, vec![3.0, 4.0]);
        regions.commit(2);
    }

    #[test]
    fn pre_advance_consumes_quarter_capacity() {
        let (mut p, c) = ring_buffer(64);
        let advance = p.capacity() / PRE_ADVANCE_DENOMINATOR;
        let advanced = p.advance_write_index(advance);
        assert_eq!(advanced, advance);
        assert_eq!(c.read_available(), advance);
    }

    #[test]
    fn flush_resets_both_indices() {
        let (mut p, mut c) = ring_buffer(32);
        p.write_samples(&[1.0; 10]);
        c.flush();
        assert_eq!(c.read_available(), 0);
        assert_eq!(p.write_available(), p.capacity());
    }
}
