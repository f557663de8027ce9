//! Sample-rate converter adapter (C3, §4.3).
//!
//! AUHAL's `pa_mac_core.c` inserts a pull-model SRC (`PaUtilSampleRateConverter`)
//! between the ring buffer and the render callback whenever the device's
//! running rate doesn't match the stream's requested rate. This module plays
//! the same role with [`rubato`], grounded in `JackDraak-Humr`'s use of
//! rubato for pull-model resampling: the render callback asks the adapter
//! for `n` output frames, and the adapter pulls however many input frames it
//! needs from the [`RingConsumer`] to produce them, reporting
//! [`PullOutcome::Starved`] when the ring can't supply enough yet (mirrors
//! the source's treatment of an empty ring as silence-fill rather than a
//! hard error).

use rubato::{FftFixedIn, Resampler};

use crate::ring::RingConsumer;

/// Outcome of one [`SrcAdapter::pull`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Exactly the requested number of output frames were produced.
    Full,
    /// The ring didn't have enough input to produce a full block; the
    /// shortfall was filled with silence and the underflow flag should be
    /// set by the caller.
    Starved,
}

/// Pull-model sample-rate converter sitting between a ring buffer and the
/// render side of a duplex or render-only stream.
pub struct SrcAdapter {
    resampler: FftFixedIn<f32>,
    channels: usize,
    input_frames_per_call: usize,
    deinterleaved_in: Vec<Vec<f32>>,
    deinterleaved_out: Vec<Vec<f32>>,
    scratch_flat: Vec<f32>,
}

impl SrcAdapter {
    /// Build an adapter converting `from_rate` to `to_rate` for
    /// `channels`-channel interleaved f32 audio.
    pub fn new(from_rate: u32, to_rate: u32, channels: u16, chunk_frames: usize) -> Result<Self, String> {
        let channels = channels as usize;
        let resampler = FftFixedIn::<f32>::new(
            from_rate as usize,
            to_rate as usize,
            chunk_frames,
            2,
            channels,
        )
        .map_err(|e| e.to_string())?;
        let input_frames_per_call = resampler.input_frames_next();
        let deinterleaved_in = vec![vec![0.0f32; input_frames_per_call]; channels];
        let deinterleaved_out = vec![Vec::new(); channels];
        Ok(Self {
            resampler,
            channels,
            input_frames_per_call,
            deinterleaved_in,
            deinterleaved_out,
            scratch_flat: Vec::new(),
        })
    }

    /// Frames of *input* (pre-conversion) the adapter needs from the ring
    /// to produce its next output block.
    pub fn input_frames_needed(&self) -> usize {
        self.input_frames_per_call
    }

    /// Pull enough samples from `ring` to produce one converted block,
    /// writing the interleaved result into `out` (sized `frames * channels`).
    /// Missing input is silence-filled and reported via [`PullOutcome::Starved`].
    pub fn pull(&mut self, ring: &mut RingConsumer, out: &mut [f32]) -> PullOutcome {
        let needed_samples = self.input_frames_per_call * self.channels;
        let regions = ring.read_regions(needed_samples);
        let available = regions.len();
        let starved = available < needed_samples;

        self.scratch_flat.clear();
        let (a, b) = regions.regions();
        self.scratch_flat.extend_from_slice(a);
        self.scratch_flat.extend_from_slice(b);
        self.scratch_flat.resize(needed_samples, 0.0);
        regions.commit(available);

        for (ch, lane) in self.deinterleaved_in.iter_mut().enumerate() {
            for (frame, sample) in lane.iter_mut().enumerate() {
                *sample = self.scratch_flat[frame * self.channels + ch];
            }
        }

        match self
            .resampler
            .process_into_buffer(&self.deinterleaved_in, &mut self.deinterleaved_out, None)
        {
            Ok((_, produced)) => {
                let produced_frames = produced.min(out.len() / self.channels.max(1));
                for frame in 0..produced_frames {
                    for ch in 0..self.channels {
                        out[frame * self.channels + ch] = self.deinterleaved_out[ch][frame];
                    }
                }
                for sample in out.iter_mut().skip(produced_frames * self.channels) {
                    *sample = 0.0;
                }
            }
            Err(_) => out.fill(0.0),
        }

        if starved {
            PullOutcome::Starved
        } else {
            PullOutcome::Full
        }
    }

    pub fn reset(&mut self) {
        self.resampler.reset();
        for lane in &mut self.deinterleaved_in {
            lane.fill(0.0);
        }
    }
}
