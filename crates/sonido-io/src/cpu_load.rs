//! CPU-load metering (part of C4's `Stream` state).
//!
//! An exponentially-weighted moving average of
//! `callback wall time / (frames / sampleRate)`, bracketed around the whole
//! callback body by `begin`/`end` the way the buffer processor's
//! `BeginBufferProcessing`/`EndBufferProcessing` bracket client dispatch.

use std::time::Instant;

const SMOOTHING: f64 = 0.9;

#[derive(Debug)]
pub struct CpuLoadMeter {
    sample_rate: f64,
    load: f64,
    pending_start: Option<Instant>,
}

impl CpuLoadMeter {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            load: 0.0,
            pending_start: None,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    pub fn begin(&mut self) {
        self.pending_start = Some(Instant::now());
    }

    pub fn end(&mut self, frames_processed: usize) {
        let Some(start) = self.pending_start.take() else {
            return;
        };
        if frames_processed == 0 || self.sample_rate <= 0.0 {
            return;
        }
        let wall = start.elapsed().as_secs_f64();
        let budget = frames_processed as f64 / self.sample_rate;
        if budget <= 0.0 {
            return;
        }
        let instantaneous = (wall / budget).min(1.0);
        self.load = SMOOTHING * self.load + (1.0 - SMOOTHING) * instantaneous;
    }

    pub fn value(&self) -> f64 {
        self.load
    }

    pub fn reset(&mut self) {
        self.load = 0.0;
        self.pending_start = None;
    }
}
