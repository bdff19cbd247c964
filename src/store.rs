// src/store.rs
//
// Samples of the current run, one composite record per reading.

use crate::error::StoreError;
use crate::protocol::Reading;
use crate::render::Axis;
use chrono::{DateTime, Local};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// 1-based position in the run.
    pub index: u32,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub timestamp: DateTime<Local>,
}

impl Sample {
    pub fn new(index: u32, reading: Reading, timestamp: DateTime<Local>) -> Self {
        Self {
            index,
            voltage: reading.voltage,
            current: reading.current,
            timestamp,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SampleStore {
    samples: Vec<Sample>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Append the next sample. Its index must continue the sequence.
    pub fn push(&mut self, sample: Sample) -> Result<(), StoreError> {
        let expected = self.samples.len() as u32 + 1;
        if sample.index != expected {
            return Err(StoreError::OutOfSequence {
                expected,
                got: sample.index,
            });
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Seconds since the first sample, one entry per sample.
    pub fn elapsed_secs(&self) -> Vec<f64> {
        let Some(first) = self.samples.first() else {
            return Vec::new();
        };
        self.samples
            .iter()
            .map(|s| seconds_between(first.timestamp, s.timestamp))
            .collect()
    }

    pub fn series(&self, axis: Axis) -> Vec<Option<f64>> {
        match axis {
            Axis::Voltage => self.samples.iter().map(|s| s.voltage).collect(),
            Axis::Current => self.samples.iter().map(|s| s.current).collect(),
            Axis::Time => self.elapsed_secs().into_iter().map(Some).collect(),
            Axis::ReadingNumber => self.samples.iter().map(|s| Some(s.index as f64)).collect(),
        }
    }

    /// Fixed-width text table, `None` until there is at least one sample.
    pub fn table(&self) -> Option<String> {
        if self.samples.is_empty() {
            return None;
        }

        let mut out = String::new();
        out.push_str("Reading | Voltage (V) | Current (A) | Time (s)\n");
        out.push_str("--------|-------------|-------------|----------\n");

        for (s, t) in self.samples.iter().zip(self.elapsed_secs()) {
            let voltage = s.voltage.unwrap_or(f64::NAN);
            let current = s.current.unwrap_or(f64::NAN);
            let _ = writeln!(
                out,
                "{:<8}| {:<11.4} | {:<11.4} | {:<8.2}",
                s.index, voltage, current, t
            );
        }
        Some(out)
    }
}

fn seconds_between(from: DateTime<Local>, to: DateTime<Local>) -> f64 {
    let delta = to.signed_duration_since(from);
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}
