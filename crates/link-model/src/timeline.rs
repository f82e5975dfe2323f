//! Planning horizon
//!
//! Timestep `i` covers `[start + i·step, start + (i+1)·step)`. Epoch times are
//! `chrono` UTC instants; "OF time" is the seconds scale worth records are
//! stamped in, anchored so that `of_start` coincides with timestep 0.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance when deciding which timestep an instant on a boundary falls in
const BOUNDARY_EPSILON: f64 = 1e-9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("timestep length must be positive, got {0} s")]
    InvalidStep(f64),
    #[error("planning horizon must contain at least one timestep")]
    EmptyHorizon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    start: DateTime<Utc>,
    step_seconds: f64,
    time_steps: usize,
    of_start: f64,
}

impl Timeline {
    pub fn new(
        start: DateTime<Utc>,
        step_seconds: f64,
        time_steps: usize,
        of_start: f64,
    ) -> Result<Self, TimelineError> {
        if !(step_seconds.is_finite() && step_seconds > 0.0) {
            return Err(TimelineError::InvalidStep(step_seconds));
        }
        if time_steps == 0 {
            return Err(TimelineError::EmptyHorizon);
        }
        Ok(Self {
            start,
            step_seconds,
            time_steps,
            of_start,
        })
    }

    pub fn len(&self) -> usize {
        self.time_steps
    }

    pub fn is_empty(&self) -> bool {
        self.time_steps == 0
    }

    pub fn step_seconds(&self) -> f64 {
        self.step_seconds
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.time_steps
    }

    /// Epoch at the start of timestep `index`
    pub fn epoch_at(&self, index: usize) -> Option<DateTime<Utc>> {
        if !self.contains(index) {
            return None;
        }
        Some(self.start + seconds(index as f64 * self.step_seconds))
    }

    /// Timestep containing `epoch`
    pub fn index_at(&self, epoch: DateTime<Utc>) -> Option<usize> {
        self.index_for_of_time(self.epoch_to_of_time(epoch))
    }

    pub fn of_start(&self) -> f64 {
        self.of_start
    }

    /// OF time at the end of the last timestep
    pub fn of_end(&self) -> f64 {
        self.of_start + self.time_steps as f64 * self.step_seconds
    }

    pub fn of_time_at(&self, index: usize) -> f64 {
        self.of_start + index as f64 * self.step_seconds
    }

    /// Timestep containing the OF instant, or `None` outside the horizon
    pub fn index_for_of_time(&self, of_time: f64) -> Option<usize> {
        if !of_time.is_finite() {
            return None;
        }
        let offset = (of_time - self.of_start) / self.step_seconds;
        if offset < -BOUNDARY_EPSILON {
            return None;
        }
        let index = (offset + BOUNDARY_EPSILON).floor().max(0.0) as usize;
        self.contains(index).then_some(index)
    }

    /// OF time of the boundary that ends timestep `index`
    pub fn next_boundary_of_time(&self, index: usize) -> f64 {
        self.of_time_at(index + 1)
    }

    pub fn epoch_to_of_time(&self, epoch: DateTime<Utc>) -> f64 {
        let elapsed = epoch.signed_duration_since(self.start);
        let secs = elapsed.num_milliseconds() as f64 / 1000.0;
        self.of_start + secs
    }

    pub fn of_time_to_epoch(&self, of_time: f64) -> DateTime<Utc> {
        self.start + seconds(of_time - self.of_start)
    }
}

fn seconds(value: f64) -> Duration {
    Duration::milliseconds((value * 1000.0).round() as i64)
}
