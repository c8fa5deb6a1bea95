//! Safe-mode ramp scheduling.
//!
//! Axes are ramped one at a time in ascending order of `|target - measured|`.
//! This keeps the instantaneous field inside the safe region only when that
//! region is convex and ramping the closest-to-target axis first stays inside
//! it. That is a precondition of the caller, not something checked here; no
//! bounds checking happens in this module.

use crate::domain::{AlignResult, Axis, FieldVector, RampStatus};
use crate::numerics::deterministic_argsort;
use crate::source::FieldSource;
use std::thread;
use std::time::Duration;
use tracing::debug;

pub const RAMP_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampOutcome {
    pub order: [Axis; 3],
    pub polls: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampScheduler {
    poll_interval: Duration,
}

impl Default for RampScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RampScheduler {
    pub const fn new() -> Self {
        Self {
            poll_interval: RAMP_POLL_INTERVAL,
        }
    }

    pub const fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Axis order for a safe ramp; ties keep x, y, z order.
    pub fn plan(measured: FieldVector, target: FieldVector) -> [Axis; 3] {
        let deviation = target.abs_deviation(&measured);
        let order = deterministic_argsort(&deviation);
        [
            Axis::ALL[order[0]],
            Axis::ALL[order[1]],
            Axis::ALL[order[2]],
        ]
    }

    /// Moves every axis to its pending target, blocking until each is done,
    /// then refreshes the measured field.
    pub fn ramp<F: FieldSource + ?Sized>(&self, source: &mut F) -> AlignResult<RampOutcome> {
        let measured = source.measured_field()?;
        let target = source.target_field()?;
        let order = Self::plan(measured, target);
        debug!(
            ?order,
            from = ?measured.as_array(),
            to = ?target.as_array(),
            "safe ramp"
        );

        let mut polls = 0;
        for axis in order {
            polls += self.ramp_and_wait(source, axis)?;
        }
        source.refresh()?;
        Ok(RampOutcome { order, polls })
    }

    pub fn ramp_axis<F: FieldSource + ?Sized>(
        &self,
        source: &mut F,
        axis: Axis,
    ) -> AlignResult<FieldVector> {
        self.ramp_and_wait(source, axis)?;
        source.refresh()
    }

    fn ramp_and_wait<F: FieldSource + ?Sized>(&self, source: &mut F, axis: Axis) -> AlignResult<usize> {
        source.start_ramp(axis)?;
        let mut polls = 0;
        while source.ramp_status(axis)? == RampStatus::Ramping {
            polls += 1;
            if !self.poll_interval.is_zero() {
                thread::sleep(self.poll_interval);
            }
        }
        debug!(axis = %axis, polls, "axis ramp complete");
        Ok(polls)
    }
}
