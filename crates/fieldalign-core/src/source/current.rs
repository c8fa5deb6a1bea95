use super::CurrentSource;
use crate::domain::{AlignError, AlignResult};
use crate::numerics::duration_from_seconds;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrentRampSettings {
    /// Largest current increment per ramp step, in amperes.
    pub step: f64,
    /// Wait after each commanded step, in seconds.
    pub delay: f64,
    /// Commanded currents are snapped to integer multiples of this, in amperes.
    pub resolution: Option<f64>,
}

impl Default for CurrentRampSettings {
    fn default() -> Self {
        Self {
            step: 1.0e-5,
            delay: 5.0e-2,
            resolution: None,
        }
    }
}

impl CurrentRampSettings {
    pub fn validate(&self) -> AlignResult<()> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(AlignError::configuration(
                "CONFIG.CURRENT_STEP",
                format!("current ramp step must be positive, got {}", self.step),
            ));
        }
        self.delay_duration()?;
        match self.resolution {
            Some(resolution) if !(resolution.is_finite() && resolution > 0.0) => {
                Err(AlignError::configuration(
                    "CONFIG.CURRENT_RESOLUTION",
                    format!("current resolution must be positive, got {}", resolution),
                ))
            }
            _ => Ok(()),
        }
    }

    fn delay_duration(&self) -> AlignResult<Duration> {
        duration_from_seconds(self.delay).ok_or_else(|| {
            AlignError::configuration(
                "CONFIG.CURRENT_DELAY",
                format!(
                    "current ramp delay must be a non-negative number of seconds, got {}",
                    self.delay
                ),
            )
        })
    }
}

/// Presents a current supply as a single field axis: `field = current / coil_constant`.
#[derive(Debug)]
pub struct CurrentFieldAdapter<S> {
    source: S,
    coil_constant: f64,
    ramp: CurrentRampSettings,
    delay: Duration,
    target: f64,
}

impl<S: CurrentSource> CurrentFieldAdapter<S> {
    /// `coil_constant` is in A/T. The target starts at the present field.
    pub fn new(mut source: S, coil_constant: f64, ramp: CurrentRampSettings) -> AlignResult<Self> {
        if !(coil_constant.is_finite() && coil_constant != 0.0) {
            return Err(AlignError::configuration(
                "CONFIG.COIL_CONSTANT",
                format!("coil constant must be finite and non-zero, got {}", coil_constant),
            ));
        }
        ramp.validate()?;
        let delay = ramp.delay_duration()?;

        let target = field_from_source(&mut source, coil_constant)?;
        Ok(Self {
            source,
            coil_constant,
            ramp,
            delay,
            target,
        })
    }

    /// Zero while the output is disabled.
    pub fn field(&mut self) -> AlignResult<f64> {
        field_from_source(&mut self.source, self.coil_constant)
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn set_target(&mut self, tesla: f64) {
        self.target = tesla;
    }

    /// Blocks until the supply sits at `target * coil_constant`.
    pub fn ramp_to_target(&mut self) -> AlignResult<()> {
        if !self.source.output_enabled()? {
            self.source.select_current_mode()?;
        }
        self.source.set_output(true)?;

        let start = self.source.current()?;
        let goal = self.target * self.coil_constant;
        let points = current_ramp_points(start, goal, self.ramp.step);
        debug!(
            start_amperes = start,
            goal_amperes = goal,
            steps = points.len(),
            "ramping current source"
        );

        for amperes in points {
            let commanded = match self.ramp.resolution {
                Some(resolution) => resolution * (amperes / resolution).round(),
                None => amperes,
            };
            self.source.set_current(commanded)?;
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }
        Ok(())
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

fn field_from_source<S: CurrentSource>(source: &mut S, coil_constant: f64) -> AlignResult<f64> {
    if !source.output_enabled()? {
        return Ok(0.0);
    }
    Ok(source.current()? / coil_constant)
}

/// Intermediate currents from `start` (exclusive) to `goal` (inclusive) spaced
/// by at most `step`, produced one at a time. Empty when already at the goal.
pub fn current_ramp_points(start: f64, goal: f64, step: f64) -> CurrentRampPoints {
    let distance = goal - start;
    let count = if distance == 0.0 || step.is_nan() || step <= 0.0 {
        0
    } else {
        (distance.abs() / step).ceil().max(1.0) as usize
    };

    CurrentRampPoints {
        start,
        goal,
        signed_step: step.copysign(distance),
        emitted: 0,
        count,
    }
}

/// Iterator returned by [`current_ramp_points`]. The last point is exactly the goal.
#[derive(Debug, Clone)]
pub struct CurrentRampPoints {
    start: f64,
    goal: f64,
    signed_step: f64,
    emitted: usize,
    count: usize,
}

impl Iterator for CurrentRampPoints {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.emitted >= self.count {
            return None;
        }
        self.emitted += 1;
        let index = self.emitted;
        if index == self.count {
            Some(self.goal)
        } else {
            Some(self.start + self.signed_step * index as f64)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.emitted;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CurrentRampPoints {}
