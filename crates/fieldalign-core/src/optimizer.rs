//! Hysteresis-aware line search along a single field axis.
//!
//! The search steps the axis in one direction while the objective does not
//! drop. A drop reverses the direction; a reversal that points back along the
//! initial direction completes one oscillation and halves the step on the
//! resolution grid. The search stops once the step falls below the final step.

use crate::coordinates::spherical_from_measured;
use crate::domain::{AlignError, AlignResult, Axis, SphericalField};
use crate::numerics::{duration_from_seconds, resolution_units};
use crate::objective::Objective;
use crate::ramp::RampScheduler;
use crate::source::{AxisHandle, FieldSource};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Below this magnitude the measured angles are dominated by noise.
pub const MINIMUM_FIELD_FOR_ANGLES: f64 = 2.0e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum SearchDirection {
    Positive,
    Negative,
}

impl SearchDirection {
    pub const fn sign(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }

    pub const fn reversed(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
        }
    }
}

impl TryFrom<i8> for SearchDirection {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Positive),
            -1 => Ok(Self::Negative),
            other => Err(format!("search direction must be 1 or -1, got {}", other)),
        }
    }
}

impl From<SearchDirection> for i8 {
    fn from(direction: SearchDirection) -> Self {
        match direction {
            SearchDirection::Positive => 1,
            SearchDirection::Negative => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineSearchSettings {
    /// Tesla.
    pub initial_step: f64,
    /// The search halts once the step drops below this, in tesla.
    pub final_step: f64,
    /// Step sizes are integer multiples of this, in tesla.
    pub resolution: f64,
    pub initial_direction: SearchDirection,
    /// Largest absolute axis value the search may request, in tesla.
    pub max_amplitude: f64,
    /// Seconds to wait after each ramp before reading.
    pub settle_time: f64,
    pub minimum_field_for_angles: f64,
    pub record_history: bool,
}

impl Default for LineSearchSettings {
    fn default() -> Self {
        Self {
            initial_step: 200.0e-6,
            final_step: 50.0e-6,
            resolution: 20.0e-6,
            initial_direction: SearchDirection::Positive,
            max_amplitude: 10.0e-3,
            settle_time: 3.0,
            minimum_field_for_angles: MINIMUM_FIELD_FOR_ANGLES,
            record_history: false,
        }
    }
}

impl LineSearchSettings {
    pub fn validate(&self) -> AlignResult<()> {
        let positive = [
            ("initialStep", self.initial_step),
            ("finalStep", self.final_step),
            ("resolution", self.resolution),
            ("maxAmplitude", self.max_amplitude),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(AlignError::configuration(
                    "CONFIG.LINE_SEARCH",
                    format!("line search {} must be positive, got {}", name, value),
                ));
            }
        }
        if !(self.minimum_field_for_angles.is_finite() && self.minimum_field_for_angles >= 0.0) {
            return Err(AlignError::configuration(
                "CONFIG.LINE_SEARCH",
                format!(
                    "line search minimumFieldForAngles must be non-negative, got {}",
                    self.minimum_field_for_angles
                ),
            ));
        }
        self.settle_duration()?;
        Ok(())
    }

    pub fn settle_duration(&self) -> AlignResult<Duration> {
        duration_from_seconds(self.settle_time).ok_or_else(|| {
            AlignError::configuration(
                "CONFIG.LINE_SEARCH",
                format!(
                    "line search settleTime must be a non-negative number of seconds, got {}",
                    self.settle_time
                ),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSearchSample {
    pub position: f64,
    pub objective: f64,
}

/// Mutable state of one line search; created and consumed by a single
/// [`optimize_axis`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationState {
    objective: f64,
    position: f64,
    resolution: f64,
    step_units: u64,
    direction: SearchDirection,
    initial_direction: SearchDirection,
    steps: usize,
    history: Vec<LineSearchSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    Continue,
    Reverse,
    ReverseAndHalve,
}

impl OptimizationState {
    pub fn start(objective: f64, position: f64, settings: &LineSearchSettings) -> Self {
        Self {
            objective,
            position,
            resolution: settings.resolution,
            step_units: resolution_units(settings.initial_step, settings.resolution),
            direction: settings.initial_direction,
            initial_direction: settings.initial_direction,
            steps: 0,
            history: vec![LineSearchSample {
                position,
                objective,
            }],
        }
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn step_size(&self) -> f64 {
        self.resolution * self.step_units as f64
    }

    pub fn direction(&self) -> SearchDirection {
        self.direction
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn history(&self) -> &[LineSearchSample] {
        &self.history
    }

    pub fn next_position(&self) -> f64 {
        self.position + self.direction.sign() * self.step_size()
    }

    /// Accepts the reading taken after a step. The new point always becomes
    /// the current one.
    pub fn record(&mut self, position: f64, objective: f64) -> StepDecision {
        self.history.push(LineSearchSample {
            position,
            objective,
        });
        self.steps += 1;

        let decision = if objective < self.objective {
            self.direction = self.direction.reversed();
            if self.direction == self.initial_direction {
                self.step_units = halve_units(self.step_units);
                StepDecision::ReverseAndHalve
            } else {
                StepDecision::Reverse
            }
        } else {
            StepDecision::Continue
        };

        self.objective = objective;
        self.position = position;
        decision
    }
}

const fn halve_units(units: u64) -> u64 {
    let half = units / 2;
    if units % 2 == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSearchReport {
    pub axis: Axis,
    pub steps: usize,
    pub initial_objective: f64,
    /// Objective of the last recorded sample.
    pub optimum: f64,
    pub final_position: f64,
    pub final_step: f64,
    /// Measured direction after the search; `None` when the field magnitude
    /// was too small for the angles to mean anything.
    pub final_direction: Option<SphericalField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<LineSearchSample>>,
}

impl LineSearchReport {
    pub fn best_sample(&self) -> Option<LineSearchSample> {
        self.history.as_ref().and_then(|history| {
            history
                .iter()
                .copied()
                .max_by(|lhs, rhs| lhs.objective.total_cmp(&rhs.objective))
        })
    }
}

/// Maximises `objective` by wiggling `axis` with decreasing steps.
///
/// Fails with a safety-limit violation before touching the field if a step
/// would leave `[-max_amplitude, max_amplitude]`.
pub fn optimize_axis<F, O>(
    source: &mut F,
    objective: &mut O,
    scheduler: &RampScheduler,
    axis: Axis,
    settings: &LineSearchSettings,
) -> AlignResult<LineSearchReport>
where
    F: FieldSource + ?Sized,
    O: Objective + ?Sized,
{
    settings.validate()?;
    let settle = settings.settle_duration()?;

    let initial_objective = objective.measure()?;
    let initial_position = AxisHandle::new(source, axis).measured()?;
    let mut state = OptimizationState::start(initial_objective, initial_position, settings);

    while state.step_size() >= settings.final_step {
        let next = state.next_position();
        if next.abs() > settings.max_amplitude {
            return Err(AlignError::safety_limit(
                "SAFETY.AXIS_AMPLITUDE",
                format!(
                    "{} axis step to {:.6} T exceeds amplitude limit {:.6} T",
                    axis, next, settings.max_amplitude
                ),
            ));
        }

        debug!(
            axis = %axis,
            objective = state.objective(),
            from = state.position(),
            to = next,
            "line search step"
        );
        AxisHandle::new(source, axis).set_target(next)?;
        scheduler.ramp(source)?;
        if !settle.is_zero() {
            thread::sleep(settle);
        }

        let position = AxisHandle::new(source, axis).measured()?;
        let reading = objective.measure()?;
        match state.record(position, reading) {
            StepDecision::Continue => {}
            StepDecision::Reverse => debug!(axis = %axis, "turning around"),
            StepDecision::ReverseAndHalve => debug!(
                axis = %axis,
                step = state.step_size(),
                "turning around, halving step size"
            ),
        }
    }

    let measured = source.measured_field()?;
    let spherical = spherical_from_measured(measured);
    let final_direction = (spherical.r > settings.minimum_field_for_angles).then_some(spherical);

    info!(
        axis = %axis,
        steps = state.steps(),
        initial_objective,
        optimum = state.objective(),
        final_position = state.position(),
        "optimization finished"
    );

    Ok(LineSearchReport {
        axis,
        steps: state.steps(),
        initial_objective,
        optimum: state.objective(),
        final_position: state.position(),
        final_step: state.step_size(),
        final_direction,
        history: settings.record_history.then(|| state.history().to_vec()),
    })
}
