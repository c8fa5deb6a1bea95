//! Field-magnitude sweep with optional re-alignment.
//!
//! The believed-optimal `(theta, phi)` is held for the duration of one sweep
//! and refined whenever the selected policy triggers a line search.

use crate::coordinates::to_cartesian;
use crate::domain::{AlignError, AlignResult, Axis, FieldVector, HARDWARE_FIELD_CEILING};
use crate::numerics::{any_close_abs, duration_from_seconds};
use crate::objective::Objective;
use crate::optimizer::{LineSearchSettings, optimize_axis};
use crate::ramp::RampScheduler;
use crate::source::FieldSource;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Magnitudes within this distance (tesla) of a listed field trigger
/// `optimize_at_fields`.
pub const OPTIMIZE_AT_TOLERANCE: f64 = 5.0e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeStrategy {
    #[default]
    None,
    Always,
    ObjectiveDecrease,
    OptimizeAtFields,
}

impl OptimizeStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Always => "always",
            Self::ObjectiveDecrease => "objective_decrease",
            Self::OptimizeAtFields => "optimize_at_fields",
        }
    }
}

impl Display for OptimizeStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for OptimizeStrategy {
    type Err = AlignError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim() {
            "none" => Ok(Self::None),
            "always" => Ok(Self::Always),
            "objective_decrease" => Ok(Self::ObjectiveDecrease),
            "optimize_at_fields" => Ok(Self::OptimizeAtFields),
            other => Err(AlignError::configuration(
                "CONFIG.UNKNOWN_STRATEGY",
                format!(
                    "unknown optimize strategy '{}'; expected none, always, objective_decrease or optimize_at_fields",
                    other
                ),
            )),
        }
    }
}

/// A strategy together with the parameters it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ReoptimizationPolicy {
    Never,
    Always,
    ObjectiveDecrease { threshold: f64 },
    AtFields { fields: Vec<f64> },
}

impl ReoptimizationPolicy {
    pub fn resolve(
        strategy: OptimizeStrategy,
        reoptimization_threshold: Option<f64>,
        optimize_at: Option<&[f64]>,
    ) -> AlignResult<Self> {
        match strategy {
            OptimizeStrategy::None => Ok(Self::Never),
            OptimizeStrategy::Always => Ok(Self::Always),
            OptimizeStrategy::ObjectiveDecrease => {
                let threshold = reoptimization_threshold.ok_or_else(|| {
                    AlignError::configuration(
                        "CONFIG.MISSING_THRESHOLD",
                        "objective_decrease requires a reoptimization threshold",
                    )
                })?;
                Ok(Self::ObjectiveDecrease { threshold })
            }
            OptimizeStrategy::OptimizeAtFields => {
                let fields = optimize_at.ok_or_else(|| {
                    AlignError::configuration(
                        "CONFIG.MISSING_OPTIMIZE_AT",
                        "optimize_at_fields requires the fields at which to optimize",
                    )
                })?;
                Ok(Self::AtFields {
                    fields: fields.to_vec(),
                })
            }
        }
    }

    /// `last_optimized` is the objective after the most recent line search,
    /// `reading` the objective right after ramping to `magnitude`.
    pub fn should_reoptimize(&self, magnitude: f64, last_optimized: f64, reading: f64) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::ObjectiveDecrease { threshold } => last_optimized - reading >= *threshold,
            Self::AtFields { fields } => any_close_abs(magnitude, fields, OPTIMIZE_AT_TOLERANCE),
        }
    }
}

fn default_settle_time() -> f64 {
    3.0
}

fn default_max_field_strength() -> f64 {
    HARDWARE_FIELD_CEILING
}

fn default_return_history() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepRequest {
    /// Tesla, visited in order.
    pub magnitudes: Vec<f64>,
    /// Degrees.
    pub initial_theta: f64,
    /// Degrees.
    pub initial_phi: f64,
    pub axis: Axis,
    #[serde(default)]
    pub optimize_first: bool,
    #[serde(default)]
    pub optimize_strategy: OptimizeStrategy,
    #[serde(default)]
    pub optimize_at: Option<Vec<f64>>,
    #[serde(default)]
    pub reoptimization_threshold: Option<f64>,
    /// Seconds after each ramp; also used by every line search of the sweep.
    #[serde(default = "default_settle_time")]
    pub settle_time: f64,
    #[serde(default = "default_max_field_strength")]
    pub max_field_strength: f64,
    #[serde(default = "default_return_history")]
    pub return_history: bool,
    #[serde(default)]
    pub line_search: LineSearchSettings,
}

impl SweepRequest {
    pub fn new(magnitudes: Vec<f64>, initial_theta: f64, initial_phi: f64, axis: Axis) -> Self {
        Self {
            magnitudes,
            initial_theta,
            initial_phi,
            axis,
            optimize_first: false,
            optimize_strategy: OptimizeStrategy::None,
            optimize_at: None,
            reoptimization_threshold: None,
            settle_time: default_settle_time(),
            max_field_strength: default_max_field_strength(),
            return_history: default_return_history(),
            line_search: LineSearchSettings::default(),
        }
    }

    pub fn policy(&self) -> AlignResult<ReoptimizationPolicy> {
        ReoptimizationPolicy::resolve(
            self.optimize_strategy,
            self.reoptimization_threshold,
            self.optimize_at.as_deref(),
        )
    }

    fn validate(&self) -> AlignResult<()> {
        self.settle_duration()?;
        if !(self.max_field_strength.is_finite() && self.max_field_strength > 0.0) {
            return Err(AlignError::configuration(
                "CONFIG.FIELD_CEILING",
                format!(
                    "max field strength must be positive, got {}",
                    self.max_field_strength
                ),
            ));
        }
        if let Some(magnitude) = self.magnitudes.iter().find(|value| !value.is_finite()) {
            return Err(AlignError::configuration(
                "CONFIG.MAGNITUDE",
                format!("sweep magnitude must be finite, got {}", magnitude),
            ));
        }
        Ok(())
    }

    fn settle_duration(&self) -> AlignResult<Duration> {
        duration_from_seconds(self.settle_time).ok_or_else(|| {
            AlignError::configuration(
                "CONFIG.SETTLE_TIME",
                format!(
                    "settle time must be a non-negative number of seconds, got {}",
                    self.settle_time
                ),
            )
        })
    }

    fn line_search_settings(&self) -> LineSearchSettings {
        LineSearchSettings {
            settle_time: self.settle_time,
            ..self.line_search
        }
    }
}

/// Emits the operator warning when a requested ceiling exceeds the hardware limit.
pub fn warn_if_above_hardware_ceiling(max_field_strength: f64) -> bool {
    let above = max_field_strength > HARDWARE_FIELD_CEILING;
    if above {
        warn!(
            max_field_strength,
            hardware_ceiling = HARDWARE_FIELD_CEILING,
            "mu-metal shields saturate above the hardware ceiling and do not recover; proceeding at the operator's request"
        );
    }
    above
}

pub fn check_field_ceiling(target: FieldVector, max_field_strength: f64) -> AlignResult<()> {
    let magnitude = target.norm();
    if magnitude > max_field_strength {
        return Err(AlignError::safety_limit(
            "SAFETY.FIELD_CEILING",
            format!(
                "target field {:.6} T exceeds max field strength {:.6} T",
                magnitude, max_field_strength
            ),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepHistory {
    pub magnitudes: Vec<f64>,
    pub objectives: Vec<f64>,
    /// `[theta, phi]` in degrees, one entry per objective.
    pub optima: Vec<[f64; 2]>,
}

/// Per-sweep state: the believed-optimal angles and the objective history.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepState {
    pub theta: f64,
    pub phi: f64,
    pub current_objective: f64,
    pub last_optimized: f64,
    pub optimizations: usize,
    history: SweepHistory,
}

impl SweepState {
    pub fn new(magnitudes: &[f64], theta: f64, phi: f64, objective: f64) -> Self {
        Self {
            theta,
            phi,
            current_objective: objective,
            last_optimized: objective,
            optimizations: 0,
            history: SweepHistory {
                magnitudes: magnitudes.to_vec(),
                ..SweepHistory::default()
            },
        }
    }

    pub fn record(&mut self) {
        self.history.objectives.push(self.current_objective);
        self.history.optima.push([self.theta, self.phi]);
    }

    pub fn history(&self) -> &SweepHistory {
        &self.history
    }

    fn into_report(self, return_history: bool) -> SweepReport {
        SweepReport {
            final_objective: self
                .history
                .objectives
                .last()
                .copied()
                .unwrap_or(self.current_objective),
            final_theta: self.theta,
            final_phi: self.phi,
            optimizations: self.optimizations,
            history: return_history.then_some(self.history),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub final_objective: f64,
    pub final_theta: f64,
    pub final_phi: f64,
    pub optimizations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<SweepHistory>,
}

/// Ramps through `request.magnitudes` at the held angles, re-aligning along
/// `request.axis` whenever the policy asks for it.
///
/// Configuration and ceiling checks happen before any hardware action. A
/// fatal error discards the history gathered so far.
pub fn optimize_and_ramp_r<F, O>(
    source: &mut F,
    objective: &mut O,
    scheduler: &RampScheduler,
    request: &SweepRequest,
) -> AlignResult<SweepReport>
where
    F: FieldSource + ?Sized,
    O: Objective + ?Sized,
{
    warn_if_above_hardware_ceiling(request.max_field_strength);
    let policy = request.policy()?;
    request.validate()?;
    let line_search = request.line_search_settings();
    line_search.validate()?;
    for magnitude in &request.magnitudes {
        check_field_ceiling(
            to_cartesian(*magnitude, request.initial_theta, request.initial_phi),
            request.max_field_strength,
        )?;
    }

    let settle = request.settle_duration()?;
    let mut state = SweepState::new(
        &request.magnitudes,
        request.initial_theta,
        request.initial_phi,
        objective.measure()?,
    );

    for (index, magnitude) in request.magnitudes.iter().copied().enumerate() {
        state.record();

        let target = to_cartesian(magnitude, state.theta, state.phi);
        check_field_ceiling(target, request.max_field_strength)?;

        let current = source.measured_field()?;
        info!(
            magnitude,
            theta = state.theta,
            phi = state.phi,
            from = ?current.as_array(),
            to = ?target.as_array(),
            "sweeping field"
        );
        source.set_target_field(target)?;
        scheduler.ramp(source)?;
        if !settle.is_zero() {
            thread::sleep(settle);
        }
        let reading = objective.measure()?;

        let first_pass = request.optimize_first && index == 0;
        if first_pass || policy.should_reoptimize(magnitude, state.last_optimized, reading) {
            debug!(
                magnitude,
                reading,
                last_optimized = state.last_optimized,
                first_pass,
                strategy = %request.optimize_strategy,
                "re-optimizing"
            );
            let report = optimize_axis(source, objective, scheduler, request.axis, &line_search)?;
            state.current_objective = report.optimum;
            state.last_optimized = report.optimum;
            state.optimizations += 1;
            if let Some(direction) = report.final_direction {
                state.theta = direction.theta;
                state.phi = direction.phi;
            }
        } else {
            debug!(magnitude, reading, "keeping alignment");
            state.current_objective = reading;
        }

        state.record();
    }

    Ok(state.into_report(request.return_history))
}
