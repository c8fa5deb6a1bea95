//! Deterministic in-memory bench: a current supply, a vector magnet
//! controller and a resonator whose frequency depends on the applied field.
//!
//! All three instruments share one bench state, so moving a coil is
//! immediately visible to the resonator. The resonator frequency is
//!
//! ```text
//! f = f0 - kappa * (B . n + h * d)^2 - beta * |B|^2
//! ```
//!
//! where `n` is the sample-plane normal, `d` the sign of the last x-axis move
//! and `h` the hysteresis offset.

use crate::coordinates::to_cartesian;
use crate::domain::{AlignError, AlignResult, Axis, FieldVector, RampStatus};
use crate::numerics::duration_from_seconds;
use crate::objective::Objective;
use crate::ramp::RampScheduler;
use crate::source::{
    CompositeMagnet, CurrentFieldAdapter, CurrentRampSettings, CurrentSource, FieldSource,
    NativeMagnet, VectorMagnetController,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Which instruments drive which axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnetLayout {
    /// x from the current supply, y and z from the controller.
    #[default]
    Composite,
    /// All axes from the controller.
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResonatorModel {
    /// Hz at zero field.
    pub base_frequency: f64,
    /// Hz/T^2 for the out-of-plane component.
    pub out_of_plane_coupling: f64,
    /// Hz/T^2 for the total field.
    pub magnitude_coupling: f64,
    /// Tesla.
    pub hysteresis_offset: f64,
    /// Sample-plane normal, degrees.
    pub normal_theta: f64,
    pub normal_phi: f64,
}

impl Default for ResonatorModel {
    fn default() -> Self {
        Self {
            base_frequency: 6.0e9,
            out_of_plane_coupling: 5.0e12,
            magnitude_coupling: 1.0e7,
            hysteresis_offset: 20.0e-6,
            normal_theta: 88.0,
            normal_phi: 2.0,
        }
    }
}

impl ResonatorModel {
    pub fn normal(&self) -> FieldVector {
        to_cartesian(1.0, self.normal_theta, self.normal_phi)
    }

    pub fn frequency(&self, field: FieldVector, last_x_move: f64) -> f64 {
        let out_of_plane = field.dot(&self.normal()) + self.hysteresis_offset * last_x_move;
        let magnitude = field.norm();
        self.base_frequency
            - self.out_of_plane_coupling * out_of_plane * out_of_plane
            - self.magnitude_coupling * magnitude * magnitude
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BenchConfig {
    pub layout: MagnetLayout,
    /// A/T of the x-axis coil.
    pub coil_constant: f64,
    pub current_ramp: CurrentRampSettings,
    /// Status polls the controller reports as ramping after each ramp request.
    pub ramp_polls: usize,
    /// Seconds between status polls.
    pub poll_interval: f64,
    pub initial_field: FieldVector,
    pub resonator: ResonatorModel,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            layout: MagnetLayout::Composite,
            coil_constant: 10.0,
            current_ramp: CurrentRampSettings {
                step: 1.0e-4,
                delay: 0.0,
                resolution: None,
            },
            ramp_polls: 2,
            poll_interval: 0.0,
            initial_field: FieldVector::ZERO,
            resonator: ResonatorModel::default(),
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> AlignResult<()> {
        if !(self.coil_constant.is_finite() && self.coil_constant != 0.0) {
            return Err(AlignError::configuration(
                "CONFIG.COIL_CONSTANT",
                format!(
                    "coil constant must be finite and non-zero, got {}",
                    self.coil_constant
                ),
            ));
        }
        self.current_ramp.validate()?;
        self.scheduler()?;
        let field = self.initial_field.as_array();
        if field.iter().any(|component| !component.is_finite()) {
            return Err(AlignError::configuration(
                "CONFIG.INITIAL_FIELD",
                "initial field components must be finite",
            ));
        }
        Ok(())
    }

    pub fn scheduler(&self) -> AlignResult<RampScheduler> {
        let poll_interval = duration_from_seconds(self.poll_interval).ok_or_else(|| {
            AlignError::configuration(
                "CONFIG.POLL_INTERVAL",
                format!(
                    "poll interval must be a non-negative number of seconds, got {}",
                    self.poll_interval
                ),
            )
        })?;
        Ok(RampScheduler::with_poll_interval(poll_interval))
    }
}

#[derive(Debug)]
struct BenchState {
    layout: MagnetLayout,
    coil_constant: f64,
    ramp_polls: usize,
    output_enabled: bool,
    current_mode: bool,
    current: f64,
    controller_field: FieldVector,
    controller_target: FieldVector,
    pending_polls: [usize; 3],
    last_x_move: f64,
    ramp_log: Vec<Axis>,
    current_commands: usize,
}

impl BenchState {
    fn new(config: &BenchConfig) -> Self {
        let supply_x = config.layout == MagnetLayout::Composite && config.initial_field.x != 0.0;
        Self {
            layout: config.layout,
            coil_constant: config.coil_constant,
            ramp_polls: config.ramp_polls,
            output_enabled: supply_x,
            current_mode: supply_x,
            current: if supply_x {
                config.initial_field.x * config.coil_constant
            } else {
                0.0
            },
            controller_field: config.initial_field,
            controller_target: config.initial_field,
            pending_polls: [0; 3],
            last_x_move: 0.0,
            ramp_log: Vec::new(),
            current_commands: 0,
        }
    }

    fn supply_field(&self) -> f64 {
        if self.output_enabled {
            self.current / self.coil_constant
        } else {
            0.0
        }
    }

    fn field(&self) -> FieldVector {
        match self.layout {
            MagnetLayout::Composite => self
                .controller_field
                .with_component(Axis::X, self.supply_field()),
            MagnetLayout::Native => self.controller_field,
        }
    }

    fn note_x_move(&mut self, from: f64, to: f64) {
        if to > from {
            self.last_x_move = 1.0;
        } else if to < from {
            self.last_x_move = -1.0;
        }
    }
}

type SharedBench = Rc<RefCell<BenchState>>;

/// Current supply driving the x coil in the composite layout.
#[derive(Debug, Clone)]
pub struct SimulatedCurrentSource {
    state: SharedBench,
}

impl CurrentSource for SimulatedCurrentSource {
    fn output_enabled(&mut self) -> AlignResult<bool> {
        Ok(self.state.borrow().output_enabled)
    }

    fn set_output(&mut self, enabled: bool) -> AlignResult<()> {
        let mut state = self.state.borrow_mut();
        let before = state.supply_field();
        state.output_enabled = enabled;
        let after = state.supply_field();
        state.note_x_move(before, after);
        Ok(())
    }

    fn select_current_mode(&mut self) -> AlignResult<()> {
        let mut state = self.state.borrow_mut();
        if state.output_enabled {
            return Err(AlignError::hardware(
                "HW.SOURCE_MODE",
                "source mode can only be changed while the output is off",
            ));
        }
        state.current_mode = true;
        Ok(())
    }

    fn current(&mut self) -> AlignResult<f64> {
        Ok(self.state.borrow().current)
    }

    fn set_current(&mut self, amperes: f64) -> AlignResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.current_mode {
            return Err(AlignError::hardware(
                "HW.SOURCE_MODE",
                "current commanded while the source is not in current mode",
            ));
        }
        let before = state.supply_field();
        state.current = amperes;
        state.current_commands += 1;
        let after = state.supply_field();
        state.note_x_move(before, after);
        Ok(())
    }
}

/// Three-axis controller; jumps to the target at once but reports
/// `Ramping` for a configured number of polls.
#[derive(Debug, Clone)]
pub struct SimulatedController {
    state: SharedBench,
}

impl VectorMagnetController for SimulatedController {
    fn field(&mut self, axis: Axis) -> AlignResult<f64> {
        Ok(self.state.borrow().controller_field.component(axis))
    }

    fn field_target(&mut self, axis: Axis) -> AlignResult<f64> {
        Ok(self.state.borrow().controller_target.component(axis))
    }

    fn set_field_target(&mut self, axis: Axis, tesla: f64) -> AlignResult<()> {
        let mut state = self.state.borrow_mut();
        state.controller_target = state.controller_target.with_component(axis, tesla);
        Ok(())
    }

    fn ramp_to_target(&mut self, axis: Axis) -> AlignResult<()> {
        let mut state = self.state.borrow_mut();
        let before = state.controller_field.component(axis);
        let after = state.controller_target.component(axis);
        if axis == Axis::X && state.layout == MagnetLayout::Native {
            state.note_x_move(before, after);
        }
        state.controller_field = state.controller_field.with_component(axis, after);
        state.pending_polls[axis.index()] = state.ramp_polls;
        state.ramp_log.push(axis);
        trace!(axis = %axis, tesla = after, "simulated controller ramp");
        Ok(())
    }

    fn ramp_status(&mut self, axis: Axis) -> AlignResult<RampStatus> {
        let mut state = self.state.borrow_mut();
        let pending = &mut state.pending_polls[axis.index()];
        if *pending == 0 {
            return Ok(RampStatus::Holding);
        }
        *pending -= 1;
        Ok(RampStatus::Ramping)
    }
}

/// Reads the resonance frequency implied by the present bench field.
#[derive(Debug, Clone)]
pub struct SimulatedResonator {
    state: SharedBench,
    model: ResonatorModel,
    readings: usize,
}

impl SimulatedResonator {
    pub fn readings(&self) -> usize {
        self.readings
    }

    pub fn model(&self) -> &ResonatorModel {
        &self.model
    }
}

impl Objective for SimulatedResonator {
    fn measure(&mut self) -> AlignResult<f64> {
        let (field, last_x_move) = {
            let state = self.state.borrow();
            (state.field(), state.last_x_move)
        };
        self.readings += 1;
        Ok(self.model.frequency(field, last_x_move))
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedBench {
    config: BenchConfig,
    scheduler: RampScheduler,
    state: SharedBench,
}

impl SimulatedBench {
    pub fn new(config: BenchConfig) -> AlignResult<Self> {
        config.validate()?;
        let scheduler = config.scheduler()?;
        let state = Rc::new(RefCell::new(BenchState::new(&config)));
        Ok(Self {
            config,
            scheduler,
            state,
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn current_source(&self) -> SimulatedCurrentSource {
        SimulatedCurrentSource {
            state: Rc::clone(&self.state),
        }
    }

    pub fn controller(&self) -> SimulatedController {
        SimulatedController {
            state: Rc::clone(&self.state),
        }
    }

    pub fn resonator(&self) -> SimulatedResonator {
        SimulatedResonator {
            state: Rc::clone(&self.state),
            model: self.config.resonator,
            readings: 0,
        }
    }

    pub fn composite_magnet(
        &self,
    ) -> AlignResult<CompositeMagnet<SimulatedController, SimulatedCurrentSource>> {
        let adapter = CurrentFieldAdapter::new(
            self.current_source(),
            self.config.coil_constant,
            self.config.current_ramp,
        )?;
        Ok(CompositeMagnet::new(self.controller(), adapter))
    }

    pub fn native_magnet(&self) -> NativeMagnet<SimulatedController> {
        NativeMagnet::new(self.controller())
    }

    /// Field source matching the configured layout.
    pub fn magnet(&self) -> AlignResult<Box<dyn FieldSource>> {
        Ok(match self.config.layout {
            MagnetLayout::Composite => Box::new(self.composite_magnet()?),
            MagnetLayout::Native => Box::new(self.native_magnet()),
        })
    }

    pub fn scheduler(&self) -> RampScheduler {
        self.scheduler
    }

    pub fn field(&self) -> FieldVector {
        self.state.borrow().field()
    }

    /// Controller ramp requests in order; supply ramps are not listed.
    pub fn ramp_log(&self) -> Vec<Axis> {
        self.state.borrow().ramp_log.clone()
    }

    pub fn current_commands(&self) -> usize {
        self.state.borrow().current_commands
    }
}

#[cfg(test)]
mod tests {
    use super::{BenchConfig, MagnetLayout, ResonatorModel, SimulatedBench};
    use crate::domain::{AlignErrorCategory, Axis, FieldVector};
    use crate::objective::Objective;
    use crate::source::{CurrentRampSettings, CurrentSource, FieldSource};
    use std::time::Duration;

    fn bench(layout: MagnetLayout) -> SimulatedBench {
        SimulatedBench::new(BenchConfig {
            layout,
            ..BenchConfig::default()
        })
        .expect("default bench should be valid")
    }

    #[test]
    fn composite_magnet_drives_x_through_the_supply() {
        let bench = bench(MagnetLayout::Composite);
        let mut magnet = bench.composite_magnet().expect("magnet should build");
        let scheduler = bench.scheduler();

        magnet
            .set_target_field(FieldVector::new(1.0e-3, 0.02, -0.01))
            .expect("targets should be accepted");
        let outcome = scheduler.ramp(&mut magnet).expect("ramp should complete");

        let field = bench.field();
        assert!((field.x - 1.0e-3).abs() < 1.0e-12);
        assert_eq!(field.y, 0.02);
        assert_eq!(field.z, -0.01);
        assert_eq!(outcome.polls, 4);
        assert_eq!(bench.ramp_log(), vec![Axis::Z, Axis::Y]);
        assert_eq!(bench.current_commands(), 100);
    }

    #[test]
    fn native_magnet_drives_every_axis_through_the_controller() {
        let bench = bench(MagnetLayout::Native);
        let mut magnet = bench.magnet().expect("magnet should build");
        let scheduler = bench.scheduler();

        magnet
            .set_target_field(FieldVector::new(0.3, 0.1, 0.2))
            .expect("targets should be accepted");
        scheduler.ramp(magnet.as_mut()).expect("ramp should complete");

        assert_eq!(bench.field(), FieldVector::new(0.3, 0.1, 0.2));
        assert_eq!(bench.ramp_log(), vec![Axis::Y, Axis::Z, Axis::X]);
        assert_eq!(bench.current_commands(), 0);
    }

    #[test]
    fn supply_rejects_mode_change_with_output_on() {
        let bench = bench(MagnetLayout::Composite);
        let mut supply = bench.current_source();
        supply.select_current_mode().expect("mode change with output off");
        supply.set_output(true).expect("output should enable");

        let error = supply
            .select_current_mode()
            .expect_err("mode change with output on should fail");
        assert_eq!(error.code(), "HW.SOURCE_MODE");
    }

    #[test]
    fn initial_supply_field_is_restored() {
        let bench = SimulatedBench::new(BenchConfig {
            initial_field: FieldVector::new(2.0e-3, 0.0, 0.1),
            ..BenchConfig::default()
        })
        .expect("bench should be valid");

        let mut magnet = bench.composite_magnet().expect("magnet should build");
        assert!((magnet.target(Axis::X).expect("target") - 2.0e-3).abs() < 1.0e-15);
        assert_eq!(bench.field().z, 0.1);
    }

    #[test]
    fn resonator_peaks_when_field_lies_in_plane() {
        let model = ResonatorModel {
            hysteresis_offset: 0.0,
            ..ResonatorModel::default()
        };
        let normal = model.normal();
        let in_plane = FieldVector::new(-normal.y, normal.x, 0.0);

        let aligned = model.frequency(FieldVector::new(in_plane.x * 0.1, in_plane.y * 0.1, 0.0), 0.0);
        let tilted = model.frequency(
            FieldVector::new(in_plane.x * 0.1 + 1.0e-4, in_plane.y * 0.1, 0.0),
            0.0,
        );
        assert!(aligned > tilted);
        assert_eq!(model.frequency(FieldVector::ZERO, 0.0), model.base_frequency);
    }

    #[test]
    fn resonator_sees_the_last_x_direction() {
        let bench = bench(MagnetLayout::Composite);
        let mut magnet = bench.composite_magnet().expect("magnet should build");
        let scheduler = bench.scheduler();
        let mut resonator = bench.resonator();

        magnet.set_target(Axis::X, 1.0e-4).expect("target");
        scheduler.ramp_axis(&mut magnet, Axis::X).expect("ramp up");
        let rising = resonator.measure().expect("reading");

        magnet.set_target(Axis::X, 3.0e-4).expect("target");
        scheduler.ramp_axis(&mut magnet, Axis::X).expect("ramp up");
        magnet.set_target(Axis::X, 1.0e-4).expect("target");
        scheduler.ramp_axis(&mut magnet, Axis::X).expect("ramp down");
        let falling = resonator.measure().expect("reading");

        assert_ne!(rising, falling);
        assert_eq!(resonator.readings(), 2);
    }

    #[test]
    fn invalid_bench_configuration_is_rejected() {
        let error = SimulatedBench::new(BenchConfig {
            coil_constant: 0.0,
            ..BenchConfig::default()
        })
        .expect_err("zero coil constant should fail");
        assert_eq!(error.code(), "CONFIG.COIL_CONSTANT");

        let error = SimulatedBench::new(BenchConfig {
            poll_interval: -1.0,
            ..BenchConfig::default()
        })
        .expect_err("negative poll interval should fail");
        assert_eq!(error.code(), "CONFIG.POLL_INTERVAL");
    }

    #[test]
    fn poll_interval_beyond_duration_range_is_rejected() {
        let config = BenchConfig {
            poll_interval: 1.0e30,
            ..BenchConfig::default()
        };
        assert_eq!(
            config.scheduler().expect_err("1e30 s should not convert").code(),
            "CONFIG.POLL_INTERVAL"
        );

        let error = SimulatedBench::new(config).expect_err("oversized poll interval should fail");
        assert_eq!(error.category(), AlignErrorCategory::ConfigurationError);
        assert_eq!(error.code(), "CONFIG.POLL_INTERVAL");

        let bench = SimulatedBench::new(BenchConfig {
            poll_interval: 0.25,
            ..BenchConfig::default()
        })
        .expect("quarter-second poll interval should be accepted");
        assert_eq!(bench.scheduler().poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn oversized_current_ramp_delay_is_rejected() {
        let error = SimulatedBench::new(BenchConfig {
            current_ramp: CurrentRampSettings {
                delay: 1.0e30,
                ..BenchConfig::default().current_ramp
            },
            ..BenchConfig::default()
        })
        .expect_err("oversized supply delay should fail");
        assert_eq!(error.code(), "CONFIG.CURRENT_DELAY");
    }
}
