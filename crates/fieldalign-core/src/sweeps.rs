//! Measurement and set-point helpers handed to an external sweep framework.

use crate::coordinates::{spherical_from_measured, to_cartesian};
use crate::domain::{AlignError, AlignResult, Axis, FieldVector, HARDWARE_FIELD_CEILING, SphericalField};
use crate::ramp::RampScheduler;
use crate::source::FieldSource;
use crate::sweep::warn_if_above_hardware_ceiling;
use tracing::debug;

/// Measured Cartesian components, tesla.
pub fn measure_components<F: FieldSource + ?Sized>(source: &mut F) -> AlignResult<FieldVector> {
    source.measured_field()
}

/// Measured field in the spherical convention, with the Cartesian epsilon applied.
pub fn measure_components_spherical<F: FieldSource + ?Sized>(
    source: &mut F,
) -> AlignResult<SphericalField> {
    Ok(spherical_from_measured(source.measured_field()?))
}

/// What a generator moves; the remaining coordinates are held fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepKind {
    Axis(Axis),
    Magnitude { theta: f64, phi: f64 },
    Inclination { r: f64, phi: f64 },
    Azimuth { r: f64, theta: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepGenerator {
    kind: SweepKind,
    points: Vec<f64>,
    max_field_strength: f64,
    use_conventions: bool,
}

impl SweepGenerator {
    fn build(kind: SweepKind, points: Vec<f64>, max_field_strength: f64) -> Self {
        warn_if_above_hardware_ceiling(max_field_strength);
        Self {
            kind,
            points,
            max_field_strength,
            use_conventions: true,
        }
    }

    pub fn x(points: Vec<f64>, max_field_strength: f64) -> Self {
        Self::build(SweepKind::Axis(Axis::X), points, max_field_strength)
    }

    pub fn y(points: Vec<f64>, max_field_strength: f64) -> Self {
        Self::build(SweepKind::Axis(Axis::Y), points, max_field_strength)
    }

    pub fn z(points: Vec<f64>, max_field_strength: f64) -> Self {
        Self::build(SweepKind::Axis(Axis::Z), points, max_field_strength)
    }

    /// Sweeps the magnitude at fixed angles (degrees).
    pub fn r(theta: f64, phi: f64, points: Vec<f64>, max_field_strength: f64) -> Self {
        Self::build(SweepKind::Magnitude { theta, phi }, points, max_field_strength)
    }

    pub fn theta(r: f64, phi: f64, points: Vec<f64>, max_field_strength: f64) -> Self {
        Self::build(SweepKind::Inclination { r, phi }, points, max_field_strength)
    }

    pub fn phi(r: f64, theta: f64, points: Vec<f64>, max_field_strength: f64) -> Self {
        Self::build(SweepKind::Azimuth { r, theta }, points, max_field_strength)
    }

    /// Skips the spherical convention checks; useful when sweeping through
    /// zero magnitude or across the azimuth wrap. The ceiling still applies.
    pub fn without_conventions(mut self) -> Self {
        self.use_conventions = false;
        self
    }

    pub fn kind(&self) -> SweepKind {
        self.kind
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn max_field_strength(&self) -> f64 {
        self.max_field_strength
    }

    pub fn uses_conventions(&self) -> bool {
        self.use_conventions
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            SweepKind::Axis(Axis::X) => "x_field",
            SweepKind::Axis(Axis::Y) => "y_field",
            SweepKind::Axis(Axis::Z) => "z_field",
            SweepKind::Magnitude { .. } => "r",
            SweepKind::Inclination { .. } => "theta",
            SweepKind::Azimuth { .. } => "phi",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self.kind {
            SweepKind::Axis(_) | SweepKind::Magnitude { .. } => "T",
            SweepKind::Inclination { .. } | SweepKind::Azimuth { .. } => "degrees",
        }
    }

    /// Spherical coordinates of `value` for the angular and magnitude sweeps.
    fn spherical_point(&self, value: f64) -> Option<SphericalField> {
        match self.kind {
            SweepKind::Axis(_) => None,
            SweepKind::Magnitude { theta, phi } => Some(SphericalField::new(value, theta, phi)),
            SweepKind::Inclination { r, phi } => Some(SphericalField::new(r, value, phi)),
            SweepKind::Azimuth { r, theta } => Some(SphericalField::new(r, theta, value)),
        }
    }

    pub fn validate(&self, value: f64) -> AlignResult<()> {
        let magnitude = match self.spherical_point(value) {
            Some(point) => {
                if self.use_conventions {
                    check_conventions(point, self.max_field_strength)?;
                }
                point.r
            }
            None => value,
        };

        if !(self.max_field_strength > magnitude.abs()) {
            return Err(AlignError::configuration(
                "CONFIG.SWEEP_MAGNITUDE",
                format!(
                    "{} set-point {} T must stay below max field strength {} T",
                    self.label(),
                    magnitude,
                    self.max_field_strength
                ),
            ));
        }
        Ok(())
    }

    /// Validates `value`, writes the targets it implies and ramps safely.
    pub fn set_point<F: FieldSource + ?Sized>(
        &self,
        source: &mut F,
        scheduler: &RampScheduler,
        value: f64,
    ) -> AlignResult<FieldVector> {
        self.validate(value)?;
        match self.spherical_point(value) {
            Some(point) => {
                source.set_target_field(to_cartesian(point.r, point.theta, point.phi))?;
            }
            None => {
                if let SweepKind::Axis(axis) = self.kind {
                    source.set_target(axis, value)?;
                }
            }
        }
        debug!(label = self.label(), value, "sweep set-point");
        scheduler.ramp(source)?;
        source.measured_field()
    }

    /// Visits every point in order, calling `on_point` after each ramp.
    /// Stops at the first invalid point or hardware failure.
    pub fn run<F, C>(
        &self,
        source: &mut F,
        scheduler: &RampScheduler,
        mut on_point: C,
    ) -> AlignResult<usize>
    where
        F: FieldSource + ?Sized,
        C: FnMut(f64, &mut F) -> AlignResult<()>,
    {
        for value in self.points.iter().copied() {
            self.set_point(source, scheduler, value)?;
            on_point(value, source)?;
        }
        Ok(self.points.len())
    }
}

fn check_conventions(point: SphericalField, max_field_strength: f64) -> AlignResult<()> {
    if !(max_field_strength > point.r && point.r >= 0.0) {
        return Err(AlignError::configuration(
            "CONFIG.SWEEP_MAGNITUDE",
            format!(
                "field amplitude {} T must be non-negative and below {} T",
                point.r, max_field_strength
            ),
        ));
    }
    if !(0.0..=180.0).contains(&point.theta) {
        return Err(AlignError::configuration(
            "CONFIG.SWEEP_INCLINATION",
            format!("inclination {} must lie within [0, 180] degrees", point.theta),
        ));
    }
    if !(0.0..=360.0).contains(&point.phi) {
        return Err(AlignError::configuration(
            "CONFIG.SWEEP_AZIMUTH",
            format!("azimuth {} must lie within [0, 360] degrees", point.phi),
        ));
    }
    Ok(())
}

/// Default ceiling for sweep generators.
pub const DEFAULT_SWEEP_CEILING: f64 = HARDWARE_FIELD_CEILING;
