//! Field source facade.
//!
//! The instrument layer is reached only through [`CurrentSource`] and
//! [`VectorMagnetController`]. Both are normalised behind [`FieldSource`],
//! which is what the ramp scheduler and the optimizer address.

mod current;
mod magnet;

pub use current::{CurrentFieldAdapter, CurrentRampPoints, CurrentRampSettings, current_ramp_points};
pub use magnet::{CompositeMagnet, NativeMagnet};

use crate::domain::{AlignResult, Axis, FieldVector, RampStatus};

/// Current-controlled supply driving one coil.
pub trait CurrentSource {
    fn output_enabled(&mut self) -> AlignResult<bool>;
    fn set_output(&mut self, enabled: bool) -> AlignResult<()>;
    fn select_current_mode(&mut self) -> AlignResult<()>;
    /// Present output current in amperes.
    fn current(&mut self) -> AlignResult<f64>;
    fn set_current(&mut self, amperes: f64) -> AlignResult<()>;
}

/// Magnet controller that reports and accepts field directly per axis.
pub trait VectorMagnetController {
    fn field(&mut self, axis: Axis) -> AlignResult<f64>;
    fn field_target(&mut self, axis: Axis) -> AlignResult<f64>;
    fn set_field_target(&mut self, axis: Axis, tesla: f64) -> AlignResult<()>;
    /// Starts the ramp and returns; completion is observed via `ramp_status`.
    fn ramp_to_target(&mut self, axis: Axis) -> AlignResult<()>;
    fn ramp_status(&mut self, axis: Axis) -> AlignResult<RampStatus>;
}

/// Uniform per-axis capability set of a vector field source.
pub trait FieldSource {
    fn measured(&mut self, axis: Axis) -> AlignResult<f64>;
    fn target(&mut self, axis: Axis) -> AlignResult<f64>;
    fn set_target(&mut self, axis: Axis, tesla: f64) -> AlignResult<()>;
    /// Begins ramping one axis toward its target. Self-blocking sources return
    /// once the ramp is done and report [`RampStatus::Holding`] afterwards.
    fn start_ramp(&mut self, axis: Axis) -> AlignResult<()>;
    fn ramp_status(&mut self, axis: Axis) -> AlignResult<RampStatus>;

    fn measured_field(&mut self) -> AlignResult<FieldVector> {
        Ok(FieldVector::new(
            self.measured(Axis::X)?,
            self.measured(Axis::Y)?,
            self.measured(Axis::Z)?,
        ))
    }

    fn target_field(&mut self) -> AlignResult<FieldVector> {
        Ok(FieldVector::new(
            self.target(Axis::X)?,
            self.target(Axis::Y)?,
            self.target(Axis::Z)?,
        ))
    }

    fn set_target_field(&mut self, field: FieldVector) -> AlignResult<()> {
        for axis in Axis::ALL {
            self.set_target(axis, field.component(axis))?;
        }
        Ok(())
    }

    /// Re-reads every axis so later callers see the post-ramp state.
    fn refresh(&mut self) -> AlignResult<FieldVector> {
        self.measured_field()
    }
}

impl<F> FieldSource for &mut F
where
    F: FieldSource + ?Sized,
{
    fn measured(&mut self, axis: Axis) -> AlignResult<f64> {
        (**self).measured(axis)
    }

    fn target(&mut self, axis: Axis) -> AlignResult<f64> {
        (**self).target(axis)
    }

    fn set_target(&mut self, axis: Axis, tesla: f64) -> AlignResult<()> {
        (**self).set_target(axis, tesla)
    }

    fn start_ramp(&mut self, axis: Axis) -> AlignResult<()> {
        (**self).start_ramp(axis)
    }

    fn ramp_status(&mut self, axis: Axis) -> AlignResult<RampStatus> {
        (**self).ramp_status(axis)
    }

    fn refresh(&mut self) -> AlignResult<FieldVector> {
        (**self).refresh()
    }
}

/// Borrowed view of one axis of a [`FieldSource`].
pub struct AxisHandle<'a, F: FieldSource + ?Sized> {
    source: &'a mut F,
    axis: Axis,
}

impl<'a, F: FieldSource + ?Sized> AxisHandle<'a, F> {
    pub fn new(source: &'a mut F, axis: Axis) -> Self {
        Self { source, axis }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn measured(&mut self) -> AlignResult<f64> {
        self.source.measured(self.axis)
    }

    pub fn target(&mut self) -> AlignResult<f64> {
        self.source.target(self.axis)
    }

    pub fn set_target(&mut self, tesla: f64) -> AlignResult<()> {
        self.source.set_target(self.axis, tesla)
    }
}

#[cfg(test)]
mod tests {
    use super::{AxisHandle, FieldSource};
    use crate::domain::{AlignResult, Axis, FieldVector, RampStatus};

    #[derive(Debug, Default)]
    struct StaticSource {
        measured: FieldVector,
        target: FieldVector,
    }

    impl FieldSource for StaticSource {
        fn measured(&mut self, axis: Axis) -> AlignResult<f64> {
            Ok(self.measured.component(axis))
        }

        fn target(&mut self, axis: Axis) -> AlignResult<f64> {
            Ok(self.target.component(axis))
        }

        fn set_target(&mut self, axis: Axis, tesla: f64) -> AlignResult<()> {
            self.target = self.target.with_component(axis, tesla);
            Ok(())
        }

        fn start_ramp(&mut self, axis: Axis) -> AlignResult<()> {
            self.measured = self
                .measured
                .with_component(axis, self.target.component(axis));
            Ok(())
        }

        fn ramp_status(&mut self, _axis: Axis) -> AlignResult<RampStatus> {
            Ok(RampStatus::Holding)
        }
    }

    #[test]
    fn axis_handle_reads_and_writes_only_its_axis() {
        let mut source = StaticSource {
            measured: FieldVector::new(0.1, 0.2, 0.3),
            target: FieldVector::new(0.1, 0.2, 0.3),
        };

        let mut handle = AxisHandle::new(&mut source, Axis::Z);
        assert_eq!(handle.axis(), Axis::Z);
        assert_eq!(handle.measured().expect("measured should read"), 0.3);
        handle.set_target(-0.4).expect("target should be accepted");
        assert_eq!(handle.target().expect("target should read"), -0.4);

        assert_eq!(
            source.target_field().expect("targets should read"),
            FieldVector::new(0.1, 0.2, -0.4)
        );
        assert_eq!(
            source.measured_field().expect("field should read"),
            FieldVector::new(0.1, 0.2, 0.3)
        );
    }

    #[test]
    fn set_target_field_writes_every_axis() {
        let mut source = StaticSource::default();
        let mut borrowed = &mut source;
        FieldSource::set_target_field(&mut borrowed, FieldVector::ZERO)
            .expect("targets should be accepted through a borrow");
        borrowed
            .set_target_field(FieldVector::new(1.0, -2.0, 3.0))
            .expect("targets should be accepted");
        assert_eq!(source.target, FieldVector::new(1.0, -2.0, 3.0));
    }
}
