use super::{CurrentFieldAdapter, CurrentSource, FieldSource, VectorMagnetController};
use crate::domain::{AlignResult, Axis, FieldVector, RampStatus};

/// All three axes served by one native vector-magnet controller.
#[derive(Debug)]
pub struct NativeMagnet<C> {
    controller: C,
    snapshot: Option<FieldVector>,
}

impl<C: VectorMagnetController> NativeMagnet<C> {
    pub fn new(controller: C) -> Self {
        Self {
            controller,
            snapshot: None,
        }
    }

    /// Field recorded by the most recent [`FieldSource::refresh`].
    pub fn last_snapshot(&self) -> Option<FieldVector> {
        self.snapshot
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }
}

impl<C: VectorMagnetController> FieldSource for NativeMagnet<C> {
    fn measured(&mut self, axis: Axis) -> AlignResult<f64> {
        self.controller.field(axis)
    }

    fn target(&mut self, axis: Axis) -> AlignResult<f64> {
        self.controller.field_target(axis)
    }

    fn set_target(&mut self, axis: Axis, tesla: f64) -> AlignResult<()> {
        self.controller.set_field_target(axis, tesla)
    }

    fn start_ramp(&mut self, axis: Axis) -> AlignResult<()> {
        self.controller.ramp_to_target(axis)
    }

    fn ramp_status(&mut self, axis: Axis) -> AlignResult<RampStatus> {
        self.controller.ramp_status(axis)
    }

    fn refresh(&mut self) -> AlignResult<FieldVector> {
        let field = self.measured_field()?;
        self.snapshot = Some(field);
        Ok(field)
    }
}

/// The x axis comes from a current supply, y and z from a native controller.
#[derive(Debug)]
pub struct CompositeMagnet<C, S> {
    controller: C,
    x_source: CurrentFieldAdapter<S>,
    snapshot: Option<FieldVector>,
}

enum Backend {
    Adapter,
    Controller,
}

const fn backend_for(axis: Axis) -> Backend {
    match axis {
        Axis::X => Backend::Adapter,
        Axis::Y | Axis::Z => Backend::Controller,
    }
}

impl<C, S> CompositeMagnet<C, S>
where
    C: VectorMagnetController,
    S: CurrentSource,
{
    pub fn new(controller: C, x_source: CurrentFieldAdapter<S>) -> Self {
        Self {
            controller,
            x_source,
            snapshot: None,
        }
    }

    pub fn last_snapshot(&self) -> Option<FieldVector> {
        self.snapshot
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn x_source(&self) -> &CurrentFieldAdapter<S> {
        &self.x_source
    }
}

impl<C, S> FieldSource for CompositeMagnet<C, S>
where
    C: VectorMagnetController,
    S: CurrentSource,
{
    fn measured(&mut self, axis: Axis) -> AlignResult<f64> {
        match backend_for(axis) {
            Backend::Adapter => self.x_source.field(),
            Backend::Controller => self.controller.field(axis),
        }
    }

    fn target(&mut self, axis: Axis) -> AlignResult<f64> {
        match backend_for(axis) {
            Backend::Adapter => Ok(self.x_source.target()),
            Backend::Controller => self.controller.field_target(axis),
        }
    }

    fn set_target(&mut self, axis: Axis, tesla: f64) -> AlignResult<()> {
        match backend_for(axis) {
            Backend::Adapter => {
                self.x_source.set_target(tesla);
                Ok(())
            }
            Backend::Controller => self.controller.set_field_target(axis, tesla),
        }
    }

    fn start_ramp(&mut self, axis: Axis) -> AlignResult<()> {
        match backend_for(axis) {
            Backend::Adapter => self.x_source.ramp_to_target(),
            Backend::Controller => self.controller.ramp_to_target(axis),
        }
    }

    fn ramp_status(&mut self, axis: Axis) -> AlignResult<RampStatus> {
        match backend_for(axis) {
            Backend::Adapter => Ok(RampStatus::Holding),
            Backend::Controller => self.controller.ramp_status(axis),
        }
    }

    fn refresh(&mut self) -> AlignResult<FieldVector> {
        let field = self.measured_field()?;
        self.snapshot = Some(field);
        Ok(field)
    }
}
