use crate::domain::AlignResult;

/// Externally measured scalar to maximise, typically a resonance frequency.
pub trait Objective {
    fn measure(&mut self) -> AlignResult<f64>;
}

impl<F> Objective for F
where
    F: FnMut() -> AlignResult<f64>,
{
    fn measure(&mut self) -> AlignResult<f64> {
        self()
    }
}
