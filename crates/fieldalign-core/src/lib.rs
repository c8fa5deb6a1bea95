pub mod config;
pub mod coordinates;
pub mod domain;
pub mod numerics;
pub mod objective;
pub mod optimizer;
pub mod ramp;
pub mod simulation;
pub mod source;
pub mod sweep;
pub mod sweeps;

#[cfg(test)]
mod test_support;
