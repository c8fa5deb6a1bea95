use super::CliError;
use super::helpers::{emit_report, format_triple};
use fieldalign_core::config::load_run_config;
use fieldalign_core::coordinates::{spherical_from_measured, to_cartesian};
use fieldalign_core::domain::{AlignError, FieldVector};
use fieldalign_core::simulation::SimulatedBench;
use fieldalign_core::sweep::optimize_and_ramp_r;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct CartesianArgs {
    /// x component, tesla
    #[arg(allow_negative_numbers = true)]
    x: f64,

    /// y component, tesla
    #[arg(allow_negative_numbers = true)]
    y: f64,

    /// z component, tesla
    #[arg(allow_negative_numbers = true)]
    z: f64,
}

#[derive(clap::Args)]
pub(super) struct SphericalArgs {
    /// Magnitude, tesla
    #[arg(allow_negative_numbers = true)]
    r: f64,

    /// Inclination from +z, degrees
    #[arg(allow_negative_numbers = true)]
    theta: f64,

    /// Azimuth from +x toward +y, degrees
    #[arg(allow_negative_numbers = true)]
    phi: f64,
}

#[derive(clap::Args)]
pub(super) struct SimulateArgs {
    /// Run configuration (bench + sweep) JSON path
    #[arg(long)]
    config: PathBuf,

    /// Write the sweep report here instead of stdout
    #[arg(long)]
    report: Option<PathBuf>,
}

pub(super) fn run_to_spherical_command(args: CartesianArgs) -> Result<i32, CliError> {
    let spherical = spherical_from_measured(FieldVector::new(args.x, args.y, args.z));
    println!("{}", format_triple([spherical.r, spherical.theta, spherical.phi]));
    Ok(0)
}

pub(super) fn run_to_cartesian_command(args: SphericalArgs) -> Result<i32, CliError> {
    let field = to_cartesian(args.r, args.theta, args.phi);
    println!("{}", format_triple(field.as_array()));
    Ok(0)
}

pub(super) fn run_simulate_command(args: SimulateArgs) -> Result<i32, CliError> {
    let config = load_run_config(&args.config).map_err(AlignError::from)?;
    config.validate()?;

    let bench = SimulatedBench::new(config.bench.clone())?;
    let mut magnet = bench.magnet()?;
    let mut resonator = bench.resonator();
    let scheduler = bench.scheduler();

    let report = optimize_and_ramp_r(magnet.as_mut(), &mut resonator, &scheduler, &config.sweep)?;
    info!(
        optimizations = report.optimizations,
        final_objective = report.final_objective,
        readings = resonator.readings(),
        "simulated sweep finished"
    );

    emit_report(&report, args.report.as_deref())?;
    Ok(0)
}
