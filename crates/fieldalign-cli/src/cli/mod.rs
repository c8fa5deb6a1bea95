mod commands;
mod helpers;

use clap::Parser;
use fieldalign_core::domain::AlignError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let align_error = error.as_align_error();
            eprintln!("{}", align_error.diagnostic_line());
            eprintln!("{}", align_error.fatal_exit_line());
            align_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("fieldalign".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_tracing(cli.log_level.as_deref());
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "fieldalign", about = "Vector magnet field alignment")]
struct Cli {
    /// Log filter directive, e.g. `debug` or `fieldalign_core=trace`
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Convert a Cartesian field (tesla) to r, theta, phi
    ToSpherical(commands::CartesianArgs),
    /// Convert r (tesla), theta and phi (degrees) to a Cartesian field
    ToCartesian(commands::SphericalArgs),
    /// Run a field sweep against the simulated bench
    Simulate(commands::SimulateArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::ToSpherical(args) => commands::run_to_spherical_command(args),
        CliCommand::ToCartesian(args) => commands::run_to_cartesian_command(args),
        CliCommand::Simulate(args) => commands::run_simulate_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Align(AlignError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<AlignError> for CliError {
    fn from(error: AlignError) -> Self {
        Self::Align(error)
    }
}

impl CliError {
    fn as_align_error(&self) -> AlignError {
        match self {
            Self::Usage(message) => AlignError::configuration("CONFIG.CLI_USAGE", message.trim_end()),
            Self::Align(error) => error.clone(),
            Self::Internal(error) => AlignError::internal("INTERNAL.CLI", format!("{error:#}")),
        }
    }
}
