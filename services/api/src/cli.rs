use crate::demo::{run_accrual, run_demo, AccrueArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use levy_engine::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Vehicle Levy Compliance Service",
    about = "Run and exercise the vehicle levy accrual and route-compliance engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run one daily accrual tick against the seeded fleet
    Accrue(AccrueArgs),
    /// Run an end-to-end CLI demo covering scans, accrual, and payments
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Accrue(args) => run_accrual(args),
        Command::Demo(args) => run_demo(args),
    }
}
