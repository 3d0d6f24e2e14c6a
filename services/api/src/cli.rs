use crate::commands::{run_schedule, ScheduleArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use inspection_scheduler::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "inspection-scheduler",
    about = "Plan quarterly unit inspections from rent-roll exports",
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
    /// Compute a schedule from rent-roll CSV files and write the exports
    Schedule(ScheduleArgs),
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
        Command::Schedule(args) => run_schedule(args),
    }
}
