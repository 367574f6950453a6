use crate::report::{run_report, run_schedule, ReportArgs, ScheduleArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use lending_ops::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Lending Operations Desk",
    about = "Serve or query the lending operations engine from the command line",
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
    /// Print dashboard statistics for a filtered set of applications
    Report(ReportArgs),
    /// Print the monthly repayment schedule for a loan
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
        Command::Report(args) => run_report(args),
        Command::Schedule(args) => run_schedule(args),
    }
}
