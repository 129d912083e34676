use crate::demo::{run_demo, run_rvc_check, DemoArgs, RvcArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use usmca_origin::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "USMCA Origin",
    about = "Regional value content checks and USMCA certificate-of-origin workflows",
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
    /// Check a bill of materials against the regional value content threshold
    Rvc(RvcArgs),
    /// Walk a sample product through qualification and certificate generation offline
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
        Command::Rvc(args) => run_rvc_check(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
