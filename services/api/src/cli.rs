use crate::demo::{run_demo, run_directory_filter, DemoArgs, DirectoryFilterArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use domestic_match::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Domestic Match",
    about = "Run the employer registration wizard service or try it from the command line",
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
    /// Work with a housekeeper directory export
    Directory {
        #[command(subcommand)]
        command: DirectoryCommand,
    },
    /// Walk one employer through registration and selection against sample data
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum DirectoryCommand {
    /// Filter a directory CSV by gender and age band
    Filter(DirectoryFilterArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Serve against the built-in sample directory instead of the backend
    #[arg(long)]
    pub(crate) offline: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Directory {
            command: DirectoryCommand::Filter(args),
        } => run_directory_filter(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
