use crate::demo::{run_demo, run_registration_numbers, DemoArgs, RegistrationArgs};
use crate::server;
use admission_intake::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Admission Intake",
    about = "Run the admission intake service or walk through the intake wizard from the command line",
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
    /// Walk an enquiry through the six intake steps against the in-memory backend
    Demo(DemoArgs),
    /// Print freshly generated registration and form numbers
    #[command(name = "regno")]
    RegNo(RegistrationArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Ignore INTAKE_API_BASE_URL and serve from the in-memory backend
    #[arg(long)]
    pub(crate) in_memory: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::RegNo(args) => run_registration_numbers(args),
    }
}
