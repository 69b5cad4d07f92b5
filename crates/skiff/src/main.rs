use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

use skiff::{
    backend::resolver_for,
    config::Config,
    logging,
    run::{RunArgs, Runner},
    viewer::BrowserViewer,
};

#[derive(Parser)]
#[command(author, version, about = "Run one-off commands on a Mesos/Chronos cluster", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.skiff.yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command in a fresh container of an app and print its output
    Run(RunCommand),
}

#[derive(Args)]
struct RunCommand {
    /// App to run the command for
    #[arg(short, long)]
    app: Option<String>,

    /// Deploy environment (stage, production, ...)
    #[arg(short, long)]
    env: Option<String>,

    /// Memory in GB
    #[arg(long, default_value_t = 1)]
    mem: u32,

    /// CPU shares
    #[arg(long, default_value_t = 1.0)]
    cpu: f64,

    /// ISO-8601 repeating interval, e.g. R1/2017-08-15T00:00:00Z/PT30M
    #[arg(long)]
    schedule: Option<String>,

    /// Open the task sandbox in a browser once it starts running
    #[arg(short, long)]
    follow: bool,

    /// Command to run, after `--`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl RunCommand {
    fn into_args(self) -> RunArgs {
        RunArgs {
            app: self.app.unwrap_or_default(),
            env: self.env.unwrap_or_default(),
            command: self.command.join(" "),
            schedule: self.schedule,
            cpu: self.cpu,
            mem: self.mem,
            follow: self.follow,
        }
    }
}

async fn run(config_path: Option<PathBuf>, command: RunCommand) -> anyhow::Result<()> {
    let args = command.into_args();
    args.validate()?;

    let config = Config::load(config_path.as_deref())?;
    debug!("Loaded configuration: {:?}", config);
    config.validate_for_run()?;

    let tags = resolver_for(&config).await?;
    let viewer = Arc::new(BrowserViewer::new(&config.mesos.host));
    let runner = Runner::from_config(&config, tags, viewer)?.with_progress(std::io::stderr().is_terminal());

    runner.run(&args).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_level.as_deref()) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Run(command) => run(cli.config, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
