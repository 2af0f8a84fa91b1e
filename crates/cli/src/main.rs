use clap::Parser;
use taskmill::{Commands, GlobalArgs};

#[derive(Parser)]
#[command(name = "taskmill")]
#[command(
    about = "Run batches of commands with bounded concurrency, result caching and retries",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    if let Err(e) = taskmill_utils::tracing::init() {
        eprintln!("failed to initialize logging: {e}");
    }

    let cli = Cli::parse();
    let loaded = cli.global.load()?;

    cli.command.execute(loaded).await?;
    Ok(())
}
