// src/main.rs

use clap::Parser;

use rundag::cli::CliArgs;
use rundag::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level)?;
    rundag::run(args).await
}
