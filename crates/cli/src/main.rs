mod app;
mod cli;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init();

    let app = app::App::open(cli.data_dir, cli.host_dir).await?;
    cli.cmd.run(&app).await
}
