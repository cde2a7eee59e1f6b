use clap::Parser;

mod cli;
mod client;
mod commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    commands::run_command(cli).await
}
