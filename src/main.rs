use anyhow::Result;
use clap::Parser;

use pipework::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
