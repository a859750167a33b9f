use anyhow::Result;
use clap::Args;

use super::CommandContext;
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct VersionArgs {
    /// Show detailed version information
    #[arg(long)]
    pub detailed: bool,
}

pub fn execute(args: VersionArgs, ctx: &CommandContext) -> Result<()> {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");

    if ctx.output.format() == OutputFormat::Json {
        let info = serde_json::json!({
            "name": name,
            "version": version,
            "cpus": num_cpus::get(),
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{name} {version}");
    if args.detailed {
        ctx.output.key_value("Description:", env!("CARGO_PKG_DESCRIPTION"));
        ctx.output.key_value("License:", env!("CARGO_PKG_LICENSE"));
        ctx.output.key_value("Rust edition:", "2024");
        ctx.output.key_value("Target:", std::env::consts::ARCH);
        ctx.output.key_value("CPUs:", &num_cpus::get().to_string());
        ctx.output.key_value(
            "Profile:",
            if cfg!(debug_assertions) { "debug" } else { "release" },
        );
    }
    Ok(())
}
