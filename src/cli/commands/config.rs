use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use super::CommandContext;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Display current merged configuration (JSON by default)
    Show {
        /// Only this section (e.g. "grades" or "pool.size")
        section: Option<String>,
        /// Render as TOML, ready to paste into pipework.toml
        #[arg(long = "toml")]
        as_toml: bool,
    },
    /// Check the merged configuration against its rules
    Validate,
}

pub fn execute(args: ConfigArgs, ctx: &CommandContext) -> Result<()> {
    let config = ctx.load_config()?;

    match args.command {
        ConfigCommand::Show { section, as_toml } => {
            let value = match section {
                Some(path) => config.get_section(&path)?,
                None => config.get_full_config()?,
            };
            if as_toml {
                if !value.is_object() {
                    bail!("Only tables can be rendered as TOML; drop --toml for single values");
                }
                print!("{}", toml::to_string_pretty(&value)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
        }
        ConfigCommand::Validate => {
            let settings = config.settings()?;
            ctx.output.success("Configuration is valid");
            ctx.output
                .key_value("pool workers", &settings.pool.worker_count().to_string());
            ctx.output.key_value(
                "collect timeout",
                &format!("{} ms", settings.fanout.collect_timeout_ms),
            );
        }
    }
    Ok(())
}
