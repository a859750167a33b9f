use anyhow::Result;
use clap::Args;

use super::CommandContext;
use crate::jobs::ips;

#[derive(Args)]
pub struct IpsArgs {
    /// Addresses to generate [default: ips.count]
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}

pub fn execute(args: IpsArgs, ctx: &CommandContext) -> Result<()> {
    let settings = ctx.settings()?;
    let count = args.count.unwrap_or(settings.ips.count);
    let run = ips::run(count)?;
    ctx.emit(&ips::report(&run))
}
