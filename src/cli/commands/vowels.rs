use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::CommandContext;
use crate::fanout::FanOut;
use crate::jobs::vowels;

#[derive(Args)]
pub struct VowelsArgs {
    /// Text file to scan [default: vowels.input]
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Letters to count, one worker each [default: vowels.letters]
    #[arg(short, long)]
    pub letters: Option<String>,
}

pub fn execute(args: VowelsArgs, ctx: &CommandContext) -> Result<()> {
    let settings = ctx.settings()?;
    let input = args.input.unwrap_or(settings.vowels.input);

    if !input.exists() {
        ctx.output.info(&format!(
            "{} not found, writing a sample text for this run",
            input.display()
        ));
        vowels::write_sample(&input, settings.vowels.sample_repetitions)?;
    }

    let letters = vowels::parse_letters(args.letters.as_deref().unwrap_or(&settings.vowels.letters))?;
    let fan_out = FanOut::new(settings.fanout.collect_timeout());
    let fan_in = vowels::run(&input, &letters, &fan_out)?;
    ctx.emit(&vowels::report(&fan_in))
}
