use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;

use super::CommandContext;
use crate::jobs::movies;

#[derive(Args)]
pub struct MoviesArgs {
    /// Year to extract; a whole number before the current year
    #[arg(short, long)]
    pub year: String,

    /// Movie list, one "Title;Year" per line
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where peliculasYYYY.txt is written [default: movies.output_dir]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

pub fn execute(args: MoviesArgs, ctx: &CommandContext) -> Result<()> {
    let year = movies::validate_year(&args.year, movies::current_year())?;
    if !args.input.exists() {
        bail!("Movie list {} not found", args.input.display());
    }

    let settings = ctx.settings()?;
    let output_dir = args.output_dir.unwrap_or(settings.movies.output_dir);
    let run = movies::run(&args.input, year, &output_dir)?;
    ctx.emit(&movies::report(&run, year))?;

    if let Some(written) = &run.output {
        ctx.output.success(&format!(
            "Wrote {} movie(s) to {}",
            written.lines,
            written.path.display()
        ));
    }
    Ok(())
}
