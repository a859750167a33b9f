use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::CommandContext;
use crate::jobs::grades::{self, GradesMode, GradesOptions};

#[derive(Args)]
pub struct GradesArgs {
    /// lock: one worker per student, shared-lock appends; pool: two pool batches
    #[arg(short, long, value_enum)]
    pub mode: Option<GradesMode>,

    /// Number of students [default: grades.students]
    #[arg(short, long)]
    pub students: Option<usize>,

    /// Directory for the student files and the averages file [default: grades.dir]
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Pool workers in pool mode [default: pool.size, 0 = from CPU count]
    #[arg(long)]
    pub pool_size: Option<usize>,

    /// Show a progress bar for each pool batch
    #[arg(long)]
    pub progress: bool,
}

pub fn execute(args: GradesArgs, ctx: &CommandContext) -> Result<()> {
    let settings = ctx.settings()?;
    let mode = args.mode.unwrap_or(settings.grades.mode);

    let mut pool = settings.pool.clone();
    if let Some(size) = args.pool_size {
        pool.size = size;
    }

    let options = GradesOptions {
        students: args.students.unwrap_or(settings.grades.students),
        grades_per_student: settings.grades.grades_per_student,
        dir: args.dir.unwrap_or(settings.grades.dir),
        averages_file: settings.grades.averages_file,
        pool_size: pool.worker_count(),
    };
    tracing::info!(%mode, students = options.students, "running grades job");

    let outcome = match mode {
        GradesMode::Lock => grades::run_lock(&options)?,
        GradesMode::Pool => grades::run_pool(&options, args.progress && !ctx.output.is_quiet())?,
    };

    ctx.emit(&outcome.report)?;
    if outcome.max.is_none() {
        ctx.output
            .warning(&format!("No averages found in {}", options.averages_path().display()));
    }
    Ok(())
}
