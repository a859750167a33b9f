use anyhow::{Context, Result, bail};
use chrono::Datelike;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::pipeline::{PipelineBuilder, PipelineReport, Sink};
use crate::report::RunReport;

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

/// A year must be a positive integer strictly before `current_year`.
pub fn validate_year(input: &str, current_year: i32) -> Result<i32> {
    let input = input.trim();
    let year: i32 = input
        .parse()
        .with_context(|| format!("'{input}' is not a whole number"))?;
    if year <= 0 {
        bail!("Year must be greater than zero, got {year}");
    }
    if year >= current_year {
        bail!("Year must be before {current_year}, got {year}");
    }
    Ok(year)
}

/// Parse `"Title;Year"`; blank, malformed and non-numeric lines are `None`.
pub fn parse_movie_line(line: &str) -> Option<(String, i32)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut parts = line.split(';').map(str::trim);
    let (title, year) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    Some((title.to_string(), year.parse().ok()?))
}

pub fn output_path(dir: &Path, year: i32) -> PathBuf {
    dir.join(format!("peliculas{year:04}.txt"))
}

/// Sink writing one line per item to a file it truncates on creation.
pub struct LineFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl LineFileSink {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            lines: 0,
        })
    }
}

/// What the writer stage leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub lines: usize,
}

impl Sink<String> for LineFileSink {
    type Output = WrittenFile;

    fn consume(&mut self, line: String) -> Result<()> {
        writeln!(self.writer, "{line}").with_context(|| format!("Failed to write {}", self.path.display()))?;
        self.lines += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<WrittenFile> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(WrittenFile {
            path: self.path,
            lines: self.lines,
        })
    }
}

/// filter-by-year → file writer.
///
/// The output file is created before either worker starts; a missing input
/// shows up as the filter stage's error, and the writer still gets its
/// sentinel and leaves an empty file.
pub fn run(input: &Path, year: i32, output_dir: &Path) -> Result<PipelineReport<WrittenFile>> {
    let sink = LineFileSink::create(output_path(output_dir, year))?;
    let input = input.to_path_buf();
    tracing::info!(path = %input.display(), year, "filtering movies");

    PipelineBuilder::source("filter-by-year", move |out| {
        let file = File::open(&input).with_context(|| format!("Movie list {} not found", input.display()))?;
        for line in BufReader::new(file).lines() {
            let line = line.with_context(|| format!("Failed to read {}", input.display()))?;
            match parse_movie_line(&line) {
                Some((title, movie_year)) if movie_year == year => out.send(format!("{title};{movie_year}"))?,
                Some(_) => {}
                None => tracing::debug!(%line, "skipping malformed movie line"),
            }
        }
        Ok(())
    })
    .sink("writer", sink)
    .run()
}

pub fn report(run: &PipelineReport<WrittenFile>, year: i32) -> RunReport {
    let mut report = RunReport::new(format!("Movies from {year}"));
    report.push_stages(&run.stages);
    match &run.output {
        Some(written) => {
            report.push_summary("output", written.path.display());
            report.push_summary("movies written", written.lines);
        }
        None => report.push_summary("output", "not written"),
    }
    report.finish(run.total)
}
