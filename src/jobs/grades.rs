//! Student grades: generate one file per student, average each, append the
//! averages to one shared file, then find the best one.
//!
//! Two orchestrations over the same work functions:
//! - [`run_lock`]: one dedicated worker per student, appends serialized by a
//!   [`SharedResource`] lock.
//! - [`run_pool`]: two batches on one [`WorkerPool`]; the orchestrator writes
//!   the averages file itself, in student order.
//!
//! Both finish with a max-finder worker reading the averages file back.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::pool::{BatchProgress, WorkerPool};
use crate::report::{ReportEntry, RunReport};
use crate::shared::{AppendFile, SharedResource};
use crate::worker::{ErrorMarker, Payload, WorkResult, Worker, WorkerId};

pub const MIN_GRADE: f64 = 1.0;
pub const MAX_GRADE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradesMode {
    /// One worker per student, appends under a shared lock
    #[default]
    Lock,
    /// Two batches on a reusable worker pool
    Pool,
}

impl fmt::Display for GradesMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradesMode::Lock => write!(f, "lock"),
            GradesMode::Pool => write!(f, "pool"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradesOptions {
    pub students: usize,
    pub grades_per_student: usize,
    pub dir: PathBuf,
    pub averages_file: PathBuf,
    /// Pool mode only.
    pub pool_size: usize,
}

impl GradesOptions {
    pub fn averages_path(&self) -> PathBuf {
        self.dir.join(&self.averages_file)
    }

    fn roster(&self) -> impl Iterator<Item = Student> + '_ {
        (1..=self.students).map(|index| Student::new(index, &self.dir))
    }
}

/// One student and where their grades live.
#[derive(Debug, Clone)]
pub struct Student {
    pub name: String,
    pub path: PathBuf,
}

impl Student {
    pub fn new(index: usize, dir: &Path) -> Self {
        let name = format!("Alumno{index}");
        let path = dir.join(format!("{name}.txt"));
        Self { name, path }
    }
}

/// One line of the averages file: `"{average:.2} {student}"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAverage {
    pub average: f64,
    pub student: String,
}

impl StudentAverage {
    pub fn line(&self) -> String {
        format!("{:.2} {}", self.average, self.student)
    }

    /// Parse `"<number> <name>"`; anything else is `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (average, student) = line.trim().split_once(char::is_whitespace)?;
        let student = student.trim();
        if student.is_empty() {
            return None;
        }
        Some(Self {
            average: average.parse().ok()?,
            student: student.to_string(),
        })
    }
}

impl fmt::Display for StudentAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Write `count` random grades in [1, 10], two decimals, one per line.
pub fn generate_grades(path: &Path, count: usize) -> Result<Vec<f64>> {
    let mut rng = rand::rng();
    let grades: Vec<f64> = (0..count)
        .map(|_| round2(rng.random_range(MIN_GRADE..=MAX_GRADE)))
        .collect();

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for grade in &grades {
        writeln!(writer, "{grade}")?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(grades)
}

/// Mean of the numeric lines in `path`; blank and non-numeric lines are
/// skipped and a file with no grades averages 0.0.
pub fn read_average(path: &Path) -> std::io::Result<f64> {
    let reader = BufReader::new(File::open(path)?);
    let mut sum = 0.0;
    let mut count = 0usize;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Ok(grade) = line.parse::<f64>() {
            sum += grade;
            count += 1;
        }
    }
    Ok(if count == 0 { 0.0 } else { sum / count as f64 })
}

/// The line with the largest numeric prefix; malformed lines are skipped.
pub fn max_average(path: &Path) -> Result<Option<StudentAverage>> {
    let file = File::open(path).with_context(|| format!("Averages file {} not found", path.display()))?;
    let mut best: Option<StudentAverage> = None;
    for line in BufReader::new(file).lines() {
        let Some(candidate) = StudentAverage::parse_line(&line?) else {
            continue;
        };
        if best.as_ref().is_none_or(|b| candidate.average > b.average) {
            best = Some(candidate);
        }
    }
    Ok(best)
}

/// What a grades run produced.
#[derive(Debug)]
pub struct GradesOutcome {
    pub report: RunReport,
    pub max: Option<StudentAverage>,
}

fn generation_payload(student: &Student, count: usize) -> Payload<usize> {
    generate_grades(&student.path, count)
        .map(|grades| grades.len())
        .map_err(|err| format!("{err:#}"))
        .into()
}

fn generation_key(student: &Student) -> String {
    format!("{} (generate)", student.name)
}

/// Grades written, or the error, with the generating worker and its time.
fn generation_entry(student: &Student, result: &WorkResult<usize>) -> ReportEntry {
    ReportEntry::from_result(generation_key(student), result)
}

fn generation_failure(student: &Student, worker: Option<WorkerId>, err: impl fmt::Display) -> ReportEntry {
    ReportEntry::failed(generation_key(student), worker, err)
}

fn prepare(options: &GradesOptions) -> Result<()> {
    if options.students == 0 {
        bail!("At least one student is required");
    }
    fs::create_dir_all(&options.dir)
        .with_context(|| format!("Failed to create directory {}", options.dir.display()))
}

/// Dedicated workers throughout; averages appended under one shared lock.
pub fn run_lock(options: &GradesOptions) -> Result<GradesOutcome> {
    prepare(options)?;
    let started = Instant::now();
    let mut report = RunReport::new("Student averages (shared lock)");

    // Generation: one worker per student.
    let phase = Instant::now();
    let mut generators: Vec<(Student, Worker<WorkResult<usize>>)> = Vec::new();
    for student in options.roster() {
        let bound = student.clone();
        let count = options.grades_per_student;
        let mut worker = Worker::create(format!("generate-{}", student.name), move |ctx| {
            ctx.result(generation_payload(&bound, count))
        });
        worker.start()?;
        generators.push((student, worker));
    }
    for (student, worker) in &mut generators {
        match worker.join() {
            Ok(result) => report.push_entry(generation_entry(student, &result)),
            Err(err) => report.push_entry(generation_failure(student, worker.id(), err)),
        }
    }
    report.push_phase("generate", phase.elapsed());

    // Averages: compute freely, append under the lock.
    let phase = Instant::now();
    let averages = SharedResource::new(AppendFile::create(options.averages_path())?);
    let mut averagers: Vec<(Student, Worker<WorkResult<f64>>)> = Vec::new();
    for student in options.roster() {
        let bound = student.clone();
        let sink = averages.clone();
        let mut worker = Worker::create(format!("average-{}", student.name), move |ctx| {
            let payload = match read_average(&bound.path) {
                Ok(average) => {
                    let line = StudentAverage {
                        average,
                        student: bound.name.clone(),
                    };
                    match sink.append_line(&line.line()) {
                        Ok(()) => Payload::Value(round2(average)),
                        Err(err) => Payload::error(format!("{err:#}")),
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    tracing::warn!(student = %bound.name, "grades file not found");
                    Payload::Error(ErrorMarker::missing_resource(bound.path.display()))
                }
                Err(err) => Payload::error(err.to_string()),
            };
            ctx.result(payload)
        });
        worker.start()?;
        averagers.push((student, worker));
    }
    for (student, worker) in &mut averagers {
        match worker.join() {
            Ok(result) => report.push_entry(ReportEntry::from_result(&student.name, &result)),
            Err(err) => report.push_entry(ReportEntry::failed(&student.name, worker.id(), err)),
        }
    }
    let written = averages.with_lock(|file| Ok(file.lines_written()))?;
    report.push_phase("average", phase.elapsed());
    report.push_summary("averages written", written);

    let max = find_max(options, &mut report)?;
    Ok(GradesOutcome {
        report: report.finish(started.elapsed()),
        max,
    })
}

/// Two pool batches; the orchestrator writes the averages file in student order.
pub fn run_pool(options: &GradesOptions, show_progress: bool) -> Result<GradesOutcome> {
    prepare(options)?;
    let started = Instant::now();
    let mut report = RunReport::new("Student averages (worker pool)");
    let pool = WorkerPool::new(options.pool_size)?;
    report.push_summary("pool size", pool.size());

    let students: Vec<Student> = options.roster().collect();
    let progress = |label: &str| {
        if show_progress {
            BatchProgress::new(students.len(), label)
        } else {
            BatchProgress::hidden()
        }
    };

    // Batch 1: generation.
    let phase = Instant::now();
    let count = options.grades_per_student;
    let bar = progress("generating");
    let generated = pool.map_tasks_with_progress(
        move |student: Student| generation_payload(&student, count),
        students.clone(),
        Some(bar.reporter()),
    )?;
    bar.finish("generated");
    for (student, result) in students.iter().zip(&generated) {
        report.push_entry(generation_entry(student, result));
    }
    report.push_phase("generate", phase.elapsed());

    // Batch 2: averages. A missing file averages 0.0.
    let phase = Instant::now();
    let bar = progress("averaging");
    let averaged = pool.map_tasks_with_progress(
        |student: Student| {
            let average = read_average(&student.path).unwrap_or_else(|err| {
                tracing::warn!(student = %student.name, %err, "cannot read grades, using 0.0");
                0.0
            });
            Payload::Value(StudentAverage {
                average,
                student: student.name,
            })
        },
        students.clone(),
        Some(bar.reporter()),
    )?;
    bar.finish("averaged");

    let mut file = AppendFile::create(options.averages_path())?;
    for (student, result) in students.iter().zip(&averaged) {
        if let Some(average) = result.payload.value() {
            file.append_line(&average.line())?;
        }
        report.push_entry(ReportEntry::from_result(
            &student.name,
            &WorkResult {
                payload: result.payload.clone().map(|a| round2(a.average)),
                owner: result.owner,
                duration: result.duration,
            },
        ));
    }
    report.push_phase("average", phase.elapsed());
    report.push_summary("averages written", file.lines_written());

    let stats = pool.shutdown();
    report.push_summary(
        "tasks per worker",
        stats
            .iter()
            .map(|s| s.tasks_run.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    );

    let max = find_max(options, &mut report)?;
    Ok(GradesOutcome {
        report: report.finish(started.elapsed()),
        max,
    })
}

fn find_max(options: &GradesOptions, report: &mut RunReport) -> Result<Option<StudentAverage>> {
    let phase = Instant::now();
    let path = options.averages_path();
    let mut finder = Worker::create("max-finder", move |_ctx| max_average(&path));
    finder.start()?;
    let max = finder.join()??;
    report.push_phase("max", phase.elapsed());
    match &max {
        Some(best) => report.push_summary("maximum", best),
        None => report.push_summary("maximum", "no averages found"),
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: &Path, students: usize) -> GradesOptions {
        GradesOptions {
            students,
            grades_per_student: 6,
            dir: dir.to_path_buf(),
            averages_file: PathBuf::from("medias.txt"),
            pool_size: 3,
        }
    }

    #[test]
    fn test_generated_grades_in_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Alumno1.txt");
        let grades = generate_grades(&path, 50).unwrap();
        assert_eq!(grades.len(), 50);
        assert!(grades.iter().all(|g| (MIN_GRADE..=MAX_GRADE).contains(g)));
        assert!(grades.iter().all(|g| round2(*g) == *g));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 50);
    }

    #[test]
    fn test_average_skips_junk_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grades.txt");
        fs::write(&path, "8\n\nnot a grade\n6.5\n  7.5  \n").unwrap();
        assert_eq!(read_average(&path).unwrap(), 7.333333333333333);

        fs::write(&path, "\n\n").unwrap();
        assert_eq!(read_average(&path).unwrap(), 0.0);

        let err = read_average(&dir.path().join("missing.txt")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_parse_average_line() {
        let parsed = StudentAverage::parse_line("7.25 Alumno3").unwrap();
        assert_eq!(parsed.average, 7.25);
        assert_eq!(parsed.student, "Alumno3");
        assert_eq!(parsed.line(), "7.25 Alumno3");
        assert!(StudentAverage::parse_line("7.25").is_none());
        assert!(StudentAverage::parse_line("high Alumno3").is_none());
    }

    #[test]
    fn test_max_finder_picks_largest_prefix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("medias.txt");
        fs::write(&path, "6.10 Alumno1\ngarbage\n9.05 Alumno7\n8.99 Alumno2\n").unwrap();
        let best = max_average(&path).unwrap().unwrap();
        assert_eq!(best.student, "Alumno7");

        fs::write(&path, "").unwrap();
        assert!(max_average(&path).unwrap().is_none());
    }

    #[test]
    fn test_lock_mode_writes_one_line_per_student() {
        let dir = TempDir::new().unwrap();
        let options = options(dir.path(), 5);
        let outcome = run_lock(&options).unwrap();

        let content = fs::read_to_string(options.averages_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        for line in &lines {
            assert!(StudentAverage::parse_line(line).is_some(), "malformed line {line:?}");
        }

        let keys: Vec<_> = outcome.report.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "Alumno1",
                "Alumno1 (generate)",
                "Alumno2",
                "Alumno2 (generate)",
                "Alumno3",
                "Alumno3 (generate)",
                "Alumno4",
                "Alumno4 (generate)",
                "Alumno5",
                "Alumno5 (generate)",
            ]
        );
        let generated = outcome.report.entries.iter().filter(|e| e.key.ends_with("(generate)"));
        for entry in generated {
            assert!(entry.is_ok());
            assert!(entry.worker.is_some());
            assert_eq!(entry.value, Some(serde_json::json!(6)));
        }
        let best = outcome.max.unwrap();
        let expected = lines
            .iter()
            .filter_map(|l| StudentAverage::parse_line(l))
            .map(|a| a.average)
            .fold(f64::MIN, f64::max);
        assert_eq!(best.average, expected);
    }

    #[test]
    fn test_pool_mode_writes_in_student_order() {
        let dir = TempDir::new().unwrap();
        let options = options(dir.path(), 12);
        let outcome = run_pool(&options, false).unwrap();

        let content = fs::read_to_string(options.averages_path()).unwrap();
        let names: Vec<String> = content
            .lines()
            .filter_map(StudentAverage::parse_line)
            .map(|a| a.student)
            .collect();
        let expected: Vec<String> = (1..=12).map(|i| format!("Alumno{i}")).collect();
        assert_eq!(names, expected);
        assert_eq!(outcome.report.entries.len(), 24);
        let generated: Vec<_> = outcome
            .report
            .entries
            .iter()
            .filter(|e| e.key.ends_with("(generate)"))
            .collect();
        assert_eq!(generated.len(), 12);
        assert!(generated.iter().all(|e| e.is_ok() && e.worker.is_some()));
        assert!(outcome.max.is_some());
    }

    #[test]
    fn test_zero_students_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(run_lock(&options(dir.path(), 0)).is_err());
    }
}
