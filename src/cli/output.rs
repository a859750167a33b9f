//! Styled terminal output
//!
//! Everything the user sees goes through [`Output`]; workers never print.

use anyhow::Result;
use clap::ValueEnum;
use console::style;

use crate::report::{EntryStatus, ReportEntry, RunReport, StageSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output handler for consistent CLI formatting
pub struct Output {
    quiet: bool,
    format: OutputFormat,
}

impl Output {
    pub fn new(quiet: bool, format: OutputFormat) -> Self {
        Self { quiet, format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Chatter is suppressed in quiet mode and whenever stdout carries JSON.
    fn chatty(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }

    pub fn success(&self, message: &str) {
        if self.chatty() {
            println!("{} {}", style("✔").green(), message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.chatty() {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.chatty() {
            println!("{} {}", style("ℹ").blue(), message);
        }
    }

    pub fn header(&self, title: &str) {
        if self.chatty() {
            println!("\n{}", style(title).bold().underlined());
        }
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if self.chatty() {
            println!("  {:<20} {}", style(key).dim(), value);
        }
    }

    /// Print a run report as styled text or pretty JSON.
    pub fn report(&self, report: &RunReport) -> Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", report.to_json()?),
            OutputFormat::Text if self.quiet => {}
            OutputFormat::Text => self.report_text(report),
        }
        Ok(())
    }

    fn report_text(&self, report: &RunReport) {
        self.header(&report.title);

        for entry in &report.entries {
            self.entry(entry);
        }

        if !report.stages.is_empty() {
            println!("\n{}", style("Stages").bold().cyan());
            for stage in &report.stages {
                self.stage(stage);
            }
        }

        if !report.items.is_empty() {
            println!("\n{}", style("Output").bold().cyan());
            for item in &report.items {
                println!("  {} {}", style("•").cyan(), item);
            }
        }

        if !report.phases.is_empty() {
            println!("\n{}", style("Phases").bold().cyan());
            for phase in &report.phases {
                println!("  {:<20} {}", style(&phase.name).dim(), seconds(phase.seconds));
            }
        }

        if !report.summary.is_empty() {
            println!();
            for (label, value) in &report.summary {
                println!("  {:<20} {}", style(label).dim(), style(value).bold());
            }
        }

        println!(
            "\n{} {}",
            style("Total wall clock:").bold(),
            seconds(report.total_seconds)
        );
        let problems = report.problem_count();
        if problems > 0 {
            self.warning(&format!("{problems} worker(s) did not report a clean result"));
        }
    }

    fn entry(&self, entry: &ReportEntry) {
        let worker = entry
            .worker
            .map(|w| w.to_string())
            .unwrap_or_else(|| "-".to_string());
        let timing = entry.seconds.map(seconds).unwrap_or_default();
        match entry.status {
            EntryStatus::Ok => {
                let value = match &entry.value {
                    Some(serde_json::Value::String(text)) => text.clone(),
                    Some(value) => value.to_string(),
                    None => String::new(),
                };
                println!(
                    "  {} {:<12} {:<12} {} {}",
                    style("✔").green(),
                    entry.key,
                    style(value).bold(),
                    style(worker).dim(),
                    style(timing).dim()
                );
            }
            EntryStatus::Error => println!(
                "  {} {:<12} {} {}",
                style("✖").red(),
                entry.key,
                style(entry.detail.as_deref().unwrap_or("error")).red(),
                style(worker).dim()
            ),
            EntryStatus::Missing => println!(
                "  {} {:<12} {} {}",
                style("⚠").yellow(),
                entry.key,
                style(format!("missing: {}", entry.detail.as_deref().unwrap_or("no result"))).yellow(),
                style(worker).dim()
            ),
        }
    }

    fn stage(&self, stage: &StageSummary) {
        let icon = if stage.error.is_none() {
            style("✔").green()
        } else {
            style("✖").red()
        };
        println!(
            "  {} {:<8} {:<16} received {:<6} forwarded {:<6} {}",
            icon,
            stage.role,
            stage.name,
            stage.received,
            stage.forwarded,
            style(seconds(stage.seconds)).dim()
        );
        if let Some(error) = &stage.error {
            println!("      {}", style(error).red());
        }
    }
}

fn seconds(value: f64) -> String {
    format!("{value:.6}s")
}
