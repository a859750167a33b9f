//! Run reports
//!
//! Workers only compute and return data; the orchestrator turns what it
//! collected into a [`RunReport`] once every worker has been joined. Entries are
//! sorted by key in natural order (`Alumno2` before `Alumno10`), never by
//! arrival order, so two runs over the same input print identically apart from
//! timings and worker ids.

use anyhow::Result;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use crate::fanout::{Collected, FanIn};
use crate::pipeline::StageReport;
use crate::worker::{Payload, WorkResult, WorkerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Ok,
    Error,
    Missing,
}

/// One worker's (or one task's) outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub key: String,
    pub status: EntryStatus,
    /// The payload, when there is one.
    pub value: Option<serde_json::Value>,
    /// Error or missing-result reason.
    pub detail: Option<String>,
    pub worker: Option<WorkerId>,
    pub seconds: Option<f64>,
}

impl ReportEntry {
    pub fn from_result<R: Serialize>(key: impl fmt::Display, result: &WorkResult<R>) -> Self {
        let (status, value, detail) = match &result.payload {
            Payload::Value(value) => (EntryStatus::Ok, serde_json::to_value(value).ok(), None),
            Payload::Error(marker) => (
                EntryStatus::Error,
                Some(serde_json::Value::from(marker.code)),
                Some(marker.reason.clone()),
            ),
        };
        Self {
            key: key.to_string(),
            status,
            value,
            detail,
            worker: Some(result.owner),
            seconds: Some(result.duration_seconds()),
        }
    }

    pub fn from_collected<R: Serialize>(key: impl fmt::Display, collected: &Collected<R>) -> Self {
        match collected {
            Collected::Reported(result) => Self::from_result(key, result),
            Collected::Missing { worker, reason } => Self {
                key: key.to_string(),
                status: EntryStatus::Missing,
                value: None,
                detail: Some(reason.to_string()),
                worker: *worker,
                seconds: None,
            },
        }
    }

    /// Entry for a worker that failed before it could report anything.
    pub fn failed(key: impl fmt::Display, worker: Option<WorkerId>, reason: impl fmt::Display) -> Self {
        Self {
            key: key.to_string(),
            status: EntryStatus::Error,
            value: None,
            detail: Some(reason.to_string()),
            worker,
            seconds: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == EntryStatus::Ok
    }
}

/// Counters and timing of one pipeline worker.
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub name: String,
    pub role: String,
    pub worker: Option<WorkerId>,
    pub received: usize,
    pub forwarded: usize,
    pub sentinel_seen: bool,
    pub sentinel_forwarded: bool,
    pub seconds: f64,
    pub error: Option<String>,
}

impl From<&StageReport> for StageSummary {
    fn from(report: &StageReport) -> Self {
        Self {
            name: report.name.clone(),
            role: report.role.to_string(),
            worker: report.worker,
            received: report.received,
            forwarded: report.forwarded,
            sentinel_seen: report.sentinel_seen,
            sentinel_forwarded: report.sentinel_forwarded,
            seconds: report.duration.as_secs_f64(),
            error: report.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseTiming {
    pub name: String,
    pub seconds: f64,
}

/// Everything one command run has to say, in presentation order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub title: String,
    pub entries: Vec<ReportEntry>,
    pub stages: Vec<StageSummary>,
    pub phases: Vec<PhaseTiming>,
    /// Ordered output items (e.g. what a pipeline sink collected).
    pub items: Vec<String>,
    pub summary: Vec<(String, String)>,
    pub total_seconds: f64,
}

impl RunReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
            stages: Vec::new(),
            phases: Vec::new(),
            items: Vec::new(),
            summary: Vec::new(),
            total_seconds: 0.0,
        }
    }

    /// One entry per fan-in key, missing markers included.
    pub fn from_fan_in<K, R>(title: impl Into<String>, fan_in: &FanIn<K, R>) -> Self
    where
        K: Ord + fmt::Display,
        R: Serialize,
    {
        let mut report = Self::new(title);
        for (key, collected) in &fan_in.entries {
            report.push_entry(ReportEntry::from_collected(key, collected));
        }
        report.finish(fan_in.total)
    }

    pub fn push_entry(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn push_stages<'a>(&mut self, stages: impl IntoIterator<Item = &'a StageReport>) {
        self.stages.extend(stages.into_iter().map(StageSummary::from));
    }

    pub fn push_phase(&mut self, name: impl Into<String>, duration: Duration) {
        self.phases.push(PhaseTiming {
            name: name.into(),
            seconds: duration.as_secs_f64(),
        });
    }

    pub fn push_item(&mut self, item: impl fmt::Display) {
        self.items.push(item.to_string());
    }

    pub fn push_summary(&mut self, label: impl Into<String>, value: impl fmt::Display) {
        self.summary.push((label.into(), value.to_string()));
    }

    /// Sort entries by key and stamp the total wall clock.
    pub fn finish(mut self, total: Duration) -> Self {
        self.entries.sort_by(|a, b| natural_cmp(&a.key, &b.key));
        self.total_seconds = total.as_secs_f64();
        self
    }

    /// Entries that are not a clean value, plus failed stages.
    pub fn problem_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_ok()).count()
            + self.stages.iter().filter(|s| s.error.is_some()).count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Compare strings so that embedded digit runs order numerically.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_number(&mut a);
                let right = take_number(&mut b);
                let by_value = left
                    .trim_start_matches('0')
                    .len()
                    .cmp(&right.trim_start_matches('0').len())
                    .then_with(|| left.trim_start_matches('0').cmp(right.trim_start_matches('0')));
                if by_value != Ordering::Equal {
                    return by_value;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        digits.push(c);
    }
    digits
}
