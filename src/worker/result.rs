use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Count reported in place of a result when the work failed.
pub const ERROR_COUNT: i64 = -1;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity assigned to a worker when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn next() -> Self {
        WorkerId(NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Why a unit of work produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMarker {
    /// Always [`ERROR_COUNT`]; kept so reports can show the classic `-1`.
    pub code: i64,
    pub reason: String,
}

impl ErrorMarker {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            code: ERROR_COUNT,
            reason: reason.into(),
        }
    }

    /// The designated input of the work function does not exist.
    pub fn missing_resource(resource: impl fmt::Display) -> Self {
        Self::new(format!("resource missing: {resource}"))
    }

    pub fn panicked(message: impl fmt::Display) -> Self {
        Self::new(format!("work function panicked: {message}"))
    }
}

impl fmt::Display for ErrorMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error ({}): {}", self.code, self.reason)
    }
}

/// Outcome of one unit of work: a value, or a marker saying it failed.
///
/// Distinguishes "work failed" from "work returned zero".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload<T> {
    Value(T),
    Error(ErrorMarker),
}

impl<T> Payload<T> {
    pub fn error(reason: impl Into<String>) -> Self {
        Payload::Error(ErrorMarker::new(reason))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Payload::Error(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Payload::Value(value) => Some(value),
            Payload::Error(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Payload::Value(value) => Some(value),
            Payload::Error(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Payload<U> {
        match self {
            Payload::Value(value) => Payload::Value(f(value)),
            Payload::Error(marker) => Payload::Error(marker),
        }
    }
}

impl<T, E: fmt::Display> From<Result<T, E>> for Payload<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Payload::Value(value),
            Err(err) => Payload::Error(ErrorMarker::new(err.to_string())),
        }
    }
}

/// What a worker reports back about one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkResult<T> {
    pub payload: Payload<T>,
    pub owner: WorkerId,
    #[serde(rename = "duration_seconds", serialize_with = "as_seconds")]
    pub duration: Duration,
}

impl<T> WorkResult<T> {
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

fn as_seconds<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
