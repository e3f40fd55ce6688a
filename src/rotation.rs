//! Rotation policy evaluation logic.

use std::fmt;
use std::time::Duration;

/// Thresholds that decide when the active file is rotated.
///
/// Any one threshold being reached makes rotation due. The size comparison is
/// inclusive: a file of exactly `max_size_bytes` is rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Maximum time the active file stays open.
    pub max_age: Duration,

    /// Maximum size of the active file on disk.
    pub max_size_bytes: u64,

    /// Maximum number of data rows in the active file. `None` is unbounded.
    pub max_lines: Option<u64>,
}

/// Snapshot of the active file used for a rotation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    /// Time since the file was opened or last rotated.
    pub age: Duration,

    /// Size on disk, or `None` when the file does not exist.
    pub size_bytes: Option<u64>,

    /// Durable data rows, excluding the header.
    pub line_count: u64,
}

/// Which threshold made rotation due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    Age,
    Size,
    Lines,
}

impl fmt::Display for RotationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationReason::Age => write!(f, "age"),
            RotationReason::Size => write!(f, "size"),
            RotationReason::Lines => write!(f, "line count"),
        }
    }
}

impl RotationPolicy {
    /// Evaluate whether the file described by `state` must be rotated.
    ///
    /// Returns the first reason found, checked in age, size, line order.
    /// Several thresholds may be exceeded at once; the outcome is still a
    /// single rotation.
    pub fn evaluate(&self, state: &FileState) -> Option<RotationReason> {
        if state.age >= self.max_age {
            return Some(RotationReason::Age);
        }

        if let Some(size) = state.size_bytes {
            if size >= self.max_size_bytes {
                return Some(RotationReason::Size);
            }
        }

        match self.max_lines {
            Some(max) if state.line_count >= max => Some(RotationReason::Lines),
            _ => None,
        }
    }

    pub fn is_due(&self, state: &FileState) -> bool {
        self.evaluate(state).is_some()
    }
}
