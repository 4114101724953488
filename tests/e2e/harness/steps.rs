use devpulse_core::Feedback;
use std::time::Duration;

use super::assertions::Assertion;

/// Broad error classes a step may be expected to fail with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Repository,
    SessionState,
    NotFound,
}

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Developer actions
    StartSession {
        id: String,
        user: String,
        tool: String,
    },
    TrackChange {
        id: String,
        path: String,
    },
    EndSession {
        id: String,
    },
    LogUsage {
        tool: String,
        user: String,
        feedback: Option<Feedback>,
        quality: f64,
    },

    // Working tree changes
    EditFile {
        path: String,
        diff: String,
    },
    AddUntracked {
        path: String,
    },
    Commit {
        author: String,
        message: String,
    },
    GitOffline,
    GitOnline,

    // Time control
    WaitMinutes {
        minutes: u64,
    },
    WaitDays {
        days: u64,
    },

    // Failure simulation
    Restart,
    CorruptStore,

    /// Runs the inner step and requires it to fail with the given kind
    ExpectFailure {
        step: Box<ScenarioStep>,
        kind: ErrorKind,
    },

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
