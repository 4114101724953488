//! E2E test harness for DevPulse.
//!
//! This module contains test infrastructure with builders and assertions
//! that not every scenario uses.

#![allow(dead_code)]

pub mod repo;
pub mod runner;
pub mod scenario;
pub mod steps;
pub mod workspace;

// Re-export commonly used types
pub use assertions::Assertion;
pub use clock::MockClock;
pub use repo::ScriptedRepo;
pub use scenario::Scenario;
pub use steps::ErrorKind;
pub use workspace::TestWorkspace;
