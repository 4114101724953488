//! Per-day and per-tool aggregates maintained incrementally on append.

use crate::event::UsageEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Streaming mean: `mean' = mean + (v - mean) / n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMean {
    pub count: u64,
    pub mean: f64,
}

impl RunningMean {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
    }
}

/// Totals for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: String,
    pub events: u64,
    pub lines_generated: u64,
    pub lines_deleted: u64,
    pub files_modified: u64,
    pub session_minutes: RunningMean,
    pub ai_probability: RunningMean,
    pub quality_score: RunningMean,
    pub productivity_score: RunningMean,
    /// Event count per tool.
    pub tools: BTreeMap<String, u64>,
}

impl DailyAggregate {
    pub fn new(date: &str) -> Self {
        Self {
            date: date.to_string(),
            events: 0,
            lines_generated: 0,
            lines_deleted: 0,
            files_modified: 0,
            session_minutes: RunningMean::default(),
            ai_probability: RunningMean::default(),
            quality_score: RunningMean::default(),
            productivity_score: RunningMean::default(),
            tools: BTreeMap::new(),
        }
    }

    pub fn apply(&mut self, event: &UsageEvent) {
        let m = &event.metrics;
        self.events += 1;
        self.lines_generated += m.lines_generated;
        self.lines_deleted += m.lines_deleted;
        self.files_modified += m.files_modified;
        self.session_minutes.push(m.session_minutes);
        self.ai_probability.push(m.ai_probability);
        self.quality_score.push(m.quality_score);
        self.productivity_score.push(m.productivity_score);
        *self.tools.entry(event.tool.clone()).or_default() += 1;
    }
}

/// Lifetime totals for one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAggregate {
    pub tool: String,
    pub events: u64,
    pub lines_generated: u64,
    pub files_modified: u64,
    pub session_minutes: RunningMean,
    pub ai_probability: RunningMean,
    pub quality_score: RunningMean,
    pub productivity_score: RunningMean,
    /// Mean feedback score over events that carry feedback.
    pub feedback_score: RunningMean,
    pub first_used: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl ToolAggregate {
    pub fn new(tool: &str, at: DateTime<Utc>) -> Self {
        Self {
            tool: tool.to_string(),
            events: 0,
            lines_generated: 0,
            files_modified: 0,
            session_minutes: RunningMean::default(),
            ai_probability: RunningMean::default(),
            quality_score: RunningMean::default(),
            productivity_score: RunningMean::default(),
            feedback_score: RunningMean::default(),
            first_used: at,
            last_used: at,
        }
    }

    pub fn apply(&mut self, event: &UsageEvent) {
        let m = &event.metrics;
        self.events += 1;
        self.lines_generated += m.lines_generated;
        self.files_modified += m.files_modified;
        self.session_minutes.push(m.session_minutes);
        self.ai_probability.push(m.ai_probability);
        self.quality_score.push(m.quality_score);
        self.productivity_score.push(m.productivity_score);
        if let Some(feedback) = event.feedback {
            self.feedback_score.push(f64::from(feedback.score()));
        }
        self.first_used = self.first_used.min(event.timestamp);
        self.last_used = self.last_used.max(event.timestamp);
    }
}

/// Both aggregate maps, keyed by date and by tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub daily: BTreeMap<String, DailyAggregate>,
    pub tools: BTreeMap<String, ToolAggregate>,
}

impl Aggregates {
    /// Folds one event into its day and tool buckets.
    pub fn apply(&mut self, event: &UsageEvent) {
        self.daily
            .entry(event.date.clone())
            .or_insert_with(|| DailyAggregate::new(&event.date))
            .apply(event);
        self.tools
            .entry(event.tool.clone())
            .or_insert_with(|| ToolAggregate::new(&event.tool, event.timestamp))
            .apply(event);
    }

    /// Recomputes every bucket from scratch.
    pub fn rebuild<'a>(events: impl IntoIterator<Item = &'a UsageEvent>) -> Self {
        let mut aggregates = Self::default();
        for event in events {
            aggregates.apply(event);
        }
        aggregates
    }
}
