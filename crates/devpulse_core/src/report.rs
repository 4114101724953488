//! Windowed reports computed from a store snapshot.
//!
//! Report generation is a pure function of `(snapshot, range, now)`: the
//! same inputs always produce the same report, and nothing in the report
//! records when it was generated.

use crate::aggregate::DailyAggregate;
use crate::classification::{CommitClassifier, CommitPatterns};
use crate::event::UsageEvent;
use crate::store::StoreSnapshot;
use crate::types::{CommitInfo, DateRange, EfficiencyRating, Feedback};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

const LOW_VOLUME: usize = 50;
const HIGH_VOLUME: usize = 200;
const SKEWED_SHARE: f64 = 0.8;
const POOR_FEEDBACK_SHARE: f64 = 0.2;
const LOW_QUALITY: f64 = 60.0;
const HIGH_AI_RELIANCE: f64 = 0.8;
const LOW_AI_RELIANCE: f64 = 0.3;
const LOW_PRODUCTIVITY: f64 = 0.3;
const LOW_PRODUCTIVITY_SHARE: f64 = 0.3;
const HIGH_COMPLEXITY: i64 = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub events: usize,
    pub tools: usize,
    pub users: usize,
    pub lines_generated: u64,
    pub files_modified: u64,
    /// Mean duration over events that came from a session.
    pub average_session_minutes: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Averages {
    pub ai_probability: f64,
    pub quality_score: f64,
    pub productivity_score: f64,
}

/// One row of a ranking, ordered by count descending then name ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub name: String,
    pub events: usize,
    /// Fraction of all events in the window.
    pub share: f64,
}

/// Fraction of events showing each quality signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityIndicators {
    pub comments: f64,
    pub error_handling: f64,
    pub type_annotations: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyBucket {
    pub rating: EfficiencyRating,
    pub events: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackCount {
    pub rating: Feedback,
    pub events: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub total: usize,
    /// Counts in fixed order: excellent, good, average, poor.
    pub counts: Vec<FeedbackCount>,
    /// `(excellent + good) / total * 100`, 0 without feedback.
    pub satisfaction_percent: f64,
    /// Mean feedback score per tool, for tools with feedback.
    pub tool_scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    pub events: u64,
    pub lines_generated: u64,
    pub average_quality: f64,
    pub average_productivity: f64,
}

impl From<&DailyAggregate> for TrendPoint {
    fn from(day: &DailyAggregate) -> Self {
        Self {
            date: day.date.clone(),
            events: day.events,
            lines_generated: day.lines_generated,
            average_quality: day.quality_score.mean,
            average_productivity: day.productivity_score.mean,
        }
    }
}

/// Disjoint age buckets of the window's events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBreakdown {
    /// Since UTC midnight.
    pub today: usize,
    /// Within the last 7 days, before today.
    pub earlier_this_week: usize,
    /// Within the last 30 days, before the last 7.
    pub earlier_this_month: usize,
    pub older: usize,
}

impl WindowBreakdown {
    pub fn total(&self) -> usize {
        self.today + self.earlier_this_week + self.earlier_this_month + self.older
    }
}

/// A usage report over one date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub range: DateRange,
    pub totals: Totals,
    pub averages: Averages,
    pub tool_ranking: Vec<RankEntry>,
    pub user_activity: Vec<RankEntry>,
    pub quality_indicators: QualityIndicators,
    /// Counts in fixed order: excellent, good, average, needs-improvement.
    pub efficiency: Vec<EfficiencyBucket>,
    pub feedback: FeedbackSummary,
    pub daily_trend: Vec<TrendPoint>,
    pub windows: WindowBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_patterns: Option<CommitPatterns>,
    pub recommendations: Vec<String>,
}

/// Builds [`Report`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportEngine;

impl ReportEngine {
    pub fn generate(snapshot: &StoreSnapshot, range: DateRange, now: DateTime<Utc>) -> Report {
        Self::build(snapshot, range, now, None)
    }

    /// Like [`generate`](Self::generate), adding patterns of the given commits.
    pub fn generate_with_commits(
        snapshot: &StoreSnapshot,
        range: DateRange,
        now: DateTime<Utc>,
        commits: &[CommitInfo],
    ) -> Report {
        Self::build(snapshot, range, now, Some(CommitClassifier::analyze_patterns(commits)))
    }

    fn build(
        snapshot: &StoreSnapshot,
        range: DateRange,
        now: DateTime<Utc>,
        commit_patterns: Option<CommitPatterns>,
    ) -> Report {
        let events: Vec<&UsageEvent> = snapshot
            .events
            .iter()
            .filter(|e| range.contains(e.timestamp, now))
            .collect();

        let tool_ranking = rank(events.iter().map(|e| e.tool.as_str()), events.len());
        let user_activity = rank(events.iter().map(|e| e.user.as_str()), events.len());
        let totals = totals(&events, tool_ranking.len(), user_activity.len());
        let averages = Averages {
            ai_probability: mean(events.iter().map(|e| e.metrics.ai_probability)),
            quality_score: mean(events.iter().map(|e| e.metrics.quality_score)),
            productivity_score: mean(events.iter().map(|e| e.metrics.productivity_score)),
        };
        let quality_indicators = QualityIndicators {
            comments: ratio(&events, |e| e.metrics.has_comments),
            error_handling: ratio(&events, |e| e.metrics.has_error_handling),
            type_annotations: ratio(&events, |e| e.metrics.has_type_annotations),
        };
        let efficiency = EfficiencyRating::ALL
            .iter()
            .map(|rating| EfficiencyBucket {
                rating: *rating,
                events: events
                    .iter()
                    .filter(|e| e.metrics.efficiency_rating == *rating)
                    .count(),
            })
            .collect();
        let feedback = feedback_summary(&events);

        let first_day = range
            .window_start(now)
            .map(|start| start.format("%Y-%m-%d").to_string());
        let daily_trend = snapshot
            .aggregates
            .daily
            .values()
            .filter(|day| first_day.as_ref().map_or(true, |first| day.date >= *first))
            .map(TrendPoint::from)
            .collect();

        let windows = window_breakdown(&events, now);
        let recommendations = recommendations(&RuleInput {
            events: &events,
            tool_ranking: &tool_ranking,
            feedback: &feedback,
            averages: &averages,
        });

        Report {
            range,
            totals,
            averages,
            tool_ranking,
            user_activity,
            quality_indicators,
            efficiency,
            feedback,
            daily_trend,
            windows,
            commit_patterns,
            recommendations,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn ratio(events: &[&UsageEvent], pred: impl Fn(&UsageEvent) -> bool) -> f64 {
    if events.is_empty() {
        return 0.0;
    }
    events.iter().filter(|e| pred(e)).count() as f64 / events.len() as f64
}

fn rank<'a>(names: impl Iterator<Item = &'a str>, total: usize) -> Vec<RankEntry> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for name in names {
        *counts.entry(name).or_default() += 1;
    }
    let mut ranking: Vec<RankEntry> = counts
        .into_iter()
        .map(|(name, events)| RankEntry {
            name: name.to_string(),
            events,
            share: if total == 0 { 0.0 } else { events as f64 / total as f64 },
        })
        .collect();
    ranking.sort_by(|a, b| b.events.cmp(&a.events).then_with(|| a.name.cmp(&b.name)));
    ranking
}

fn totals(events: &[&UsageEvent], tools: usize, users: usize) -> Totals {
    Totals {
        events: events.len(),
        tools,
        users,
        lines_generated: events.iter().map(|e| e.metrics.lines_generated).sum(),
        files_modified: events.iter().map(|e| e.metrics.files_modified).sum(),
        average_session_minutes: mean(
            events
                .iter()
                .filter(|e| e.session_id.is_some())
                .map(|e| e.metrics.session_minutes),
        ),
    }
}

fn feedback_summary(events: &[&UsageEvent]) -> FeedbackSummary {
    let rated: Vec<(&str, Feedback)> = events
        .iter()
        .filter_map(|e| e.feedback.map(|f| (e.tool.as_str(), f)))
        .collect();
    if rated.is_empty() {
        return FeedbackSummary {
            counts: Feedback::ALL
                .iter()
                .map(|rating| FeedbackCount { rating: *rating, events: 0 })
                .collect(),
            ..FeedbackSummary::default()
        };
    }

    let counts: Vec<FeedbackCount> = Feedback::ALL
        .iter()
        .map(|rating| FeedbackCount {
            rating: *rating,
            events: rated.iter().filter(|(_, f)| f == rating).count(),
        })
        .collect();
    let satisfied = rated
        .iter()
        .filter(|(_, f)| matches!(f, Feedback::Excellent | Feedback::Good))
        .count();

    let tools: BTreeSet<&str> = rated.iter().map(|(tool, _)| *tool).collect();
    let tool_scores = tools
        .into_iter()
        .map(|tool| {
            let score = mean(
                rated
                    .iter()
                    .filter(|(t, _)| *t == tool)
                    .map(|(_, f)| f64::from(f.score())),
            );
            (tool.to_string(), score)
        })
        .collect();

    FeedbackSummary {
        total: rated.len(),
        counts,
        satisfaction_percent: satisfied as f64 / rated.len() as f64 * 100.0,
        tool_scores,
    }
}

fn window_breakdown(events: &[&UsageEvent], now: DateTime<Utc>) -> WindowBreakdown {
    let today_start = DateRange::Today.window_start(now).unwrap_or(now);
    let week_start = now - Duration::days(7);
    let month_start = now - Duration::days(30);

    let mut breakdown = WindowBreakdown::default();
    for event in events {
        let ts = event.timestamp;
        if ts >= today_start {
            breakdown.today += 1;
        } else if ts >= week_start {
            breakdown.earlier_this_week += 1;
        } else if ts >= month_start {
            breakdown.earlier_this_month += 1;
        } else {
            breakdown.older += 1;
        }
    }
    breakdown
}

struct RuleInput<'a> {
    events: &'a [&'a UsageEvent],
    tool_ranking: &'a [RankEntry],
    feedback: &'a FeedbackSummary,
    averages: &'a Averages,
}

type ReportRule = (fn(&RuleInput<'_>) -> bool, &'static str);

const REPORT_RULES: [ReportRule; 9] = [
    (
        |r: &RuleInput<'_>| r.events.len() < LOW_VOLUME,
        "Usage volume is low; increase adoption by introducing the tools in more workflows.",
    ),
    (
        |r: &RuleInput<'_>| r.events.len() > HIGH_VOLUME,
        "Usage volume is high; the team has embraced AI-assisted development.",
    ),
    (
        |r: &RuleInput<'_>| {
            r.tool_ranking.len() == 1 || r.tool_ranking.first().is_some_and(|top| top.share > SKEWED_SHARE)
        },
        "Usage is concentrated on a single tool; diversify tool usage.",
    ),
    (
        |r: &RuleInput<'_>| {
            let poor = r
                .feedback
                .counts
                .iter()
                .find(|c| c.rating == Feedback::Poor)
                .map_or(0, |c| c.events);
            r.feedback.total > 0 && poor as f64 > r.feedback.total as f64 * POOR_FEEDBACK_SHARE
        },
        "More than a fifth of the feedback is poor; review the tools that draw complaints.",
    ),
    (
        |r: &RuleInput<'_>| r.averages.quality_score < LOW_QUALITY,
        "Average code quality is low; add comments and error handling to generated code.",
    ),
    (
        |r: &RuleInput<'_>| r.averages.ai_probability > HIGH_AI_RELIANCE,
        "AI reliance is high; keep practicing hand-written code.",
    ),
    (
        |r: &RuleInput<'_>| r.averages.ai_probability < LOW_AI_RELIANCE,
        "AI usage is low; try more of the assisted features.",
    ),
    (
        |r: &RuleInput<'_>| {
            let low = r
                .events
                .iter()
                .filter(|e| e.metrics.productivity_score < LOW_PRODUCTIVITY)
                .count();
            low as f64 > r.events.len() as f64 * LOW_PRODUCTIVITY_SHARE
        },
        "Many sessions had low productivity; streamline the development workflow.",
    ),
    (
        |r: &RuleInput<'_>| r.events.iter().any(|e| e.metrics.complexity_added > HIGH_COMPLEXITY),
        "Some sessions added a lot of complexity; refactor the most complex code.",
    ),
];

const NO_ACTIVITY: &str = "No usage recorded in this period; start using the tools to collect data.";
const HEALTHY: &str = "Development looks healthy; keep it up.";

fn recommendations(input: &RuleInput<'_>) -> Vec<String> {
    if input.events.is_empty() {
        return vec![NO_ACTIVITY.to_string()];
    }
    let fired: Vec<String> = REPORT_RULES
        .iter()
        .filter(|(applies, _)| applies(input))
        .map(|(_, message)| message.to_string())
        .collect();
    if fired.is_empty() {
        vec![HEALTHY.to_string()]
    } else {
        fired
    }
}

impl Report {
    /// Plain-text rendering for terminals.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Usage report ({})", self.range);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Events: {}   Tools: {}   Users: {}",
            self.totals.events, self.totals.tools, self.totals.users
        );
        let _ = writeln!(
            out,
            "Lines generated: {}   Files modified: {}   Avg session: {:.1} min",
            self.totals.lines_generated, self.totals.files_modified, self.totals.average_session_minutes
        );
        let _ = writeln!(
            out,
            "Avg AI probability: {:.2}   Avg quality: {:.1}   Avg productivity: {:.2}",
            self.averages.ai_probability, self.averages.quality_score, self.averages.productivity_score
        );

        if !self.tool_ranking.is_empty() {
            let _ = writeln!(out, "\nTools:");
            for entry in &self.tool_ranking {
                let _ = writeln!(out, "  {:<20} {:>6}  {:>5.1}%", entry.name, entry.events, entry.share * 100.0);
            }
        }
        if !self.user_activity.is_empty() {
            let _ = writeln!(out, "\nUsers:");
            for entry in &self.user_activity {
                let _ = writeln!(out, "  {:<20} {:>6}  {:>5.1}%", entry.name, entry.events, entry.share * 100.0);
            }
        }

        let _ = writeln!(out, "\nQuality signals:");
        let _ = writeln!(out, "  comments          {:>5.1}%", self.quality_indicators.comments * 100.0);
        let _ = writeln!(out, "  error handling    {:>5.1}%", self.quality_indicators.error_handling * 100.0);
        let _ = writeln!(out, "  type annotations  {:>5.1}%", self.quality_indicators.type_annotations * 100.0);

        let _ = writeln!(out, "\nEfficiency:");
        for bucket in &self.efficiency {
            let _ = writeln!(out, "  {:<18} {:>6}", bucket.rating.as_str(), bucket.events);
        }

        let _ = writeln!(
            out,
            "\nFeedback: {} responses, {:.1}% satisfied",
            self.feedback.total, self.feedback.satisfaction_percent
        );

        let w = &self.windows;
        let _ = writeln!(
            out,
            "\nBy age: today {}, earlier this week {}, earlier this month {}, older {}",
            w.today, w.earlier_this_week, w.earlier_this_month, w.older
        );

        if !self.daily_trend.is_empty() {
            let _ = writeln!(out, "\nDaily trend:");
            for point in &self.daily_trend {
                let _ = writeln!(
                    out,
                    "  {}  {:>5} events  {:>7} lines  quality {:.1}",
                    point.date, point.events, point.lines_generated, point.average_quality
                );
            }
        }

        if let Some(patterns) = &self.commit_patterns {
            let _ = writeln!(
                out,
                "\nCommits: {} total, {} AI-assisted ({:.1}%)",
                patterns.total_commits,
                patterns.ai_assisted_commits,
                patterns.ai_rate * 100.0
            );
            if let Some(author) = &patterns.most_active_author {
                let _ = writeln!(out, "  most active: {}", author);
            }
        }

        let _ = writeln!(out, "\nRecommendations:");
        for rec in &self.recommendations {
            let _ = writeln!(out, "  - {}", rec);
        }
        out
    }
}
