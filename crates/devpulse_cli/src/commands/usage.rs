//! Direct usage event recording.

use super::{explain, open, GlobalArgs};
use anyhow::Result;
use console::style;
use devpulse_core::{
    efficiency_rating, productivity_score, AiMetrics, Feedback, FeedbackResponse, NewUsageEvent,
};

pub struct LogArgs {
    pub tool: String,
    pub user: String,
    pub feedback: Option<String>,
    pub context: Option<String>,
    pub lines: u64,
    pub files: u64,
    pub minutes: f64,
}

/// Parses `--minutes`; only finite, non-negative values are accepted.
pub fn parse_minutes(raw: &str) -> std::result::Result<f64, String> {
    let minutes: f64 = raw.trim().parse().map_err(|e| format!("{}", e))?;
    if !minutes.is_finite() || minutes < 0.0 {
        return Err(format!("expected a finite, non-negative number of minutes, got {}", raw));
    }
    Ok(minutes)
}

pub fn log(global: &GlobalArgs, args: LogArgs) -> Result<()> {
    let feedback = match args.feedback.as_deref().map(Feedback::parse_response) {
        None | Some(FeedbackResponse::Skipped) => None,
        Some(FeedbackResponse::Rated(rating)) => Some(rating),
        Some(FeedbackResponse::Unrecognized(answer)) => {
            eprintln!(
                "{} Unrecognized feedback '{}'; recording without feedback",
                style("⚠").yellow(),
                answer
            );
            None
        }
    };

    let base = AiMetrics::default();
    let metrics = AiMetrics {
        session_minutes: args.minutes,
        files_modified: args.files,
        lines_generated: args.lines,
        productivity_score: productivity_score(args.lines, args.minutes, args.files),
        efficiency_rating: efficiency_rating(base.quality_score, base.ai_probability, 0.0),
        ..base
    };

    let mut new_event = NewUsageEvent::new(args.tool, args.user)
        .with_metrics(metrics)
        .with_feedback(feedback);
    if let Some(context) = args.context {
        new_event = new_event.with_context(context);
    }

    let ctx = open(global)?;
    let event = ctx.store().append(new_event).map_err(explain)?;
    println!(
        "{} Recorded {} event for {} ({})",
        style("✓").green(),
        style(&event.tool).cyan(),
        event.user,
        event.id
    );
    Ok(())
}
