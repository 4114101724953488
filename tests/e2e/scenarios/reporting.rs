use crate::harness::Scenario;
use devpulse_core::{DateRange, Feedback};

#[test]
fn test_tool_ranking_orders_by_usage_then_name() {
    Scenario::new("tool_ranking")
        .log_usage("cursor", "ada")
        .log_usage("copilot", "bob")
        .log_usage("cursor", "bob")
        .log_usage("claude", "ada")
        .log_usage("cursor", "cy")
        .assert_tool_ranking(&["cursor", "claude", "copilot"])
        .assert_event_count(DateRange::Today, 5)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_feedback_drives_satisfaction() {
    Scenario::new("feedback_satisfaction")
        .log_rated_usage("cursor", "ada", Some(Feedback::Excellent), 80.0)
        .log_rated_usage("cursor", "ada", Some(Feedback::Good), 80.0)
        .log_rated_usage("claude", "bob", Some(Feedback::Poor), 80.0)
        .log_rated_usage("claude", "bob", None, 80.0)
        .assert_satisfaction(200.0 / 3.0)
        .assert_recommendation(DateRange::All, "feedback is poor")
        .run()
        .unwrap();
}

#[test]
fn test_windows_partition_events_by_age() {
    Scenario::new("windows_partition")
        .log_usage("cursor", "ada")
        .wait_days(20)
        .log_usage("cursor", "ada")
        .wait_days(14)
        .log_usage("cursor", "ada")
        .wait_days(3)
        .log_usage("cursor", "ada")
        .assert_windows(1, 1, 1, 1)
        .assert_event_count(DateRange::Today, 1)
        .assert_event_count(DateRange::Last7Days, 2)
        .assert_event_count(DateRange::Last30Days, 3)
        .assert_event_count(DateRange::All, 4)
        .run()
        .unwrap();
}

#[test]
fn test_recommendations_for_sparse_single_tool_usage() {
    Scenario::new("sparse_usage_recommendations")
        .assert_recommendation(DateRange::All, "No usage recorded")
        .log_rated_usage("cursor", "ada", None, 40.0)
        .assert_recommendation(DateRange::All, "volume is low")
        .assert_recommendation(DateRange::All, "single tool")
        .assert_recommendation(DateRange::All, "quality is low")
        .wait_days(2)
        .assert_recommendation(DateRange::Today, "No usage recorded")
        .run()
        .unwrap();
}

#[test]
fn test_ended_sessions_feed_reports() {
    Scenario::new("sessions_feed_reports")
        .start_session("s1", "ada", "windsurf")
        .wait_minutes(20)
        .commit("ada", "feat: windsurf scaffold")
        .end_session("s1")
        .log_usage("cursor", "bob")
        .log_usage("cursor", "bob")
        .assert_tool_ranking(&["cursor", "windsurf"])
        .assert_custom(|ctx| {
            let report = ctx.report(DateRange::All);
            anyhow::ensure!(report.totals.users == 2, "expected 2 users, got {}", report.totals.users);
            anyhow::ensure!(
                (report.totals.average_session_minutes - 20.0).abs() < 1e-9,
                "average session minutes {}",
                report.totals.average_session_minutes
            );
            Ok(())
        })
        .assert_custom(|ctx| {
            let report = ctx.report_with_commits(DateRange::Today);
            let patterns = report
                .commit_patterns
                .ok_or_else(|| anyhow::anyhow!("commit patterns missing"))?;
            anyhow::ensure!(patterns.total_commits == 1);
            anyhow::ensure!(patterns.ai_assisted_commits == 1);
            anyhow::ensure!(patterns.most_active_author.as_deref() == Some("ada"));
            Ok(())
        })
        .run()
        .unwrap();
}

#[test]
fn test_reports_are_repeatable() {
    Scenario::new("repeatable_reports")
        .log_rated_usage("cursor", "ada", Some(Feedback::Average), 70.0)
        .log_rated_usage("claude", "bob", Some(Feedback::Good), 90.0)
        .assert_custom(|ctx| {
            let first = serde_json::to_string(&ctx.report(DateRange::Last7Days))?;
            let second = serde_json::to_string(&ctx.report(DateRange::Last7Days))?;
            anyhow::ensure!(first == second, "reports differ");
            Ok(())
        })
        .run()
        .unwrap();
}
