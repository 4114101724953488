use crate::harness::{MockClock, ScriptedRepo, TestWorkspace};
use devpulse_core::{DateRange, NewUsageEvent, SessionStatus};
use std::thread;

fn diff_for(path: &str, lines: usize) -> String {
    let mut diff = format!(
        "diff --git a/{p} b/{p}\n--- a/{p}\n+++ b/{p}\n@@ -0,0 +1,{n} @@\n",
        p = path,
        n = lines
    );
    for i in 0..lines {
        diff.push_str(&format!("+let v{} = {};\n", i, i));
    }
    diff
}

#[test]
fn test_parallel_tracking_on_one_session() {
    let workspace = TestWorkspace::empty().unwrap();
    let repo = ScriptedRepo::new();
    let clock = MockClock::new();
    repo.commit("bob", clock.now(), "chore: init");
    let ctx = workspace.open(&repo, &clock).unwrap();

    let paths: Vec<String> = (0..8).map(|i| format!("src/mod{}.rs", i)).collect();
    for (i, path) in paths.iter().enumerate() {
        repo.edit(path, &diff_for(path, i + 1));
    }

    ctx.tracker().start("s1", "ada", "cursor").unwrap();
    thread::scope(|scope| {
        for path in &paths {
            let ctx = &ctx;
            scope.spawn(move || ctx.tracker().track_change("s1", path).unwrap());
        }
    });

    let session = ctx.tracker().get("s1").unwrap();
    assert_eq!(session.files.len(), 8);
    assert_eq!(session.metrics().lines_added, (1..=8).sum::<u64>());

    clock.advance_minutes(5);
    let report = ctx.tracker().end("s1").unwrap();
    assert_eq!(report.metrics.files_modified, 8);
    assert_eq!(ctx.tracker().get("s1").unwrap().status, SessionStatus::Ended);
}

#[test]
fn test_parallel_sessions_and_appends() {
    let workspace = TestWorkspace::empty().unwrap();
    let repo = ScriptedRepo::new();
    let clock = MockClock::new();
    let ctx = workspace.open(&repo, &clock).unwrap();

    thread::scope(|scope| {
        for worker in 0..4 {
            let ctx = &ctx;
            scope.spawn(move || {
                let id = format!("s{}", worker);
                ctx.tracker().start(&id, "ada", "claude").unwrap();
                for _ in 0..10 {
                    ctx.store()
                        .append(NewUsageEvent::new(format!("tool{}", worker), "ada"))
                        .unwrap();
                }
                ctx.tracker().end(&id).unwrap();
            });
        }
    });

    assert_eq!(ctx.tracker().list().len(), 4);
    assert_eq!(ctx.store().query(DateRange::All).len(), 44);

    let snapshot = ctx.store().snapshot();
    let daily_events: u64 = snapshot.aggregates.daily.values().map(|d| d.events).sum();
    assert_eq!(daily_events, 44);
    assert_eq!(snapshot.aggregates.tools["claude"].events, 4);
}

#[test]
fn test_concurrent_duplicate_start_admits_one() {
    let workspace = TestWorkspace::empty().unwrap();
    let repo = ScriptedRepo::new();
    let clock = MockClock::new();
    let ctx = workspace.open(&repo, &clock).unwrap();

    let successes: usize = thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let ctx = &ctx;
                scope.spawn(move || ctx.tracker().start("shared", "ada", "cursor").is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum()
    });

    assert_eq!(successes, 1);
    assert_eq!(ctx.tracker().list().len(), 1);
}
