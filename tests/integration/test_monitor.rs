//! Monitoring task registry and scheduled comparison passes

use crate::fixtures::{wait_for, write_file_sync};
use fim::io::logs::LogPaths;
use fim::monitor::scheduler::ComparisonJob;
use fim::{BuildOptions, MonitorConfig, ReportClock, TaskRegistry};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(15);

struct Setup {
    _temp_dir: TempDir,
    data: PathBuf,
    baseline: PathBuf,
    registry: TaskRegistry,
}

/// A monitored-directory candidate with one file and a saved baseline.
fn setup() -> Setup {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    write_file_sync(data.join("a.txt"), b"alpha").unwrap();
    let data = data.canonicalize().unwrap();

    let baseline = temp_dir.path().join("baseline.txt");
    let snapshot = fim::generate_baseline(&data, &BuildOptions::default()).unwrap();
    fim::save_baseline(&snapshot, &baseline).unwrap();

    let mut config = MonitorConfig::with_data_dir(temp_dir.path().join("fim"));
    config.utc_offset = Some("UTC".to_string());
    config.repeat_schedule = false;
    let registry = TaskRegistry::new(Arc::new(config)).unwrap();

    Setup {
        _temp_dir: temp_dir,
        data,
        baseline,
        registry,
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_add_for_same_directory_conflicts() {
    let s = setup();

    let first = s.registry.add_task(&s.data, &s.baseline, 4, 2).await.unwrap();
    assert!(first.running);

    let err = s
        .registry
        .add_task(s.data.join("."), &s.baseline, 2, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, fim::Error::SchedulingConflict(_)), "got {err:?}");

    let tasks = s.registry.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].regular_per_hour, 4, "existing task untouched");
    assert!(tasks[0].running);

    s.registry.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_resume_remove_lifecycle() {
    let s = setup();
    s.registry.add_task(&s.data, &s.baseline, 4, 2).await.unwrap();

    let stopped = s.registry.stop_task(&s.data).await.unwrap();
    assert!(!stopped.running);
    assert_eq!(s.registry.tasks().await.len(), 1, "stopped task stays registered");

    // A stopped task still blocks a second registration.
    let err = s.registry.add_task(&s.data, &s.baseline, 4, 2).await.unwrap_err();
    assert!(matches!(err, fim::Error::SchedulingConflict(_)));

    let resumed = s.registry.resume_task(&s.data).await.unwrap();
    assert!(resumed.running);

    let removed = s.registry.remove_task(&s.data).await.unwrap();
    assert!(!removed.running);
    assert!(s.registry.tasks().await.is_empty());

    let err = s.registry.remove_task(&s.data).await.unwrap_err();
    assert!(matches!(err, fim::Error::TaskNotFound(_)), "got {err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopped_task_runs_no_further_passes() {
    let s = setup();
    let count = |path: &Path| read(path).matches("Comparison time: ").count();

    // 3600 per hour: a checkpoint every second.
    let status = s.registry.add_task(&s.data, &s.baseline, 3600, 0).await.unwrap();
    let firing = wait_for(WAIT, || count(&status.comparison_log) >= 2).await;
    assert!(firing, "scheduler never ran two passes");

    s.registry.stop_task(&s.data).await.unwrap();
    // A pass already running when stop lands may still finish.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let after_stop = count(&status.comparison_log);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(count(&status.comparison_log), after_stop, "pass ran after stop");

    s.registry.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_creates_register_once() {
    let s = setup();

    let (a, b) = tokio::join!(
        s.registry.create_task(&s.data, 4, 2),
        s.registry.create_task(&s.data, 2, 1)
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(fim::Error::SchedulingConflict(_)))),
        "{outcomes:?}"
    );

    s.registry.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_create_leaves_stored_baseline_alone() {
    let s = setup();
    let status = s.registry.create_task(&s.data, 4, 2).await.unwrap();
    let stored = read(&status.baseline_file);

    write_file_sync(s.data.join("b.txt"), b"beta").unwrap();
    let err = s.registry.create_task(&s.data, 4, 2).await.unwrap_err();

    assert!(matches!(err, fim::Error::SchedulingConflict(_)), "got {err:?}");
    assert_eq!(read(&status.baseline_file), stored);
    assert!(!stored.contains("b.txt"));

    s.registry.shutdown().await;
}

#[tokio::test]
async fn unknown_directory_is_not_found() {
    let s = setup();

    let err = s.registry.stop_task(&s.data).await.unwrap_err();
    assert!(matches!(err, fim::Error::TaskNotFound(_)));

    let err = s.registry.resume_task(&s.data).await.unwrap_err();
    assert!(matches!(err, fim::Error::TaskNotFound(_)));
}

#[tokio::test]
async fn infeasible_schedule_registers_nothing() {
    let s = setup();

    // 60 checks per hour leave a 60 s gap; five picks need 240 s.
    let err = s.registry.add_task(&s.data, &s.baseline, 60, 5).await.unwrap_err();
    assert!(matches!(err, fim::Error::InvalidInput(_)), "got {err:?}");

    let err = s.registry.add_task(&s.data, &s.baseline, 0, 0).await.unwrap_err();
    assert!(matches!(err, fim::Error::InvalidInput(_)), "got {err:?}");

    assert!(s.registry.tasks().await.is_empty());
}

#[tokio::test]
async fn missing_baseline_file_is_rejected() {
    let s = setup();

    let err = s
        .registry
        .add_task(&s.data, s.data.join("no-such-baseline.txt"), 4, 2)
        .await
        .unwrap_err();

    assert!(matches!(err, fim::Error::InvalidInput(_)), "got {err:?}");
    assert!(s.registry.tasks().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn first_checkpoint_writes_comparison_report() {
    let s = setup();

    // One regular check per hour: the only checkpoint is "now".
    let status = s.registry.add_task(&s.data, &s.baseline, 1, 0).await.unwrap();

    let written = wait_for(WAIT, || read(&status.comparison_log).contains("Matching percentage")).await;
    s.registry.shutdown().await;

    assert!(written, "comparison log never written");
    let report = read(&status.comparison_log);
    assert!(report.starts_with("Comparison time: "), "{report}");
    assert!(report.contains("No of files matched: 1"), "{report}");
    assert!(report.contains("Matching percentage: 100%"), "{report}");

    let via_registry = s.registry.comparison_log(&s.data).await.unwrap();
    assert_eq!(via_registry.as_deref(), Some(report.as_str()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn corrupt_baseline_fails_closed() {
    let s = setup();
    fs::write(&s.baseline, "this is not a baseline report\n").unwrap();

    let status = s.registry.add_task(&s.data, &s.baseline, 1, 0).await.unwrap();

    let written = wait_for(WAIT, || read(&status.comparison_log).contains("Baseline error:")).await;
    s.registry.shutdown().await;

    assert!(written, "fail-closed report never written");
    let report = read(&status.comparison_log);
    assert!(report.contains("No of files matched: 0"), "{report}");
    assert!(report.contains("Matching percentage: 0%"), "{report}");
    assert!(report.contains("Added or modified files:"), "{report}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_task_stores_baseline_in_configured_directory() {
    let s = setup();

    let status = s.registry.create_task(&s.data, 4, 2).await.unwrap();
    let expected = LogPaths::for_directory(s.registry.config(), &s.data);

    assert_eq!(status.baseline_file, expected.baseline);
    assert!(expected.baseline.is_file());
    let index = fim::load_baseline(&expected.baseline).unwrap();
    assert_eq!(index.hashes.len(), 1);

    s.registry.shutdown().await;
    assert!(s.registry.tasks().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn event_log_is_readable_through_registry() {
    let s = setup();
    s.registry.add_task(&s.data, &s.baseline, 4, 2).await.unwrap();

    assert_eq!(s.registry.event_log(&s.data).await.unwrap(), None);
    write_file_sync(s.data.join("b.txt"), b"beta").unwrap();

    let paths = s.registry.log_paths(&s.data).unwrap();
    let seen = wait_for(WAIT, || read(&paths.event_log).contains("b.txt")).await;
    s.registry.stop_task(&s.data).await.unwrap();

    assert!(seen);
    let text = s.registry.event_log(&s.data).await.unwrap().unwrap();
    assert!(text.contains("File Created"), "{text}");
}

#[test]
fn single_pass_appends_one_report_per_run() {
    let s = setup();
    let log = s.data.parent().unwrap().join("comparisons.txt");
    let job = ComparisonJob {
        directory: s.data.clone(),
        baseline_file: s.baseline.clone(),
        comparison_log: log.clone(),
        clock: ReportClock::from_setting(Some("UTC")).unwrap(),
    };

    let first = job.run_pass().unwrap();
    write_file_sync(s.data.join("b.txt"), b"beta").unwrap();
    let second = job.run_pass().unwrap();

    assert!(first.is_clean());
    assert_eq!(second.unmatched_file_count, 1);

    let text = read(&log);
    assert_eq!(text.matches("Comparison time: ").count(), 2);
    assert!(text.contains("\n\nComparison time: "), "reports separated by a blank line");
    assert!(text.ends_with("\n\n"));
}
