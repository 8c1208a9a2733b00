//! Live event watcher against the real OS backend

use crate::fixtures::{wait_for, write_file_sync};
use fim::monitor::watcher::{EventWatcher, WatchSettings};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(10);

fn log_text(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

fn count_lines(path: &Path, needle: &str) -> usize {
    log_text(path).lines().filter(|line| line.contains(needle)).count()
}

fn watcher_for(temp_dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf, EventWatcher) {
    let watched = temp_dir.path().join("watched");
    fs::create_dir_all(&watched).unwrap();
    let watched = watched.canonicalize().unwrap();
    let log = temp_dir.path().join("logs/events.txt");
    let watcher = EventWatcher::new(watched.clone(), log.clone(), WatchSettings::default());
    (watched, log, watcher)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn created_file_is_logged() {
    let temp_dir = TempDir::new().unwrap();
    let (watched, log, mut watcher) = watcher_for(&temp_dir);

    watcher.start().await.unwrap();
    assert!(watcher.is_active());
    write_file_sync(watched.join("new.txt"), b"payload").unwrap();

    let seen = wait_for(WAIT, || {
        log_text(&log)
            .lines()
            .any(|line| line.contains("File Created") && line.contains("new.txt"))
    })
    .await;
    watcher.stop().await;

    assert!(seen, "log was: {}", log_text(&log));
    let line = log_text(&log).lines().next().unwrap().to_string();
    assert!(line.starts_with('['), "audit line format: {line}");
    assert_eq!(line.matches(" - ").count(), 3, "audit line format: {line}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nothing_is_logged_after_stop() {
    let temp_dir = TempDir::new().unwrap();
    let (watched, log, mut watcher) = watcher_for(&temp_dir);

    watcher.start().await.unwrap();
    write_file_sync(watched.join("before.txt"), b"1").unwrap();
    assert!(wait_for(WAIT, || log_text(&log).contains("before.txt")).await);

    watcher.stop().await;
    assert!(!watcher.is_active());
    let frozen = log_text(&log);

    write_file_sync(watched.join("after.txt"), b"2").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(log_text(&log), frozen);
    assert!(!frozen.contains("after.txt"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restarting_does_not_duplicate_events() {
    let temp_dir = TempDir::new().unwrap();
    let (watched, log, mut watcher) = watcher_for(&temp_dir);

    watcher.start().await.unwrap();
    watcher.start().await.unwrap();
    fs::create_dir(watched.join("once")).unwrap();

    assert!(wait_for(WAIT, || log_text(&log).contains("Directory Created")).await);
    // Give a duplicate logger time to show up if one existed.
    tokio::time::sleep(Duration::from_millis(500)).await;
    watcher.stop().await;

    assert_eq!(count_lines(&log, "Directory Created"), 1, "log: {}", log_text(&log));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rename_inside_tree_is_one_moved_event() {
    let temp_dir = TempDir::new().unwrap();
    let (watched, log, mut watcher) = watcher_for(&temp_dir);
    write_file_sync(watched.join("old.txt"), b"data").unwrap();

    watcher.start().await.unwrap();
    fs::rename(watched.join("old.txt"), watched.join("new.txt")).unwrap();

    let seen = wait_for(WAIT, || log_text(&log).contains("File Moved")).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    watcher.stop().await;

    assert!(seen, "log: {}", log_text(&log));
    assert_eq!(count_lines(&log, "File Moved"), 1);
    let moved = log_text(&log)
        .lines()
        .find(|line| line.contains("File Moved"))
        .unwrap()
        .to_string();
    assert!(moved.contains("old.txt -> "), "{moved}");
    assert!(moved.ends_with("new.txt"), "{moved}");
}

#[tokio::test]
async fn stop_without_start_is_harmless() {
    let temp_dir = TempDir::new().unwrap();
    let (_, log, mut watcher) = watcher_for(&temp_dir);

    watcher.stop().await;
    watcher.stop().await;

    assert!(!watcher.is_active());
    assert!(!log.exists());
}

#[tokio::test]
async fn missing_directory_fails_setup() {
    let temp_dir = TempDir::new().unwrap();
    let mut watcher = EventWatcher::new(
        temp_dir.path().join("missing"),
        temp_dir.path().join("events.txt"),
        WatchSettings::default(),
    );

    let err = watcher.start().await.unwrap_err();

    assert!(matches!(err, fim::Error::WatchSetup { .. }), "got {err:?}");
    assert!(!watcher.is_active());
}
