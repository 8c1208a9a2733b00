//! Contract tests for the baseline report text format

use fim::io::report::{parse_report, render_baseline};
use fim::models::{Baseline, ErrorItem, FileRecord, FolderEntry, SubdirectoryRef};
use fim::services::clock::parse_timestamp;

const HASH_A: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
const HASH_B: &str = "486ea46224d1bb4fb680f34f7c9ad96a8f24ec88be73ea8e5a6c65260e9cb8a7";

fn sample() -> Baseline {
    let at = parse_timestamp("2024-05-01 10:00:00").unwrap();
    Baseline {
        root: "/data".to_string(),
        captured_at: at,
        folders: vec![
            FolderEntry {
                path: "/data".to_string(),
                subdirectory_count: 1,
                file_count: 1,
                files: vec![FileRecord {
                    name: "a.txt".to_string(),
                    path: "/data/a.txt".to_string(),
                    size: 5,
                    hash: HASH_A.to_string(),
                    created_at: at,
                    modified_at: at,
                }],
                subdirectories: vec![SubdirectoryRef {
                    name: "sub".to_string(),
                    path: "/data/sub".to_string(),
                }],
                errors: Vec::new(),
            },
            FolderEntry {
                path: "/data/sub".to_string(),
                subdirectory_count: 0,
                file_count: 2,
                files: vec![FileRecord {
                    name: "b.txt".to_string(),
                    path: "/data/sub/b.txt".to_string(),
                    size: 1536,
                    hash: HASH_B.to_string(),
                    created_at: at,
                    modified_at: at,
                }],
                subdirectories: Vec::new(),
                errors: vec![ErrorItem {
                    path: "/data/sub/locked".to_string(),
                    code: "EACCES".to_string(),
                    message: "Permission denied".to_string(),
                }],
            },
        ],
    }
}

#[test]
fn rendered_report_layout() {
    let text = render_baseline(&sample());

    let expected_head = "\
Folder: /data
Number of subdirectories: 1
Number of files: 1
Files:
  Name: a.txt
  Path: /data/a.txt
  Size: 5.00 B (5 B)
  Hash: 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824
  Date Created: 2024-05-01 10:00:00
  Date Modified: 2024-05-01 10:00:00
Subdirectories:
  Name: sub
  Path: /data/sub

Folder: /data/sub
";
    assert!(text.starts_with(expected_head), "{text}");
    assert!(text.contains("  Size: 1.50 KB (1536 B)\n"));
    assert!(text.contains("Unreadable:\n  EACCES: /data/sub/locked (Permission denied)\n"));
}

#[test]
fn parsed_report_keeps_folders_and_hashes() {
    let index = parse_report(&render_baseline(&sample())).unwrap();

    assert_eq!(index.folders.len(), 2);
    assert!(index.folders.contains("/data/sub"));
    assert_eq!(index.hashes.get(HASH_A).map(String::as_str), Some("/data/a.txt"));
    assert_eq!(index.hashes.get(HASH_B).map(String::as_str), Some("/data/sub/b.txt"));
}

#[test]
fn subdirectory_paths_are_not_files() {
    let index = parse_report(&render_baseline(&sample())).unwrap();

    assert!(index.hashes.values().all(|path| path != "/data/sub"));
}

#[test]
fn empty_report_is_rejected() {
    for text in ["", "\n\n   \n"] {
        let err = parse_report(text).unwrap_err();
        assert!(matches!(err, fim::Error::Parse { .. }), "{text:?}: {err:?}");
    }
}

#[test]
fn malformed_date_is_rejected() {
    let text = format!(
        "Folder: /d\nFiles:\n  Name: x\n  Path: /d/x\n  Hash: {HASH_A}\n  Date Created: yesterday\n"
    );

    let err = parse_report(&text).unwrap_err();

    assert!(matches!(err, fim::Error::Parse { line: 6, .. }), "got {err:?}");
}

#[cfg(unix)]
#[test]
fn names_with_line_breaks_stay_out_of_the_report() {
    use fim::models::BaselineIndex;
    use fim::BuildOptions;
    use std::fs;

    let temp_dir = tempfile::TempDir::new().unwrap();
    let root = temp_dir.path().join("data");
    fs::create_dir_all(root.join("x\n  Path: /etc/shadow")).unwrap();
    fs::write(root.join("ok.txt"), b"hello").unwrap();
    fs::write(root.join("evil\nname"), b"other").unwrap();

    let baseline = fim::generate_baseline(&root, &BuildOptions::default()).unwrap();
    let index = parse_report(&render_baseline(&baseline)).unwrap();

    assert_eq!(index, BaselineIndex::from_baseline(&baseline));
    assert_eq!(index.folders.len(), 1);
    assert_eq!(index.hashes.len(), 1);
    assert!(index.hashes.contains_key(HASH_A));
    assert!(index.hashes.values().all(|path| !path.contains("shadow")));

    let rejected: Vec<_> = baseline.errors().collect();
    assert_eq!(rejected.len(), 2);
    assert!(rejected.iter().all(|item| item.code == "EINVAL" && !item.path.contains('\n')));
}

#[test]
fn uppercase_hash_is_normalized() {
    let text = format!("Folder: /d\nFiles:\n  Name: x\n  Path: /d/x\n  Hash: {}\n", HASH_A.to_uppercase());

    let index = parse_report(&text).unwrap();

    assert!(index.hashes.contains_key(HASH_A));
}

#[test]
fn hash_before_any_folder_is_rejected() {
    let text = format!("  Path: /d/x\n  Hash: {HASH_A}\n");

    let err = parse_report(&text).unwrap_err();

    assert!(matches!(err, fim::Error::Parse { line: 2, .. }), "got {err:?}");
}

#[test]
fn hash_without_path_is_rejected() {
    let text = format!("Folder: /d\nFiles:\n  Name: x\n  Hash: {HASH_A}\n");

    let err = parse_report(&text).unwrap_err();

    assert!(matches!(err, fim::Error::Parse { line: 4, .. }), "got {err:?}");
}

#[test]
fn text_without_folders_is_rejected() {
    let err = parse_report("hello\nworld\n").unwrap_err();

    assert!(matches!(err, fim::Error::Parse { .. }), "got {err:?}");
}
