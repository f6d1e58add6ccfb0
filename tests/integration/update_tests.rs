use filetime::{set_file_mtime, FileTime};
use hashstat::cache::Cache;
use hashstat::progress::Progress;
use hashstat::runner::{UpdateOptions, UpdateRunner};
use hashstat::scanner::{Algorithm, Walker};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_touched_file_is_rehashed_others_skipped() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, b"x").unwrap();
    fs::write(&b, b"y").unwrap();
    let cache_path = dir.path().join("sums.cache");

    let cache = Cache::open(&cache_path, false).unwrap();
    UpdateRunner::new(Some(cache), UpdateOptions::default(), Vec::new())
        .run(&[a.clone(), b.clone()])
        .unwrap();

    // Same content, new mtime
    set_file_mtime(&a, FileTime::from_unix_time(946_684_800, 0)).unwrap();

    let cache = Cache::open(&cache_path, false).unwrap();
    let mut runner = UpdateRunner::new(Some(cache), UpdateOptions::default(), Vec::new());
    let summary = runner.run(&[a.clone(), b.clone()]).unwrap();
    assert_eq!(summary.refreshed, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.hashed, 1);

    let entry = runner.cache().unwrap().get(&a).unwrap();
    assert_eq!(entry.mtime().as_millis(), 946_684_800_000);
    assert_eq!(entry.digest(), "9dd4e461268c8034f5c8564e155c67a6");
}

#[test]
fn test_recursive_walk_feeds_update() {
    let dir = tempdir().unwrap();
    let tree = dir.path().join("tree");
    fs::create_dir_all(tree.join("sub")).unwrap();
    fs::write(tree.join("b.txt"), b"y").unwrap();
    fs::write(tree.join("sub").join("a.txt"), b"x").unwrap();

    let files = Walker::new(vec![tree.clone()]).recursive(true).files();
    assert_eq!(files.len(), 2);

    let cache = Cache::open(dir.path().join("sums.cache"), false).unwrap();
    let options = UpdateOptions {
        algorithm: Algorithm::Sha256,
    };
    let mut runner = UpdateRunner::new(Some(cache), options, Vec::new());
    let summary = runner.run(&files).unwrap();
    assert_eq!(summary.added, 2);

    let cache = runner.into_cache().unwrap();
    assert!(cache
        .entries()
        .all(|e| e.algorithm() == Algorithm::Sha256 && e.digest().len() == 64));
}

#[test]
fn test_directory_without_recursion_is_skipped() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("a.txt");
    fs::write(&file, b"x").unwrap();

    let files = Walker::new(vec![dir.path().to_path_buf(), file.clone()]).files();
    assert_eq!(files, vec![file]);
}

#[test]
fn test_progress_sees_hashed_bytes() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, b"hello world").unwrap();

    let progress = Arc::new(Progress::new(true));
    let cache = Cache::open(dir.path().join("sums.cache"), false).unwrap();
    let mut runner = UpdateRunner::new(Some(cache), UpdateOptions::default(), Vec::new())
        .with_progress(progress.clone());
    let summary = runner.run(&[a]).unwrap();

    assert_eq!(summary.bytes_hashed, 11);
    assert_eq!(progress.hashed_bytes(), 11);
}

#[test]
fn test_listing_output_is_valid_check_input() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, b"x").unwrap();

    let mut out = Vec::new();
    UpdateRunner::new(
        None,
        UpdateOptions {
            algorithm: Algorithm::Sha1,
        },
        &mut out,
    )
    .run(&[a.clone()])
    .unwrap();

    let text = String::from_utf8(out).unwrap();
    let record = hashstat::cache::Record::parse(text.trim_end()).unwrap();
    assert_eq!(record.path(), a.as_path());
    assert!(!record.has_stat());
    assert!(text.starts_with("11f6ad8ec52a2984abaafd7c3b516503785c2072  "));
}

#[test]
fn test_recursive_update_with_cache_inside_tree_settles() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"x").unwrap();
    fs::write(dir.path().join("b.txt"), b"y").unwrap();
    let cache_path = dir.path().join("sums.cache");

    let mut snapshots = Vec::new();
    let mut summaries = Vec::new();
    for _ in 0..3 {
        let cache = Cache::open(&cache_path, false).unwrap();
        let files = Walker::new(vec![dir.path().to_path_buf()])
            .recursive(true)
            .exclude([cache.path(), cache.lock().path()])
            .files();
        let summary = UpdateRunner::new(Some(cache), UpdateOptions::default(), Vec::new())
            .run(&files)
            .unwrap();
        summaries.push(summary);
        snapshots.push(fs::read(&cache_path).unwrap());
    }

    assert_eq!(summaries[0].added, 2);
    for summary in &summaries[1..] {
        assert_eq!(summary.added, 0);
        assert_eq!(summary.refreshed, 0);
        assert_eq!(summary.hashed, 0);
        assert!(!summary.saved);
    }
    assert_eq!(snapshots[1], snapshots[2]);
    assert_eq!(
        Cache::open(&cache_path, true).unwrap().len(),
        2,
        "cache and lock file must not be cached"
    );
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_file_name_is_not_rehashed() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let file = dir.path().join(OsStr::from_bytes(b"caf\xe9.txt"));
    fs::write(&file, b"x").unwrap();
    let cache_path = dir.path().join("sums.cache");

    for expected_hashed in [1, 0] {
        let cache = Cache::open(&cache_path, false).unwrap();
        let mut runner = UpdateRunner::new(Some(cache), UpdateOptions::default(), Vec::new());
        let summary = runner.run(&[file.clone()]).unwrap();
        assert_eq!(summary.hashed, expected_hashed);
    }

    let cache = Cache::open(&cache_path, true).unwrap();
    assert!(cache.contains(&file));
}
