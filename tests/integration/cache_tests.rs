use hashstat::cache::{Cache, CacheError, Entry, ParseError};
use hashstat::runner::{UpdateOptions, UpdateRunner};
use hashstat::scanner::Algorithm;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_build_from_empty_cache_then_rebuild_is_noop() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, b"x").unwrap();
    fs::write(&b, b"y").unwrap();
    let cache_path = dir.path().join("sums.cache");
    fs::write(&cache_path, b"").unwrap();

    // Build, listing b before a
    let cache = Cache::open(&cache_path, false).unwrap();
    let mut runner = UpdateRunner::new(Some(cache), UpdateOptions::default(), Vec::new());
    let summary = runner.run(&[b.clone(), a.clone()]).unwrap();
    assert_eq!(summary.added, 2);
    assert_eq!(summary.hashed, 2);
    assert!(summary.saved);
    drop(runner);

    let first = fs::read_to_string(&cache_path).unwrap();
    let lines: Vec<&str> = first.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("9dd4e461268c8034f5c8564e155c67a6 "));
    assert!(lines[0].ends_with(&format!(" 1 {}", a.display())));
    assert!(lines[1].starts_with("415290769594460e2e485922904f345d "));
    assert!(lines[1].ends_with(&format!(" 1 {}", b.display())));

    let entry = Entry::parse(lines[0]).unwrap();
    assert_eq!(entry.algorithm(), Algorithm::Md5);
    assert_eq!(entry.size(), 1);

    // Rebuild with nothing changed
    let cache = Cache::open(&cache_path, false).unwrap();
    let mut runner = UpdateRunner::new(Some(cache), UpdateOptions::default(), Vec::new());
    let summary = runner.run(&[a, b]).unwrap();
    assert_eq!(summary.hashed, 0);
    assert_eq!(summary.unchanged, 2);
    assert!(!summary.saved);
    drop(runner);

    assert_eq!(fs::read_to_string(&cache_path).unwrap(), first);
}

#[test]
fn test_open_creates_missing_cache() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("new.cache");
    let cache = Cache::open(&cache_path, false).unwrap();
    assert!(cache.is_empty());
    assert!(cache_path.exists());
}

#[test]
fn test_corrupt_cache_is_fatal_with_line_number() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("sums.cache");
    fs::write(
        &cache_path,
        "9dd4e461268c8034f5c8564e155c67a6 1.000 1 a.txt\nabc 1.000 1 b.txt\n",
    )
    .unwrap();

    match Cache::open(&cache_path, true) {
        Err(CacheError::Parse { line, source, .. }) => {
            assert_eq!(line, 2);
            assert_eq!(source, ParseError::UnknownDigestLength { len: 3 });
        }
        other => panic!("Expected parse error, got {other:?}"),
    }
}

#[test]
fn test_cache_lines_survive_reload() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("sums.cache");
    let line = "9dd4e461268c8034f5c8564e155c67a6 1700000000.250 1 dir with spaces/a b.txt";
    fs::write(&cache_path, format!("{line}\n")).unwrap();

    {
        let cache = Cache::open(&cache_path, false).unwrap();
        assert_eq!(cache.len(), 1);
        cache.save().unwrap();
    }
    assert_eq!(fs::read_to_string(&cache_path).unwrap(), format!("{line}\n"));
}

#[test]
fn test_stale_paths_feed_update() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, b"x").unwrap();
    fs::write(&b, b"y").unwrap();
    let cache_path = dir.path().join("sums.cache");

    let mut cache = Cache::open(&cache_path, false).unwrap();
    cache.add(Entry::from_file(&a, Algorithm::Md5).unwrap());
    cache.add(Entry::from_file(&b, Algorithm::Md5).unwrap());
    fs::write(&b, b"yy").unwrap();

    let stale = cache.stale_paths();
    assert_eq!(stale, vec![b.clone()]);

    let mut runner = UpdateRunner::new(Some(cache), UpdateOptions::default(), Vec::new());
    let summary = runner.run(&stale).unwrap();
    assert_eq!(summary.refreshed, 1);
    assert_eq!(summary.hashed, 1);
    assert!(runner.cache().unwrap().stale_paths().is_empty());
}
