use hashstat::cache::{Cache, CacheError};
use tempfile::tempdir;

#[test]
fn test_two_writers_conflict() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("sums.cache");

    let _writer = Cache::open(&cache_path, false).unwrap();
    match Cache::open(&cache_path, false) {
        Err(CacheError::LockUnavailable(path)) => assert_eq!(path, cache_path),
        other => panic!("Expected lock conflict, got {other:?}"),
    }
}

#[test]
fn test_readers_coexist() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("sums.cache");

    let first = Cache::open(&cache_path, true).unwrap();
    let second = Cache::open(&cache_path, true).unwrap();
    assert!(first.is_readonly());
    assert!(second.is_readonly());
}

#[test]
fn test_writer_blocks_reader_and_reader_blocks_writer() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("sums.cache");

    {
        let _writer = Cache::open(&cache_path, false).unwrap();
        assert!(matches!(
            Cache::open(&cache_path, true),
            Err(CacheError::LockUnavailable(_))
        ));
    }
    {
        let _reader = Cache::open(&cache_path, true).unwrap();
        assert!(matches!(
            Cache::open(&cache_path, false),
            Err(CacheError::LockUnavailable(_))
        ));
    }
}

#[test]
fn test_lock_released_on_drop() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("sums.cache");

    let writer = Cache::open(&cache_path, false).unwrap();
    drop(writer);
    assert!(Cache::open(&cache_path, false).is_ok());
}
