use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn hashstat(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hashstat").unwrap();
    // Keep the user's config and environment out of the run
    cmd.env("XDG_CONFIG_HOME", config_dir)
        .env("HOME", config_dir)
        .env_remove("RUST_LOG");
    for (key, _) in std::env::vars() {
        if key.starts_with("HASHSTAT_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

#[test]
fn test_update_then_check_ok() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, b"x").unwrap();
    let cache = dir.path().join("sums.cache");

    hashstat(dir.path())
        .arg("update")
        .arg("-f")
        .arg(&cache)
        .arg(&a)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    hashstat(dir.path())
        .arg("check")
        .arg("--cache")
        .arg(&cache)
        .assert()
        .code(0)
        .stdout(format!("{}: OK\n", a.display()));
}

#[test]
fn test_update_with_cache_only_refreshes_stale_entries() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, b"x").unwrap();
    let cache = dir.path().join("sums.cache");

    hashstat(dir.path())
        .args(["update", "-f"])
        .arg(&cache)
        .arg(&a)
        .assert()
        .success();

    fs::write(&a, b"xyz").unwrap();
    hashstat(dir.path())
        .arg("check")
        .arg("--cache")
        .arg(&cache)
        .assert()
        .code(2);

    hashstat(dir.path())
        .args(["update", "-f"])
        .arg(&cache)
        .assert()
        .success()
        .stderr(predicate::str::contains("1 stale entry"));

    hashstat(dir.path())
        .arg("check")
        .arg("--cache")
        .arg(&cache)
        .assert()
        .success();
}

#[test]
fn test_update_without_cache_prints_listing() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, b"x").unwrap();

    hashstat(dir.path())
        .arg("update")
        .arg(&a)
        .assert()
        .success()
        .stdout(format!("9dd4e461268c8034f5c8564e155c67a6  {}\n", a.display()));
}

#[test]
fn test_check_mismatch_exit_code() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, b"changed").unwrap();
    let listing = dir.path().join("sums.md5");
    fs::write(
        &listing,
        format!("9dd4e461268c8034f5c8564e155c67a6  {}\n", a.display()),
    )
    .unwrap();

    hashstat(dir.path())
        .arg("check")
        .arg(&listing)
        .assert()
        .code(2)
        .stdout(format!("{}: FAILED\n", a.display()))
        .stderr(predicate::str::contains("1 computed checksum did NOT match"));
}

#[test]
fn test_check_unreadable_exit_code() {
    let dir = tempdir().unwrap();
    let gone = dir.path().join("gone.txt");
    let listing = dir.path().join("sums.md5");
    fs::write(
        &listing,
        format!("9dd4e461268c8034f5c8564e155c67a6  {}\n", gone.display()),
    )
    .unwrap();

    hashstat(dir.path())
        .arg("check")
        .arg(&listing)
        .assert()
        .code(3)
        .stdout(predicate::str::contains("FAILED open or read"))
        .stderr(predicate::str::contains("1 listed file could not be read"));
}

#[test]
fn test_quiet_hides_ok_lines() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, b"x").unwrap();
    let listing = dir.path().join("sums.md5");
    fs::write(
        &listing,
        format!("9dd4e461268c8034f5c8564e155c67a6  {}\n", a.display()),
    )
    .unwrap();

    hashstat(dir.path())
        .arg("-q")
        .arg("check")
        .arg(&listing)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_malformed_listing_is_general_error() {
    let dir = tempdir().unwrap();
    let listing = dir.path().join("sums.md5");
    fs::write(&listing, "not-a-digest a.txt\n").unwrap();

    hashstat(dir.path())
        .arg("check")
        .arg(&listing)
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("[HS001] Error:"));
}

#[test]
fn test_json_errors() {
    let dir = tempdir().unwrap();

    hashstat(dir.path())
        .arg("--json-errors")
        .arg("check")
        .arg(dir.path().join("missing.md5"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("\"code\": \"HS001\""));
}

#[test]
fn test_config_file_selects_algorithm() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, b"x").unwrap();
    let config = dir.path().join("hashstat.toml");
    fs::write(&config, "algorithm = \"sha1\"\n").unwrap();

    hashstat(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("update")
        .arg(&a)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "11f6ad8ec52a2984abaafd7c3b516503785c2072  ",
        ));
}

#[test]
fn test_config_disabling_both_checks_is_an_error() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("hashstat.toml");
    fs::write(&config, "check_stat = false\ncheck_digest = false\n").unwrap();
    let listing = dir.path().join("sums.md5");
    fs::write(&listing, "").unwrap();

    hashstat(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(&listing)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Must check either digest or stat"));
}

#[test]
fn test_directory_without_recursive_counts_as_unreadable() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();

    hashstat(dir.path())
        .arg("update")
        .arg(&sub)
        .assert()
        .code(3);
}

#[test]
fn test_help_lists_subcommands() {
    let dir = tempdir().unwrap();
    hashstat(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("update").and(predicate::str::contains("check")));
}

#[test]
fn test_recursive_update_skips_its_own_cache() {
    let dir = tempdir().unwrap();
    let tree = dir.path().join("tree");
    fs::create_dir(&tree).unwrap();
    fs::write(tree.join("a.txt"), b"x").unwrap();
    let cache = tree.join("sums.cache");

    let mut snapshots = Vec::new();
    for _ in 0..3 {
        hashstat(dir.path())
            .args(["update", "-r", "-f"])
            .arg(&cache)
            .arg(&tree)
            .assert()
            .success();
        snapshots.push(fs::read_to_string(&cache).unwrap());
    }

    assert_eq!(snapshots[1], snapshots[2]);
    assert_eq!(snapshots[2].lines().count(), 1);
    assert!(!snapshots[2].contains("sums.cache"));
}

#[test]
fn test_check_of_empty_cache_warns() {
    let dir = tempdir().unwrap();

    hashstat(dir.path())
        .arg("check")
        .arg("--cache")
        .arg(dir.path().join("typo.cache"))
        .assert()
        .success()
        .stderr(predicate::str::contains("No records were checked"));
}
