use std::time::{Duration, Instant};
use tweetprep::replace_file_atomic_backoff;

/// Replacing a path that is a directory is a permanent error on Unix: it is reported
/// right away instead of being retried with growing sleeps.
#[cfg(unix)]
#[test]
fn permanent_errors_are_not_retried() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("part.inprogress");
    std::fs::write(&src, b"x").unwrap();
    let dest = tmp.path().join("taken");
    std::fs::create_dir(&dest).unwrap();

    let started = Instant::now();
    assert!(replace_file_atomic_backoff(&src, &dest).is_err());
    assert!(started.elapsed() < Duration::from_millis(500), "took {:?}", started.elapsed());
    assert!(src.exists(), "source must be left in place");
}

#[test]
fn replaces_existing_file() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("new.inprogress");
    let dest = tmp.path().join("out.csv");
    std::fs::write(&src, b"new").unwrap();
    std::fs::write(&dest, b"old").unwrap();

    replace_file_atomic_backoff(&src, &dest).unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    assert!(!src.exists());
}
