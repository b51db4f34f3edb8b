//! Tests for `src/checkpoint.rs`.

use observer::checkpoint::Checkpoint;

#[tokio::test]
async fn missing_checkpoint_loads_empty() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let checkpoint = Checkpoint::new(tmp.path().join("saved.log"));
    assert!(checkpoint.load().await.is_empty());
}

#[tokio::test]
async fn save_then_load_keeps_lines_in_order() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let checkpoint = Checkpoint::new(tmp.path().join("saved.log"));
    let lines = vec!["first".to_owned(), String::new(), "third".to_owned()];

    checkpoint.save(&lines).await.expect("save should succeed");
    assert_eq!(checkpoint.load().await, lines);

    let raw = std::fs::read_to_string(checkpoint.path()).expect("file should exist");
    assert_eq!(raw, "first\n\nthird\n");
}

#[tokio::test]
async fn save_replaces_previous_contents() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let checkpoint = Checkpoint::new(tmp.path().join("saved.log"));

    checkpoint
        .save(&["a".to_owned(), "b".to_owned()])
        .await
        .expect("first save");
    checkpoint.save(&["c".to_owned()]).await.expect("second save");

    assert_eq!(checkpoint.load().await, vec!["c"]);
    assert!(!tmp.path().join("saved.tmp").exists(), "temp file should be renamed away");
}

#[tokio::test]
async fn save_into_missing_directory_fails() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let checkpoint = Checkpoint::new(tmp.path().join("nope").join("saved.log"));
    assert!(checkpoint.save(&["x".to_owned()]).await.is_err());
}
