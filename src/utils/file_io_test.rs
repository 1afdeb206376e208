use std::io::Write;

use super::file_io::create_parent_dir_if_not_exist;
use super::file_io::open_file_for_append;

/// Passed: "{tmp}/logs/node-1/d-elect.log"
/// Expected: "{tmp}/logs/node-1" created, file untouched
#[test]
fn test_create_parent_dir_for_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file_path = temp_dir.path().join("logs").join("node-1").join("d-elect.log");

    create_parent_dir_if_not_exist(&file_path).unwrap();

    assert!(file_path.parent().unwrap().is_dir());
    assert!(!file_path.exists());
}

#[test]
fn test_bare_file_name_has_nothing_to_create() {
    create_parent_dir_if_not_exist(std::path::Path::new("d-elect.log")).unwrap();
}

#[test]
fn test_open_file_for_append_keeps_existing_content() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file_path = temp_dir.path().join("nested").join("d-elect.log");

    let mut first = open_file_for_append(&file_path).unwrap();
    writeln!(first, "first").unwrap();
    drop(first);

    let mut second = open_file_for_append(&file_path).unwrap();
    writeln!(second, "second").unwrap();
    drop(second);

    let content = std::fs::read_to_string(&file_path).unwrap();
    assert_eq!(content, "first\nsecond\n");
}
