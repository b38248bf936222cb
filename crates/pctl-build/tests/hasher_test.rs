use std::collections::HashMap;
use std::path::Path;

use pctl_build::ContentHasher;
use tempfile::TempDir;

fn hash(context: &Path, dockerfile: &str, args: &HashMap<String, String>) -> String {
    ContentHasher::new()
        .hash_build_context(context, dockerfile, args)
        .unwrap()
}

fn write_basic_context(dir: &Path) {
    std::fs::write(dir.join("Dockerfile"), "FROM nginx:alpine\nCOPY . /srv\n").unwrap();
    std::fs::write(dir.join("index.html"), "<h1>hello</h1>\n").unwrap();
}

#[test]
fn hash_is_deterministic() {
    let tmp = TempDir::new().unwrap();
    write_basic_context(tmp.path());

    let first = hash(tmp.path(), "Dockerfile", &HashMap::new());
    let second = hash(tmp.path(), "Dockerfile", &HashMap::new());

    assert_eq!(first, second);
    assert_eq!(first.len(), 12);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn file_content_change_changes_the_hash() {
    let tmp = TempDir::new().unwrap();
    write_basic_context(tmp.path());
    let before = hash(tmp.path(), "Dockerfile", &HashMap::new());

    std::fs::write(tmp.path().join("index.html"), "<h1>changed</h1>\n").unwrap();
    let after = hash(tmp.path(), "Dockerfile", &HashMap::new());

    assert_ne!(before, after);
}

#[test]
fn new_file_changes_the_hash() {
    let tmp = TempDir::new().unwrap();
    write_basic_context(tmp.path());
    let before = hash(tmp.path(), "Dockerfile", &HashMap::new());

    std::fs::write(tmp.path().join("style.css"), "body {}\n").unwrap();
    let after = hash(tmp.path(), "Dockerfile", &HashMap::new());

    assert_ne!(before, after);
}

#[test]
fn renamed_file_changes_the_hash() {
    let tmp = TempDir::new().unwrap();
    write_basic_context(tmp.path());
    let before = hash(tmp.path(), "Dockerfile", &HashMap::new());

    std::fs::rename(
        tmp.path().join("index.html"),
        tmp.path().join("home.html"),
    )
    .unwrap();
    let after = hash(tmp.path(), "Dockerfile", &HashMap::new());

    assert_ne!(before, after);
}

#[test]
fn dockerfile_change_changes_the_hash() {
    let tmp = TempDir::new().unwrap();
    write_basic_context(tmp.path());
    let before = hash(tmp.path(), "Dockerfile", &HashMap::new());

    std::fs::write(
        tmp.path().join("Dockerfile"),
        "FROM nginx:alpine\nCOPY . /var/www\n",
    )
    .unwrap();
    let after = hash(tmp.path(), "Dockerfile", &HashMap::new());

    assert_ne!(before, after);
}

#[test]
fn build_args_change_the_hash() {
    let tmp = TempDir::new().unwrap();
    write_basic_context(tmp.path());

    let empty = hash(tmp.path(), "Dockerfile", &HashMap::new());
    let with_args = hash(
        tmp.path(),
        "Dockerfile",
        &HashMap::from([("VERSION".to_owned(), "1.0".to_owned())]),
    );
    let changed_value = hash(
        tmp.path(),
        "Dockerfile",
        &HashMap::from([("VERSION".to_owned(), "2.0".to_owned())]),
    );

    assert_ne!(empty, with_args);
    assert_ne!(with_args, changed_value);
}

#[test]
fn build_arg_order_does_not_matter() {
    let tmp = TempDir::new().unwrap();
    write_basic_context(tmp.path());

    // HashMap iteration order varies; the digest must not.
    let args = HashMap::from([
        ("A".to_owned(), "1".to_owned()),
        ("B".to_owned(), "2".to_owned()),
        ("C".to_owned(), "3".to_owned()),
    ]);

    let first = hash(tmp.path(), "Dockerfile", &args);
    for _ in 0..5 {
        assert_eq!(first, hash(tmp.path(), "Dockerfile", &args));
    }
}

#[test]
fn ignored_files_do_not_affect_the_hash() {
    let tmp = TempDir::new().unwrap();
    write_basic_context(tmp.path());
    std::fs::write(tmp.path().join(".dockerignore"), "*.log\nnode_modules/\n").unwrap();
    let before = hash(tmp.path(), "Dockerfile", &HashMap::new());

    std::fs::write(tmp.path().join("debug.log"), "noise\n").unwrap();
    std::fs::create_dir_all(tmp.path().join("node_modules/pkg")).unwrap();
    std::fs::write(tmp.path().join("node_modules/pkg/index.js"), "x\n").unwrap();
    let after = hash(tmp.path(), "Dockerfile", &HashMap::new());

    assert_eq!(before, after);
}

#[test]
fn missing_dockerfile_still_hashes_its_path() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("index.html"), "<h1>hi</h1>\n").unwrap();

    let default_name = hash(tmp.path(), "Dockerfile", &HashMap::new());
    let other_name = hash(tmp.path(), "Dockerfile.dev", &HashMap::new());

    // Neither file exists, but the declared path is part of the digest.
    assert_ne!(default_name, other_name);
}

#[test]
fn empty_dockerfile_argument_defaults_to_dockerfile() {
    let tmp = TempDir::new().unwrap();
    write_basic_context(tmp.path());

    assert_eq!(
        hash(tmp.path(), "", &HashMap::new()),
        hash(tmp.path(), "Dockerfile", &HashMap::new())
    );
}

#[test]
fn missing_context_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let result = ContentHasher::new().hash_build_context(
        &tmp.path().join("nope"),
        "Dockerfile",
        &HashMap::new(),
    );
    assert!(result.is_err());
}

/// The end-to-end scenario: fixed context, deterministic tag input.
#[test]
fn web_context_round_trip() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Dockerfile"), "FROM nginx:alpine\n").unwrap();
    std::fs::write(tmp.path().join("index.html"), "<h1>demo</h1>\n").unwrap();

    let first = hash(tmp.path(), "Dockerfile", &HashMap::new());
    let second = hash(tmp.path(), "Dockerfile", &HashMap::new());
    assert_eq!(first, second);

    std::fs::write(tmp.path().join("index.html"), "<h1>demo v2</h1>\n").unwrap();
    let third = hash(tmp.path(), "Dockerfile", &HashMap::new());
    assert_ne!(first, third);
}
