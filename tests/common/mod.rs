#![allow(dead_code)]

use std::io::Cursor;

use assert_fs::TempDir;
use ocflcore::{CommitMeta, OcflRepo, RepoConfig, WriteOptions};

/// Opens a brand new, empty filesystem repository rooted in a fresh temp directory. The
/// directory is returned alongside the repo so it isn't dropped (and deleted) out from under
/// the caller.
pub fn new_repo() -> (TempDir, OcflRepo) {
    let root = TempDir::new().unwrap();
    let repo = OcflRepo::fs_repo(root.path(), RepoConfig::fs(root.path().to_string_lossy())).unwrap();
    (root, repo)
}

pub fn reader(content: &str) -> Cursor<Vec<u8>> {
    Cursor::new(content.as_bytes().to_vec())
}

pub fn commit_meta(message: &str) -> CommitMeta {
    CommitMeta::new()
        .with_user(Some("Peter".to_string()), Some("peter@example.com".to_string()))
        .unwrap()
        .with_message(Some(message.to_string()))
}

pub fn write_opts() -> WriteOptions {
    WriteOptions::new()
}
