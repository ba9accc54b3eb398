use std::convert::TryInto;
use std::fs;

use ocflcore::ErrorCode;

mod common;

use common::*;

#[test]
fn valid_object_has_no_problems() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    repo.update_object("o1", None, commit_meta("v2"), write_opts(), |updater| {
        updater.add_file(reader("two"), "b.txt".try_into()?, false)
    })
    .unwrap();

    let result = repo.validate_object("o1", true).unwrap();
    assert!(!result.has_errors(), "unexpected errors: {:?}", result.errors);
    assert!(!result.has_warnings(), "unexpected warnings: {:?}", result.warnings);
}

#[test]
fn validate_repo_walks_every_object() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    repo.put_object("o2", reader("two"), "b.txt", commit_meta("v1"), write_opts())
        .unwrap();

    let mut validator = repo.validate_repo(true).unwrap();
    let mut count = 0;
    while let Some(result) = validator.next() {
        let result = result.unwrap();
        assert!(!result.has_errors(), "unexpected errors: {:?}", result.errors);
        count += 1;
    }
    assert_eq!(count, 2);
}

#[test]
fn missing_sidecar_is_reported() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();

    let object = repo.get_object(&ocflcore::ObjectVersionId::head("o1")).unwrap();
    let sidecar = std::path::PathBuf::from(&object.object_root).join("inventory.json.sha512");
    fs::remove_file(&sidecar).unwrap();

    let result = repo.validate_object("o1", true).unwrap();
    assert!(result
        .errors
        .iter()
        .any(|e| e.code == ErrorCode::E058));
}

#[test]
fn corrupt_declaration_contents_is_reported() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();

    let object = repo.get_object(&ocflcore::ObjectVersionId::head("o1")).unwrap();
    let object_root = std::path::PathBuf::from(&object.object_root);
    fs::write(object_root.join("0=ocfl_object_1.1"), b"not the right content\n").unwrap();

    let result = repo.validate_object("o1", true).unwrap();
    assert!(result.errors.iter().any(|e| e.code == ErrorCode::E007));
}

#[test]
fn sidecar_digest_mismatch_is_reported() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();

    let object = repo.get_object(&ocflcore::ObjectVersionId::head("o1")).unwrap();
    let object_root = std::path::PathBuf::from(&object.object_root);
    let sidecar = object_root.join("inventory.json.sha512");
    fs::write(&sidecar, "0".repeat(128) + "  inventory.json").unwrap();

    let result = repo.validate_object("o1", true).unwrap();
    assert!(result.errors.iter().any(|e| e.code == ErrorCode::E060));
}
