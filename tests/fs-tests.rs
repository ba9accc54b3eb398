use std::convert::{TryFrom, TryInto};

use ocflcore::{Diff, InventoryPath, ObjectVersionId, RocflError, VersionNum};

mod common;

use common::*;

#[test]
fn put_object_creates_new_object() {
    let (_root, repo) = new_repo();

    let details = repo
        .put_object(
            "o1",
            reader("hello world"),
            "file1.txt",
            commit_meta("initial commit"),
            write_opts(),
        )
        .unwrap();

    assert_eq!(details.id, "o1");
    assert_eq!(details.version_details.version_num, VersionNum::try_from(1).unwrap());

    let object = repo.get_object(&ObjectVersionId::head("o1")).unwrap();
    assert_eq!(object.state.len(), 1);
    assert!(object.state.keys().any(|p| p.as_str() == "file1.txt"));
}

#[test]
fn put_object_on_existing_id_adds_new_version() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("v1"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    let details = repo
        .put_object("o1", reader("v2"), "b.txt", commit_meta("v2"), write_opts())
        .unwrap();

    assert_eq!(details.version_details.version_num, VersionNum::try_from(2).unwrap());

    let object = repo.get_object(&ObjectVersionId::head("o1")).unwrap();
    assert_eq!(object.state.len(), 2);
}

#[test]
fn update_object_adds_removes_and_renames_files() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "keep.txt", commit_meta("v1"), write_opts())
        .unwrap();
    repo.update_object("o1", None, commit_meta("v1.5"), write_opts(), |updater| {
        updater.add_file(reader("two"), "drop.txt".try_into()?, false)
    })
    .unwrap();

    repo.update_object("o1", None, commit_meta("v2"), write_opts(), |updater| {
        updater.remove_file(&"drop.txt".try_into()?)?;
        updater.rename_file(&"keep.txt".try_into()?, "kept.txt".try_into()?, false)?;
        Ok(())
    })
    .unwrap();

    let object = repo.get_object(&ObjectVersionId::head("o1")).unwrap();
    let paths: Vec<&str> = object.state.keys().map(|p| p.as_str()).collect();
    assert_eq!(paths, vec!["kept.txt"]);
}

#[test]
fn update_object_rejects_stale_base_version() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();

    let result = repo.update_object(
        "o1",
        Some(VersionNum::try_from(1).unwrap()),
        commit_meta("v2"),
        write_opts(),
        |updater| updater.add_file(reader("two"), "b.txt".try_into()?, false),
    );
    assert!(result.is_ok());

    // Now the head has moved to v2; a commit still pinned to v1 must be rejected.
    let result = repo.update_object(
        "o1",
        Some(VersionNum::try_from(1).unwrap()),
        commit_meta("v3"),
        write_opts(),
        |updater| updater.add_file(reader("three"), "c.txt".try_into()?, false),
    );

    assert!(matches!(result, Err(RocflError::OutOfSync { .. })));
}

#[test]
fn add_file_without_overwrite_fails_on_conflict() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();

    let result = repo.put_object("o1", reader("two"), "a.txt", commit_meta("v2"), write_opts());
    assert!(matches!(result, Err(RocflError::Overwrite { .. })));

    let details = repo
        .put_object(
            "o1",
            reader("two"),
            "a.txt",
            commit_meta("v2"),
            write_opts().overwrite(true),
        )
        .unwrap();
    assert_eq!(details.version_details.version_num, VersionNum::try_from(2).unwrap());
}

#[test]
fn diff_reports_adds_and_deletes() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    repo.update_object("o1", None, commit_meta("v2"), write_opts(), |updater| {
        updater.remove_file(&"a.txt".try_into()?)?;
        updater.add_file(reader("two"), "b.txt".try_into()?, false)
    })
    .unwrap();

    let mut diff = repo
        .diff("o1", None, VersionNum::try_from(2).unwrap())
        .unwrap();
    diff.sort_unstable_by_key(|d| d.path().as_str().to_string());

    assert_eq!(diff.len(), 2);
    assert!(matches!(&diff[0], Diff::Added(p) if p.as_str() == "b.txt"));
    assert!(matches!(&diff[1], Diff::Deleted(p) if p.as_str() == "a.txt"));
}

#[test]
fn describe_version_lists_every_version_in_order() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    repo.put_object("o1", reader("two"), "b.txt", commit_meta("v2"), write_opts())
        .unwrap();

    let versions = repo.describe_version("o1").unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version_num, VersionNum::try_from(1).unwrap());
    assert_eq!(versions[1].version_num, VersionNum::try_from(2).unwrap());
}

#[test]
fn file_change_history_skips_unchanged_versions() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    repo.put_object("o1", reader("unrelated"), "b.txt", commit_meta("v2"), write_opts())
        .unwrap();
    repo.put_object(
        "o1",
        reader("one-changed"),
        "a.txt",
        commit_meta("v3"),
        write_opts().overwrite(true),
    )
    .unwrap();

    let history = repo.file_change_history("o1", "a.txt").unwrap();
    let nums: Vec<u32> = history.iter().map(|v| v.version_num.number).collect();
    assert_eq!(nums, vec![1, 3]);
}

#[test]
fn list_object_ids_filters_by_glob() {
    let (_root, repo) = new_repo();

    repo.put_object("foo-1", reader("a"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    repo.put_object("foo-2", reader("b"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    repo.put_object("bar-1", reader("c"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();

    let mut ids: Vec<String> = repo.list_object_ids(Some("foo-*")).unwrap().collect();
    ids.sort();
    assert_eq!(ids, vec!["foo-1".to_string(), "foo-2".to_string()]);
}

#[test]
fn contains_object_reflects_existence() {
    let (_root, repo) = new_repo();

    assert!(!repo.contains_object("o1").unwrap());
    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    assert!(repo.contains_object("o1").unwrap());
}

#[test]
fn purge_object_removes_it_entirely() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    assert!(repo.contains_object("o1").unwrap());

    repo.purge_object("o1").unwrap();
    assert!(!repo.contains_object("o1").unwrap());

    // A no-op the second time.
    repo.purge_object("o1").unwrap();
}

#[test]
fn get_object_for_missing_id_is_not_found() {
    let (_root, repo) = new_repo();
    let result = repo.get_object(&ObjectVersionId::head("bogus"));
    assert!(matches!(result, Err(RocflError::NotFound { .. })));
}

#[test]
fn rollback_to_version_discards_later_versions() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    repo.put_object("o1", reader("two"), "b.txt", commit_meta("v2"), write_opts())
        .unwrap();
    repo.put_object("o1", reader("three"), "c.txt", commit_meta("v3"), write_opts())
        .unwrap();

    repo.rollback_to_version("o1", VersionNum::try_from(1).unwrap())
        .unwrap();

    let versions = repo.describe_version("o1").unwrap();
    assert_eq!(versions.len(), 1);

    let object = repo.get_object(&ObjectVersionId::head("o1")).unwrap();
    let paths: Vec<&str> = object.state.keys().map(|p| p.as_str()).collect();
    assert_eq!(paths, vec!["a.txt"]);
}

#[test]
fn replicate_version_as_head_preserves_history() {
    let (_root, repo) = new_repo();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    repo.put_object("o1", reader("two"), "b.txt", commit_meta("v2"), write_opts())
        .unwrap();

    let details = repo
        .replicate_version_as_head("o1", VersionNum::try_from(1).unwrap(), commit_meta("revert to v1"))
        .unwrap();

    assert_eq!(details.version_details.version_num, VersionNum::try_from(3).unwrap());

    let versions = repo.describe_version("o1").unwrap();
    assert_eq!(versions.len(), 3);

    let object = repo.get_object(&ObjectVersionId::head("o1")).unwrap();
    let paths: Vec<&str> = object.state.keys().map(|p| p.as_str()).collect();
    assert_eq!(paths, vec!["a.txt"]);
}

#[test]
fn export_and_import_object_round_trips() {
    let (_root, repo) = new_repo();
    let export_dir = assert_fs::TempDir::new().unwrap();

    repo.put_object("o1", reader("one"), "a.txt", commit_meta("v1"), write_opts())
        .unwrap();
    repo.put_object("o1", reader("two"), "b.txt", commit_meta("v2"), write_opts())
        .unwrap();

    repo.export_object("o1", export_dir.path()).unwrap();
    assert!(export_dir.path().join("v1").join("a.txt").exists());
    assert!(export_dir.path().join("v2").join("a.txt").exists());
    assert!(export_dir.path().join("v2").join("b.txt").exists());

    repo.import_object("o2", export_dir.path()).unwrap();

    let imported = repo.get_object(&ObjectVersionId::head("o2")).unwrap();
    let paths: Vec<&str> = imported.state.keys().map(|p| p.as_str()).collect();
    assert_eq!(paths.len(), 2);

    let versions = repo.describe_version("o2").unwrap();
    assert_eq!(versions.len(), 2);
}
