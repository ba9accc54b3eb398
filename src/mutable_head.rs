//! Folds the contents of the mutable-HEAD extension into a regular version, or discards it
//! outright. Reads go through `OcflStore::get_object_file` so this works identically regardless
//! of storage backend; only the new version's content ever touches the local filesystem, staged
//! the same way `InventoryUpdater` stages a regular version.

use std::fs::{self, File};
use std::path::Path;

use chrono::{DateTime, Local};
use tempfile::TempDir;

use crate::consts::MUTABLE_HEAD_CONTENT_DIR;
use crate::error::Result;
use crate::inventory::Inventory;
use crate::store::OcflStore;
use crate::types::{CommitMeta, VersionRef};

/// Materializes a mutable-HEAD object's accumulated revisions into an ordinary version.
pub struct MutableHeadCommitter<'a> {
    store: &'a dyn OcflStore,
}

impl<'a> MutableHeadCommitter<'a> {
    pub fn new(store: &'a dyn OcflStore) -> Self {
        Self { store }
    }

    /// Rewrites `inventory`'s manifest so mutable-HEAD content paths point at the regular
    /// version they're being folded into, copies the underlying bytes into a new directory
    /// under `work_root`, and clears the inventory's mutable-HEAD flag.
    ///
    /// Returns the finished inventory and the staging directory its version content was
    /// written under; the version itself lives at `<dir>/<version_num>`, ready to hand to
    /// `OcflStore::write_new_version` once its `inventory.json` and sidecar are added.
    pub fn commit_staged_changes(
        &self,
        mut inventory: Inventory,
        work_root: impl AsRef<Path>,
        version_info: CommitMeta,
        created: Option<DateTime<Local>>,
    ) -> Result<(Inventory, TempDir)> {
        let version_num = inventory.head;
        let new_prefix = format!("{}/{}", version_num, inventory.defaulted_content_dir());

        // Every logical path live in the HEAD version, paired with the content path it
        // resolves to before the manifest gets rewritten. Needed to read the bytes back out
        // via their current (extension-relative) addressing.
        let mut sources = Vec::new();
        for (logical_path, _digest) in inventory.head_version().state_iter() {
            let content_path = inventory
                .content_path_for_logical_path(logical_path, None)?
                .as_ref()
                .clone();
            sources.push((logical_path.as_ref().clone(), content_path));
        }

        inventory.rewrite_manifest_prefix(MUTABLE_HEAD_CONTENT_DIR, &new_prefix)?;

        fs::create_dir_all(work_root.as_ref())?;
        let staging_dir = tempfile::Builder::new()
            .prefix("mhc-")
            .tempdir_in(work_root.as_ref())?;
        let version_dir = staging_dir.path().join(version_num.to_string());
        fs::create_dir_all(&version_dir)?;

        for (logical_path, old_content_path) in &sources {
            if !old_content_path.as_str().starts_with(MUTABLE_HEAD_CONTENT_DIR) {
                // Content carried over from an earlier, already-committed version; nothing to
                // move.
                continue;
            }

            let new_content_path = inventory.content_path_for_logical_path(logical_path, None)?;
            let tail = new_content_path
                .as_str()
                .strip_prefix(&format!("{}/", version_num))
                .unwrap_or(new_content_path.as_str());
            let dest = version_dir.join(tail);

            if dest.exists() {
                // Another logical path already materialized this digest's content.
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut sink = File::create(&dest)?;
            self.store
                .get_object_file(&inventory.id, logical_path, VersionRef::Head, &mut sink)?;
        }

        inventory.mutable_head = false;
        inventory.head_version_mut().update_meta(version_info);
        if let Some(created) = created {
            inventory.head_version_mut().created = created;
        }

        Ok((inventory, staging_dir))
    }

    /// Discards the mutable-HEAD extension directory entirely, abandoning every staged
    /// revision without creating a version.
    pub fn purge_staged_changes(&self, object_id: &str) -> Result<()> {
        self.store.purge_mutable_head(object_id)
    }
}
