//! Stateful builder over an `Inventory`, scoped to a single write transaction. Owns the local
//! staging directory that content is written into before the storage backend moves it into
//! place, per the commit protocol in `store`.

use std::collections::HashSet;
use std::convert::TryInto;
use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Local};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tempfile::{NamedTempFile, TempDir};

use crate::consts::MUTABLE_HEAD_CONTENT_DIR;
use crate::digest::{DigestAlgorithm, HexDigest, MultiDigestWriter};
use crate::error::{Result, RocflError};
use crate::inventory::Inventory;
use crate::spec_version::SpecVersion;
use crate::types::{CommitMeta, ContentPath, InventoryPath, LogicalPath};

const NON_ALPHA_PLUS_SLASH: AsciiSet = NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Maps a logical path to the tail segment of the content path it is stored under.
pub trait LogicalPathMapper {
    fn map(&self, logical_path: &LogicalPath) -> String;
}

/// The logical path is used verbatim as the content path tail. The default.
pub struct IdentityMapper;

impl LogicalPathMapper for IdentityMapper {
    fn map(&self, logical_path: &LogicalPath) -> String {
        logical_path.as_str().to_string()
    }
}

/// Each path segment is percent-encoded. Useful when the storage backend's path rules are
/// stricter than what OCFL logical paths allow (eg object stores that dislike certain
/// characters in keys).
pub struct UrlEncodedMapper;

impl LogicalPathMapper for UrlEncodedMapper {
    fn map(&self, logical_path: &LogicalPath) -> String {
        logical_path
            .as_str()
            .split('/')
            .map(|segment| utf8_percent_encode(segment, &NON_ALPHA_PLUS_SLASH).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Builds the new manifest entries and physical content for a single version (or mutable-HEAD
/// revision) under construction. Every logical-path-mutating method operates on the HEAD
/// version only.
pub struct InventoryUpdater {
    inventory: Inventory,
    mapper: Box<dyn LogicalPathMapper>,
    content_path_prefix: String,
    staging_dir: TempDir,
    fixity_algorithms: Vec<DigestAlgorithm>,
}

impl InventoryUpdater {
    /// Begins a regular new version. Advances `inventory`'s HEAD, cloning over the previous
    /// version's state, same as opening a new commit for editing.
    pub fn for_new_version(
        mut inventory: Inventory,
        work_root: impl AsRef<Path>,
        mapper: Box<dyn LogicalPathMapper>,
    ) -> Result<Self> {
        inventory.create_staging_head()?;
        let prefix = format!(
            "{}/{}",
            inventory.head,
            inventory.defaulted_content_dir()
        );
        Self::new(inventory, work_root, mapper, prefix)
    }

    /// Begins a brand-new object. Unlike `for_new_version`, the inventory's HEAD is left alone --
    /// `Inventory::builder(..).build()` already stages a version at HEAD, so advancing it again
    /// here would skip straight to v2 before any content is added.
    pub fn for_new_object(
        inventory: Inventory,
        work_root: impl AsRef<Path>,
        mapper: Box<dyn LogicalPathMapper>,
    ) -> Result<Self> {
        let prefix = format!(
            "{}/{}",
            inventory.head,
            inventory.defaulted_content_dir()
        );
        Self::new(inventory, work_root, mapper, prefix)
    }

    /// Begins (or continues) a mutable-HEAD revision. `inventory`'s HEAD must already have been
    /// advanced to the version the mutable HEAD represents; `revision` is the 1-based revision
    /// number being staged.
    pub fn for_mutable_head_revision(
        inventory: Inventory,
        work_root: impl AsRef<Path>,
        mapper: Box<dyn LogicalPathMapper>,
        revision: u32,
    ) -> Result<Self> {
        let prefix = format!("{}/r{}", MUTABLE_HEAD_CONTENT_DIR, revision);
        Self::new(inventory, work_root, mapper, prefix)
    }

    fn new(
        inventory: Inventory,
        work_root: impl AsRef<Path>,
        mapper: Box<dyn LogicalPathMapper>,
        content_path_prefix: String,
    ) -> Result<Self> {
        fs::create_dir_all(work_root.as_ref())?;
        let staging_dir = tempfile::Builder::new()
            .prefix("txn-")
            .tempdir_in(work_root.as_ref())?;

        Ok(Self {
            inventory,
            mapper,
            content_path_prefix,
            staging_dir,
            fixity_algorithms: Vec::new(),
        })
    }

    /// Configures secondary digest algorithms to compute and record as fixity alongside the
    /// inventory's primary digest algorithm.
    pub fn with_fixity_algorithms(mut self, algorithms: Vec<DigestAlgorithm>) -> Self {
        self.fixity_algorithms = algorithms;
        self
    }

    /// The directory new content is being staged under. Handed to `OcflStore::write_new_version`
    /// (or `write_new_object`) once the transaction is finalized.
    pub fn staging_dir(&self) -> &Path {
        self.staging_dir.path()
    }

    /// Reads `source` to completion, adding it to the HEAD version at `logical_path`. If a file
    /// already exists at `logical_path` and `overwrite` is false, fails with
    /// `RocflError::Overwrite`; otherwise the existing entry is replaced.
    pub fn add_file(
        &mut self,
        mut source: impl Read,
        logical_path: LogicalPath,
        overwrite: bool,
    ) -> Result<()> {
        self.inventory
            .head_version()
            .validate_non_conflicting(&logical_path)?;

        if self.inventory.head_version().exists(&logical_path) {
            if !overwrite {
                return Err(RocflError::Overwrite { path: logical_path });
            }
            self.remove_from_head(&logical_path)?;
        }

        let mut algorithms = self.fixity_algorithms.clone();
        algorithms.push(self.inventory.digest_algorithm);
        algorithms.dedup();

        let scratch = NamedTempFile::new_in(self.staging_dir.path())?;
        let digests = {
            let file = scratch.reopen()?;
            let mut writer = MultiDigestWriter::new(&algorithms, file);
            io::copy(&mut source, &mut writer)?;
            writer.finalize_hex()
        };

        let mut digests = digests;
        let primary = digests
            .remove(&self.inventory.digest_algorithm)
            .ok_or_else(|| {
                RocflError::IllegalState("primary digest was not computed".to_string())
            })?;

        let content_path = if self.inventory.contains_file_id(&primary) {
            scratch.close().ok();
            self.inventory
                .content_path_for_digest(&primary, None, None)?
                .as_ref()
                .clone()
        } else {
            let tail = self.mapper.map(&logical_path);
            let content_path: ContentPath =
                format!("{}/{}", self.content_path_prefix, tail).try_into()?;
            let dest = self.staging_dir.path().join(content_path.as_path());
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            scratch.persist(&dest).map_err(|e| e.error)?;
            content_path
        };

        self.inventory
            .add_file_to_head_at(primary, logical_path, content_path.clone())?;

        for (algorithm, digest) in digests {
            self.record_fixity(algorithm, digest, &content_path);
        }

        Ok(())
    }

    /// Removes `logical_path` from the HEAD version's state. If it was also added during this
    /// transaction, its staged content is discarded too.
    pub fn remove_file(&mut self, logical_path: &LogicalPath) -> Result<()> {
        self.remove_from_head(logical_path)
    }

    fn remove_from_head(&mut self, logical_path: &LogicalPath) -> Result<()> {
        let tail = self.mapper.map(logical_path);
        let content_path: ContentPath =
            format!("{}/{}", self.content_path_prefix, tail).try_into()?;

        if let Some(removed) = self
            .inventory
            .remove_logical_path_from_head_at(logical_path, content_path)
        {
            self.discard_staged(&removed)?;
        }

        Ok(())
    }

    /// Moves `src` to `dst` within the HEAD version. `dst` is subject to the same overwrite
    /// rule as `add_file`. Returns the content paths, if any, that were removed from the
    /// manifest because they belonged only to a file `dst` just replaced.
    pub fn rename_file(
        &mut self,
        src: &LogicalPath,
        dst: LogicalPath,
        overwrite: bool,
    ) -> Result<HashSet<ContentPath>> {
        if !self.inventory.head_version().exists(src) {
            return Err(crate::error::not_found_path(
                &self.inventory.id,
                self.inventory.head,
                src,
            ));
        }

        let mut removed = HashSet::new();
        if self.inventory.head_version().exists(&dst) {
            if !overwrite {
                return Err(RocflError::Overwrite { path: dst });
            }
            if let Some(path) = self.take_removed(&dst)? {
                removed.insert(path);
            }
        }

        self.inventory.move_file_in_head(src, dst)?;
        Ok(removed)
    }

    /// Copies `src` as it existed in `src_version` to `dst` in the HEAD version. `dst` is
    /// subject to the same overwrite rule as `add_file`.
    pub fn reinstate_file(
        &mut self,
        src_version: crate::types::VersionNum,
        src: &LogicalPath,
        dst: LogicalPath,
        overwrite: bool,
    ) -> Result<HashSet<ContentPath>> {
        let mut removed = HashSet::new();
        if self.inventory.head_version().exists(&dst) {
            if !overwrite {
                return Err(RocflError::Overwrite { path: dst });
            }
            if let Some(path) = self.take_removed(&dst)? {
                removed.insert(path);
            }
        }

        self.inventory.copy_file_to_head(src_version, src, dst)?;
        Ok(removed)
    }

    fn take_removed(&mut self, logical_path: &LogicalPath) -> Result<Option<ContentPath>> {
        let tail = self.mapper.map(logical_path);
        let content_path: ContentPath =
            format!("{}/{}", self.content_path_prefix, tail).try_into()?;

        let removed = self
            .inventory
            .remove_logical_path_from_head_at(logical_path, content_path);

        if let Some(path) = &removed {
            self.discard_staged(path)?;
        }

        Ok(removed)
    }

    /// Empties the HEAD version's state without discarding any already-staged content.
    pub fn clear_state(&mut self) {
        self.inventory.head_version_mut().remove_state();
    }

    /// Empties the inventory's fixity block without discarding any already-staged content.
    pub fn clear_fixity(&mut self) {
        self.inventory.fixity = None;
    }

    /// Bumps the inventory's declared type to `target`, provided it is strictly newer than the
    /// inventory's current type. A no-op otherwise.
    pub fn upgrade_inventory(&mut self, target: SpecVersion) {
        if target.inventory_type() != self.inventory.type_declaration
            && target > current_spec_version(&self.inventory.type_declaration)
        {
            self.inventory.type_declaration = target.inventory_type().to_string();
        }
    }

    /// Finalizes the transaction: dedups any content paths that turned out to be duplicates,
    /// stamps the HEAD version's metadata, and returns the immutable `Inventory` plus the
    /// staging directory it was built in.
    pub fn build_new_inventory(
        mut self,
        created: Option<DateTime<Local>>,
        version_info: CommitMeta,
    ) -> Result<(Inventory, TempDir)> {
        for removed in self.inventory.dedup_head() {
            self.discard_staged(&removed)?;
        }

        self.inventory.head_version_mut().update_meta(version_info);
        if let Some(created) = created {
            self.inventory.head_version_mut().created = created;
        }

        Ok((self.inventory, self.staging_dir))
    }

    fn record_fixity(&mut self, algorithm: DigestAlgorithm, digest: HexDigest, content_path: &ContentPath) {
        let fixity = self.inventory.fixity.get_or_insert_with(Default::default);
        fixity
            .entry(algorithm.to_string())
            .or_insert_with(Default::default)
            .entry(digest.to_string())
            .or_insert_with(Vec::new)
            .push(content_path.as_str().to_string());
    }

    fn discard_staged(&self, content_path: &ContentPath) -> Result<()> {
        if !content_path.starts_with(&self.content_path_prefix) {
            // Belongs to an earlier version; nothing staged locally to clean up.
            return Ok(());
        }

        let staged = self.staging_dir.path().join(content_path.as_path());
        if staged.exists() {
            fs::remove_file(&staged)?;
        }
        Ok(())
    }
}

fn current_spec_version(type_declaration: &str) -> SpecVersion {
    SpecVersion::try_from_inventory_type(type_declaration).unwrap_or(SpecVersion::Ocfl1_0)
}
