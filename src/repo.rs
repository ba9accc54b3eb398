//! The top-level entry point for opening and operating on an OCFL repository: wires together
//! a storage backend, a lock manager, and an object-details cache, and exposes the commit
//! protocol every write operation goes through.

use std::convert::TryInto;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use log::info;
#[cfg(feature = "s3")]
use rusoto_core::Region;

use crate::config::{RepoConfig, StorageConfig};
use crate::details::{DetailsStore, MemDetailsStore, ObjectDetailsRecord};
use crate::digest::DigestAlgorithm;
use crate::error::{not_found, Result, RocflError};
use crate::inventory::Inventory;
use crate::lock::LockManager;
use crate::mutable_head::MutableHeadCommitter;
use crate::paths;
use crate::spec_version::SpecVersion;
use crate::store::fs::FsOcflStore;
use crate::store::layout::StorageLayout;
#[cfg(feature = "s3")]
use crate::store::s3::S3OcflStore;
use crate::store::{IncrementalValidator, ObjectValidationResult, OcflStore};
use crate::types::{
    CommitMeta, Diff, InventoryPath, LogicalPath, ObjectVersion, ObjectVersionDetails,
    VersionDetails, VersionNum, VersionRef,
};
use crate::updater::{IdentityMapper, InventoryUpdater};
use crate::util;

/// Identifies an object, and optionally a specific version of it. Most operations that act on
/// a specific object version take one of these rather than a bare object id plus an
/// `Option<VersionNum>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectVersionId {
    object_id: String,
    version_num: Option<VersionNum>,
}

impl ObjectVersionId {
    /// Identifies an object's HEAD version.
    pub fn head(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            version_num: None,
        }
    }

    /// Identifies a specific version of an object.
    pub fn version(object_id: impl Into<String>, version_num: VersionNum) -> Self {
        Self {
            object_id: object_id.into(),
            version_num: Some(version_num),
        }
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn version_num(&self) -> Option<VersionNum> {
        self.version_num
    }
}

impl From<&str> for ObjectVersionId {
    fn from(object_id: &str) -> Self {
        Self::head(object_id)
    }
}

impl From<String> for ObjectVersionId {
    fn from(object_id: String) -> Self {
        Self::head(object_id)
    }
}

impl From<&String> for ObjectVersionId {
    fn from(object_id: &String) -> Self {
        Self::head(object_id.clone())
    }
}

/// Flags controlling how a write operation resolves conflicts with what is already in an
/// object. The defaults match the strictest behavior: nothing is overwritten and the result is
/// validated before it is committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    overwrite: bool,
    move_source: bool,
    no_validation: bool,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow the write to replace a logical path that already exists at the destination.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Move (rename) the source file into the object's staging area instead of copying its
    /// bytes. Only meaningful for operations that read from the local filesystem.
    pub fn move_source(mut self, move_source: bool) -> Self {
        self.move_source = move_source;
        self
    }

    /// Skip validating the object's inventory before it is committed.
    pub fn no_validation(mut self, no_validation: bool) -> Self {
        self.no_validation = no_validation;
        self
    }
}

/// Interface for interacting with an OCFL repository: its object engine, storage backend, and
/// commit protocol.
pub struct OcflRepo {
    store: Box<dyn OcflStore + Sync + Send>,
    lock_manager: LockManager,
    details_store: MemDetailsStore,
    config: RepoConfig,
    work_root: PathBuf,
    closed: AtomicBool,
}

impl OcflRepo {
    /// Opens (or, if the storage root is empty, initializes) a filesystem-backed repository.
    pub fn fs_repo(storage_root: impl AsRef<Path>, config: RepoConfig) -> Result<Self> {
        config.validate()?;

        if !matches!(config.storage, StorageConfig::Fs { .. }) {
            return Err(RocflError::Config(
                "fs_repo requires a StorageConfig::Fs configuration".to_string(),
            ));
        }

        let storage_root = storage_root.as_ref();

        let store: Box<dyn OcflStore + Sync + Send> = if repo_root_initialized(storage_root)? {
            Box::new(FsOcflStore::new(storage_root)?)
        } else {
            let layout = build_storage_layout(&config)?;
            Box::new(FsOcflStore::init(storage_root, SpecVersion::Ocfl1_1, layout)?)
        };

        Self::assemble(store, storage_root, config)
    }

    /// Opens (or, if the bucket/prefix is empty, initializes) an S3-backed repository.
    /// `local_staging_root` is a local filesystem directory used to stage writes and hold the
    /// lock manager's lock files; it does not itself hold any part of the repository.
    #[cfg(feature = "s3")]
    pub fn s3_repo(local_staging_root: impl AsRef<Path>, config: RepoConfig) -> Result<Self> {
        config.validate()?;

        let (bucket, region_name, endpoint, prefix, profile) = match &config.storage {
            StorageConfig::S3 {
                bucket,
                region,
                endpoint,
                prefix,
                profile,
            } => (
                bucket.as_str(),
                region.as_str(),
                endpoint.as_deref(),
                prefix.as_deref(),
                profile.as_deref(),
            ),
            StorageConfig::Fs { .. } => {
                return Err(RocflError::Config(
                    "s3_repo requires a StorageConfig::S3 configuration".to_string(),
                ));
            }
        };

        let region = match endpoint {
            Some(endpoint) => Region::Custom {
                name: region_name.to_string(),
                endpoint: endpoint.to_string(),
            },
            None => Region::from_str(region_name)?,
        };

        let store: Box<dyn OcflStore + Sync + Send> =
            match S3OcflStore::new(region.clone(), bucket, prefix, profile) {
                Ok(store) => Box::new(store),
                Err(RocflError::NotFound { .. }) => {
                    let layout = build_storage_layout(&config)?;
                    Box::new(S3OcflStore::init(region, bucket, prefix, layout, profile)?)
                }
                Err(e) => return Err(e),
            };

        Self::assemble(store, local_staging_root.as_ref(), config)
    }

    fn assemble(
        store: Box<dyn OcflStore + Sync + Send>,
        local_root: &Path,
        config: RepoConfig,
    ) -> Result<Self> {
        let locks_root = paths::locks_root_path(local_root);
        fs::create_dir_all(&locks_root)?;

        Ok(Self {
            store,
            lock_manager: LockManager::file_backed(locks_root, config.lock_timeout()),
            details_store: MemDetailsStore::with_timeout(config.lock_timeout()),
            work_root: paths::work_root_path(local_root),
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// The configuration this repository was opened with.
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Instructs the repo to gracefully stop any in-flight work and not accept any additional
    /// requests.
    pub fn close(&self) {
        info!("Closing OCFL repository");
        self.closed.store(true, Ordering::Release);
        self.store.close();
    }

    /// Drops any cached details this repository holds for `object_id`. The next lookup for the
    /// object re-derives them from its inventory.
    pub fn invalidate_cache(&self, object_id: &str) -> Result<()> {
        self.details_store.remove(object_id)
    }

    /// Returns `true` if an object with the given id exists.
    pub fn contains_object(&self, object_id: &str) -> Result<bool> {
        self.ensure_open()?;

        match self.store.get_inventory(object_id) {
            Ok(_) => Ok(true),
            Err(RocflError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns an iterator over the ids of every object in the repository. An optional glob
    /// pattern filters the ids that are returned.
    pub fn list_object_ids<'a>(
        &'a self,
        filter_glob: Option<&str>,
    ) -> Result<Box<dyn Iterator<Item = String> + 'a>> {
        self.ensure_open()?;

        let iter = self.store.iter_inventories(filter_glob)?;
        Ok(Box::new(iter.filter_map(|result| match result {
            Ok(inventory) => Some(inventory.id),
            Err(e) => {
                log::error!("{:#}", e);
                None
            }
        })))
    }

    /// Returns a fully materialized view of an object version, including its file listing.
    pub fn get_object(&self, object_version_id: &ObjectVersionId) -> Result<ObjectVersion> {
        self.ensure_open()?;

        let inventory = self.store.get_inventory(&object_version_id.object_id)?;
        let object_root = inventory.storage_path.clone();
        let version_ref: VersionRef = object_version_id.version_num.into();

        ObjectVersion::from_inventory(inventory, version_ref, &object_root, None, false)
    }

    /// Writes the content of a single logical path to `sink`.
    pub fn get_object_view(
        &self,
        object_version_id: &ObjectVersionId,
        logical_path: &str,
        sink: &mut dyn Write,
    ) -> Result<()> {
        self.ensure_open()?;

        let path: LogicalPath = logical_path.try_into()?;
        let version_ref: VersionRef = object_version_id.version_num.into();

        self.store
            .get_object_file(&object_version_id.object_id, &path, version_ref, sink)
    }

    /// Returns high-level details about an object version: its metadata, but not its file
    /// listing.
    pub fn describe_object(
        &self,
        object_version_id: &ObjectVersionId,
    ) -> Result<ObjectVersionDetails> {
        self.ensure_open()?;

        let inventory = self.store.get_inventory(&object_version_id.object_id)?;
        let version_ref: VersionRef = object_version_id.version_num.into();
        ObjectVersionDetails::from_inventory(inventory, version_ref)
    }

    /// Returns the metadata of every version of an object, in ascending order.
    pub fn describe_version(&self, object_id: &str) -> Result<Vec<VersionDetails>> {
        self.ensure_open()?;

        let inventory = self.store.get_inventory(object_id)?;
        Ok(inventory
            .versions
            .into_iter()
            .map(|(num, version)| VersionDetails::from_version(num, version))
            .collect())
    }

    /// Returns the metadata of every version of an object that changed the content at
    /// `logical_path`, in ascending order.
    pub fn file_change_history(
        &self,
        object_id: &str,
        logical_path: &str,
    ) -> Result<Vec<VersionDetails>> {
        self.ensure_open()?;

        let path: LogicalPath = logical_path.try_into()?;
        let inventory = self.store.get_inventory(object_id)?;

        let mut versions = Vec::new();
        let mut current_digest = None;

        for (num, version) in inventory.versions {
            match version.lookup_digest(&path) {
                Some(digest) => {
                    if current_digest.as_ref() != Some(digest) {
                        current_digest = Some(digest.clone());
                        versions.push(VersionDetails::from_version(num, version));
                    }
                }
                None => {
                    if current_digest.is_some() {
                        current_digest = None;
                        versions.push(VersionDetails::from_version(num, version));
                    }
                }
            }
        }

        if versions.is_empty() {
            return Err(not_found(&format!("{} (path {})", object_id, path), None));
        }

        Ok(versions)
    }

    /// Returns the diff between two versions of an object. If `left_version` is `None`, the
    /// diff is against the version immediately before `right_version`.
    pub fn diff(
        &self,
        object_id: &str,
        left_version: Option<VersionNum>,
        right_version: VersionNum,
    ) -> Result<Vec<Diff>> {
        self.ensure_open()?;

        self.store
            .get_inventory(object_id)?
            .diff_versions(left_version, right_version)
    }

    /// Completely removes an object from the repository. A no-op if it does not exist.
    pub fn purge_object(&self, object_id: &str) -> Result<()> {
        self.ensure_open()?;

        self.lock_manager.with_write_lock(object_id, || {
            self.store.purge_object(object_id)?;
            self.details_store.remove(object_id)
        })
    }

    /// Validates a single object and returns any problems found. `Err` is only returned for a
    /// non-validation failure, eg an I/O error.
    pub fn validate_object(
        &self,
        object_id: &str,
        fixity_check: bool,
    ) -> Result<ObjectValidationResult> {
        self.ensure_open()?;
        self.store.validate_object(object_id, fixity_check)
    }

    /// Validates the structure of the repository and every object in it. The storage root is
    /// validated immediately; the returned incremental validator lazily validates the rest.
    pub fn validate_repo(&self, fixity_check: bool) -> Result<Box<dyn IncrementalValidator + '_>> {
        self.ensure_open()?;
        self.store.validate_repo(fixity_check)
    }

    /// Creates a brand new object with a single file staged at `logical_path`, or, if
    /// `object_id` already exists, updates its HEAD version with that one file. Equivalent to
    /// opening an update, adding the one file, and committing it immediately.
    pub fn put_object(
        &self,
        object_id: &str,
        source: impl std::io::Read,
        logical_path: &str,
        version_info: CommitMeta,
        options: WriteOptions,
    ) -> Result<ObjectVersionDetails> {
        self.ensure_open()?;

        let logical_path: LogicalPath = logical_path.try_into()?;

        self.lock_manager.with_write_lock(object_id, || {
            self.commit_object(object_id, None, version_info, options, |updater| {
                updater.add_file(source, logical_path, options.overwrite)
            })
        })
    }

    /// Applies `f` to the object's HEAD version and commits the result. `base_version`, if
    /// provided, pins the commit to a specific expected HEAD; if the object has since moved
    /// past it, the commit fails with `RocflError::OutOfSync` instead of silently stacking on
    /// top of changes the caller never saw.
    pub fn update_object(
        &self,
        object_id: &str,
        base_version: Option<VersionNum>,
        version_info: CommitMeta,
        options: WriteOptions,
        f: impl FnOnce(&mut InventoryUpdater) -> Result<()>,
    ) -> Result<ObjectVersionDetails> {
        self.ensure_open()?;

        self.lock_manager
            .with_write_lock(object_id, || {
                self.commit_object(object_id, base_version, version_info, options, f)
            })
    }

    /// Makes `version_num` the object's new HEAD, as a full copy of its state, preserving
    /// every version in between. The content itself is not moved or duplicated; the new
    /// version's state simply references digests already present in the manifest.
    pub fn replicate_version_as_head(
        &self,
        object_id: &str,
        version_num: VersionNum,
        version_info: CommitMeta,
    ) -> Result<ObjectVersionDetails> {
        self.ensure_open()?;

        self.lock_manager.with_write_lock(object_id, || {
            let mut inventory = self.store.get_inventory(object_id)?;

            if inventory.mutable_head {
                return Err(RocflError::IllegalState(format!(
                    "Cannot replicate a version in object {} because it has an active mutable HEAD",
                    object_id
                )));
            }

            let replicated = inventory.get_version(version_num)?.clone_staged();
            let new_head = inventory.head.next()?;
            inventory.versions.insert(new_head, replicated);
            inventory.head = new_head;
            inventory.head_version_mut().update_meta(version_info);

            inventory.validate()?;

            let work_root = self.ensure_work_root()?;
            let staging_dir = tempfile::Builder::new()
                .prefix("replicate-")
                .tempdir_in(work_root)?;
            let version_dir = staging_dir.path().join(new_head.to_string());
            fs::create_dir_all(&version_dir)?;
            stage_inventory_files(&version_dir, &inventory)?;

            self.store.write_new_version(&mut inventory, &version_dir)?;
            self.update_details_record(&inventory, None)
        })
    }

    /// Permanently deletes every version after `version_num`, making it the object's new HEAD.
    /// The content and history of every later version is discarded; the object is rebuilt from
    /// scratch out of the versions that remain.
    pub fn rollback_to_version(&self, object_id: &str, version_num: VersionNum) -> Result<()> {
        self.ensure_open()?;

        self.lock_manager.with_write_lock(object_id, || {
            let inventory = self.store.get_inventory(object_id)?;

            if inventory.mutable_head {
                return Err(RocflError::IllegalState(format!(
                    "Cannot roll back object {} because it has an active mutable HEAD",
                    object_id
                )));
            }

            inventory.get_version(version_num)?;

            if inventory.head == version_num {
                return Ok(());
            }

            let digest_algorithm = inventory.digest_algorithm;
            let content_dir = inventory.defaulted_content_dir().to_string();

            let mut retained: Vec<VersionNum> = inventory
                .versions
                .keys()
                .copied()
                .filter(|v| *v <= version_num)
                .collect();
            retained.sort();

            let work_root = self.ensure_work_root()?;
            let export_root = tempfile::Builder::new()
                .prefix("rollback-export-")
                .tempdir_in(&work_root)?;

            for v in &retained {
                self.export_version(
                    &ObjectVersionId::version(object_id, *v),
                    export_root.path().join(v.to_string()),
                )?;
            }

            self.store.purge_object(object_id)?;
            self.details_store.remove(object_id)?;

            for v in &retained {
                self.import_version_unlocked(
                    object_id,
                    &export_root.path().join(v.to_string()),
                    digest_algorithm,
                    &content_dir,
                    CommitMeta::new(),
                )?;
            }

            Ok(())
        })
    }

    /// Copies a single version of an object onto the local filesystem at `destination`, laid
    /// out as its logical paths.
    pub fn export_version(
        &self,
        object_version_id: &ObjectVersionId,
        destination: impl AsRef<Path>,
    ) -> Result<()> {
        self.ensure_open()?;

        let inventory = self.store.get_inventory(&object_version_id.object_id)?;
        let version_ref: VersionRef = object_version_id.version_num.into();
        let version_num = version_ref.resolve(inventory.head);
        let version = inventory.get_version(version_num)?;

        let destination = destination.as_ref();
        for (logical_path, _digest) in version.state_iter() {
            let dest = destination.join(logical_path.as_path());
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut sink = File::create(&dest)?;
            self.store.get_object_file(
                &object_version_id.object_id,
                logical_path,
                VersionRef::Number(version_num),
                &mut sink,
            )?;
        }

        Ok(())
    }

    /// Copies every version of an object onto the local filesystem at `destination`, one
    /// subdirectory per version, each laid out the way `export_version` lays out a single
    /// version.
    pub fn export_object(&self, object_id: &str, destination: impl AsRef<Path>) -> Result<()> {
        self.ensure_open()?;

        let inventory = self.store.get_inventory(object_id)?;
        let destination = destination.as_ref();

        for version_num in inventory.versions.keys().copied().collect::<Vec<_>>() {
            self.export_version(
                &ObjectVersionId::version(object_id, version_num),
                destination.join(version_num.to_string()),
            )?;
        }

        Ok(())
    }

    /// Imports a version previously written by `export_version` as a new version of
    /// `object_id` (or as its first version, if the object does not yet exist).
    pub fn import_version(
        &self,
        object_id: &str,
        source: impl AsRef<Path>,
        digest_algorithm: DigestAlgorithm,
        content_dir: &str,
        version_info: CommitMeta,
    ) -> Result<ObjectVersionDetails> {
        self.ensure_open()?;

        let source = source.as_ref();

        self.lock_manager.with_write_lock(object_id, || {
            self.import_version_unlocked(object_id, source, digest_algorithm, content_dir, version_info)
        })
    }

    /// Imports an entire object tree, as laid out by `export_object`, as a brand new object.
    /// The object must not already exist.
    pub fn import_object(&self, object_id: &str, source: impl AsRef<Path>) -> Result<()> {
        self.ensure_open()?;

        let source = source.as_ref();

        self.lock_manager.with_write_lock(object_id, || {
            if self.contains_object(object_id)? {
                return Err(RocflError::AlreadyExists(object_id.to_string()));
            }

            let mut version_dirs: Vec<VersionNum> = fs::read_dir(source)?
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
                .filter_map(|name| VersionNum::from_str(&name).ok())
                .collect();
            version_dirs.sort();

            if version_dirs.is_empty() {
                return Err(not_found(object_id, None));
            }

            for version_num in version_dirs {
                self.import_version_unlocked(
                    object_id,
                    &source.join(version_num.to_string()),
                    DigestAlgorithm::Sha512,
                    "content",
                    CommitMeta::new(),
                )?;
            }

            Ok(())
        })
    }

    /// The shared sequencing every object write goes through: load the current inventory
    /// (or create a fresh one, for a new object), let the caller mutate HEAD through an
    /// `InventoryUpdater`, finalize and stage it, and hand it to the storage backend. Assumes
    /// the caller already holds the object's write lock.
    fn commit_object(
        &self,
        object_id: &str,
        base_version: Option<VersionNum>,
        version_info: CommitMeta,
        options: WriteOptions,
        f: impl FnOnce(&mut InventoryUpdater) -> Result<()>,
    ) -> Result<ObjectVersionDetails> {
        let existing = self.store.get_inventory(object_id);

        let (inventory, is_new) = match existing {
            Ok(inventory) => {
                if inventory.mutable_head {
                    return self.commit_mutable_head(object_id, version_info);
                }
                (inventory, false)
            }
            Err(RocflError::NotFound { .. }) => {
                let inventory = Inventory::builder(object_id)
                    .with_digest_algorithm(self.config.digest_algorithm)
                    .with_content_directory(&self.config.content_dir)
                    .build()?;
                (inventory, true)
            }
            Err(e) => return Err(e),
        };

        if let Some(expected) = base_version {
            if !is_new && inventory.head != expected {
                return Err(RocflError::OutOfSync {
                    object_id: object_id.to_string(),
                    expected: expected.to_string(),
                    actual: inventory.head.to_string(),
                });
            }
        }

        let work_root = self.ensure_work_root()?;

        let mut updater = if is_new {
            InventoryUpdater::for_new_object(inventory, work_root, Box::new(IdentityMapper))?
        } else {
            InventoryUpdater::for_new_version(inventory, work_root, Box::new(IdentityMapper))?
        };

        f(&mut updater)?;

        let (mut new_inventory, staging_dir) = updater.build_new_inventory(None, version_info)?;

        if !options.no_validation {
            new_inventory.validate()?;
        }

        if is_new {
            stage_whole_object(&staging_dir, &mut new_inventory)?;
            self.store
                .write_new_object(&mut new_inventory, staging_dir.path(), None)?;
        } else {
            let version_num = new_inventory.head;
            let version_dir = staging_dir.path().join(version_num.to_string());
            stage_inventory_files(&version_dir, &new_inventory)?;
            self.store.write_new_version(&mut new_inventory, &version_dir)?;
        }

        self.update_details_record(&new_inventory, None)
    }

    fn commit_mutable_head(
        &self,
        object_id: &str,
        version_info: CommitMeta,
    ) -> Result<ObjectVersionDetails> {
        let inventory = self.store.get_inventory(object_id)?;
        let work_root = self.ensure_work_root()?;

        let committer = MutableHeadCommitter::new(self.store.as_ref());
        let (mut new_inventory, staging_dir) =
            committer.commit_staged_changes(inventory, &work_root, version_info, None)?;

        new_inventory.validate()?;

        let version_num = new_inventory.head;
        let version_dir = staging_dir.path().join(version_num.to_string());
        stage_inventory_files(&version_dir, &new_inventory)?;
        self.store.write_new_version(&mut new_inventory, &version_dir)?;

        self.update_details_record(&new_inventory, None)
    }

    /// Core of `import_version`, factored out so callers that already hold the object's write
    /// lock (`rollback_to_version`, `import_object`) can reuse it without re-entering the lock.
    fn import_version_unlocked(
        &self,
        object_id: &str,
        source: &Path,
        digest_algorithm: DigestAlgorithm,
        content_dir: &str,
        version_info: CommitMeta,
    ) -> Result<ObjectVersionDetails> {
        let source = source.to_path_buf();

        if self.contains_object(object_id)? {
            self.commit_object(object_id, None, version_info, WriteOptions::new(), |updater| {
                import_tree_into(updater, &source)
            })
        } else {
            let inventory = Inventory::builder(object_id)
                .with_digest_algorithm(digest_algorithm)
                .with_content_directory(content_dir)
                .build()?;

            let work_root = self.ensure_work_root()?;
            let mut updater =
                InventoryUpdater::for_new_object(inventory, work_root, Box::new(IdentityMapper))?;
            import_tree_into(&mut updater, &source)?;
            let (mut new_inventory, staging_dir) =
                updater.build_new_inventory(None, version_info)?;

            new_inventory.validate()?;
            stage_whole_object(&staging_dir, &mut new_inventory)?;
            self.store
                .write_new_object(&mut new_inventory, staging_dir.path(), None)?;

            self.update_details_record(&new_inventory, None)
        }
    }

    fn update_details_record(
        &self,
        inventory: &Inventory,
        revision_num: Option<u32>,
    ) -> Result<ObjectVersionDetails> {
        let previous = self.details_store.get(&inventory.id)?;

        let bytes = serde_json::to_vec_pretty(inventory)?;
        let digest = inventory.digest_algorithm.hash_hex(&mut bytes.as_slice())?;

        let record = ObjectDetailsRecord {
            object_id: inventory.id.clone(),
            version_num: inventory.head,
            revision_num,
            object_root_path: inventory.storage_path.clone(),
            inventory_digest: digest,
            digest_algorithm: inventory.digest_algorithm,
            inventory_bytes: Some(bytes),
            update_timestamp: Local::now(),
        };

        if previous.is_some() {
            self.details_store.update(record)?;
        } else {
            self.details_store.add(record)?;
        }

        ObjectVersionDetails::from_inventory(
            self.store.get_inventory(&inventory.id)?,
            VersionRef::Head,
        )
    }

    fn ensure_work_root(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.work_root)?;
        Ok(self.work_root.clone())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(RocflError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Writes a new object's NAMASTE file and `inventory.json`+sidecar at the object root, plus
/// their duplicate copy inside `v1`, so that `staging_dir` is a complete, final object root
/// ready for `OcflStore::write_new_object`.
fn stage_whole_object(staging_dir: &Path, inventory: &mut Inventory) -> Result<()> {
    let spec_version =
        SpecVersion::try_from_inventory_type(&inventory.type_declaration).unwrap_or(SpecVersion::Ocfl1_1);

    fs::write(
        paths::object_namaste_path(staging_dir, spec_version),
        spec_version.object_namaste().content,
    )?;

    stage_inventory_files(staging_dir, inventory)?;

    let version_dir = staging_dir.join(inventory.head.to_string());
    fs::create_dir_all(&version_dir)?;
    stage_inventory_files(&version_dir, inventory)?;

    Ok(())
}

/// Writes `inventory.json` and its sidecar digest file into `dir`.
fn stage_inventory_files(dir: &Path, inventory: &Inventory) -> Result<()> {
    fs::create_dir_all(dir)?;

    let bytes = serde_json::to_vec_pretty(inventory)?;
    let digest = inventory.digest_algorithm.hash_hex(&mut bytes.as_slice())?;

    fs::write(paths::inventory_path(dir), &bytes)?;
    fs::write(
        paths::sidecar_path(dir, inventory.digest_algorithm),
        format!("{}  inventory.json\n", digest),
    )?;

    Ok(())
}

/// Reads the storage layout a `RepoConfig` describes, if any.
fn build_storage_layout(config: &RepoConfig) -> Result<Option<StorageLayout>> {
    match config.layout_extension {
        Some(extension) => {
            let bytes = match &config.layout_config {
                Some(value) => Some(serde_json::to_vec(value)?),
                None => None,
            };
            Ok(Some(StorageLayout::new(extension, bytes.as_deref())?))
        }
        None => Ok(None),
    }
}

/// A filesystem storage root counts as already initialized once it has any content in it.
fn repo_root_initialized(storage_root: &Path) -> Result<bool> {
    Ok(storage_root.exists() && storage_root.is_dir() && !util::dir_is_empty(storage_root)?)
}

/// Walks `source` (as laid out by `export_version`) and adds every file it contains to an
/// `InventoryUpdater`'s HEAD version.
fn import_tree_into(updater: &mut InventoryUpdater, source: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(source) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let relative = pathdiff::diff_paths(entry.path(), source).unwrap();
            let logical_path: LogicalPath =
                util::convert_backslash_to_forward(&relative.to_string_lossy())
                    .to_string()
                    .try_into()?;
            let file = File::open(entry.path())?;
            updater.add_file(file, logical_path, true)?;
        }
    }
    Ok(())
}
