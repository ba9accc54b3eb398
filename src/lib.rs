//! An engine for reading and writing [Oxford Common File Layout](https://ocfl.io) repositories.
//!
//! This crate implements the object and repository model described by the OCFL 1.0/1.1
//! specifications -- inventories, content-addressed manifests, versioning, and the storage
//! layout extensions used to map object IDs onto physical paths -- along with a transactional
//! commit protocol and a validator. It does not embed any particular storage backend beyond the
//! filesystem (and, optionally, S3); everything else -- CLIs, servers, sync daemons -- is left
//! to whatever embeds this library.
//!
//! [`OcflRepo`] is the primary entry point.

pub use self::config::{RepoConfig, StorageConfig};
pub use self::details::{DetailsStore, MemDetailsStore, ObjectDetailsRecord};
pub use self::digest::DigestAlgorithm;
pub use self::error::{Result, RocflError};
pub use self::inventory::Inventory;
pub use self::lock::{FileLockManager, LockManager, MemLockManager};
pub use self::mutable_head::MutableHeadCommitter;
pub use self::repo::{ObjectVersionId, OcflRepo, WriteOptions};
pub use self::spec_version::SpecVersion;
pub use self::store::layout::{LayoutExtensionName, StorageLayout};
pub use self::types::{
    CommitMeta, ContentPath, Diff, InventoryPath, LogicalPath, ObjectVersion,
    ObjectVersionDetails, VersionDetails, VersionNum, VersionRef,
};
pub use self::updater::{InventoryUpdater, LogicalPathMapper};
pub use self::validate::{
    ErrorCode, IncrementalValidator, ObjectValidationResult, RepoIncrementalValidator,
    ValidationError, ValidationResult, ValidationWarning, Validator, WarnCode,
};

mod bimap;
mod config;
mod consts;
mod details;
mod digest;
mod error;
mod inventory;
mod lock;
mod mutable_head;
mod paths;
mod repo;
mod serde;
mod spec_version;
mod specs;
mod store;
mod types;
mod updater;
mod util;
mod validate;
