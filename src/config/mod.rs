//! Everything needed to open or initialize a repository. Carries no file-loading logic of its
//! own -- whatever embeds this library is responsible for populating a `RepoConfig`, whether
//! that's from a TOML file, environment variables, or hardcoded defaults. `RepoConfig` derives
//! `serde::Deserialize` so any of those are a straightforward fit.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_CONTENT_DIR;
use crate::digest::DigestAlgorithm;
use crate::error::{Result, RocflError};
use crate::lock::DEFAULT_LOCK_TIMEOUT;
use crate::paths::PathConstraintProfile;
use crate::store::layout::LayoutExtensionName;

/// Where a repository's objects physically live.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Fs {
        root: String,
    },
    #[cfg(feature = "s3")]
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        prefix: Option<String>,
        profile: Option<String>,
    },
}

/// Parameters needed to open or initialize a repository.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    pub storage: StorageConfig,
    /// The storage layout extension new object paths are derived from. `None` means the
    /// repository has no declared layout and object root paths must be supplied explicitly.
    pub layout_extension: Option<LayoutExtensionName>,
    /// Raw JSON config for `layout_extension`, if it takes one.
    pub layout_config: Option<serde_json::Value>,
    /// Restricted to SHA-256/SHA-512 for new repositories, per the inventory invariant.
    pub digest_algorithm: DigestAlgorithm,
    /// The content sub-directory name within a version. Defaults to `content`.
    #[serde(default = "default_content_dir")]
    pub content_dir: String,
    /// How long to wait to acquire an object lock before failing with `RocflError::Lock`.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
    /// Character restrictions applied to content path segments beyond OCFL's own structural
    /// rules, chosen to match whatever the storage backend actually tolerates.
    #[serde(default)]
    pub path_constraint_profile: PathConstraintProfile,
    /// Whether a commit recomputes fixity digests by default when the caller doesn't say
    /// otherwise.
    #[serde(default)]
    pub fixity_on_commit: bool,
}

fn default_content_dir() -> String {
    DEFAULT_CONTENT_DIR.to_string()
}

fn default_lock_timeout_secs() -> u64 {
    DEFAULT_LOCK_TIMEOUT.as_secs()
}

impl RepoConfig {
    /// A config for a local filesystem repository with every other field defaulted.
    pub fn fs(root: impl Into<String>) -> Self {
        Self {
            storage: StorageConfig::Fs { root: root.into() },
            layout_extension: None,
            layout_config: None,
            digest_algorithm: DigestAlgorithm::Sha512,
            content_dir: default_content_dir(),
            lock_timeout_secs: default_lock_timeout_secs(),
            path_constraint_profile: PathConstraintProfile::default(),
            fixity_on_commit: false,
        }
    }

    /// A config for an S3-backed repository with every other field defaulted.
    #[cfg(feature = "s3")]
    pub fn s3(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            storage: StorageConfig::S3 {
                bucket: bucket.into(),
                region: region.into(),
                endpoint: None,
                prefix: None,
                profile: None,
            },
            layout_extension: None,
            layout_config: None,
            digest_algorithm: DigestAlgorithm::Sha512,
            content_dir: default_content_dir(),
            lock_timeout_secs: default_lock_timeout_secs(),
            path_constraint_profile: PathConstraintProfile::default(),
            fixity_on_commit: false,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Rejects configurations that can't possibly open a repository: an unsupported digest
    /// algorithm, an empty content directory, a zero lock timeout, or layout config supplied
    /// without a layout extension to interpret it.
    pub fn validate(&self) -> Result<()> {
        if !self.digest_algorithm.is_valid_inventory_digest() {
            return Err(RocflError::Config(format!(
                "{} is not a valid inventory digest algorithm; use sha256 or sha512",
                self.digest_algorithm
            )));
        }

        if self.content_dir.is_empty() || self.content_dir.contains('/') {
            return Err(RocflError::Config(
                "content_dir must be a single, non-empty path segment".to_string(),
            ));
        }

        if self.lock_timeout_secs == 0 {
            return Err(RocflError::Config(
                "lock_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.layout_config.is_some() && self.layout_extension.is_none() {
            return Err(RocflError::Config(
                "layout_config was provided without a layout_extension to interpret it"
                    .to_string(),
            ));
        }

        #[cfg(feature = "s3")]
        if let StorageConfig::S3 { bucket, .. } = &self.storage {
            if bucket.is_empty() {
                return Err(RocflError::Config("S3 bucket must not be empty".to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fs_config_is_valid() {
        assert!(RepoConfig::fs("/tmp/repo").validate().is_ok());
    }

    #[test]
    fn md5_is_rejected_as_inventory_digest() {
        let mut config = RepoConfig::fs("/tmp/repo");
        config.digest_algorithm = DigestAlgorithm::Md5;
        assert!(matches!(config.validate(), Err(RocflError::Config(_))));
    }

    #[test]
    fn zero_lock_timeout_is_rejected() {
        let mut config = RepoConfig::fs("/tmp/repo");
        config.lock_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(RocflError::Config(_))));
    }

    #[test]
    fn layout_config_without_extension_is_rejected() {
        let mut config = RepoConfig::fs("/tmp/repo");
        config.layout_config = Some(serde_json::json!({}));
        assert!(matches!(config.validate(), Err(RocflError::Config(_))));
    }
}
