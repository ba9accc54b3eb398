use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::consts::*;
use crate::error::{Result, RocflError};
use crate::inventory::Inventory;
use crate::{DigestAlgorithm, SpecVersion, VersionNum};

/// Returns the path to `inventory.json` within the specified directory
pub fn inventory_path<P>(dir: P) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(INVENTORY_FILE)
}

/// Returns the path to `inventory.json.ALGO` within the specified directory
pub fn sidecar_path<P>(dir: P, algorithm: DigestAlgorithm) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(sidecar_name(algorithm))
}

/// Returns the name of an inventory sidecar for the specified algorithm
pub fn sidecar_name(algorithm: DigestAlgorithm) -> String {
    format!("{}.{}", INVENTORY_FILE, algorithm)
}

/// Returns the path to an object's namaste file
pub fn object_namaste_path<P>(dir: P, version: SpecVersion) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(version.object_namaste().filename)
}

/// Returns the path to the version directory within the object root
pub fn version_path<P>(object_root: P, version_num: VersionNum) -> PathBuf
where
    P: AsRef<Path>,
{
    object_root.as_ref().join(version_num.to_string())
}

/// Returns the a version's content directory
pub fn content_path<P>(object_root: P, version_num: VersionNum, inventory: &Inventory) -> PathBuf
where
    P: AsRef<Path>,
{
    let mut version_dir = version_path(object_root, version_num);
    version_dir.push(inventory.defaulted_content_dir());
    version_dir
}

/// Returns the path to the head version's content directory
pub fn head_content_path<P>(object_root: P, inventory: &Inventory) -> PathBuf
where
    P: AsRef<Path>,
{
    content_path(object_root, inventory.head, inventory)
}

/// Returns the path to the `extensions` directory within the specified directory
pub fn extensions_path<P>(dir: P) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(EXTENSIONS_DIR)
}

/// Returns the path to the root-relative directory holding per-transaction staging work
/// directories. This is not part of the OCFL object model.
pub fn work_root_path<P>(storage_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    storage_root.as_ref().join(WORK_ROOT_DIR)
}

/// Returns the path to the root-relative directory holding the file lock manager's lock files.
pub fn locks_root_path<P>(storage_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    storage_root.as_ref().join(LOCKS_ROOT_DIR)
}

/// Returns the path to the `ocfl_layout.json`
pub fn ocfl_layout_path<P>(storage_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    storage_root.as_ref().join(OCFL_LAYOUT_FILE)
}

/// Returns the path to the OCFL root namaste file
pub fn root_namaste_path<P>(storage_root: P, version: SpecVersion) -> PathBuf
where
    P: AsRef<Path>,
{
    storage_root.as_ref().join(version.root_namaste().filename)
}

/// Returns the path to the OCFL spec file
pub fn ocfl_spec_path<P>(storage_root: P, version: SpecVersion) -> PathBuf
where
    P: AsRef<Path>,
{
    storage_root.as_ref().join(version.spec_filename())
}

/// Joins two string path parts, inserting at `/` if needed
pub fn join(part1: &str, part2: &str) -> String {
    let mut joined = match part1.ends_with('/') {
        true => part1[..part1.len() - 1].to_string(),
        false => part1.to_string(),
    };

    if !part2.is_empty() {
        if (!joined.is_empty() || part1 == "/") && !part2.starts_with('/') {
            joined.push('/');
        }
        joined.push_str(part2);
    }

    joined
}

/// Joins two string path parts, inserting at `/` if needed, and appends a `/` to the end,
/// if there is not already one
pub fn join_with_trailing_slash(part1: &str, part2: &str) -> String {
    let mut joined = join(part1, part2);

    if !joined.is_empty() && !joined.ends_with('/') {
        joined.push('/');
    }

    joined
}

/// Selects which characters a content path tail may safely contain for a given storage backend.
/// Applied on top of the structural rules every `ContentPath`/`LogicalPath` already enforces
/// (no empty segments, no `.`/`..`, no leading/trailing slash).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathConstraintProfile {
    /// No additional restrictions beyond the structural rules.
    Posix,
    /// Rejects characters and trailing dots that Windows filesystems disallow in a path
    /// segment: `< > : " | ? * \` and ASCII control characters, plus segments ending in `.`
    /// or containing only whitespace.
    Windows,
    /// The intersection of `Windows` with a conservative per-segment length limit, suitable
    /// for object-store keys that are shared across operating systems.
    Cloud,
}

static WINDOWS_ILLEGAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"|?*\x00-\x1F]"#).unwrap());

const CLOUD_MAX_SEGMENT_LEN: usize = 255;

impl PathConstraintProfile {
    /// Validates a single path segment (one component between `/`s) against this profile.
    /// Structural rules (empty, `.`, `..`) are assumed to have already been checked.
    pub fn validate_segment(&self, segment: &str) -> Result<()> {
        match self {
            PathConstraintProfile::Posix => Ok(()),
            PathConstraintProfile::Windows => Self::validate_windows_segment(segment),
            PathConstraintProfile::Cloud => {
                Self::validate_windows_segment(segment)?;
                if segment.len() > CLOUD_MAX_SEGMENT_LEN {
                    return Err(RocflError::PathConstraint {
                        path: segment.to_string(),
                        reason: format!(
                            "path segment exceeds the {} character limit",
                            CLOUD_MAX_SEGMENT_LEN
                        ),
                    });
                }
                Ok(())
            }
        }
    }

    fn validate_windows_segment(segment: &str) -> Result<()> {
        if WINDOWS_ILLEGAL.is_match(segment) {
            return Err(RocflError::PathConstraint {
                path: segment.to_string(),
                reason: "path segment contains a character reserved on Windows".to_string(),
            });
        }
        if segment.ends_with('.') || segment.ends_with(' ') {
            return Err(RocflError::PathConstraint {
                path: segment.to_string(),
                reason: "path segment may not end in a dot or space".to_string(),
            });
        }
        Ok(())
    }

    /// Validates every segment of a `/`-joined path.
    pub fn validate_path(&self, path: &str) -> Result<()> {
        for segment in path.split('/') {
            self.validate_segment(segment)?;
        }
        Ok(())
    }
}

impl Default for PathConstraintProfile {
    fn default() -> Self {
        PathConstraintProfile::Posix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_allows_anything_structurally_valid() {
        assert!(PathConstraintProfile::Posix.validate_path("a:b|c?d").is_ok());
    }

    #[test]
    fn windows_rejects_reserved_characters() {
        assert!(PathConstraintProfile::Windows
            .validate_path("a/b:c")
            .is_err());
    }

    #[test]
    fn windows_rejects_trailing_dot() {
        assert!(PathConstraintProfile::Windows.validate_segment("name.").is_err());
    }

    #[test]
    fn cloud_rejects_overlong_segment() {
        let segment = "a".repeat(CLOUD_MAX_SEGMENT_LEN + 1);
        assert!(PathConstraintProfile::Cloud.validate_segment(&segment).is_err());
    }

    #[test]
    fn cloud_accepts_normal_segment() {
        assert!(PathConstraintProfile::Cloud.validate_segment("foo.txt").is_ok());
    }
}
