pub const INVENTORY_FILE: &str = "inventory.json";
pub const INVENTORY_SIDECAR_PREFIX: &str = "inventory.json.";
pub const OCFL_LAYOUT_FILE: &str = "ocfl_layout.json";
pub const EXTENSIONS_DIR: &str = "extensions";
pub const EXTENSIONS_CONFIG_FILE: &str = "config.json";

pub const OBJECT_NAMASTE_FILE_PREFIX: &str = "0=ocfl_object_";
pub const OBJECT_NAMASTE_FILE_1_0: &str = "0=ocfl_object_1.0";
pub const OBJECT_NAMASTE_FILE: &str = "0=ocfl_object_1.1";
pub const OBJECT_NAMASTE_CONTENTS_1_0: &str = "ocfl_object_1.0\n";
pub const OBJECT_NAMASTE_CONTENTS_1_1: &str = "ocfl_object_1.1\n";

pub const ROOT_NAMASTE_FILE_1_0: &str = "0=ocfl_1.0";
pub const ROOT_NAMASTE_FILE_1_1: &str = "0=ocfl_1.1";

pub const INVENTORY_TYPE_1_0: &str = "https://ocfl.io/1.0/spec/#inventory";
pub const INVENTORY_TYPE_1_1: &str = "https://ocfl.io/1.1/spec/#inventory";

pub const DEFAULT_CONTENT_DIR: &str = "content";

pub const MUTABLE_HEAD_EXT_DIR: &str = "extensions/0005-mutable-head";
pub const MUTABLE_HEAD_INVENTORY_FILE: &str = "extensions/0005-mutable-head/head/inventory.json";
pub const MUTABLE_HEAD_CONTENT_DIR: &str = "extensions/0005-mutable-head/head/content";
pub const MUTABLE_HEAD_REVISIONS_DIR: &str = "extensions/0005-mutable-head/revisions";

pub const FLAT_DIRECT_LAYOUT_EXTENSION: &str = "0002-flat-direct-storage-layout";
pub const HASHED_NTUPLE_OBJECT_ID_LAYOUT_EXTENSION: &str =
    "0003-hash-and-id-n-tuple-storage-layout";
pub const HASHED_NTUPLE_LAYOUT_EXTENSION: &str = "0004-hashed-n-tuple-storage-layout";
pub const MUTABLE_HEAD_EXTENSION: &str = "0005-mutable-head";
pub const FLAT_OMIT_PREFIX_LAYOUT_EXTENSION: &str = "0006-flat-omit-prefix-storage-layout";
pub const NTUPLE_OMIT_PREFIX_LAYOUT_EXTENSION: &str = "0007-n-tuple-omit-prefix-storage-layout";

pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    FLAT_DIRECT_LAYOUT_EXTENSION,
    HASHED_NTUPLE_OBJECT_ID_LAYOUT_EXTENSION,
    HASHED_NTUPLE_LAYOUT_EXTENSION,
    MUTABLE_HEAD_EXTENSION,
    FLAT_OMIT_PREFIX_LAYOUT_EXTENSION,
    NTUPLE_OMIT_PREFIX_LAYOUT_EXTENSION,
];

/// Object root entries that are not a validation error by themselves.
pub const OBJECT_ROOT_WHITELIST: &[&str] = &["inventory.json", "logs", "extensions"];

pub const WORK_DIR_PREFIX: &str = "work";

/// Root-relative directory holding per-transaction staging work directories. Not part of the
/// OCFL object model; ignored by validation.
pub const WORK_ROOT_DIR: &str = ".ocflcore/work";

/// Root-relative directory holding the file-lock-backed lock manager's lock files.
pub const LOCKS_ROOT_DIR: &str = ".ocflcore/locks";
