use std::fmt;
use std::fmt::{Display, Formatter};

use crate::consts::*;
use crate::error::{Result, RocflError};

/// The contents of a NAMASTE declaration file: its filename and the single line it contains.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct NamasteFile {
    pub filename: &'static str,
    pub content: &'static str,
}

/// The version of the OCFL specification an object or repository root declares conformance to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum SpecVersion {
    Ocfl1_0,
    Ocfl1_1,
}

impl SpecVersion {
    /// The object root's `0=ocfl_object_X.Y` NAMASTE file.
    pub fn object_namaste(&self) -> NamasteFile {
        match self {
            SpecVersion::Ocfl1_0 => NamasteFile {
                filename: OBJECT_NAMASTE_FILE_1_0,
                content: OBJECT_NAMASTE_CONTENTS_1_0,
            },
            SpecVersion::Ocfl1_1 => NamasteFile {
                filename: OBJECT_NAMASTE_FILE,
                content: OBJECT_NAMASTE_CONTENTS_1_1,
            },
        }
    }

    /// The storage root's `0=ocfl_X.Y` NAMASTE file.
    pub fn root_namaste(&self) -> NamasteFile {
        match self {
            SpecVersion::Ocfl1_0 => NamasteFile {
                filename: ROOT_NAMASTE_FILE_1_0,
                content: "ocfl_1.0\n",
            },
            SpecVersion::Ocfl1_1 => NamasteFile {
                filename: ROOT_NAMASTE_FILE_1_1,
                content: "ocfl_1.1\n",
            },
        }
    }

    /// The name the spec text file is written under at the storage root.
    pub fn spec_filename(&self) -> String {
        match self {
            SpecVersion::Ocfl1_0 => "ocfl_1.0.txt".to_string(),
            SpecVersion::Ocfl1_1 => "ocfl_1.1.txt".to_string(),
        }
    }

    /// The `type` field value that appears in an `inventory.json` of this spec version.
    pub fn inventory_type(&self) -> &'static str {
        match self {
            SpecVersion::Ocfl1_0 => INVENTORY_TYPE_1_0,
            SpecVersion::Ocfl1_1 => INVENTORY_TYPE_1_1,
        }
    }

    /// Parses an inventory's `type` declaration into the `SpecVersion` it names.
    pub fn try_from_inventory_type(type_declaration: &str) -> Result<Self> {
        match type_declaration {
            INVENTORY_TYPE_1_0 => Ok(SpecVersion::Ocfl1_0),
            INVENTORY_TYPE_1_1 => Ok(SpecVersion::Ocfl1_1),
            other => Err(RocflError::CorruptObject {
                object_id: String::new(),
                message: format!("Unknown inventory type declaration: {}", other),
            }),
        }
    }
}

impl Display for SpecVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SpecVersion::Ocfl1_0 => write!(f, "1.0"),
            SpecVersion::Ocfl1_1 => write!(f, "1.1"),
        }
    }
}
