use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::BTreeMap, fmt::Display};

/// Everything needed to render one folder of the uploads disk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderInfo {
    /// The cleaned folder path
    pub folder: String,

    /// Label of the last breadcrumb, `root` for the root folder
    pub folder_name: String,

    /// Ancestors of the folder, root first. Does not include the folder itself.
    pub breadcrumbs: Vec<Breadcrumb>,

    /// Maps child paths to their names.
    pub subfolders: BTreeMap<String, String>,

    pub files: Vec<FileDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub path: String,
    pub label: String,
}

impl Breadcrumb {
    pub fn new(path: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetails {
    /// File name with extension
    pub name: String,

    /// Path on the disk, starting with `/`
    pub full_path: String,

    /// Where the file can be fetched from
    pub web_path: String,

    pub mime_type: Option<String>,

    pub size: u64,

    pub modified: DateTime<Utc>,
}

/// Result of a guarded write. A refusal is an expected state of the disk,
/// not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Refused(String),
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Done => write!(f, "done"),
            Outcome::Refused(message) => write!(f, "{message}"),
        }
    }
}
