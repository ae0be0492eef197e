use serde::Serialize;

use crate::rights::Rights;
use crate::store::BlobId;

/// A file as listed in its folder.
///
/// The blob reference stays server-side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct File {
    pub name: String,
    #[serde(skip_serializing)]
    pub blob_id: BlobId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rights: Option<Rights>,
}

/// Reference to a direct child folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildFolder {
    pub path: String,
}

/// A folder with its files and the paths of its direct children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Folder {
    pub path: String,
    pub files: Vec<File>,
    pub folders: Vec<ChildFolder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rights: Option<Rights>,
}

impl Folder {
    pub fn file(&self, name: &str) -> Option<&File> {
        self.files.iter().find(|f| f.name == name)
    }
}
