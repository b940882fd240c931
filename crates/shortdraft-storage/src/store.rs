//! Folder store abstraction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shortdraft_models::WorkItem;

use crate::error::StorageResult;

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// One child of a remote container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: Option<u64>,
}

impl RemoteEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, mime_type: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: mime_type.into(),
            size,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn to_work_item(&self) -> WorkItem {
        WorkItem::new(self.id.clone(), self.name.clone(), self.size)
    }
}

/// Hierarchical store of containers (folders) and files.
///
/// Container arguments are store ids, not URLs.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List the direct children of a container.
    async fn list(&self, container: &str) -> StorageResult<Vec<RemoteEntry>>;

    /// Download an item into `dir`, returning the local path.
    async fn download(&self, item: &WorkItem, dir: &Path) -> StorageResult<PathBuf>;

    /// Upload a local file into a container, returning a shareable URL.
    async fn upload(&self, local_path: &Path, container: &str) -> StorageResult<String>;

    /// Whether a child container named `name` exists directly under `container`.
    async fn exists(&self, container: &str, name: &str) -> StorageResult<bool>;

    /// Create a child container, or return the id of an existing one with
    /// the same name.
    async fn create_container(&self, parent: &str, name: &str) -> StorageResult<String>;
}
