//! Google Drive folder store client.
//!
//! This crate provides:
//! - The `RemoteStore` trait the batch pipeline talks to
//! - A Drive v3 implementation with service-account auth
//! - Folder URL / id parsing
//! - Token caching with refresh margin

pub mod drive;
pub mod error;
pub mod folder;
pub mod store;
pub mod token_cache;

pub use drive::{DriveClient, DriveConfig};
pub use error::{parse_retry_after, StorageError, StorageResult};
pub use folder::extract_folder_id;
pub use store::{RemoteEntry, RemoteStore, FOLDER_MIME_TYPE};
pub use token_cache::{AccessTokenSource, TokenCache, DRIVE_SCOPE};
