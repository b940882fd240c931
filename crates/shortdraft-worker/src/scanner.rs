//! Selection of the next unprocessed video in a remote folder.

use std::sync::Arc;

use shortdraft_models::{has_video_extension, is_video_mime_type, WorkItem};
use shortdraft_storage::{RemoteEntry, RemoteStore};
use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};
use crate::retry::{invoke, Payload, RetryPolicy};

/// Folder listing; an empty folder is a valid answer, not an empty payload.
struct Listing(Vec<RemoteEntry>);

impl Payload for Listing {}

/// True for non-folder entries whose name or MIME type marks them as video.
pub fn is_video_entry(entry: &RemoteEntry) -> bool {
    !entry.is_folder() && (has_video_extension(&entry.name) || is_video_mime_type(&entry.mime_type))
}

pub struct BatchWorkScanner {
    store: Arc<dyn RemoteStore>,
    policy: RetryPolicy,
}

impl BatchWorkScanner {
    pub fn new(store: Arc<dyn RemoteStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Video entries under `input`, sorted case-insensitively by name.
    pub async fn candidates(&self, input: &str) -> WorkerResult<Vec<WorkItem>> {
        let policy = self.policy.named("store.list");
        let Listing(entries) = invoke(&policy, || async move {
            self.store.list(input).await.map(Listing).map_err(WorkerError::from)
        })
        .await?;

        let mut items: Vec<WorkItem> = entries
            .iter()
            .filter(|entry| is_video_entry(entry))
            .map(RemoteEntry::to_work_item)
            .collect();
        items.sort_by_cached_key(|item| (item.display_name.to_lowercase(), item.display_name.clone()));
        Ok(items)
    }

    /// First candidate without a same-named folder under `output`.
    pub async fn find_next(&self, input: &str, output: &str) -> WorkerResult<Option<WorkItem>> {
        let candidates = self.candidates(input).await?;
        debug!(candidates = candidates.len(), "Scanned input folder");

        let policy = self.policy.named("store.exists");
        for item in candidates {
            let base_name = item.output_base_name();
            let name = base_name.as_str();
            let processed = invoke(&policy, || async move {
                self.store.exists(output, name).await.map_err(WorkerError::from)
            })
            .await?;
            if !processed {
                info!(item = %item.display_name, "Found unprocessed video");
                return Ok(Some(item));
            }
            debug!(item = %item.display_name, "Already processed, skipping");
        }

        info!("No unprocessed videos");
        Ok(None)
    }
}
