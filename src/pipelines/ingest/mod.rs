// SPDX-License-Identifier: GPL-3.0-only

//! Ingest pipeline
//!
//! Turns a batch of incoming files into ready entries in the pending store:
//!
//! ```text
//! files ──▶ reserve count+bytes ──▶ per-file type/size ──▶ resize (concurrent)
//!                 │                        │                      │
//!           TooManyFiles             InvalidType            ResizeFailed
//!           BatchTooLarge            FileTooLarge          (keeps original)
//!                                                                 │
//!                                      reorder buffer ◀───────────┘
//!                                            │
//!                                  store, in batch order
//! ```
//!
//! Resizes complete in any order; each entry is committed only once every
//! earlier admitted entry of its batch has been committed.

pub mod resize;
pub mod validation;

pub use resize::{HalvingResizer, ImageResizer, ResizeError, ResizedImage};
pub use validation::{FileValidator, batch_bytes};

use crate::config::ResizeSettings;
use crate::errors::IngestError;
use crate::media::{EntryId, IncomingFile, MediaEntry, Payload, PreviewRegistry};
use crate::store::{ReservationId, SharedStore, lock_store};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of an admitted batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Entries added to the store, in batch order
    pub admitted: Vec<EntryId>,
    /// Files refused individually
    pub rejected: Vec<IngestError>,
    /// Files admitted with their original payload after a failed resize
    pub degraded: Vec<IngestError>,
}

impl BatchOutcome {
    /// Every file admitted without fallback
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.degraded.is_empty()
    }
}

/// Resize progress within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestProgress {
    pub processed: usize,
    pub total: usize,
}

/// Releases a batch's leftover reservation, also when the batch is dropped
struct ReservationGuard<'a> {
    store: &'a SharedStore,
    id: ReservationId,
}

impl Drop for ReservationGuard<'_> {
    fn drop(&mut self) {
        lock_store(self.store).finish_reservation(self.id);
    }
}

/// An admitted file on its way to the store
struct Job {
    entry: MediaEntry,
    reserved_bytes: u64,
}

/// Validates, resizes and stores incoming media
pub struct MediaIngestor {
    store: SharedStore,
    resize: ResizeSettings,
    resizer: Arc<dyn ImageResizer>,
    previews: Arc<dyn PreviewRegistry>,
}

impl MediaIngestor {
    pub fn new(
        store: SharedStore,
        resize: ResizeSettings,
        resizer: Arc<dyn ImageResizer>,
        previews: Arc<dyn PreviewRegistry>,
    ) -> Self {
        Self {
            store,
            resize,
            resizer,
            previews,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn previews(&self) -> &Arc<dyn PreviewRegistry> {
        &self.previews
    }

    /// Add a batch of files
    ///
    /// # Returns
    /// * `Ok(BatchOutcome)` - Batch passed the count and size checks
    /// * `Err(IngestError::TooManyFiles)` / `Err(IngestError::BatchTooLarge)` -
    ///   Nothing was admitted and the store is unchanged
    pub async fn add_batch(&self, files: Vec<IncomingFile>) -> Result<BatchOutcome, IngestError> {
        self.add_batch_with_progress(files, |_| {}).await
    }

    /// Add a batch, reporting each finished file
    pub async fn add_batch_with_progress<F>(
        &self,
        files: Vec<IncomingFile>,
        mut progress: F,
    ) -> Result<BatchOutcome, IngestError>
    where
        F: FnMut(IngestProgress),
    {
        let mut outcome = BatchOutcome::default();
        if files.is_empty() {
            return Ok(outcome);
        }

        let (reservation, ids, constraints) = {
            let mut store = lock_store(&self.store);
            let reservation = match store.try_reserve(files.len(), batch_bytes(&files)) {
                Ok(reservation) => reservation,
                Err(e) => {
                    warn!(files = files.len(), error = %e, "Batch rejected");
                    return Err(e);
                }
            };
            let ids: Vec<EntryId> = files.iter().map(|f| store.allocate_identity(&f.name)).collect();
            (reservation, ids, store.constraints().clone())
        };
        let _guard = ReservationGuard {
            store: &self.store,
            id: reservation,
        };

        let validator = FileValidator::new(&constraints);
        let mut jobs = Vec::with_capacity(files.len());
        for (file, id) in files.into_iter().zip(ids) {
            let size = file.size();
            let verdict = validator.validate(&file);
            let mut entry = MediaEntry::pending(id, file);
            match verdict {
                Ok(()) => {
                    entry.begin_resize();
                    jobs.push(Job {
                        entry,
                        reserved_bytes: size,
                    });
                }
                Err(e) => {
                    entry.reject();
                    info!(entry = %entry.id(), error = %e, "File rejected");
                    lock_store(&self.store).release(reservation, 1, size);
                    outcome.rejected.push(e);
                }
            }
        }

        let total = jobs.len();
        let mut in_flight: FuturesUnordered<_> = jobs
            .into_iter()
            .enumerate()
            .map(|(position, job)| async move {
                let (job, degraded) = self.process(job).await;
                (position, job, degraded)
            })
            .collect();

        let mut buffered: BTreeMap<usize, Job> = BTreeMap::new();
        let mut next = 0;
        let mut processed = 0;

        while let Some((position, job, degraded)) = in_flight.next().await {
            processed += 1;
            progress(IngestProgress { processed, total });
            if let Some(e) = degraded {
                outcome.degraded.push(e);
            }
            buffered.insert(position, job);

            while let Some(job) = buffered.remove(&next) {
                let id = job.entry.id().clone();
                if lock_store(&self.store).commit(reservation, job.reserved_bytes, job.entry) {
                    outcome.admitted.push(id);
                }
                next += 1;
            }
        }

        info!(
            admitted = outcome.admitted.len(),
            rejected = outcome.rejected.len(),
            degraded = outcome.degraded.len(),
            "Batch ingested"
        );
        Ok(outcome)
    }

    /// Resize if needed and mark ready
    async fn process(&self, mut job: Job) -> (Job, Option<IngestError>) {
        let mut degraded = None;

        if let Payload::Inline { data, content_type } = job.entry.payload().clone() {
            let size = data.len() as u64;
            if self.resize.should_resize(&content_type, size) {
                match self.resizer.resize(data, &content_type, &self.resize).await {
                    Ok(resized) if (resized.data.len() as u64) < size => {
                        debug!(
                            entry = %job.entry.id(),
                            from = size,
                            to = resized.data.len(),
                            "Using resized payload"
                        );
                        job.entry.replace_payload(resized.data, resized.content_type);
                    }
                    Ok(resized) => {
                        debug!(
                            entry = %job.entry.id(),
                            size,
                            resized = resized.data.len(),
                            "Resize did not shrink, keeping original"
                        );
                    }
                    Err(e) => {
                        warn!(entry = %job.entry.id(), error = %e, "Resize failed, keeping original");
                        degraded = Some(IngestError::ResizeFailed {
                            name: job.entry.name().to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        job.entry.mark_ready(&self.previews);
        (job, degraded)
    }

    /// Remove one entry; absent identities are ignored
    pub fn remove(&self, id: &EntryId) -> bool {
        lock_store(&self.store).remove(id)
    }

    /// Remove every entry
    pub fn remove_all(&self) -> usize {
        lock_store(&self.store).remove_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConstraints;
    use crate::media::{MediaOrigin, ObjectUrlRegistry};
    use crate::store::{self, PendingMediaStore};

    fn ingestor(constraints: BatchConstraints) -> (MediaIngestor, Arc<ObjectUrlRegistry>) {
        let registry = ObjectUrlRegistry::shared();
        let ingestor = MediaIngestor::new(
            store::shared(PendingMediaStore::new(constraints)),
            ResizeSettings::default(),
            Arc::new(HalvingResizer),
            registry.clone(),
        );
        (ingestor, registry)
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let (ingestor, registry) = ingestor(BatchConstraints::default());
        let outcome = ingestor.add_batch(Vec::new()).await.unwrap();
        assert_eq!(outcome, BatchOutcome::default());
        assert_eq!(registry.stats().allocated, 0);
    }

    #[tokio::test]
    async fn test_undecodable_large_jpeg_keeps_original() {
        let (ingestor, _registry) = ingestor(BatchConstraints::default());
        let size = (ResizeSettings::default().threshold_bytes + 1) as usize;
        let file = IncomingFile::new("broken.jpg", "image/jpeg", vec![7u8; size], MediaOrigin::Picked);

        let mut seen = Vec::new();
        let outcome = ingestor
            .add_batch_with_progress(vec![file], |p| seen.push(p))
            .await
            .unwrap();

        assert_eq!(outcome.admitted.len(), 1);
        assert!(matches!(outcome.degraded[0], IngestError::ResizeFailed { .. }));
        assert_eq!(seen, vec![IngestProgress { processed: 1, total: 1 }]);

        let store = lock_store(ingestor.store());
        assert_eq!(store.total_bytes(), size as u64);
    }
}
