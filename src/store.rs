// SPDX-License-Identifier: GPL-3.0-only

//! Pending media store
//!
//! Ordered collection of ready entries bound to the report being composed.
//! Count and total size are always derived from the entries themselves, and
//! the limit flag is recomputed after every mutation.
//!
//! Admission goes through reservations: a batch first reserves its count and
//! bytes, then commits entries one by one (or releases them when rejected).
//! Overlapping batches therefore cannot jointly exceed the limits.
//!
//! Every change is published on a [`watch`] channel as the report's image
//! list.

use crate::config::BatchConstraints;
use crate::constants::bytes_to_size;
use crate::errors::IngestError;
use crate::media::{EntryId, EntryState, IdentityAllocator, MediaEntry, Payload};
use crate::report::ReportImage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Store shared between the ingestor and its readers
pub type SharedStore = Arc<Mutex<PendingMediaStore>>;

/// Wrap a store for sharing
pub fn shared(store: PendingMediaStore) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Lock a shared store, recovering from poisoning
pub fn lock_store(store: &SharedStore) -> MutexGuard<'_, PendingMediaStore> {
    store.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle to capacity held for an in-flight batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReservationId(u64);

#[derive(Debug, Default, Clone, Copy)]
struct Held {
    count: usize,
    bytes: u64,
}

/// Aggregate metrics for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSummary {
    pub count: usize,
    pub max_count: usize,
    pub total_bytes: u64,
    pub max_total_bytes: u64,
    pub limit_exceeded: bool,
}

impl std::fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / {} files, {} of {}",
            self.count,
            self.max_count,
            bytes_to_size(self.total_bytes),
            bytes_to_size(self.max_total_bytes)
        )?;
        if self.limit_exceeded {
            write!(f, " (limit exceeded)")?;
        }
        Ok(())
    }
}

pub struct PendingMediaStore {
    constraints: BatchConstraints,
    order: Vec<EntryId>,
    entries: HashMap<EntryId, MediaEntry>,
    identities: IdentityAllocator,
    reservations: HashMap<u64, Held>,
    next_reservation: u64,
    limit_exceeded: bool,
    /// Remote URLs removed during this session
    removed_urls: Vec<String>,
    changes: watch::Sender<Vec<ReportImage>>,
}

impl PendingMediaStore {
    pub fn new(constraints: BatchConstraints) -> Self {
        let (changes, _) = watch::channel(Vec::new());
        Self {
            constraints,
            order: Vec::new(),
            entries: HashMap::new(),
            identities: IdentityAllocator::new(),
            reservations: HashMap::new(),
            next_reservation: 0,
            limit_exceeded: false,
            removed_urls: Vec::new(),
            changes,
        }
    }

    pub fn constraints(&self) -> &BatchConstraints {
        &self.constraints
    }

    pub fn count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(MediaEntry::size_bytes).sum()
    }

    pub fn limit_exceeded(&self) -> bool {
        self.limit_exceeded
    }

    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            count: self.count(),
            max_count: self.constraints.max_file_count,
            total_bytes: self.total_bytes(),
            max_total_bytes: self.constraints.max_total_bytes,
            limit_exceeded: self.limit_exceeded,
        }
    }

    /// Entries in store order
    pub fn entries(&self) -> impl Iterator<Item = &MediaEntry> + '_ {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn ids(&self) -> Vec<EntryId> {
        self.order.clone()
    }

    pub fn get(&self, id: &EntryId) -> Option<&MediaEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.entries.contains_key(id)
    }

    /// Remote URLs removed during this session
    pub fn removed_urls(&self) -> &[String] {
        &self.removed_urls
    }

    /// Allocate a session-unique identity for a file name
    pub fn allocate_identity(&mut self, name: &str) -> EntryId {
        self.identities.allocate(name)
    }

    fn held(&self) -> Held {
        self.reservations.values().fold(Held::default(), |acc, h| Held {
            count: acc.count + h.count,
            bytes: acc.bytes + h.bytes,
        })
    }

    /// Reserve room for a batch
    ///
    /// Counts entries already stored plus every outstanding reservation. A
    /// store whose limit is already exceeded refuses every reservation.
    pub fn try_reserve(&mut self, count: usize, bytes: u64) -> Result<ReservationId, IngestError> {
        let held = self.held();

        let requested = self.count() + held.count + count;
        if requested > self.constraints.max_file_count {
            return Err(IngestError::TooManyFiles {
                requested,
                max: self.constraints.max_file_count,
            });
        }

        let requested_bytes = self.total_bytes() + held.bytes + bytes;
        if requested_bytes > self.constraints.max_total_bytes {
            return Err(IngestError::BatchTooLarge {
                requested: requested_bytes,
                max: self.constraints.max_total_bytes,
            });
        }

        let id = self.next_reservation;
        self.next_reservation += 1;
        self.reservations.insert(id, Held { count, bytes });
        debug!(reservation = id, count, bytes, "Reserved store capacity");
        Ok(ReservationId(id))
    }

    /// Give back part of a reservation
    pub fn release(&mut self, reservation: ReservationId, count: usize, bytes: u64) {
        if let Some(held) = self.reservations.get_mut(&reservation.0) {
            held.count = held.count.saturating_sub(count);
            held.bytes = held.bytes.saturating_sub(bytes);
        }
    }

    /// Drop whatever is left of a reservation
    pub fn finish_reservation(&mut self, reservation: ReservationId) {
        if let Some(held) = self.reservations.remove(&reservation.0) {
            if held.count > 0 {
                debug!(reservation = reservation.0, count = held.count, bytes = held.bytes, "Released unused reservation");
            }
        }
    }

    /// Append a ready entry admitted under a reservation
    ///
    /// `reserved_bytes` is the size the entry was reserved with, which may
    /// differ from its final size after resizing. Returns `false` (dropping
    /// the entry) if it is not ready or its identity is already present.
    pub fn commit(&mut self, reservation: ReservationId, reserved_bytes: u64, entry: MediaEntry) -> bool {
        self.release(reservation, 1, reserved_bytes);
        self.insert(entry)
    }

    fn insert(&mut self, entry: MediaEntry) -> bool {
        if entry.state() != EntryState::Ready {
            warn!(entry = %entry.id(), state = ?entry.state(), "Refusing to store entry that is not ready");
            return false;
        }
        if self.entries.contains_key(entry.id()) {
            warn!(entry = %entry.id(), "Duplicate entry identity");
            return false;
        }

        debug!(entry = %entry.id(), size = entry.size_bytes(), origin = %entry.origin(), "Entry stored");
        self.order.push(entry.id().clone());
        self.entries.insert(entry.id().clone(), entry);
        self.changed();
        true
    }

    /// Pre-populate from the report's current image list
    ///
    /// Live images become ready remote entries without a local preview.
    /// Deleted ones are remembered so they keep being reported as deleted.
    pub fn preload(&mut self, images: &[ReportImage]) -> usize {
        let mut added = 0;
        for image in images {
            if image.is_deleted {
                if !self.removed_urls.contains(&image.url) {
                    self.removed_urls.push(image.url.clone());
                }
                continue;
            }
            let already_present = self.entries.values().any(
                |e| matches!(e.payload(), Payload::Remote { url } if *url == image.url),
            );
            if already_present {
                continue;
            }
            let id = self.identities.allocate(&image.url);
            let entry = MediaEntry::remote(id.clone(), image.url.clone());
            self.order.push(id.clone());
            self.entries.insert(id, entry);
            added += 1;
        }

        info!(added, total = self.count(), "Preloaded report images");
        self.changed();
        added
    }

    /// Remove one entry, revoking its preview
    ///
    /// Removing an identity that is not present is a no-op.
    pub fn remove(&mut self, id: &EntryId) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            debug!(entry = %id, "Remove of absent entry ignored");
            return false;
        };
        self.order.retain(|other| other != id);
        self.forget(entry);
        self.changed();
        true
    }

    /// Remove every entry, revoking all previews before clearing
    pub fn remove_all(&mut self) -> usize {
        for entry in self.entries.values_mut() {
            entry.release_preview();
        }

        let removed = self.order.len();
        let order = std::mem::take(&mut self.order);
        for id in order {
            if let Some(entry) = self.entries.remove(&id) {
                self.forget(entry);
            }
        }

        info!(removed, "Removed all entries");
        self.changed();
        removed
    }

    fn forget(&mut self, mut entry: MediaEntry) {
        entry.release_preview();
        if let Payload::Remote { url } = entry.payload() {
            if !self.removed_urls.contains(url) {
                self.removed_urls.push(url.clone());
            }
        }
        debug!(entry = %entry.id(), "Entry removed");
    }

    /// Current image list in the report's shape
    pub fn report_images(&self) -> Vec<ReportImage> {
        self.entries()
            .filter_map(|e| e.reference_url().map(ReportImage::live))
            .chain(self.removed_urls.iter().map(ReportImage::deleted))
            .collect()
    }

    /// Receive the image list whenever it changes
    pub fn subscribe(&self) -> watch::Receiver<Vec<ReportImage>> {
        self.changes.subscribe()
    }

    fn changed(&mut self) {
        let c = &self.constraints;
        let count = self.count();
        let total = self.total_bytes();
        let exceeded = count > c.max_file_count || total > c.max_total_bytes;
        if exceeded != self.limit_exceeded {
            if exceeded {
                warn!(count, total, "Pending media limit exceeded");
            } else {
                info!(count, total, "Pending media back within limits");
            }
        }
        self.limit_exceeded = exceeded;
        self.changes.send_replace(self.report_images());
    }
}

impl std::fmt::Debug for PendingMediaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingMediaStore")
            .field("summary", &self.summary())
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{IncomingFile, MediaOrigin, ObjectUrlRegistry, PreviewRegistry};

    fn constraints(max_files: usize, max_bytes: u64) -> BatchConstraints {
        BatchConstraints {
            max_file_count: max_files,
            max_total_bytes: max_bytes,
            max_single_file_bytes: max_bytes,
            ..BatchConstraints::default()
        }
    }

    fn ready_entry(store: &mut PendingMediaStore, registry: &Arc<dyn PreviewRegistry>, name: &str, size: usize) -> MediaEntry {
        let id = store.allocate_identity(name);
        let file = IncomingFile::new(name, "image/png", vec![0u8; size], MediaOrigin::Picked);
        let mut entry = MediaEntry::pending(id, file);
        entry.begin_resize();
        entry.mark_ready(registry);
        entry
    }

    #[test]
    fn test_reservations_count_against_limits() {
        let mut store = PendingMediaStore::new(constraints(3, 100));
        let first = store.try_reserve(2, 60).unwrap();

        assert!(matches!(
            store.try_reserve(2, 10),
            Err(IngestError::TooManyFiles { requested: 4, max: 3 })
        ));
        assert!(matches!(
            store.try_reserve(1, 50),
            Err(IngestError::BatchTooLarge { requested: 110, max: 100 })
        ));

        store.finish_reservation(first);
        assert!(store.try_reserve(3, 100).is_ok());
    }

    #[test]
    fn test_commit_and_remove_twice() {
        let registry = ObjectUrlRegistry::shared();
        let dyn_registry: Arc<dyn PreviewRegistry> = registry.clone();
        let mut store = PendingMediaStore::new(constraints(5, 1000));

        let reservation = store.try_reserve(1, 10).unwrap();
        let entry = ready_entry(&mut store, &dyn_registry, "a.png", 10);
        let id = entry.id().clone();
        assert!(store.commit(reservation, 10, entry));
        store.finish_reservation(reservation);

        assert_eq!(store.count(), 1);
        assert_eq!(store.total_bytes(), 10);

        assert!(store.remove(&id));
        assert!(!store.remove(&id));
        assert_eq!(store.count(), 0);
        assert!(registry.stats().is_balanced());
    }

    #[test]
    fn test_preload_publishes_and_tracks_deletions() {
        let mut store = PendingMediaStore::new(constraints(1, 1000));
        let mut changes = store.subscribe();

        let added = store.preload(&[
            ReportImage::live("https://cdn/a.jpg"),
            ReportImage::live("https://cdn/b.jpg"),
            ReportImage::deleted("https://cdn/c.jpg"),
        ]);
        assert_eq!(added, 2);
        assert!(store.limit_exceeded());
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().len(), 3);

        assert!(matches!(store.try_reserve(0, 0), Err(IngestError::TooManyFiles { .. })));

        let first = store.ids()[0].clone();
        store.remove(&first);
        assert!(!store.limit_exceeded());
        assert_eq!(
            store.report_images(),
            vec![
                ReportImage::live("https://cdn/b.jpg"),
                ReportImage::deleted("https://cdn/c.jpg"),
                ReportImage::deleted("https://cdn/a.jpg"),
            ]
        );
    }

    #[test]
    fn test_remove_all_revokes_every_preview() {
        let registry = ObjectUrlRegistry::shared();
        let dyn_registry: Arc<dyn PreviewRegistry> = registry.clone();
        let mut store = PendingMediaStore::new(constraints(5, 1000));

        let reservation = store.try_reserve(3, 30).unwrap();
        for name in ["a.png", "a.png", "b.png"] {
            let entry = ready_entry(&mut store, &dyn_registry, name, 10);
            assert!(store.commit(reservation, 10, entry));
        }
        store.finish_reservation(reservation);
        assert_eq!(registry.stats().live, 3);

        assert_eq!(store.remove_all(), 3);
        assert!(store.is_empty());
        assert_eq!(store.total_bytes(), 0);
        assert!(registry.stats().is_balanced());
        assert_eq!(store.summary().to_string(), "0 / 5 files, 0 Bytes of 1000 Bytes");
    }
}
