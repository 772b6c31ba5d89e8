//! Store contract: the processor depends on this trait, never
//! on a concrete database. Grounded on the teacher's `NetworkTransport`/
//! `GodViewContext` Sans-IO abstraction pattern — production and
//! in-memory/test implementations are both plain structs implementing the
//! same trait.

use crate::error::StoreError;
use crate::sample::LocomotionSample;
use crate::timeline_item::TimelineItem;
use crate::types::{ItemId, SampleId};
use std::time::{Duration, SystemTime};

/// A set of mutations to apply atomically within one `process` block.
#[derive(Default)]
pub struct ChangeSet {
    pub upsert_items: Vec<TimelineItem>,
    pub upsert_samples: Vec<LocomotionSample>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.upsert_items.is_empty() && self.upsert_samples.is_empty()
    }
}

/// Abstract persistent store for timeline items and locomotion samples.
pub trait Store: Send + Sync {
    fn upsert_item(&self, item: &TimelineItem) -> Result<(), StoreError>;
    fn upsert_sample(&self, sample: &LocomotionSample) -> Result<(), StoreError>;

    fn item(&self, id: ItemId) -> Result<Option<TimelineItem>, StoreError>;
    fn sample(&self, id: SampleId) -> Result<Option<LocomotionSample>, StoreError>;

    /// Items whose local date range intersects `[from, to]`.
    fn items_in_range(&self, from: SystemTime, to: SystemTime) -> Result<Vec<TimelineItem>, StoreError>;

    /// Samples with no owning item (`timeline_item_id == None`) and not deleted.
    fn orphaned_samples(&self) -> Result<Vec<LocomotionSample>, StoreError>;

    /// Soft-deletes an item (caller has already called `TimelineItem::delete`);
    /// persists the tombstone and breaks any still-pointing neighbour edges
    /// (the store's symmetry trigger).
    fn commit_deletion(&self, item: &TimelineItem) -> Result<(), StoreError>;

    /// Permanently removes soft-deleted rows older than `older_than`.
    fn sweep_deleted(&self, older_than: Duration) -> Result<usize, StoreError>;

    /// Applies `changes` as one atomic unit: marks the store `processing`,
    /// applies the upserts (with constraint-violation rollback-and-retry
    /// per item), flushes, and clears `processing`.
    fn process(&self, changes: ChangeSet) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        for mut item in changes.upsert_items {
            if let Err(StoreError::ConstraintViolation(_)) = self.validate_edges(&item) {
                item.break_edges();
            }
            self.upsert_item(&item)?;
        }
        for sample in changes.upsert_samples {
            self.upsert_sample(&sample)?;
        }
        Ok(())
    }

    /// Checks that `item`'s edges don't reference a missing/deleted
    /// neighbour or create a self-edge; used by `process`'s rollback path.
    fn validate_edges(&self, item: &TimelineItem) -> Result<(), StoreError> {
        if item.previous_item_id == Some(item.id) || item.next_item_id == Some(item.id) {
            return Err(StoreError::ConstraintViolation(item.id));
        }
        if let Some(prev) = item.previous_item_id {
            match self.item(prev)? {
                Some(p) if !p.deleted => {}
                _ => return Err(StoreError::ConstraintViolation(item.id)),
            }
        }
        if let Some(next) = item.next_item_id {
            match self.item(next)? {
                Some(n) if !n.deleted => {}
                _ => return Err(StoreError::ConstraintViolation(item.id)),
            }
        }
        Ok(())
    }
}
