//! In-memory [`Store`] used by unit tests and the `transect_sim` scenario
//! harness, where a real embedded database would add unwanted I/O latency
//! to deterministic replay.

use crate::error::StoreError;
use crate::sample::LocomotionSample;
use crate::store::Store;
use crate::timeline_item::TimelineItem;
use crate::types::{ItemId, SampleId};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<ItemId, TimelineItem>>,
    samples: Mutex<HashMap<SampleId, LocomotionSample>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn upsert_item(&self, item: &TimelineItem) -> Result<(), StoreError> {
        self.items.lock().unwrap().insert(item.id, item.clone());
        Ok(())
    }

    fn upsert_sample(&self, sample: &LocomotionSample) -> Result<(), StoreError> {
        self.samples.lock().unwrap().insert(sample.id, sample.clone());
        Ok(())
    }

    fn item(&self, id: ItemId) -> Result<Option<TimelineItem>, StoreError> {
        Ok(self.items.lock().unwrap().get(&id).cloned())
    }

    fn sample(&self, id: SampleId) -> Result<Option<LocomotionSample>, StoreError> {
        Ok(self.samples.lock().unwrap().get(&id).cloned())
    }

    fn items_in_range(&self, from: SystemTime, to: SystemTime) -> Result<Vec<TimelineItem>, StoreError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|item| {
                item.local_date_range()
                    .map(|(start, end)| start <= to && end >= from)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    fn orphaned_samples(&self) -> Result<Vec<LocomotionSample>, StoreError> {
        Ok(self
            .samples
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.timeline_item_id.is_none() && !s.deleted)
            .cloned()
            .collect())
    }

    fn commit_deletion(&self, item: &TimelineItem) -> Result<(), StoreError> {
        let mut items = self.items.lock().unwrap();
        items.insert(item.id, item.clone());
        for neighbour_id in [item.previous_item_id, item.next_item_id].into_iter().flatten() {
            if let Some(neighbour) = items.get_mut(&neighbour_id) {
                if neighbour.previous_item_id == Some(item.id) {
                    neighbour.previous_item_id = None;
                }
                if neighbour.next_item_id == Some(item.id) {
                    neighbour.next_item_id = None;
                }
            }
        }
        Ok(())
    }

    fn sweep_deleted(&self, older_than: Duration) -> Result<usize, StoreError> {
        let now = SystemTime::now();
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|_, item| {
            if !item.deleted {
                return true;
            }
            let age = item
                .local_date_range()
                .map(|(_, end)| now.duration_since(end).unwrap_or(Duration::ZERO))
                .unwrap_or(Duration::MAX);
            age < older_than
        });
        Ok(before - items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ItemThresholds;
    use crate::timeline_item::ItemVariant;

    #[test]
    fn roundtrips_and_tracks_orphans() {
        let store = MemoryStore::new();
        let item = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
        store.upsert_item(&item).unwrap();
        assert!(store.item(item.id).unwrap().is_some());

        let sample = LocomotionSample::new(
            SystemTime::now(),
            None,
            vec![],
            vec![],
            crate::types::MovingState::Uncertain,
            crate::types::RecordingState::Recording,
            0,
        );
        store.upsert_sample(&sample).unwrap();
        assert_eq!(store.orphaned_samples().unwrap().len(), 1);
    }
}
