//! Production [`Store`] implementation backed by `sled`.
//!
//! The teacher used `sled` for the Trust Engine's revoked-key cache; here
//! it backs the actual persisted timeline, a much closer fit for an
//! embedded-device append-mostly workload.

use crate::error::StoreError;
use crate::sample::LocomotionSample;
use crate::store::Store;
use crate::timeline_item::TimelineItem;
use crate::types::{ItemId, SampleId};
use std::time::{Duration, SystemTime};
use tracing::warn;
use uuid::Uuid;

pub struct SledStore {
    items: sled::Tree,
    samples: sled::Tree,
}

impl SledStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self {
            items: db.open_tree("items")?,
            samples: db.open_tree("samples")?,
        })
    }

    fn item_key(id: ItemId) -> [u8; 16] {
        *id.0.as_bytes()
    }

    fn sample_key(id: SampleId) -> [u8; 16] {
        *id.0.as_bytes()
    }
}

impl Store for SledStore {
    fn upsert_item(&self, item: &TimelineItem) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(item)?;
        self.items.insert(Self::item_key(item.id), bytes)?;
        Ok(())
    }

    fn upsert_sample(&self, sample: &LocomotionSample) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(sample)?;
        self.samples.insert(Self::sample_key(sample.id), bytes)?;
        Ok(())
    }

    fn item(&self, id: ItemId) -> Result<Option<TimelineItem>, StoreError> {
        match self.items.get(Self::item_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn sample(&self, id: SampleId) -> Result<Option<LocomotionSample>, StoreError> {
        match self.samples.get(Self::sample_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn items_in_range(&self, from: SystemTime, to: SystemTime) -> Result<Vec<TimelineItem>, StoreError> {
        let mut result = Vec::new();
        for entry in self.items.iter() {
            let (_, bytes) = entry?;
            let item: TimelineItem = serde_json::from_slice(&bytes)?;
            if let Some((start, end)) = item.local_date_range() {
                if start <= to && end >= from {
                    result.push(item);
                }
            }
        }
        Ok(result)
    }

    fn orphaned_samples(&self) -> Result<Vec<LocomotionSample>, StoreError> {
        let mut result = Vec::new();
        for entry in self.samples.iter() {
            let (_, bytes) = entry?;
            let sample: LocomotionSample = serde_json::from_slice(&bytes)?;
            if sample.timeline_item_id.is_none() && !sample.deleted {
                result.push(sample);
            }
        }
        Ok(result)
    }

    fn commit_deletion(&self, item: &TimelineItem) -> Result<(), StoreError> {
        self.upsert_item(item)?;
        for neighbour_id in [item.previous_item_id, item.next_item_id].into_iter().flatten() {
            if let Some(mut neighbour) = self.item(neighbour_id)? {
                if neighbour.previous_item_id == Some(item.id) {
                    neighbour.previous_item_id = None;
                }
                if neighbour.next_item_id == Some(item.id) {
                    neighbour.next_item_id = None;
                }
                self.upsert_item(&neighbour)?;
            }
        }
        Ok(())
    }

    fn sweep_deleted(&self, older_than: Duration) -> Result<usize, StoreError> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut stale_item_keys = Vec::new();
        for entry in self.items.iter() {
            let (key, bytes) = entry?;
            let item: TimelineItem = serde_json::from_slice(&bytes)?;
            if item.deleted {
                let age = item
                    .local_date_range()
                    .map(|(_, end)| now.duration_since(end).unwrap_or(Duration::ZERO))
                    .unwrap_or(Duration::MAX);
                if age >= older_than {
                    stale_item_keys.push(key.to_vec());
                }
            }
        }
        for key in stale_item_keys {
            self.items.remove(key)?;
            removed += 1;
        }

        let mut stale_sample_keys = Vec::new();
        for entry in self.samples.iter() {
            let (key, bytes) = entry?;
            let sample: LocomotionSample = serde_json::from_slice(&bytes)?;
            if sample.deleted {
                let age = now.duration_since(sample.date).unwrap_or(Duration::ZERO);
                if age >= older_than {
                    stale_sample_keys.push(key.to_vec());
                }
            }
        }
        for key in stale_sample_keys {
            self.samples.remove(key)?;
            removed += 1;
        }

        if removed > 0 {
            warn!(removed, "hard-delete sweep removed rows");
        }
        Ok(removed)
    }
}

#[allow(dead_code)]
fn parse_uuid(bytes: &[u8]) -> Option<Uuid> {
    Uuid::from_slice(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ItemThresholds;
    use crate::timeline_item::ItemVariant;

    #[test]
    fn upsert_and_fetch_roundtrips() {
        let dir = tempdir();
        let store = SledStore::open(&dir).unwrap();
        let item = TimelineItem::new(ItemVariant::Visit, "native", ItemThresholds::default());
        let id = item.id;
        store.upsert_item(&item).unwrap();
        let fetched = store.item(id).unwrap().unwrap();
        assert_eq!(fetched.id, id);
    }

    fn tempdir() -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("transect-sled-test-{}", Uuid::new_v4()));
        p
    }
}
