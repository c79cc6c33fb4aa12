use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::repository::SpotStore;
use crate::spot::{ParkingSpot, SpotChanges, SpotId};
use crate::{CoreError, CoreResult};

/// Spot store held in process memory.
///
/// Every write runs under one write lock, which makes the conditional
/// primitives linearizable. Used for local runs and tests.
#[derive(Default)]
pub struct InMemorySpotStore {
    spots: RwLock<BTreeMap<SpotId, ParkingSpot>>,
    offline: AtomicBool,
}

impl InMemorySpotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert spots that are not present yet. Existing ids are left untouched.
    pub async fn seed(&self, spots: impl IntoIterator<Item = ParkingSpot>) -> usize {
        let mut guard = self.spots.write().await;
        let mut inserted = 0;
        for spot in spots {
            if !guard.contains_key(&spot.id) {
                guard.insert(spot.id, spot);
                inserted += 1;
            }
        }
        info!("Seeded {} parking spots into memory", inserted);
        inserted
    }

    /// Simulate the backing store going away; every call then fails with
    /// `StorageUnavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> CoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::StorageUnavailable("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SpotStore for InMemorySpotStore {
    async fn get(&self, id: SpotId) -> CoreResult<ParkingSpot> {
        self.check_online()?;
        self.spots.read().await.get(&id).cloned().ok_or(CoreError::NotFound(id))
    }

    async fn conditional_update(
        &self,
        id: SpotId,
        expected_available: bool,
        at: DateTime<Utc>,
        changes: SpotChanges,
    ) -> CoreResult<ParkingSpot> {
        self.check_online()?;
        let mut guard = self.spots.write().await;
        let spot = guard.get_mut(&id).ok_or(CoreError::NotFound(id))?;

        if spot.is_available(at) != expected_available {
            return Err(CoreError::Conflict(id));
        }

        spot.apply(changes);
        Ok(spot.clone())
    }

    async fn bulk_expire(&self, before: DateTime<Utc>) -> CoreResult<Vec<ParkingSpot>> {
        self.check_online()?;
        let mut guard = self.spots.write().await;
        let mut changed = Vec::new();

        // BTreeMap iteration keeps the result ordered by id.
        for spot in guard.values_mut() {
            if spot.is_expired(before) {
                spot.apply(SpotChanges::Release);
                changed.push(spot.clone());
            }
        }

        Ok(changed)
    }

    async fn list_all(&self) -> CoreResult<Vec<ParkingSpot>> {
        self.check_online()?;
        Ok(self.spots.read().await.values().cloned().collect())
    }
}
