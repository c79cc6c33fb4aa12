use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::spot::{ParkingSpot, SpotChanges, SpotId};
use crate::CoreResult;

/// Storage for parking spots.
///
/// Implementations own the atomicity of every write: `conditional_update` and
/// `bulk_expire` must each be linearizable per spot.
#[async_trait]
pub trait SpotStore: Send + Sync {
    async fn get(&self, id: SpotId) -> CoreResult<ParkingSpot>;

    /// Apply `changes` only if the spot's availability at `at` still equals
    /// `expected_available` when the write happens. Fails with `Conflict` otherwise.
    async fn conditional_update(
        &self,
        id: SpotId,
        expected_available: bool,
        at: DateTime<Utc>,
        changes: SpotChanges,
    ) -> CoreResult<ParkingSpot>;

    /// Release every booking with `booked_until < before` and return exactly
    /// the spots that changed, ordered by id.
    async fn bulk_expire(&self, before: DateTime<Utc>) -> CoreResult<Vec<ParkingSpot>>;

    async fn list_all(&self) -> CoreResult<Vec<ParkingSpot>>;
}
