use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use curbside_core::{
    ChangeNotifier, ChangeReason, CoreError, CoreResult, ParkingSpot, SpotBooking, SpotChangedEvent,
    SpotChanges, SpotId, SpotStore,
};
use tracing::{info, warn};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Validates and executes booking requests against a [`SpotStore`].
pub struct BookingService {
    store: Arc<dyn SpotStore>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl BookingService {
    pub fn new(store: Arc<dyn SpotStore>, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Book `spot_id` for `user_id` from `now` for `duration_hours`.
    ///
    /// Inputs are validated before the store is touched. The write itself is a
    /// conditional update that re-checks availability, so of two racing callers
    /// only one can win; the loser gets `Conflict`. Nothing is retried.
    pub async fn book(
        &self,
        spot_id: SpotId,
        user_id: &str,
        duration_hours: f64,
        now: DateTime<Utc>,
    ) -> CoreResult<ParkingSpot> {
        if user_id.trim().is_empty() {
            return Err(CoreError::InvalidInput("user id must not be empty".to_string()));
        }
        let until = booked_until(now, duration_hours)?;

        let spot = self.store.get(spot_id).await?;
        if !spot.is_available(now) {
            info!("Spot {} already booked until {:?}", spot_id, spot.booked_until());
            return Err(CoreError::Conflict(spot_id));
        }

        let changes = SpotChanges::Book(SpotBooking {
            user_id: user_id.to_string(),
            until,
        });

        let updated = self
            .store
            .conditional_update(spot_id, true, now, changes)
            .await
            .map_err(|e| {
                if let CoreError::Conflict(_) = e {
                    warn!("Spot {} was taken between read and write", spot_id);
                }
                e
            })?;

        info!("Spot {} booked by {} until {}", spot_id, user_id, until);

        self.notifier
            .publish(SpotChangedEvent::new(updated.clone(), ChangeReason::Booked, now));

        Ok(updated)
    }

    pub async fn list_spots(&self) -> CoreResult<Vec<ParkingSpot>> {
        self.store.list_all().await
    }

    /// Spots currently held by `user_id`, ordered by id.
    pub async fn bookings_for(&self, user_id: &str, now: DateTime<Utc>) -> CoreResult<Vec<ParkingSpot>> {
        let spots = self.store.list_all().await?;
        Ok(spots
            .into_iter()
            .filter(|s| s.booked_by_user_id() == Some(user_id) && !s.is_available(now))
            .collect())
    }
}

fn booked_until(now: DateTime<Utc>, duration_hours: f64) -> CoreResult<DateTime<Utc>> {
    if !duration_hours.is_finite() || duration_hours <= 0.0 {
        return Err(CoreError::InvalidInput(format!(
            "booking duration must be a positive number of hours, got {}",
            duration_hours
        )));
    }

    let millis = (duration_hours * MILLIS_PER_HOUR).round();
    if millis < 1.0 {
        return Err(CoreError::InvalidInput(format!(
            "booking duration of {} hours is too short",
            duration_hours
        )));
    }

    Duration::try_milliseconds(millis as i64)
        .and_then(|window| now.checked_add_signed(window))
        .ok_or_else(|| {
            CoreError::InvalidInput(format!("booking duration of {} hours is too long", duration_hours))
        })
}
