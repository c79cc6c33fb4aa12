use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use curbside_core::{ChangeNotifier, ChangeReason, CoreResult, ParkingSpot, SpotChangedEvent, SpotStore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Releases bookings whose expiry has passed.
pub struct ExpirySweeper {
    store: Arc<dyn SpotStore>,
    notifier: Arc<dyn ChangeNotifier>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn SpotStore>, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self {
            store,
            notifier,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        // tokio intervals must be non-zero
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep at `now`.
    ///
    /// Storage errors are logged here and returned; the sweep is simply
    /// abandoned until the next scheduled tick.
    pub async fn tick(&self, now: DateTime<Utc>) -> CoreResult<Vec<ParkingSpot>> {
        let released = match self.store.bulk_expire(now).await {
            Ok(released) => released,
            Err(e) => {
                error!("Expiry sweep at {} abandoned: {}", now, e);
                return Err(e);
            }
        };

        if released.is_empty() {
            debug!("Expiry sweep at {}: nothing to release", now);
            return Ok(released);
        }

        for spot in &released {
            self.notifier
                .publish(SpotChangedEvent::new(spot.clone(), ChangeReason::Expired, now));
        }
        info!("Expiry sweep at {} released {} spots", now, released.len());

        Ok(released)
    }

    /// Tick forever on the configured interval using the wall clock.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Expiry sweeper started, interval {:?}", self.interval);

        loop {
            ticker.tick().await;
            // Failures are already logged by tick.
            let _ = self.tick(Utc::now()).await;
        }
    }
}
