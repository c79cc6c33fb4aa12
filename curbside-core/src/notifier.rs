use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::spot::ParkingSpot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeReason {
    Booked,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotChangedEvent {
    pub event_id: Uuid,
    pub spot: ParkingSpot,
    pub reason: ChangeReason,
    pub timestamp: i64,
}

impl SpotChangedEvent {
    pub fn new(spot: ParkingSpot, reason: ChangeReason, at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            spot,
            reason,
            timestamp: at.timestamp(),
        }
    }
}

/// Receives spot-state changes and fans them out to observers.
///
/// `publish` is fire-and-forget: it must not block the caller and has no way to
/// fail it. Observers that miss events reconcile by listing all spots.
pub trait ChangeNotifier: Send + Sync {
    fn publish(&self, event: SpotChangedEvent);
}

/// In-process fan-out over a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<SpotChangedEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpotChangedEvent> {
        self.tx.subscribe()
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn publish(&self, event: SpotChangedEvent) {
        let spot_id = event.spot.id;
        // Err only means nobody is listening right now.
        match self.tx.send(event) {
            Ok(receivers) => debug!("Spot {} change delivered to {} observers", spot_id, receivers),
            Err(_) => debug!("Spot {} changed with no observers attached", spot_id),
        }
    }
}

/// Publishes every event to each inner notifier in turn.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    targets: Vec<Arc<dyn ChangeNotifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: Arc<dyn ChangeNotifier>) -> Self {
        self.targets.push(target);
        self
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl ChangeNotifier for FanoutNotifier {
    fn publish(&self, event: SpotChangedEvent) {
        for target in &self.targets {
            target.publish(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: i64) -> SpotChangedEvent {
        let spot = ParkingSpot::new(id, "Test", 0.0, 0.0, 10.0).unwrap();
        SpotChangedEvent::new(spot, ChangeReason::Expired, Utc::now())
    }

    #[test]
    fn test_publish_without_observers_does_not_fail() {
        let notifier = BroadcastNotifier::new(4);
        notifier.publish(event(1));
    }

    #[test]
    fn test_fanout_reaches_every_target() {
        let a = BroadcastNotifier::new(4);
        let b = BroadcastNotifier::new(4);
        let mut rx_a = a.subscribe();
        let mut rx_b = b.subscribe();

        let fanout = FanoutNotifier::new()
            .with(Arc::new(a.clone()))
            .with(Arc::new(b.clone()));
        assert_eq!(fanout.len(), 2);

        fanout.publish(event(7));

        assert_eq!(rx_a.try_recv().unwrap().spot.id, 7);
        assert_eq!(rx_b.try_recv().unwrap().spot.id, 7);
    }

    #[test]
    fn test_event_serializes_reason() {
        let value = serde_json::to_value(event(3)).unwrap();
        assert_eq!(value["reason"], "EXPIRED");
        assert_eq!(value["spot"]["id"], 3);
    }
}
