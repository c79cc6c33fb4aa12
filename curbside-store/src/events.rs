use std::time::Duration;

use curbside_core::{ChangeNotifier, SpotChangedEvent};
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::{debug, error, warn};

/// Produces every spot change to a Kafka topic, keyed by spot id so that the
/// changes of one spot stay ordered within a partition.
#[derive(Clone)]
pub struct KafkaChangeNotifier {
    producer: FutureProducer,
    topic: String,
}

impl KafkaChangeNotifier {
    pub fn new(brokers: &str, topic: impl Into<String>) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.into(),
        })
    }
}

/// Partition key and JSON payload for one change.
fn encode(event: &SpotChangedEvent) -> serde_json::Result<(String, String)> {
    Ok((event.spot.id.to_string(), serde_json::to_string(event)?))
}

impl ChangeNotifier for KafkaChangeNotifier {
    fn publish(&self, event: SpotChangedEvent) {
        let (key, payload) = match encode(&event) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Dropping change event for spot {}: {}", event.spot.id, e);
                return;
            }
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime, dropping change event for spot {}", event.spot.id);
            return;
        };

        let producer = self.producer.clone();
        let topic = self.topic.clone();
        handle.spawn(async move {
            let record = FutureRecord::to(&topic).key(&key).payload(&payload);
            match producer.send(record, Timeout::After(Duration::from_secs(0))).await {
                Ok(delivery) => debug!(
                    "Spot {} change delivered to {} partition {} offset {}",
                    key, topic, delivery.partition, delivery.offset
                ),
                Err((e, _)) => error!("Failed to deliver spot {} change to {}: {}", key, topic, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use curbside_core::{ChangeReason, ParkingSpot};

    #[test]
    fn test_encode_keys_by_spot_id() {
        let spot = ParkingSpot::new(7, "Koramangala", 12.93, 77.62, 20.0).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let event = SpotChangedEvent::new(spot, ChangeReason::Expired, at);

        let (key, payload) = encode(&event).unwrap();

        assert_eq!(key, "7");
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["reason"], "EXPIRED");
        assert_eq!(json["spot"]["id"], 7);
        assert_eq!(json["event_id"], event.event_id.to_string());
    }
}
