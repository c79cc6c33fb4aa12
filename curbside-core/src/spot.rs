use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

pub type SpotId = i64;

/// Who holds a spot and until when.
///
/// Both halves of a booking travel together, so a spot can never carry a
/// user without an expiry or an expiry without a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotBooking {
    pub user_id: String,
    pub until: DateTime<Utc>,
}

/// A parking spot as stored by a [`crate::SpotStore`].
///
/// Availability is derived from the booking's expiry and never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "SpotRecord", try_from = "SpotRecord")]
pub struct ParkingSpot {
    pub id: SpotId,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub booking_price_per_hour: f64,
    pub booking: Option<SpotBooking>,
}

impl ParkingSpot {
    /// Build an unbooked spot, as done by seeding.
    pub fn new(id: SpotId, name: impl Into<String>, lat: f64, lng: f64, booking_price_per_hour: f64) -> CoreResult<Self> {
        if !booking_price_per_hour.is_finite() || booking_price_per_hour < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "booking price for spot {} must be a non-negative number, got {}",
                id, booking_price_per_hour
            )));
        }

        Ok(Self {
            id,
            name: name.into(),
            lat,
            lng,
            booking_price_per_hour,
            booking: None,
        })
    }

    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        match &self.booking {
            None => true,
            Some(b) => b.until <= now,
        }
    }

    /// True when the sweeper should release this spot. Strictly after the expiry,
    /// unlike [`Self::is_available`] which already frees the spot at the expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(&self.booking, Some(b) if b.until < now)
    }

    pub fn booked_by_user_id(&self) -> Option<&str> {
        self.booking.as_ref().map(|b| b.user_id.as_str())
    }

    pub fn booked_until(&self) -> Option<DateTime<Utc>> {
        self.booking.as_ref().map(|b| b.until)
    }

    pub fn apply(&mut self, changes: SpotChanges) {
        self.booking = match changes {
            SpotChanges::Book(booking) => Some(booking),
            SpotChanges::Release => None,
        };
    }
}

/// The only mutations a booking core may request from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotChanges {
    Book(SpotBooking),
    Release,
}

/// Flat wire shape of a spot, mirroring the persisted columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SpotRecord {
    id: SpotId,
    name: String,
    lat: f64,
    lng: f64,
    booking_price_per_hour: f64,
    booked_by_user_id: Option<String>,
    booked_until: Option<DateTime<Utc>>,
}

impl From<ParkingSpot> for SpotRecord {
    fn from(spot: ParkingSpot) -> Self {
        let (booked_by_user_id, booked_until) = match spot.booking {
            Some(b) => (Some(b.user_id), Some(b.until)),
            None => (None, None),
        };

        Self {
            id: spot.id,
            name: spot.name,
            lat: spot.lat,
            lng: spot.lng,
            booking_price_per_hour: spot.booking_price_per_hour,
            booked_by_user_id,
            booked_until,
        }
    }
}

impl TryFrom<SpotRecord> for ParkingSpot {
    type Error = CoreError;

    fn try_from(record: SpotRecord) -> Result<Self, Self::Error> {
        let booking = booking_from_columns(record.id, record.booked_by_user_id, record.booked_until)?;
        let mut spot = ParkingSpot::new(record.id, record.name, record.lat, record.lng, record.booking_price_per_hour)?;
        spot.booking = booking;
        Ok(spot)
    }
}

/// Combine the two nullable booking columns, rejecting rows where only one is set.
pub fn booking_from_columns(
    id: SpotId,
    booked_by_user_id: Option<String>,
    booked_until: Option<DateTime<Utc>>,
) -> CoreResult<Option<SpotBooking>> {
    match (booked_by_user_id, booked_until) {
        (Some(user_id), Some(until)) => Ok(Some(SpotBooking { user_id, until })),
        (None, None) => Ok(None),
        _ => Err(CoreError::InvalidInput(format!(
            "spot {} has only one of booked_by_user_id / booked_until set",
            id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn booked(until: DateTime<Utc>) -> ParkingSpot {
        let mut spot = ParkingSpot::new(1, "Main St", 12.97, 77.59, 50.0).unwrap();
        spot.apply(SpotChanges::Book(SpotBooking { user_id: "alice".to_string(), until }));
        spot
    }

    #[test]
    fn test_availability_boundaries() {
        let until = t0() + Duration::hours(1);
        let spot = booked(until);

        assert!(!spot.is_available(until - Duration::seconds(1)));
        assert!(spot.is_available(until));
        assert!(!spot.is_expired(until));
        assert!(spot.is_expired(until + Duration::seconds(1)));
    }

    #[test]
    fn test_unbooked_spot_is_available() {
        let spot = ParkingSpot::new(2, "Lot B", 0.0, 0.0, 0.0).unwrap();
        assert!(spot.is_available(t0()));
        assert!(!spot.is_expired(t0()));
        assert_eq!(spot.booked_by_user_id(), None);
        assert_eq!(spot.booked_until(), None);
    }

    #[test]
    fn test_negative_price_rejected() {
        assert!(matches!(
            ParkingSpot::new(3, "Bad", 0.0, 0.0, -1.0),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(ParkingSpot::new(3, "Bad", 0.0, 0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_release_clears_both_fields() {
        let mut spot = booked(t0());
        spot.apply(SpotChanges::Release);
        assert_eq!(spot.booked_by_user_id(), None);
        assert_eq!(spot.booked_until(), None);
    }

    #[test]
    fn test_wire_shape_uses_flat_columns() {
        let spot = booked(t0() + Duration::hours(2));
        let value = serde_json::to_value(&spot).unwrap();

        assert_eq!(value["booked_by_user_id"], "alice");
        assert_eq!(value["booked_until"], "2024-01-01T02:00:00Z");
        assert!(value.get("is_available").is_none());

        let back: ParkingSpot = serde_json::from_value(value).unwrap();
        assert_eq!(back, spot);
    }

    #[test]
    fn test_half_booked_record_rejected() {
        let json = serde_json::json!({
            "id": 9,
            "name": "Broken",
            "lat": 0.0,
            "lng": 0.0,
            "booking_price_per_hour": 10.0,
            "booked_by_user_id": "alice",
            "booked_until": null
        });
        assert!(serde_json::from_value::<ParkingSpot>(json).is_err());
    }
}
