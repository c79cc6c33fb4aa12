use curbside_core::ParkingSpot;

/// Total price for holding `spot` for `duration_hours`, rounded to cents.
pub fn quote(spot: &ParkingSpot, duration_hours: f64) -> f64 {
    let total = spot.booking_price_per_hour * duration_hours;
    (total * 100.0).round() / 100.0
}
