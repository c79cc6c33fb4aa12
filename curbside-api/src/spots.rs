use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use curbside_core::{ParkingSpot, SpotId};
use serde::Serialize;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

/// A spot as shown to clients, with availability evaluated at response time.
#[derive(Debug, Serialize)]
pub struct SpotView {
    pub id: SpotId,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub booking_price_per_hour: f64,
    pub booked_by_user_id: Option<String>,
    pub booked_until: Option<DateTime<Utc>>,
    pub is_available: bool,
}

impl SpotView {
    pub fn at(spot: &ParkingSpot, now: DateTime<Utc>) -> Self {
        Self {
            id: spot.id,
            name: spot.name.clone(),
            lat: spot.lat,
            lng: spot.lng,
            booking_price_per_hour: spot.booking_price_per_hour,
            booked_by_user_id: spot.booked_by_user_id().map(str::to_string),
            booked_until: spot.booked_until(),
            is_available: spot.is_available(now),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/parking-spots", get(list_spots))
        .route("/api/parking-spots/stream", get(stream_changes))
}

async fn list_spots(State(state): State<AppState>) -> Result<Json<Vec<SpotView>>, AppError> {
    let now = Utc::now();
    let spots = state.bookings.list_spots().await?;
    Ok(Json(spots.iter().map(|s| SpotView::at(s, now)).collect()))
}

/// Server-sent stream of spot changes. Clients that fall behind lose events and
/// should refetch the list.
async fn stream_changes(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.changes.subscribe()).filter_map(|result| match result {
        Ok(event) => Event::default()
            .event("spot_changed")
            .json_data(&event)
            .ok()
            .map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("Change stream subscriber lagged, skipped {} events", skipped);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
