use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use curbside_booking::quote;
use curbside_core::SpotId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::middleware::{user_auth_middleware, UserClaims};
use crate::spots::SpotView;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BookSpotRequest {
    // Missing is treated like zero so it fails the same validation.
    pub duration_hours: Option<f64>,
}

#[derive(Debug, Serialize)]
struct BookSpotResponse {
    success: bool,
    spot: SpotView,
    total_price: f64,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/book-spot/{id}", post(book_spot))
        .route("/api/my-bookings", get(my_bookings))
        .route_layer(axum::middleware::from_fn_with_state(state, user_auth_middleware))
}

async fn book_spot(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(spot_id): Path<SpotId>,
    body: Result<Json<BookSpotRequest>, JsonRejection>,
) -> Result<Json<BookSpotResponse>, AppError> {
    let Json(req) = body?;
    let now = Utc::now();
    let duration_hours = req.duration_hours.unwrap_or(0.0);

    let spot = state.bookings.book(spot_id, &claims.sub, duration_hours, now).await?;
    info!("User {} booked spot {} for {}h", claims.sub, spot_id, duration_hours);

    Ok(Json(BookSpotResponse {
        success: true,
        total_price: quote(&spot, duration_hours),
        spot: SpotView::at(&spot, now),
    }))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<Vec<SpotView>>, AppError> {
    let now = Utc::now();
    let spots = state.bookings.bookings_for(&claims.sub, now).await?;
    Ok(Json(spots.iter().map(|s| SpotView::at(s, now)).collect()))
}
