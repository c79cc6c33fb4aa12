use std::sync::Arc;
use curbside_booking::{BookingService, ExpirySweeper};
use curbside_core::BroadcastNotifier;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub audience: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub sweeper: Arc<ExpirySweeper>,
    /// Feeds the SSE change stream.
    pub changes: BroadcastNotifier,
    pub auth: AuthConfig,
    pub cron_secret: Option<String>,
    pub allowed_origin: Option<String>,
}
