pub mod service;
pub mod expiry;
pub mod pricing;

pub use service::BookingService;
pub use expiry::{ExpirySweeper, DEFAULT_SWEEP_INTERVAL};
pub use pricing::quote;
