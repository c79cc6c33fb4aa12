pub mod spot;
pub mod repository;
pub mod notifier;
pub mod memory;

pub use spot::{ParkingSpot, SpotBooking, SpotChanges, SpotId};
pub use repository::SpotStore;
pub use notifier::{BroadcastNotifier, ChangeNotifier, ChangeReason, FanoutNotifier, SpotChangedEvent};
pub use memory::InMemorySpotStore;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Parking spot not found: {0}")]
    NotFound(SpotId),
    #[error("Parking spot {0} is not available")]
    Conflict(SpotId),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
