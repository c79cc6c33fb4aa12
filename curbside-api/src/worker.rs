use std::sync::Arc;
use curbside_booking::ExpirySweeper;
use tokio::task::JoinHandle;
use tracing::info;

/// Start the periodic expiry sweep in the background.
pub fn start_expiry_worker(sweeper: Arc<ExpirySweeper>) -> JoinHandle<()> {
    info!("Starting expiry worker every {:?}", sweeper.interval());
    tokio::spawn(sweeper.run())
}
