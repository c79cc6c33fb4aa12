pub mod app_config;
pub mod database;
pub mod spot_repo;
pub mod events;

pub use database::DbClient;
pub use spot_repo::PgSpotStore;
pub use events::KafkaChangeNotifier;
