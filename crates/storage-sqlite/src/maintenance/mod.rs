mod model;
mod repository;

pub use model::{BarGapDB, StoreMetadataDB};
pub use repository::MaintenanceRepository;
