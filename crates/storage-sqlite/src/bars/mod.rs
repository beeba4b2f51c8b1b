mod model;
mod repository;

pub use model::DailyBarDB;
pub use repository::BarRepository;
