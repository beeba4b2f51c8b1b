mod model;
mod repository;

pub use model::SymbolDB;
pub use repository::SymbolRepository;
