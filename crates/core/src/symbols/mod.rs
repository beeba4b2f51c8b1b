//! Symbol universe: metadata, listing status and the store contract.

mod import;
mod model;
mod store;

pub use import::{import_symbol_list, parse_symbol_list, SymbolListImport};
pub use model::{MarketCount, Symbol, SymbolMetadata, SymbolStatus};
pub use store::SymbolStore;
