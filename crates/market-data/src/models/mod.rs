//! Row shapes returned by market data providers.

mod bar;
mod listing;

pub use bar::RawBar;
pub use listing::ListedSymbol;
