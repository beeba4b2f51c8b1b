//! Daily OHLCV bars: model, store contract and invariant checks.

mod model;
mod store;
mod validator;

pub use model::{Bar, BarStats, UpsertOutcome};
pub use store::BarStore;
pub use validator::{BarValidator, ValidationSeverity, ValidatorConfig};
