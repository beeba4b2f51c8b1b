//! Maintenance: keep the symbol universe current with full, delta and gap
//! repair runs, and retire symbols the source no longer lists.

mod cancel;
mod model;
mod planner;
mod service;
mod store;

#[cfg(test)]
mod service_tests;

pub use cancel::CancellationFlag;
pub use model::{
    BarGap, MaintenanceMode, PruneSummary, RunSummary, SymbolRunResult, SymbolRunStatus,
};
pub use planner::{plan_download, plan_repair, plan_update, StoredSpan, SyncPlan};
pub use service::{MaintenanceConfig, MaintenanceService};
pub use store::{GapStore, MetadataStore};
