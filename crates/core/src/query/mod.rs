//! Read-only access for analysis code.

mod service;

pub use service::{DatabaseInfo, QueryService};
