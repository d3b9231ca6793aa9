//! Application layer for livemap-subscriber.

pub mod dashboard;

pub use dashboard::{DashboardState, DEFAULT_MAP_SIZE};
