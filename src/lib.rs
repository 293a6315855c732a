//! Client-side sync for a job/slave/workflow scheduler.

pub mod api;
pub mod bus;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod notify;
pub mod socket;
pub mod store;
