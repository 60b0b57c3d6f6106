//! Report State Module
//!
//! Keeps the outcome of the most recent processing cycle in memory so the API
//! can serve it without touching the store.

mod cache;
pub use cache::ReportCache;
