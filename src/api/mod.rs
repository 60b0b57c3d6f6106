//! API Module
//!
//! This module handles the JSON-RPC API for submitting shipments and
//! running aggregations on demand.

mod server;
pub use server::{AppState, Server};
