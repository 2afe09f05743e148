//! Data types for queries, payloads, rulings and configuration.

pub mod config;
pub mod payload;
pub mod query;
pub mod ruling;
