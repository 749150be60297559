//! # Cluster Review Common Library
//!
//! Shared code for the cluster review client including:
//! - Wire and domain types for the clustering backend API
//! - Review event types and the EventBus
//! - Configuration loading
//! - Common error type

pub mod api;
pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
