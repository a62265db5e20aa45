//! # noisegen
//!
//! Composition root: command line / environment configuration, the JSON
//! store for destinations and the last run configuration, and the REST API
//! driving a shared [`NoiseGenerator`](noise_core::NoiseGenerator).

pub mod api;
pub mod config;
pub mod store;

pub use api::{AppState, router};
pub use config::Cli;
pub use store::{Store, StoreError};
