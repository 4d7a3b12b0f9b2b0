pub mod models;
pub mod repository;
pub mod service;
pub mod media;
pub mod config;
pub mod error;
pub mod logging;
pub mod bootstrap;
pub mod metrics;

#[cfg(test)]
pub mod test_helpers;

pub use config::Config;
pub use error::{Error, Result};
