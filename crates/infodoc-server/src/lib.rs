//! infodoc Server
//!
//! Thin HTTP adapter over the resource store: warp routes, configuration,
//! logging setup, and startup seeding.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ServerConfig::default();
//! let store = app::build_store(&config).await?;
//! let state = Arc::new(AppState::new(store, &config));
//! warp::serve(http::routes(state)).run(config.listen).await;
//! ```

#![allow(missing_docs)]

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod telemetry;

pub use app::{AppError, AppState};
pub use cli::Cli;
pub use config::{ConfigError, LimitsConfig, LogConfig, LogFormat, ServerConfig, StorageConfig};
pub use error::ApiError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
