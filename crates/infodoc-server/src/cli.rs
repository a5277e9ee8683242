//! Command line
//!
//! Flags override the matching configuration keys after the TOML file is
//! loaded.

use crate::config::{ConfigError, LogFormat, ServerConfig, StorageConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// infodoc resource server
#[derive(Debug, Clone, Parser)]
#[command(name = "infodoc-server", version, about = "Serve general-info resources with inline documents")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Persist resources as JSON files in this directory
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Load the configuration file, if any, and apply flag overrides
    ///
    /// # Errors
    /// Returns error if the file cannot be loaded
    pub fn resolve(&self) -> Result<ServerConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        Ok(self.apply(base))
    }

    /// Apply flag overrides to `config`
    #[must_use]
    pub fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(data_dir) = &self.data_dir {
            config.storage = StorageConfig::File {
                data_dir: data_dir.clone(),
            };
        }
        if let Some(format) = self.log_format {
            config.log.format = format;
        }
        config
    }
}
