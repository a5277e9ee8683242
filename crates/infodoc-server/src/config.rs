//! Server configuration
//!
//! [`ServerConfig`] is read from an optional TOML file; every key has a
//! default so an empty file (or none) yields a working memory-backed
//! server seeded with resource `1`.
//!
//! ```toml
//! listen = "0.0.0.0:8000"
//! seed_ids = ["1"]
//!
//! [limits]
//! max_attachment_bytes = 5242880
//!
//! [storage]
//! backend = "file"
//! data_dir = "/var/lib/infodoc"
//!
//! [log]
//! format = "json"
//! ```

use infodoc_artifact::{
    ResourceId, SizeLimits, DEFAULT_MAX_ATTACHMENT_BYTES, DEFAULT_MAX_TOTAL_BYTES,
    DEFAULT_RESOURCE_TYPE,
};
use infodoc_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// JSON framing allowance on top of the encoded attachments (1 MiB)
pub const BODY_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8000;

/// Top-level server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind
    pub listen: SocketAddr,
    /// JSON-LD type of served resources
    pub resource_type: String,
    /// Size ceilings
    pub limits: LimitsConfig,
    /// Persistence backend
    pub storage: StorageConfig,
    /// Resources created at startup when absent
    pub seed_ids: Vec<ResourceId>,
    /// Honour `If-Match` on replace
    pub optimistic_concurrency: bool,
    /// Logging
    pub log: LogConfig,
}

impl ServerConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or does not parse
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not a valid configuration
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// With listen address
    #[inline]
    #[must_use]
    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    /// With resource type
    #[inline]
    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    /// With size limits
    #[inline]
    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// With storage backend
    #[inline]
    #[must_use]
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// With seed ids
    #[inline]
    #[must_use]
    pub fn with_seed_ids(mut self, seed_ids: Vec<ResourceId>) -> Self {
        self.seed_ids = seed_ids;
        self
    }

    /// With optimistic concurrency switch
    #[inline]
    #[must_use]
    pub fn with_optimistic_concurrency(mut self, enabled: bool) -> Self {
        self.optimistic_concurrency = enabled;
        self
    }

    /// With log settings
    #[inline]
    #[must_use]
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Store behaviour derived from this configuration
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::default().with_optimistic_concurrency(self.optimistic_concurrency)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    /// Returns the first constraint violated
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resource_type.trim().is_empty() {
            return Err(ConfigError::EmptyResourceType);
        }
        let limits = &self.limits;
        if limits.max_attachment_bytes == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "limits.max_attachment_bytes",
            });
        }
        if limits.max_total_bytes == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "limits.max_total_bytes",
            });
        }
        if limits.max_body_bytes == Some(0) {
            return Err(ConfigError::ZeroLimit {
                name: "limits.max_body_bytes",
            });
        }
        if limits.max_attachment_bytes > limits.max_total_bytes {
            return Err(ConfigError::AttachmentAboveAggregate {
                attachment: limits.max_attachment_bytes,
                total: limits.max_total_bytes,
            });
        }
        let required = limits.encoded_total_bytes();
        if limits.body_limit() < required {
            return Err(ConfigError::BodyTooSmall {
                body: limits.body_limit(),
                required,
            });
        }
        if let StorageConfig::File { data_dir } = &self.storage {
            if data_dir.as_os_str().is_empty() {
                return Err(ConfigError::EmptyDataDir);
            }
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            resource_type: DEFAULT_RESOURCE_TYPE.to_string(),
            limits: LimitsConfig::default(),
            storage: StorageConfig::default(),
            seed_ids: ResourceId::new("1").into_iter().collect(),
            optimistic_concurrency: false,
            log: LogConfig::default(),
        }
    }
}

/// Size ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Decoded bytes per attachment
    pub max_attachment_bytes: usize,
    /// Decoded bytes across all attachments of a resource
    pub max_total_bytes: usize,
    /// Request body bytes; derived from `max_total_bytes` when unset
    pub max_body_bytes: Option<u64>,
}

impl LimitsConfig {
    /// Attachment ceilings for the merge engine
    #[must_use]
    pub fn size_limits(&self) -> SizeLimits {
        SizeLimits::new(self.max_attachment_bytes, self.max_total_bytes)
    }

    /// Base64 text length of the aggregate ceiling
    #[must_use]
    pub fn encoded_total_bytes(&self) -> u64 {
        u64::try_from(self.max_total_bytes)
            .unwrap_or(u64::MAX)
            .div_ceil(3)
            .saturating_mul(4)
    }

    /// Effective request body ceiling
    #[must_use]
    pub fn body_limit(&self) -> u64 {
        self.max_body_bytes
            .unwrap_or_else(|| self.encoded_total_bytes().saturating_add(BODY_OVERHEAD_BYTES))
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_body_bytes: None,
        }
    }
}

/// Persistence backend selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process memory; lost on exit
    #[default]
    Memory,
    /// One JSON file per resource
    File {
        /// Directory holding the files
        data_dir: PathBuf,
    },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Output format
    pub format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: Option<String>,
}

/// Invalid configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// `resource_type` is blank
    #[error("resource_type must not be empty")]
    EmptyResourceType,

    /// A size limit is zero
    #[error("{name} must be greater than zero")]
    ZeroLimit { name: &'static str },

    /// Per-attachment ceiling larger than the aggregate
    #[error("max_attachment_bytes ({attachment}) exceeds max_total_bytes ({total})")]
    AttachmentAboveAggregate { attachment: usize, total: usize },

    /// Body ceiling cannot carry a full set of attachments
    #[error("max_body_bytes ({body}) is below the encoded aggregate size ({required})")]
    BodyTooSmall { body: u64, required: u64 },

    /// File storage without a directory
    #[error("storage.data_dir must not be empty")]
    EmptyDataDir,
}
