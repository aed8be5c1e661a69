//! Configuration management
//!
//! Configuration lives in a single TOML file. The directory defaults to
//! `<config dir>/upyun` and can be overridden with `UPYUN_CONFIG_DIR`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "UPYUN_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";
const CONFIG_VERSION: u32 = 1;

/// REST API entry point
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Endpoint {
    /// Let the service pick the best line
    #[default]
    Auto,
    Telecom,
    Cnc,
    Ctt,
    /// Any other host, e.g. a proxy or a test server
    Custom(String),
}

impl Endpoint {
    /// Host name requests are sent to
    pub fn host(&self) -> String {
        match self {
            Endpoint::Auto => "v0.api.upyun.com".to_string(),
            Endpoint::Telecom => "v1.api.upyun.com".to_string(),
            Endpoint::Cnc => "v2.api.upyun.com".to_string(),
            Endpoint::Ctt => "v3.api.upyun.com".to_string(),
            Endpoint::Custom(host) => host.clone(),
        }
    }

    /// Whether the host belongs to the public API domain
    pub fn is_official(&self) -> bool {
        self.host().contains("api.upyun.com")
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Auto => write!(f, "auto"),
            Endpoint::Telecom => write!(f, "telecom"),
            Endpoint::Cnc => write!(f, "cnc"),
            Endpoint::Ctt => write!(f, "ctt"),
            Endpoint::Custom(host) => write!(f, "{host}"),
        }
    }
}

impl std::str::FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "" => Err(Error::Config("Endpoint cannot be empty".to_string())),
            "auto" | "v0.api.upyun.com" => Ok(Endpoint::Auto),
            "telecom" | "v1.api.upyun.com" => Ok(Endpoint::Telecom),
            "cnc" | "v2.api.upyun.com" => Ok(Endpoint::Cnc),
            "ctt" | "v3.api.upyun.com" => Ok(Endpoint::Ctt),
            _ if s.contains('/') => Err(Error::Config(format!(
                "Endpoint must be a host name without scheme or path: {s}"
            ))),
            _ => Ok(Endpoint::Custom(s.to_string())),
        }
    }
}

impl TryFrom<String> for Endpoint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

/// Named credentials for one bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub bucket: String,
    pub operator: String,
    pub password: String,
    #[serde(default)]
    pub endpoint: Endpoint,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Profile {
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        operator: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            bucket: bucket.into(),
            operator: operator.into(),
            password: password.into(),
            endpoint: Endpoint::Auto,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("Profile name cannot be empty".to_string()));
        }
        if self.bucket.is_empty() {
            return Err(Error::Config("Bucket cannot be empty".to_string()));
        }
        if self.operator.is_empty() {
            return Err(Error::Config("Operator cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    60
}

/// Retry tuning for uploads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub retries: u32,
    /// Fixed wait between attempts
    pub wait_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            wait_ms: 5000,
        }
    }
}

/// Resumable upload tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Size of every part except the last
    pub part_size: u64,
    /// Payloads smaller than this are sent in a single request
    pub resume_threshold: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            part_size: 1024 * 1024,
            resume_threshold: 10 * 1024 * 1024,
        }
    }
}

/// Directory listing tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    pub page_size: usize,
    /// Capacity of the entry channel
    pub entry_buffer: usize,
    /// Capacity of the error channel
    pub error_buffer: usize,
    /// Stop listing a directory silently when a page comes back without a
    /// cursor header, dropping that page, instead of failing the traversal
    pub lenient_cursor: bool,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            entry_buffer: 1000,
            error_buffer: 10,
            lenient_cursor: false,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub upload: UploadConfig,
    pub retry: RetryConfig,
    pub list: ListConfig,
    pub profiles: Vec<Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            upload: UploadConfig::default(),
            retry: RetryConfig::default(),
            list: ListConfig::default(),
            profiles: Vec::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.upload.part_size == 0 {
            return Err(Error::Config("upload.part_size must be positive".to_string()));
        }
        if self.upload.resume_threshold <= self.upload.part_size {
            return Err(Error::Config(
                "upload.resume_threshold must be larger than upload.part_size".to_string(),
            ));
        }
        if self.list.page_size == 0 {
            return Err(Error::Config("list.page_size must be positive".to_string()));
        }
        if self.list.entry_buffer == 0 || self.list.error_buffer == 0 {
            return Err(Error::Config("list buffers must be positive".to_string()));
        }
        for profile in &self.profiles {
            profile.validate()?;
        }
        Ok(())
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }
}

/// Loads and stores the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Locate the configuration file from the environment
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Cannot determine config directory".to_string()))?
                .join("upyun"),
        };
        Ok(Self::with_path(dir.join(CONFIG_FILE)))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the configuration; a missing file yields the defaults
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Profile CRUD on top of [`ConfigManager`]
#[derive(Debug, Clone)]
pub struct ProfileManager {
    config: ConfigManager,
}

impl ProfileManager {
    pub fn new() -> Result<Self> {
        Ok(Self::with_config(ConfigManager::new()?))
    }

    pub fn with_config(config: ConfigManager) -> Self {
        Self { config }
    }

    pub fn list(&self) -> Result<Vec<Profile>> {
        Ok(self.config.load()?.profiles)
    }

    pub fn get(&self, name: &str) -> Result<Profile> {
        self.config
            .load()?
            .profile(name)
            .cloned()
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// Add a profile, replacing any profile with the same name
    pub fn set(&self, profile: Profile) -> Result<()> {
        profile.validate()?;
        let mut config = self.config.load()?;
        match config.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => config.profiles.push(profile),
        }
        self.config.save(&config)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config.load()?;
        let before = config.profiles.len();
        config.profiles.retain(|p| p.name != name);
        if config.profiles.len() == before {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        self.config.save(&config)
    }
}
