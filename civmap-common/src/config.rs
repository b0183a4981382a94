//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a single TOML file. Every section is
//! optional; a missing file or section falls back to built-in defaults so the
//! tools always start.
//!
//! # Root folder priority
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `CIVMAP_ROOT_FOLDER`
//! 3. TOML `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ENV_ROOT_FOLDER: &str = "CIVMAP_ROOT_FOLDER";

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_FILE: &str = "CIVMAP_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the dataset, record tree, cache and database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub geocoder: GeocoderConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// External source files fed to the enrichment pipeline
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Geocoding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    /// Provider base URL (Nominatim-compatible)
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,

    /// Descriptive client identifier sent as User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Minimum spacing between outbound requests
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum results requested per query
    #[serde(default = "default_result_limit")]
    pub result_limit: u32,

    /// Target region as `[west, north, east, south]`
    #[serde(default = "default_viewbox")]
    pub viewbox: [f64; 4],
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_url(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            min_interval_ms: default_min_interval_ms(),
            timeout_secs: default_timeout_secs(),
            result_limit: default_result_limit(),
            viewbox: default_viewbox(),
        }
    }
}

/// Data file locations; relative paths resolve against the root folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_boundaries")]
    pub boundaries: PathBuf,

    #[serde(default = "default_base_records")]
    pub base_records: PathBuf,

    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,

    #[serde(default = "default_database")]
    pub database: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            boundaries: default_boundaries(),
            base_records: default_base_records(),
            cache_file: default_cache_file(),
            database: default_database(),
        }
    }
}

/// HTTP surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// One external source file for the enrichment pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub kind: SourceKind,
    /// County assumed when the address does not name one
    pub county: String,
}

/// Kind of community resource a source file lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    CareCenter,
    FoodBank,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::CareCenter => "care_center",
            SourceKind::FoodBank => "food_bank",
        }
    }
}

/// Data paths with the root folder applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub boundaries: PathBuf,
    pub base_records: PathBuf,
    pub cache_file: PathBuf,
    pub database: PathBuf,
}

impl TomlConfig {
    /// Resolve every data path against `root`
    pub fn data_paths(&self, root: &Path) -> DataPaths {
        DataPaths {
            boundaries: under_root(root, &self.data.boundaries),
            base_records: under_root(root, &self.data.base_records),
            cache_file: under_root(root, &self.data.cache_file),
            database: under_root(root, &self.data.database),
        }
    }

    /// Source files with the root folder applied
    pub fn resolved_sources(&self, root: &Path) -> Vec<SourceConfig> {
        self.sources
            .iter()
            .map(|s| SourceConfig {
                path: under_root(root, &s.path),
                ..s.clone()
            })
            .collect()
    }
}

fn under_root(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    format!("civmap/{} (village address resolver)", env!("CARGO_PKG_VERSION"))
}

fn default_accept_language() -> String {
    "zh-TW".to_string()
}

fn default_min_interval_ms() -> u64 {
    1200 // provider minimum is 1 req/s
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_result_limit() -> u32 {
    1
}

fn default_viewbox() -> [f64; 4] {
    [119.0, 26.0, 123.0, 21.0]
}

fn default_boundaries() -> PathBuf {
    PathBuf::from("data/villages.geojson")
}

fn default_base_records() -> PathBuf {
    PathBuf::from("local_db")
}

fn default_cache_file() -> PathBuf {
    PathBuf::from("data/geocode_cache.json")
}

fn default_database() -> PathBuf {
    PathBuf::from("civmap.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Locate and load the config file, falling back to defaults
///
/// An explicit path (argument or `CIVMAP_CONFIG`) must parse. A discovered
/// file that fails to parse, or no file at all, yields defaults with a warning.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_FILE) {
        return load_toml_config(Path::new(&path));
    }

    match find_config_file() {
        Some(path) => match load_toml_config(&path) {
            Ok(config) => {
                info!("Configuration loaded from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("{}; using built-in defaults", e);
                Ok(TomlConfig::default())
            }
        },
        None => {
            warn!("No config file found; using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Default configuration file path for the platform
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("civmap").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/civmap/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Root folder resolution in priority order
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>) -> Self {
        Self { cli_arg }
    }

    pub fn resolve(&self, config: &TomlConfig) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &config.root_folder {
            return path.clone();
        }

        default_root_folder()
    }
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/civmap (or /var/lib/civmap for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("civmap"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/civmap"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("civmap"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/civmap"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("civmap"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\civmap"))
    } else {
        PathBuf::from("./civmap_data")
    }
}
