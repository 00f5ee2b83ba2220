//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::path::{Path, PathBuf};

/// Environment variable overriding the root folder
pub const ROOT_ENV_VAR: &str = "MREC_ROOT";

/// Default debounce window for text field commits
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;
/// Default time a `saved` status stays visible before reverting to `idle`
pub const DEFAULT_SAVED_DISPLAY_MS: u64 = 2000;
/// Default lifetime of a signed storage URL
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
/// Default number of tool-calling rounds per chat request
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` key of the loaded config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config_root: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: config file, whichever one was loaded
    if let Some(path) = config_root.filter(|p| !p.as_os_str().is_empty()) {
        return path.to_path_buf();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Find the configuration file for the platform
///
/// Linux checks `~/.config/mrec/config.toml` then `/etc/mrec/config.toml`.
pub fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("mrec").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/mrec/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("mrec"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/mrec"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("mrec"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/mrec"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("mrec"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\mrec"))
    } else {
        PathBuf::from("./mrec_data")
    }
}

/// Database file inside the root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join("mrec.db")
}

/// Object storage directory inside the root folder
pub fn storage_path(root: &Path) -> PathBuf {
    root.join("storage")
}

/// HTTP service configuration (`[server]` table of the config file)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Absolute base used when building signed URLs
    pub public_url: Option<String>,
    pub signed_url_ttl_secs: u64,
    pub ai: AiConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5730,
            public_url: None,
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
            ai: AiConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn public_base_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.bind_address()))
    }
}

/// AI provider configuration (`[server.ai]`)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    /// OpenAI-compatible API base, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub model: String,
    pub reasoning_effort: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tool_rounds: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            reasoning_effort: "low".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

impl AiConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

/// Auto-save timing (`[autosave]` table of the config file)
///
/// The server hands these to remote clients through `/api/me`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutosaveConfig {
    pub debounce_ms: u64,
    pub saved_display_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            saved_display_ms: DEFAULT_SAVED_DISPLAY_MS,
        }
    }
}

impl AutosaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn saved_display(&self) -> Duration {
        Duration::from_millis(self.saved_display_ms)
    }
}

/// Contents of the config file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Root folder; the command line and environment take precedence
    pub root_folder: Option<PathBuf>,
    pub server: ServerConfig,
    pub autosave: AutosaveConfig,
}

/// Parse config file text
pub fn parse_config(toml_content: &str) -> Result<Config> {
    toml::from_str(toml_content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
}

/// Load configuration from an explicit file, the located config file, or defaults
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match locate_config_file() {
            Ok(path) => path,
            Err(_) => {
                tracing::info!("No config file found, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    tracing::info!("Loaded config file: {}", path.display());
    parse_config(&content)
}
