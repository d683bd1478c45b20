//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::chat::{DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_PAGE_SIZE};

/// Launch settings for the Minecraft server process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Server working directory (holds `server.jar`, `whitelist.json`, ...).
    pub path: PathBuf,
    /// Heap size handed to the JVM as both `-Xms` and `-Xmx` (e.g. "2G").
    pub memory: String,
    /// Java binary to launch.
    pub java: String,
    /// Server jar, relative to `path`.
    pub jar: String,
    /// Extra JVM arguments placed before `-jar`.
    pub extra_args: Vec<String>,
    /// Replace the generated launch arguments entirely (wrapper scripts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_args: Option<Vec<String>>,
    /// Seconds to wait for `stop` before terminating the process.
    pub stop_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("server"),
            memory: "2G".to_string(),
            java: "java".to_string(),
            jar: "server.jar".to_string(),
            extra_args: Vec::new(),
            launch_args: None,
            stop_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Outbound chat batching settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// Channel that receives the relayed chat.
    pub channel_id: String,
    /// Delay between queue flushes, in milliseconds.
    pub flush_interval_ms: u64,
    /// Maximum characters per outbound message.
    pub page_size: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            channel_id: String::new(),
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ChatConfig {
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Which chat transport delivers pages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Write pages to the log only.
    #[default]
    Log,
    /// Post pages through the Discord REST API.
    Discord,
}

/// Chat transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// Base URL for the REST API.
    pub base_url: String,
    /// Environment variable holding the bot token.
    pub token_env: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Log,
            base_url: "https://discord.com/api/v10".to_string(),
            token_env: "DISCORD_TOKEN".to_string(),
        }
    }
}

/// Allow-list file settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AllowListConfig {
    /// Allow-list file, relative to the server path.
    pub file: PathBuf,
    /// Rewrite the file and issue `whitelist reload` right after start.
    pub reload_on_start: bool,
}

impl Default for AllowListConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("whitelist.json"),
            reload_on_start: true,
        }
    }
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub transport: TransportConfig,
    pub allowlist: AllowListConfig,
}

impl BridgeConfig {
    /// Path of the allow-list file, resolved against the server directory.
    #[must_use]
    pub fn allowlist_path(&self) -> PathBuf {
        self.server.path.join(&self.allowlist.file)
    }

    /// Reject settings the bridge cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.page_size == 0 {
            return Err(ConfigError::Invalid("chat.page_size must be positive".into()));
        }
        if self.chat.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "chat.flush_interval_ms must be positive".into(),
            ));
        }
        if !is_memory_size(&self.server.memory) {
            return Err(ConfigError::Invalid(format!(
                "server.memory must look like 1024M or 2G, got {:?}",
                self.server.memory
            )));
        }
        if self.transport.kind == TransportKind::Discord && self.chat.channel_id.is_empty() {
            return Err(ConfigError::Invalid(
                "chat.channel_id is required for the discord transport".into(),
            ));
        }
        Ok(())
    }
}

/// JVM heap sizes are digits with an optional K/M/G unit.
fn is_memory_size(value: &str) -> bool {
    let digits = value.trim_end_matches(['k', 'K', 'm', 'M', 'g', 'G']);
    value.len() - digits.len() <= 1
        && !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
}
