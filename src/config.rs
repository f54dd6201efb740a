use eyre::{Context, Result};
use robolink::drive::DEFAULT_BOUND;
use robolink::link::LinkConfig;
use robolink::protocol::{Component, Receiver, Transmitter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub link: LinkSection,
    pub drive: DriveSection,
    pub chatter: ChatterSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSection {
    pub url: String,
    pub keepalive_secs: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub connect_timeout_ms: u64,
    pub disconnect_grace_ms: u64,
    pub send_timeout_ms: u64,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            url: "ws://192.168.3.2:2005".to_string(),
            keepalive_secs: 30,
            reconnect_delay_ms: 5000,
            max_reconnect_attempts: 5,
            connect_timeout_ms: 5000,
            disconnect_grace_ms: 2000,
            send_timeout_ms: 5000,
        }
    }
}

impl LinkSection {
    pub fn to_link_config(&self) -> LinkConfig {
        LinkConfig::default()
            .with_keepalive_interval(Duration::from_secs(self.keepalive_secs))
            .with_reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
            .with_max_reconnect_attempts(self.max_reconnect_attempts)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_disconnect_grace(Duration::from_millis(self.disconnect_grace_ms))
            .with_send_timeout(Duration::from_millis(self.send_timeout_ms))
    }

    fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 {
            eyre::bail!("link.connect_timeout_ms must be > 0");
        }
        if self.disconnect_grace_ms == 0 {
            eyre::bail!("link.disconnect_grace_ms must be > 0");
        }
        if self.send_timeout_ms == 0 {
            eyre::bail!("link.send_timeout_ms must be > 0");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveSection {
    pub transmitter: Transmitter,
    pub receiver: Receiver,
    pub component: Component,
    pub bound: i32,
}

impl Default for DriveSection {
    fn default() -> Self {
        Self {
            transmitter: Transmitter::Master,
            receiver: Receiver::All,
            component: Component::Drive,
            bound: DEFAULT_BOUND,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatterSection {
    pub interval_ms: u64,
    pub prefix: String,
}

impl Default for ChatterSection {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            prefix: "Hello world ".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.link.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
