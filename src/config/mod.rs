use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub captioner: CaptionerConfig,
    #[serde(default)]
    pub recaptcha: RecaptchaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: std::path::PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign session tokens. A random per-process secret is
    /// generated when unset, which invalidates sessions across restarts.
    #[serde(default = "default_session_secret")]
    pub session_secret: String,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: default_session_secret(),
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

fn default_session_secret() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_session_ttl_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_from_name() -> String {
    "Image Description".to_string()
}

impl MailConfig {
    /// Startup refuses to proceed without working mail credentials:
    /// registration cannot complete if verification codes cannot be sent.
    pub fn require_credentials(&self) -> Result<()> {
        if self.smtp_host.is_none()
            || self.smtp_username.is_none()
            || self.smtp_password.is_none()
            || self.from_address.is_none()
        {
            anyhow::bail!(
                "Mail credentials are not set: [mail] smtp_host, smtp_username, \
                 smtp_password and from_address are all required"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptionerConfig {
    /// Base URL of the external captioning service.
    #[serde(default = "default_captioner_base_url")]
    pub base_url: String,
}

impl Default for CaptionerConfig {
    fn default() -> Self {
        Self {
            base_url: default_captioner_base_url(),
        }
    }
}

fn default_captioner_base_url() -> String {
    "http://localhost:5000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecaptchaConfig {
    /// Server-side secret; the verification endpoint returns 501 when unset.
    pub secret_key: Option<String>,
    pub site_key: Option<String>,
    #[serde(default = "default_recaptcha_verify_url")]
    pub verify_url: String,
}

impl Default for RecaptchaConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            site_key: None,
            verify_url: default_recaptcha_verify_url(),
        }
    }
}

fn default_recaptcha_verify_url() -> String {
    "https://www.google.com/recaptcha/api/siteverify".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse configuration file")?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.mail.require_credentials()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            mail: MailConfig::default(),
            captioner: CaptionerConfig::default(),
            recaptcha: RecaptchaConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
