use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/gamekeep.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session and CSRF cookies.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Trusted proxy IP addresses allowed to provide forwarded client IP headers.
    ///
    /// When empty, forwarded headers are ignored for rate-limiting identity and
    /// the socket peer address is used.
    pub trusted_proxy_ips: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6780,
            cors_allowed_origins: vec![
                "http://localhost:6780".to_string(),
                "http://127.0.0.1:6780".to_string(),
            ],
            secure_cookies: true,
            trusted_proxy_ips: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub argon2: Argon2Config,

    pub password: PasswordPolicyConfig,

    pub lockout: LockoutConfig,

    pub reset: ResetConfig,

    pub csrf: CsrfConfig,

    pub session: SessionConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2: Argon2Config::default(),
            password: PasswordPolicyConfig::default(),
            lockout: LockoutConfig::default(),
            reset: ResetConfig::default(),
            csrf: CsrfConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2Config {
    /// Argon2 memory cost in KiB (default: 19456 = ~19MB).
    /// Sized to resist offline brute force while keeping a single
    /// verification well under a second on reference hardware.
    pub memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost_kib: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicyConfig {
    pub min_length: usize,

    pub max_length: usize,

    /// Additional entries for the common-password denylist, matched
    /// case-insensitively against the built-in list.
    pub extra_common_passwords: Vec<String>,
}

impl Default for PasswordPolicyConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 100,
            extra_common_passwords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Failed attempts before an account (or origin) locks.
    pub max_attempts: u32,

    /// Lock window once the threshold trips.
    pub lock_minutes: i64,

    /// Active accounts whose last login is older than this are marked
    /// inactive by the maintenance job.
    pub inactivity_days: i64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_minutes: 30,
            inactivity_days: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// Reset token lifetime.
    pub token_ttl_minutes: i64,

    /// A still-valid token younger than this suppresses reissue; the
    /// response is indistinguishable from a fresh issue.
    pub resend_window_minutes: i64,

    /// Issuance cap per origin per hour.
    pub origin_hourly_cap: usize,

    /// Randomized artificial delay applied to every issuance branch so
    /// timing does not reveal whether an address exists.
    pub delay_min_ms: u64,

    pub delay_max_ms: u64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: 60,
            resend_window_minutes: 15,
            origin_hourly_cap: 3,
            delay_min_ms: 50,
            delay_max_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsrfConfig {
    pub token_ttl_hours: i64,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self { token_ttl_hours: 24 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session inactivity expiry in days, clamped to 7 at load time.
    pub expiry_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { expiry_days: 7 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,

    /// Interval for the in-memory map sweeps (CSRF tokens, origin records).
    pub sweep_interval_seconds: u64,

    /// Cron expression for the daily inactivity pass.
    pub inactivity_cron: String,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_seconds: 300,
            inactivity_cron: "0 0 3 * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "gamekeep".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            maintenance: MaintenanceConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("gamekeep").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".gamekeep").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.security.password.min_length < 4 {
            anyhow::bail!("Password minimum length must be at least 4");
        }
        if self.security.password.max_length < self.security.password.min_length {
            anyhow::bail!("Password maximum length must be >= minimum length");
        }
        if self.security.lockout.max_attempts == 0 {
            anyhow::bail!("Lockout max attempts must be > 0");
        }
        if self.security.reset.delay_max_ms < self.security.reset.delay_min_ms {
            anyhow::bail!("Reset delay range is inverted");
        }
        if self.security.argon2.parallelism == 0 || self.security.argon2.time_cost == 0 {
            anyhow::bail!("Argon2 cost parameters must be > 0");
        }

        Ok(())
    }

    /// Session expiry, clamped to the 7-day ceiling the issuance contract
    /// allows.
    #[must_use]
    pub fn session_expiry_days(&self) -> i64 {
        self.security.session.expiry_days.clamp(1, 7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.security.lockout.max_attempts, 5);
        assert_eq!(config.security.lockout.lock_minutes, 30);
        assert_eq!(config.security.reset.token_ttl_minutes, 60);
        assert_eq!(config.security.argon2.memory_cost_kib, 19456);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[security.lockout]"));
        assert!(toml_str.contains("[maintenance]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [security.lockout]
            max_attempts = 3
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.security.lockout.max_attempts, 3);

        assert_eq!(config.security.reset.origin_hourly_cap, 3);
    }

    #[test]
    fn test_session_expiry_is_clamped() {
        let mut config = Config::default();
        config.security.session.expiry_days = 30;
        assert_eq!(config.session_expiry_days(), 7);

        config.security.session.expiry_days = 0;
        assert_eq!(config.session_expiry_days(), 1);
    }
}
