use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allowed CORS origins. Set CIFIX_LEARN__API__CORS_ALLOWED_ORIGINS in production.
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
    /// Base URL used when building links in outgoing emails.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl ApiConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_hours: u64,
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: i64,
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,
    #[serde(default = "default_verification_expiry")]
    pub verification_expiry_hours: i64,
    #[serde(default = "default_true")]
    pub require_strong_passwords: bool,
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// When false, messages are logged instead of delivered.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_base_url: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_sender")]
    pub sender: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default = "default_email_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base_url: String::new(),
            api_token: String::new(),
            sender: default_sender(),
            reply_to: None,
            timeout_ms: default_email_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_global_requests")]
    pub global_requests: usize,
    #[serde(default = "default_global_window_secs")]
    pub global_window_secs: u64,
    /// Skip the global per-IP limit for loopback peers (local development).
    #[serde(default)]
    pub exempt_loopback: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_requests: default_global_requests(),
            global_window_secs: default_global_window_secs(),
            exempt_loopback: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    /// The admin account is only created when a password is configured.
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            admin_email: default_admin_email(),
            admin_password: None,
        }
    }
}

fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_api_port() -> u16 { 8000 }
fn default_public_url() -> String { "http://localhost:8000".to_string() }
fn default_environment() -> String { "development".to_string() }
fn default_db_path() -> String { "./cifix-learn.db".to_string() }
fn default_jwt_expiry() -> u64 { 24 }
fn default_max_login_attempts() -> i64 { 5 }
fn default_lockout_minutes() -> i64 { 30 }
fn default_verification_expiry() -> i64 { 24 }
fn default_true() -> bool { true }
fn default_password_min_length() -> usize { 8 }
fn default_sender() -> String { "noreply@localhost".to_string() }
fn default_email_timeout_ms() -> u64 { 10_000 }
fn default_global_requests() -> usize { 1000 }
fn default_global_window_secs() -> u64 { 3600 }
fn default_admin_email() -> String { "admin@cifixlearn.com".to_string() }
fn default_cors_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "https://cifixlearn.online".to_string(),
    ]
}

const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

pub fn validate(cfg: &Config) -> Result<()> {
    if cfg.auth.jwt_secret == DEFAULT_JWT_SECRET {
        anyhow::bail!(
            "SECURITY ERROR: JWT secret must be changed from default value '{}'. \
            Set CIFIX_LEARN__AUTH__JWT_SECRET environment variable with a strong random value.",
            DEFAULT_JWT_SECRET
        );
    }

    if cfg.auth.jwt_secret.len() < 32 {
        anyhow::bail!(
            "CONFIG ERROR: JWT secret must be at least 32 characters (current: {})",
            cfg.auth.jwt_secret.len()
        );
    }

    if cfg.auth.max_login_attempts < 1 {
        anyhow::bail!("CONFIG ERROR: auth.max_login_attempts must be at least 1");
    }

    if cfg.email.enabled && cfg.email.api_base_url.is_empty() {
        anyhow::bail!("CONFIG ERROR: email.api_base_url is required when email is enabled");
    }

    if let Some(parent) = std::path::Path::new(&cfg.database.path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            anyhow::bail!(
                "CONFIG ERROR: Database directory does not exist: {}",
                parent.display()
            );
        }
    }

    tracing::info!("Configuration validation passed");
    Ok(())
}

pub fn load() -> Result<Config> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name("config").required(false))
        .add_source(
            config::Environment::with_prefix("CIFIX_LEARN")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("api.cors_allowed_origins")
                .try_parsing(true),
        )
        .set_default("api.bind", "0.0.0.0")?
        .set_default("api.port", 8000)?
        .set_default("api.environment", "development")?
        .set_default("database.path", "./cifix-learn.db")?
        .set_default("auth.jwt_secret", DEFAULT_JWT_SECRET)?
        .set_default("auth.jwt_expiry_hours", 24)?
        .build()?
        .try_deserialize()?;

    validate(&cfg)?;

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            api: ApiConfig {
                port: 8000,
                bind: "127.0.0.1".to_string(),
                cors_allowed_origins: default_cors_allowed_origins(),
                public_url: default_public_url(),
                environment: "development".to_string(),
            },
            database: DatabaseConfig { path: "cifix-learn.db".to_string() },
            auth: AuthConfig {
                jwt_secret: "a-sufficiently-long-secret-for-config-tests".to_string(),
                jwt_expiry_hours: 24,
                max_login_attempts: 5,
                lockout_minutes: 30,
                verification_expiry_hours: 24,
                require_strong_passwords: true,
                password_min_length: 8,
            },
            email: EmailConfig::default(),
            rate_limit: RateLimitConfig::default(),
            seed: SeedConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn test_default_secret_rejected() {
        let mut cfg = base_config();
        cfg.auth.jwt_secret = DEFAULT_JWT_SECRET.to_string();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut cfg = base_config();
        cfg.auth.jwt_secret = "too-short".to_string();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_missing_db_directory_rejected() {
        let mut cfg = base_config();
        cfg.database.path = "/definitely/not/a/real/dir/cifix.db".to_string();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_enabled_email_requires_base_url() {
        let mut cfg = base_config();
        cfg.email.enabled = true;
        assert!(validate(&cfg).is_err());
        cfg.email.api_base_url = "https://mail.example.com".to_string();
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_production_flag() {
        let mut cfg = base_config();
        assert!(!cfg.api.is_production());
        cfg.api.environment = "Production".to_string();
        assert!(cfg.api.is_production());
    }
}
