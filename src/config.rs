use serde::{Deserialize, Serialize};
use tracing::{info, error};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port, shared by the API and the real-time channel
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated. Any origin when unset.
    pub cors_origins: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Database URL. Documents are kept on disk when unset.
    pub db_url: Option<String>,

    /// Directory for file-backed document storage
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        // Load from environment variables using envy
        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("✅ Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Default tracing filter when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> String {
        let app_level = if self.is_development() { "debug" } else { self.log_level.as_str() };
        format!(
            "coedit={},tower_http={},axum::rejection=trace,{}",
            app_level, app_level, self.log_level
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            service_name: default_service_name(),
            db_url: None,
            documents_dir: default_documents_dir(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "coedit".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_documents_dir() -> String {
    "documents".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_environment() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.documents_dir, "documents");
        assert!(config.db_url.is_none());
        assert!(config.is_development());
    }

    #[test]
    fn reads_uppercase_variables() {
        let vars = vec![
            ("PORT".to_string(), "8080".to_string()),
            ("DB_URL".to_string(), "postgres://localhost/coedit".to_string()),
            ("CORS_ORIGINS".to_string(), "http://localhost:3000".to_string()),
            ("ENVIRONMENT".to_string(), "production".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.server_address(), "0.0.0.0:8080");
        assert_eq!(config.db_url.as_deref(), Some("postgres://localhost/coedit"));
        assert_eq!(config.cors_origins.as_deref(), Some("http://localhost:3000"));
        assert!(!config.is_development());
        assert_eq!(
            config.default_log_filter(),
            "coedit=info,tower_http=info,axum::rejection=trace,info"
        );
    }

    #[test]
    fn rejects_malformed_port() {
        let vars = vec![("PORT".to_string(), "not-a-port".to_string())];
        assert!(envy::from_iter::<_, Config>(vars).is_err());
    }
}
