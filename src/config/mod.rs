use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub commission: CommissionConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// JSON gateway in front of the partner/commission services
    Http,
    /// In-process store, for local runs and tests
    Memory,
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(BackendMode::Http),
            "memory" | "mem" => Ok(BackendMode::Memory),
            other => Err(format!("unknown backend mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub mode: BackendMode,
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// `CODE:Name` pairs seeded into the memory backend
    pub memory_partners: Vec<String>,
}

/// How tier rows are written for tier-based commissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierWriteMode {
    /// Delete every existing tier, then create the submitted rows
    Replace,
    /// Create rows without an id, update rows with one, never delete
    Upsert,
}

impl FromStr for TierWriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(TierWriteMode::Replace),
            "upsert" => Ok(TierWriteMode::Upsert),
            other => Err(format!("unknown tier write mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionConfig {
    pub write_concurrency: usize,
    pub tier_write_mode: TierWriteMode,
    pub strict_parsing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub require_auth: bool,
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("SERVER_BIND_HOST") {
            self.server.bind_host = v;
        }
        if let Some(port) = env::var("REMCO_CMS_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Backend overrides
        if let Ok(v) = env::var("BACKEND_MODE") {
            match v.parse() {
                Ok(mode) => self.backend.mode = mode,
                Err(e) => tracing::warn!("Ignoring BACKEND_MODE: {}", e),
            }
        }
        if let Ok(v) = env::var("BACKEND_BASE_URL") {
            self.backend.base_url = v;
        }
        if let Ok(v) = env::var("BACKEND_REQUEST_TIMEOUT_MS") {
            self.backend.request_timeout_ms = v.parse().unwrap_or(self.backend.request_timeout_ms);
        }
        if let Ok(v) = env::var("BACKEND_MEMORY_PARTNERS") {
            self.backend.memory_partners = split_list(&v);
        }

        // Commission overrides
        if let Ok(v) = env::var("COMMISSION_WRITE_CONCURRENCY") {
            self.commission.write_concurrency = v
                .parse()
                .ok()
                .filter(|n: &usize| *n > 0)
                .unwrap_or(self.commission.write_concurrency);
        }
        if let Ok(v) = env::var("COMMISSION_TIER_WRITE_MODE") {
            match v.parse() {
                Ok(mode) => self.commission.tier_write_mode = mode,
                Err(e) => tracing::warn!("Ignoring COMMISSION_TIER_WRITE_MODE: {}", e),
            }
        }
        if let Ok(v) = env::var("COMMISSION_STRICT_PARSING") {
            self.commission.strict_parsing = v.parse().unwrap_or(self.commission.strict_parsing);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_REQUIRE_AUTH") {
            self.security.require_auth = v.parse().unwrap_or(self.security.require_auth);
        }
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                bind_host: "0.0.0.0".to_string(),
                port: 3000,
            },
            backend: BackendConfig {
                mode: BackendMode::Memory,
                base_url: "http://localhost:8080".to_string(),
                request_timeout_ms: 30_000,
                memory_partners: vec!["WU:Western Union".to_string(), "MG:MoneyGram".to_string()],
            },
            commission: CommissionConfig {
                write_concurrency: 4,
                tier_write_mode: TierWriteMode::Replace,
                strict_parsing: false,
            },
            security: SecurityConfig {
                require_auth: false,
                jwt_secret: String::new(),
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                bind_host: "0.0.0.0".to_string(),
                port: 8000,
            },
            backend: BackendConfig {
                mode: BackendMode::Http,
                base_url: "http://cms-gateway.staging.svc:8080".to_string(),
                request_timeout_ms: 15_000,
                memory_partners: Vec::new(),
            },
            commission: CommissionConfig {
                write_concurrency: 8,
                tier_write_mode: TierWriteMode::Replace,
                strict_parsing: false,
            },
            security: SecurityConfig {
                require_auth: true,
                jwt_secret: String::new(),
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                bind_host: "0.0.0.0".to_string(),
                port: 8000,
            },
            backend: BackendConfig {
                mode: BackendMode::Http,
                base_url: "http://cms-gateway.prod.svc:8080".to_string(),
                request_timeout_ms: 10_000,
                memory_partners: Vec::new(),
            },
            commission: CommissionConfig {
                write_concurrency: 8,
                tier_write_mode: TierWriteMode::Replace,
                strict_parsing: false,
            },
            security: SecurityConfig {
                require_auth: true,
                jwt_secret: String::new(),
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.backend.mode, BackendMode::Memory);
        assert!(!config.security.require_auth);
        assert!(!config.commission.strict_parsing);
        assert_eq!(config.commission.tier_write_mode, TierWriteMode::Replace);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.backend.mode, BackendMode::Http);
        assert!(config.security.require_auth);
        assert!(config.commission.write_concurrency > 1);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("MEMORY".parse::<BackendMode>(), Ok(BackendMode::Memory));
        assert_eq!(" upsert ".parse::<TierWriteMode>(), Ok(TierWriteMode::Upsert));
        assert!("diff".parse::<TierWriteMode>().is_err());
    }

    #[test]
    fn test_split_list_drops_blanks() {
        assert_eq!(split_list("WU:Western Union, ,MG"), vec!["WU:Western Union", "MG"]);
    }
}
