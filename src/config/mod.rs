use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
    pub security: SecurityConfig,
    pub smtp: SmtpConfig,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub default_limit: i64,
    pub max_limit: Option<i64>,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_video_bytes: u64,
    pub max_file_bytes: u64,
    pub local_dir: String,
    pub public_base_url: String,
    /// Bucket used for video; `None` keeps video on an in-process object store.
    pub remote_bucket: Option<String>,
    pub remote_service_account_key: Option<String>,
    pub remote_public_base_url: Option<String>,
    pub signed_url_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
    pub reset_token_ttl_secs: i64,
    pub reset_url_base: String,
    pub allow_admin_signup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub base_url: String,
    pub endpoint: String,
    pub terminal_name: String,
    pub public_key: String,
    pub private_key: String,
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
        if let Some(v) = env::var("ACADEMY_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse().ok())
        {
            self.server.port = v;
        }

        // Filter overrides
        if let Ok(v) = env::var("FILTER_DEFAULT_LIMIT") {
            self.filter.default_limit = v.parse().unwrap_or(self.filter.default_limit);
        }
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }
        if let Ok(v) = env::var("FILTER_DEBUG_LOGGING") {
            self.filter.debug_logging = v.parse().unwrap_or(self.filter.debug_logging);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_BACKEND") {
            self.database.backend = match v.to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Postgres,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Upload overrides
        if let Ok(v) = env::var("UPLOAD_MAX_VIDEO_BYTES") {
            self.upload.max_video_bytes = v.parse().unwrap_or(self.upload.max_video_bytes);
        }
        if let Ok(v) = env::var("UPLOAD_MAX_FILE_BYTES") {
            self.upload.max_file_bytes = v.parse().unwrap_or(self.upload.max_file_bytes);
        }
        if let Ok(v) = env::var("UPLOAD_LOCAL_DIR") {
            self.upload.local_dir = v;
        }
        if let Ok(v) = env::var("UPLOAD_PUBLIC_BASE_URL") {
            self.upload.public_base_url = v;
        }
        if let Ok(v) = env::var("BUCKET_NAME") {
            self.upload.remote_bucket = Some(v);
        }
        if let Ok(v) = env::var("GCS_SERVICE_ACCOUNT_KEY") {
            self.upload.remote_service_account_key = Some(v);
        }
        if let Ok(v) = env::var("UPLOAD_REMOTE_PUBLIC_BASE_URL") {
            self.upload.remote_public_base_url = Some(v);
        }
        if let Ok(v) = env::var("UPLOAD_SIGNED_URL_TTL_SECS") {
            self.upload.signed_url_ttl_secs = v.parse().unwrap_or(self.upload.signed_url_ttl_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("CORS_ORIGIN") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_RESET_TOKEN_TTL_SECS") {
            self.security.reset_token_ttl_secs = v.parse().unwrap_or(self.security.reset_token_ttl_secs);
        }
        if let Ok(v) = env::var("RESET_URL_BASE") {
            self.security.reset_url_base = v;
        }
        if let Ok(v) = env::var("SECURITY_ALLOW_ADMIN_SIGNUP") {
            self.security.allow_admin_signup = v.parse().unwrap_or(self.security.allow_admin_signup);
        }

        // SMTP overrides
        if let Ok(v) = env::var("SMTP_HOST") {
            self.smtp.host = Some(v);
        }
        if let Ok(v) = env::var("SMTP_PORT") {
            self.smtp.port = v.parse().unwrap_or(self.smtp.port);
        }
        if let Ok(v) = env::var("EMAIL_USERNAME") {
            self.smtp.from = v.clone();
            self.smtp.username = Some(v);
        }
        if let Ok(v) = env::var("EMAIL_PASSWORD") {
            self.smtp.password = Some(v);
        }

        // Payment overrides
        if let Ok(v) = env::var("TRANZILA_BASE") {
            self.payment.base_url = v;
        }
        if let Ok(v) = env::var("TRANZILA_ENDPOINT") {
            self.payment.endpoint = v;
        }
        if let Ok(v) = env::var("TRANZILA_TERMINAL_NAME") {
            self.payment.terminal_name = v;
        }
        if let Ok(v) = env::var("APP_PUBLIC_KEY") {
            self.payment.public_key = v;
        }
        if let Ok(v) = env::var("APP_PRIVATE_KEY") {
            self.payment.private_key = v;
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 8080 },
            filter: FilterConfig {
                default_limit: 24,
                max_limit: Some(1000),
                debug_logging: true,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            upload: UploadConfig::defaults("http://localhost:8080"),
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 240,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                reset_token_ttl_secs: 3600,
                reset_url_base: "http://localhost:3000/reset".to_string(),
                allow_admin_signup: true,
            },
            smtp: SmtpConfig::defaults(),
            payment: PaymentConfig::defaults(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 8080 },
            filter: FilterConfig {
                default_limit: 24,
                max_limit: Some(500),
                debug_logging: false,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            upload: UploadConfig::defaults("https://staging.example.com"),
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                cors_origins: vec!["https://staging.example.com".to_string()],
                reset_token_ttl_secs: 3600,
                reset_url_base: "https://staging.example.com/reset".to_string(),
                allow_admin_signup: false,
            },
            smtp: SmtpConfig::defaults(),
            payment: PaymentConfig::defaults(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 8080 },
            filter: FilterConfig {
                default_limit: 24,
                max_limit: Some(100),
                debug_logging: false,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            upload: UploadConfig::defaults("https://app.example.com"),
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 100,
                cors_origins: vec!["https://app.example.com".to_string()],
                reset_token_ttl_secs: 3600,
                reset_url_base: "https://app.example.com/reset".to_string(),
                allow_admin_signup: false,
            },
            smtp: SmtpConfig::defaults(),
            payment: PaymentConfig::defaults(),
        }
    }
}

impl UploadConfig {
    fn defaults(public_base_url: &str) -> Self {
        Self {
            max_video_bytes: 2 * 1024 * 1024 * 1024, // 2GB
            max_file_bytes: 50 * 1024 * 1024,        // 50MB
            local_dir: "uploads".to_string(),
            public_base_url: format!("{}/uploads", public_base_url),
            remote_bucket: None,
            remote_service_account_key: None,
            remote_public_base_url: None,
            signed_url_ttl_secs: 15 * 60,
        }
    }
}

impl SmtpConfig {
    fn defaults() -> Self {
        Self {
            host: None,
            port: 587,
            username: None,
            password: None,
            from: "no-reply@localhost".to_string(),
        }
    }
}

impl PaymentConfig {
    fn defaults() -> Self {
        Self {
            base_url: "https://api.tranzila.com".to_string(),
            endpoint: "/v1/transaction/credit_card/create".to_string(),
            terminal_name: String::new(),
            public_key: String::new(),
            private_key: String::new(),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.filter.default_limit, 24);
        assert_eq!(config.filter.max_limit, Some(1000));
        assert!(config.security.allow_admin_signup);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.filter.max_limit, Some(100));
        assert!(!config.security.allow_admin_signup);
    }

    #[test]
    fn upload_ceilings_split_video_from_everything_else() {
        let config = AppConfig::development();
        assert_eq!(config.upload.max_video_bytes, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.upload.max_file_bytes, 50 * 1024 * 1024);
        assert_eq!(config.upload.signed_url_ttl_secs, 900);
    }
}
