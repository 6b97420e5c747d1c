/// Configuration management for CMS Service
///
/// This module handles loading and managing configuration from environment
/// variables.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Cache (Redis) configuration
    pub cache: CacheConfig,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// Object storage configuration
    pub storage: StorageConfig,
    /// Media processing configuration
    pub media: MediaConfig,
    /// Public-endpoint rate limiting
    pub rate_limit: RateLimitConfig,
    /// Scheduled-post publisher configuration
    pub publisher: PublisherConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
    /// Public base URL of the site (used in sitemaps and media URLs)
    pub public_base_url: String,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
}

/// Cache (Redis) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis URL
    pub url: String,
    /// Rendered-page cache TTL in seconds
    pub page_ttl_secs: u64,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for JWT validation
    pub jwt_secret: String,
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend: "local" or "s3"
    pub backend: String,
    /// Root directory for the local backend
    pub local_root: String,
    /// Base URL under which local files are served
    pub local_base_url: String,
    /// Bucket name for the s3 backend
    pub s3_bucket: String,
    /// Region for the s3 backend
    pub s3_region: String,
    /// Optional custom endpoint (R2 and other S3-compatible stores)
    pub s3_endpoint: Option<String>,
    /// Public URL prefix for objects in the bucket
    pub s3_public_url: String,
}

/// Media processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
    /// JPEG quality for generated variants (0-100)
    pub jpeg_quality: u8,
}

/// Sliding-window rate limit applied to public endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Scheduled-post publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Seconds between publisher runs
    pub interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("CMS_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("CMS_SERVICE_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8084),
                public_base_url: std::env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:8084".to_string()),
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if app_env.eq_ignore_ascii_case("production") => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                if app_env.eq_ignore_ascii_case("production") && allowed_origins.trim() == "*" {
                    return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
                }

                CorsConfig { allowed_origins }
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/lattice".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(10),
            },
            cache: CacheConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                page_ttl_secs: std::env::var("PAGE_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            },
            auth: {
                let jwt_secret = std::env::var("JWT_SECRET")
                    .unwrap_or_else(|_| "lattice-dev-secret".to_string());
                if app_env.eq_ignore_ascii_case("production")
                    && (jwt_secret.trim().is_empty() || jwt_secret == "lattice-dev-secret")
                {
                    return Err(
                        "JWT_SECRET must be set to a non-default value in production".to_string()
                    );
                }
                AuthConfig { jwt_secret }
            },
            storage: StorageConfig {
                backend: std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string()),
                local_root: std::env::var("STORAGE_LOCAL_ROOT")
                    .unwrap_or_else(|_| "./media".to_string()),
                local_base_url: std::env::var("STORAGE_LOCAL_BASE_URL")
                    .unwrap_or_else(|_| "/media".to_string()),
                s3_bucket: std::env::var("STORAGE_S3_BUCKET")
                    .unwrap_or_else(|_| "lattice-media".to_string()),
                s3_region: std::env::var("STORAGE_S3_REGION")
                    .unwrap_or_else(|_| "auto".to_string()),
                s3_endpoint: std::env::var("STORAGE_S3_ENDPOINT").ok(),
                s3_public_url: std::env::var("STORAGE_S3_PUBLIC_URL")
                    .unwrap_or_else(|_| "https://media.lattice.dev".to_string()),
            },
            media: MediaConfig {
                max_upload_bytes: std::env::var("MEDIA_MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(25 * 1024 * 1024),
                jpeg_quality: std::env::var("MEDIA_JPEG_QUALITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(85),
            },
            rate_limit: RateLimitConfig {
                max_requests: std::env::var("RATE_LIMIT_MAX_REQUESTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
                window_secs: std::env::var("RATE_LIMIT_WINDOW_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            },
            publisher: PublisherConfig {
                interval_secs: std::env::var("PUBLISHER_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_defaults_in_development() {
        std::env::remove_var("APP_ENV");
        std::env::remove_var("CMS_SERVICE_PORT");
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
        std::env::remove_var("JWT_SECRET");

        let config = Config::from_env().unwrap();
        assert_eq!(config.app.env, "development");
        assert_eq!(config.app.port, 8084);
        assert_eq!(config.storage.backend, "local");
        assert_eq!(config.rate_limit.max_requests, 60);
    }

    #[test]
    #[serial_test::serial]
    fn test_production_requires_real_jwt_secret() {
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("CORS_ALLOWED_ORIGINS", "https://admin.lattice.dev");
        std::env::remove_var("JWT_SECRET");

        assert!(Config::from_env().is_err());

        std::env::remove_var("APP_ENV");
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
    }

    #[test]
    #[serial_test::serial]
    fn test_production_rejects_wildcard_cors() {
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("CORS_ALLOWED_ORIGINS", "*");
        std::env::set_var("JWT_SECRET", "a-real-secret");

        assert!(Config::from_env().is_err());

        std::env::remove_var("APP_ENV");
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
        std::env::remove_var("JWT_SECRET");
    }
}
