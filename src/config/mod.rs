use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::database::PoolSettings;
use crate::tenant::AllowList;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub tenancy: TenancyConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub auto_migrate: bool,
    pub enable_slow_query_warning: bool,
    pub slow_query_threshold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// First path segment of every tenant-scoped route
    pub route_prefix: String,
    pub allowed_tenants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
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
        .with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        // Database overrides
        if let Some(v) = var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Some(v) = var("DATABASE_AUTO_MIGRATE") {
            self.database.auto_migrate = v.parse().unwrap_or(self.database.auto_migrate);
        }
        if let Some(v) = var("DATABASE_ENABLE_SLOW_QUERY_WARNING") {
            self.database.enable_slow_query_warning = v.parse().unwrap_or(self.database.enable_slow_query_warning);
        }
        if let Some(v) = var("DATABASE_SLOW_QUERY_THRESHOLD_MS") {
            self.database.slow_query_threshold_ms = v.parse().unwrap_or(self.database.slow_query_threshold_ms);
        }

        // Tenancy overrides
        if let Some(v) = var("TENANCY_ROUTE_PREFIX") {
            let prefix = v.trim().trim_matches('/');
            if !prefix.is_empty() {
                self.tenancy.route_prefix = prefix.to_string();
            }
        }
        if let Some(v) = var("TENANCY_ALLOWED_TENANTS") {
            self.tenancy.allowed_tenants = split_list(&v);
        }

        // API overrides
        if let Some(v) = var("PORT") {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Some(v) = var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Some(v) = var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }

        self
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(self.tenancy.allowed_tenants.iter().cloned())
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.database.max_connections,
            acquire_timeout: Duration::from_secs(self.database.connection_timeout),
        }
    }

    /// `None` when slow-query warnings are disabled
    pub fn slow_query_threshold(&self) -> Option<Duration> {
        self.database
            .enable_slow_query_warning
            .then(|| Duration::from_millis(self.database.slow_query_threshold_ms))
    }

    fn default_tenancy() -> TenancyConfig {
        TenancyConfig {
            route_prefix: "api".to_string(),
            allowed_tenants: vec!["project-a".to_string(), "project-b".to_string()],
        }
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                auto_migrate: true,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 100,
            },
            tenancy: Self::default_tenancy(),
            api: ApiConfig {
                port: 4000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:3001".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                auto_migrate: true,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 500,
            },
            tenancy: Self::default_tenancy(),
            api: ApiConfig {
                port: 4000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                auto_migrate: false,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 1000,
            },
            tenancy: Self::default_tenancy(),
            api: ApiConfig {
                port: 4000,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.database.auto_migrate);
        assert_eq!(config.tenancy.route_prefix, "api");
        assert_eq!(config.allow_list().as_slice(), &["project-a".to_string(), "project-b".to_string()]);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.database.auto_migrate);
        assert!(!config.api.enable_request_logging);
        assert_eq!(config.pool_settings().max_connections, 50);
    }

    #[test]
    fn allowed_tenants_come_from_comma_separated_list() {
        let config = AppConfig::development().with_overrides(overrides(&[
            ("TENANCY_ALLOWED_TENANTS", " team-x, team-y ,,"),
            ("TENANCY_ROUTE_PREFIX", "/v1/"),
        ]));

        assert_eq!(config.tenancy.allowed_tenants, vec!["team-x", "team-y"]);
        assert_eq!(config.tenancy.route_prefix, "v1");
    }

    #[test]
    fn unparseable_overrides_keep_defaults() {
        let config = AppConfig::development().with_overrides(overrides(&[
            ("DATABASE_MAX_CONNECTIONS", "many"),
            ("PORT", "8080"),
        ]));

        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn slow_query_threshold_can_be_disabled() {
        let config = AppConfig::development().with_overrides(overrides(&[("DATABASE_ENABLE_SLOW_QUERY_WARNING", "false")]));
        assert_eq!(config.slow_query_threshold(), None);
        assert_eq!(
            AppConfig::development().slow_query_threshold(),
            Some(Duration::from_millis(100))
        );
    }
}
