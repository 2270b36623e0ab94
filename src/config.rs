use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::services::retry::DEFAULT_MAX_RETRIES;
use crate::services::validation_cache::DEFAULT_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    pub host: IpAddr,
    pub port: u16,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub validation_cache_enabled: bool,
    pub validation_cache_size: usize,
    pub bulk_max_retries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            store_backend: StoreBackend::Postgres,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            db_max_connections: 10,
            run_migrations: true,
            validation_cache_enabled: true,
            validation_cache_size: DEFAULT_CAPACITY,
            bulk_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unparsable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            store_backend: match parse_or("STORE_BACKEND", "postgres").to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Postgres,
            },
            host: parse_or("HOST", "0.0.0.0").parse().unwrap_or(defaults.host),
            port: parse_or("PORT", "8000").parse().unwrap_or(defaults.port),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", "10")
                .parse()
                .unwrap_or(defaults.db_max_connections),
            run_migrations: parse_or("RUN_MIGRATIONS", "true").parse().unwrap_or(true),
            validation_cache_enabled: parse_or("VALIDATION_CACHE_ENABLED", "true")
                .parse()
                .unwrap_or(true),
            validation_cache_size: parse_or("VALIDATION_CACHE_SIZE", "1000")
                .parse()
                .unwrap_or(defaults.validation_cache_size),
            bulk_max_retries: parse_or("BULK_MAX_RETRIES", "3")
                .parse()
                .unwrap_or(defaults.bulk_max_retries),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.store_backend == StoreBackend::Postgres && self.database_url.is_none() {
            return Err("STORE_BACKEND is postgres but DATABASE_URL is not set".to_string());
        }
        if self.validation_cache_size == 0 {
            return Err("VALIDATION_CACHE_SIZE must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
