//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del servidor. Las variables ausentes
//! toman su valor por defecto; las mal formadas son un error de arranque.

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use super::database::DatabaseConfig;
use super::network::NetworkConfig;

/// Backend de persistencia y consultas espaciales
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgis" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow!("unknown storage backend '{}'", other)),
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub storage: StorageBackend,
    pub network: NetworkConfig,
}

/// Lee una variable de entorno, usando `default` si no está definida
pub(crate) fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        _ => Ok(default),
    }
}

impl EnvironmentConfig {
    pub fn from_env() -> Result<Self> {
        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            environment: env_or("ENVIRONMENT", "development".to_string())?,
            port: env_or("PORT", 3000)?,
            host: env_or("HOST", "0.0.0.0".to_string())?,
            cors_origins,
            storage: env_or("STORAGE", StorageBackend::Postgres)?,
            network: NetworkConfig::from_env()?,
        })
    }

    /// La configuración de base de datos solo se exige con el backend PostgreSQL
    pub fn database(&self) -> Result<DatabaseConfig> {
        DatabaseConfig::from_env()
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_aliases() {
        assert_eq!("postgis".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert_eq!(" Memory ".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("redis".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn env_or_falls_back_and_rejects_garbage() {
        std::env::remove_var("TRANSIT_TEST_UNSET_PORT");
        assert_eq!(env_or("TRANSIT_TEST_UNSET_PORT", 8080u16).unwrap(), 8080);

        std::env::set_var("TRANSIT_TEST_BAD_PORT", "eighty");
        assert!(env_or("TRANSIT_TEST_BAD_PORT", 8080u16).is_err());
        std::env::remove_var("TRANSIT_TEST_BAD_PORT");
    }
}
