//! Process-wide configuration snapshot.
//!
//! Read once at startup from the environment (and `.env`, if present) and then
//! shared read-only by every request.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_TEMPLATE_BYTES: u64 = 50 * 1024 * 1024;
pub const USER_AGENT: &str = concat!("docgen-server/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be set")]
    Missing { name: &'static str },
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Which storage backend holds stored templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Fs,
    Supabase,
}

/// Which conversion delegate to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverterKind {
    Gotenberg,
    Soffice,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub bucket_name: String,
}

impl SupabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            supabase_url: required("SUPABASE_URL")?,
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            bucket_name: env::var("SUPABASE_BUCKET").unwrap_or_else(|_| "templates".to_string()),
        })
    }
}

/// Limits applied to the remote template fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub timeout: Duration,
    pub max_bytes: u64,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            max_bytes: DEFAULT_MAX_TEMPLATE_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub fetch: FetchLimits,
    pub storage_backend: StorageBackend,
    pub templates_dir: String,
    pub supabase: Option<SupabaseConfig>,
    pub render_service_url: String,
    pub converter: ConverterKind,
    pub gotenberg_url: String,
    pub soffice_bin: String,
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            fetch: FetchLimits::default(),
            storage_backend: StorageBackend::Fs,
            templates_dir: "./templates".to_string(),
            supabase: None,
            render_service_url: "http://localhost:3001".to_string(),
            converter: ConverterKind::Gotenberg,
            gotenberg_url: "http://localhost:3000".to_string(),
            soffice_bin: "soffice".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "fs".to_string())
            .to_lowercase()
            .as_str()
        {
            "fs" => StorageBackend::Fs,
            "supabase" => StorageBackend::Supabase,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let supabase = match storage_backend {
            StorageBackend::Supabase => Some(SupabaseConfig::from_env()?),
            StorageBackend::Fs => None,
        };

        let converter = match env::var("CONVERTER")
            .unwrap_or_else(|_| "gotenberg".to_string())
            .to_lowercase()
            .as_str()
        {
            "gotenberg" => ConverterKind::Gotenberg,
            "soffice" | "libreoffice" => ConverterKind::Soffice,
            other => {
                return Err(ConfigError::Invalid {
                    name: "CONVERTER",
                    value: other.to_string(),
                })
            }
        };

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                    "http://localhost:8080".to_string(),
                    "http://127.0.0.1:8080".to_string(),
                ]
            });

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed("PORT", 8080)?,
            fetch: FetchLimits {
                timeout: Duration::from_millis(parsed(
                    "TEMPLATE_FETCH_TIMEOUT_MS",
                    DEFAULT_FETCH_TIMEOUT_MS,
                )?),
                max_bytes: parsed("TEMPLATE_MAX_BYTES", DEFAULT_MAX_TEMPLATE_BYTES)?,
            },
            storage_backend,
            templates_dir: env::var("TEMPLATES_DIR").unwrap_or_else(|_| "./templates".to_string()),
            supabase,
            render_service_url: env::var("RENDER_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
            converter,
            gotenberg_url: env::var("GOTENBERG_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            soffice_bin: env::var("SOFFICE_BIN").unwrap_or_else(|_| "soffice".to_string()),
            allowed_origins,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing { name })
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
