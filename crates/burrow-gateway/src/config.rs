use burrow_telemetry::LogFormat;
use clap::Parser;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use thiserror::Error;

pub const SERVER_ADDRESS_ENV: &str = "SERVER_ADDRESS";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const AUTH_SECRET_ENV: &str = "AUTH_SECRET";
pub const ID_OFFSET_ENV: &str = "ID_OFFSET";
pub const CACHE_CAPACITY_ENV: &str = "CACHE_CAPACITY";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_SERVER_ADDRESS: &str = "localhost:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/";
pub const DEFAULT_FILE_STORAGE_PATH: &str = "./url_storage.json";
pub const DEFAULT_AUTH_SECRET: &str = "burrow-development-secret";
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("server address cannot be empty")]
    EmptyServerAddress,
    #[error("base url cannot be empty")]
    EmptyBaseUrl,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "burrow", about = "URL shortening HTTP server")]
pub struct Cli {
    /// Address to listen on, e.g. `localhost:8080`.
    #[arg(short = 'a', long, env = SERVER_ADDRESS_ENV, default_value = DEFAULT_SERVER_ADDRESS)]
    pub server_address: String,

    /// Prefix of every short URL handed out.
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Journal file. An empty value keeps records in memory only.
    #[arg(
        short = 'f',
        long,
        env = FILE_STORAGE_PATH_ENV,
        default_value = DEFAULT_FILE_STORAGE_PATH
    )]
    pub file_storage_path: String,

    /// PostgreSQL connection string. Takes precedence over the journal.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Key used to sign identity cookies.
    #[arg(
        long,
        env = AUTH_SECRET_ENV,
        default_value = DEFAULT_AUTH_SECRET,
        hide_default_value = true,
        hide_env_values = true
    )]
    pub auth_secret: String,

    /// Number of IDs to skip, so that a restarted process does not reissue
    /// IDs already present in a persistent store.
    #[arg(long, env = ID_OFFSET_ENV, default_value_t = 0)]
    pub id_offset: u64,

    /// Entries held by the lookup cache in front of PostgreSQL.
    #[arg(long, env = CACHE_CAPACITY_ENV, default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: u64,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Record store selected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { dsn: String },
    File { path: PathBuf },
    Memory,
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Postgres { .. } => write!(f, "postgres"),
            StorageBackend::File { .. } => write!(f, "file"),
            StorageBackend::Memory => write!(f, "in-memory"),
        }
    }
}

/// Validated server settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    /// Base URL without trailing slash.
    pub base_url: String,
    pub storage: StorageBackend,
    pub auth_secret: String,
    pub id_offset: u64,
    pub cache_capacity: u64,
    pub log_format: LogFormat,
}

impl TryFrom<Cli> for Config {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let server_address = normalize_server_address(&cli.server_address);
        if server_address.is_empty() {
            return Err(ConfigError::EmptyServerAddress);
        }

        let base_url = cli.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }

        let storage = match cli.database_dsn.filter(|dsn| !dsn.trim().is_empty()) {
            Some(dsn) => StorageBackend::Postgres { dsn },
            None if !cli.file_storage_path.trim().is_empty() => StorageBackend::File {
                path: PathBuf::from(cli.file_storage_path),
            },
            None => StorageBackend::Memory,
        };

        Ok(Self {
            server_address,
            base_url,
            storage,
            auth_secret: cli.auth_secret,
            id_offset: cli.id_offset,
            cache_capacity: cli.cache_capacity,
            log_format: cli.log_format,
        })
    }
}

/// Strips a scheme prefix and trailing slashes, so that `http://host:80/`
/// can be passed where `host:80` is expected.
fn normalize_server_address(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix("http://")
        .or_else(|| raw.strip_prefix("https://"))
        .unwrap_or(raw);
    raw.trim_end_matches('/').to_string()
}
