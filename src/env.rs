use std::path::Path;

use tracing::{info, warn};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://usuarios.db";
pub const DEFAULT_SESSION_HOURS: i64 = 1;
pub const DEFAULT_REPORT_LINES_PER_PAGE: usize = 40;

/// What happened to one env file. Reported by the caller once logging is up,
/// since the files may configure the logging itself.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvFile {
    Loaded(String),
    Missing(String),
}

pub fn load_environment() -> Result<Vec<EnvFile>, Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    let mut loaded = Vec::new();
    for env_file in env_files {
        loaded.push(load_env_file(env_file)?);
    }

    Ok(loaded)
}

fn load_env_file(path: &str) -> Result<EnvFile, Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        return Ok(EnvFile::Missing(path.to_string()));
    }

    dotenvy::from_filename_override(path)?;
    Ok(EnvFile::Loaded(path.to_string()))
}

pub fn log_env_files(files: &[EnvFile]) {
    for file in files {
        match file {
            EnvFile::Loaded(path) => info!("Loaded environment from: {}", path),
            EnvFile::Missing(path) => {
                warn!("Warning: Environment file {} not found, skipping", path)
            }
        }
    }
}

/// Credentials for an admin account created at startup when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub session_hours: i64,
    pub report_lines_per_page: usize,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            session_hours: DEFAULT_SESSION_HOURS,
            report_lines_per_page: DEFAULT_REPORT_LINES_PER_PAGE,
            bootstrap_admin: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(defaults.database_url);

        let session_hours = match std::env::var("SESSION_HOURS") {
            Ok(value) => value
                .parse::<i64>()
                .ok()
                .filter(|hours| *hours > 0)
                .ok_or_else(|| anyhow::anyhow!("SESSION_HOURS must be a positive integer"))?,
            Err(_) => defaults.session_hours,
        };

        let report_lines_per_page = match std::env::var("REPORT_LINES_PER_PAGE") {
            Ok(value) => value.parse::<usize>().map_err(|e| {
                anyhow::anyhow!("REPORT_LINES_PER_PAGE must be a number: {}", e)
            })?,
            Err(_) => defaults.report_lines_per_page,
        };

        let bootstrap_admin = match (
            std::env::var("ADMIN_USERNAME"),
            std::env::var("ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { username, password })
            }
            (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
                warn!("ADMIN_USERNAME and ADMIN_PASSWORD must both be set, ignoring");
                None
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            session_hours,
            report_lines_per_page,
            bootstrap_admin,
        })
    }
}
