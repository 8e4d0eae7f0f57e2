mod api;
mod auth;
mod database;
mod db;
mod env;
mod error;
mod export;
mod models;
mod progress;
mod telemetry;
mod validation;
#[cfg(test)]
mod test;

use std::str::FromStr;
use std::time::Duration;

use api::{
    api_change_password, api_create_post, api_export_csv, api_export_report, api_get_all_profiles,
    api_get_calendar, api_get_profile, api_get_progress, api_get_students, api_get_wall,
    api_get_workouts, api_log_workout, api_login, api_logout, api_me, api_promote_user,
    api_register_user, api_update_profile, health,
};
use auth::{forbidden_api, unauthorized_api};
use db::{Registration, clean_expired_sessions, promote_user, register_user};
use env::{AppConfig, BootstrapAdmin, load_environment, log_env_files};
use error::AppError;
use rocket::{Build, Rocket, catchers, launch, routes, tokio};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use telemetry::{TelemetryConfig, TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[launch]
async fn rocket() -> _ {
    let otel_guard = {
        let env_files = load_environment();

        let otel_guard = init_tracing(&TelemetryConfig::from_env());

        match env_files {
            Ok(files) => log_env_files(&files),
            Err(e) => error!("Failed to load environment files: {}", e),
        }

        otel_guard
    };

    let (pool, config) = match setup().await {
        Ok(state) => state,
        Err(e) => {
            error!("Startup failed: {}", e);
            panic!("Startup failed: {}", e);
        }
    };

    spawn_session_sweeper(pool.clone());

    init_rocket(pool, config).await.manage(otel_guard)
}

async fn setup() -> Result<(SqlitePool, AppConfig), Error> {
    let config = AppConfig::from_env()?;

    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePool::connect_with(options).await?;

    info!("Running database migrations...");
    database::migrate(&pool).await?;
    let version = database::current_version(&pool).await?;
    info!(version = ?version, "Migrations completed successfully");

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(&pool, admin).await?;
    }

    Ok((pool, config))
}

async fn bootstrap_admin(pool: &SqlitePool, admin: &BootstrapAdmin) -> Result<(), AppError> {
    match register_user(pool, &admin.username, &admin.password).await? {
        Registration::Created => {
            promote_user(pool, &admin.username).await?;
            info!(username = %admin.username, "Bootstrap admin account created");
        }
        Registration::AlreadyExists => {
            info!(username = %admin.username, "Bootstrap admin account already present");
        }
    }
    Ok(())
}

fn spawn_session_sweeper(pool: SqlitePool) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(SESSION_SWEEP_INTERVAL).await;
        }
    });
}

pub async fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting gym tracker");

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_register_user,
                api_me,
                api_change_password,
                api_get_profile,
                api_update_profile,
                api_log_workout,
                api_get_workouts,
                api_get_calendar,
                api_get_progress,
                api_export_csv,
                api_export_report,
                api_get_wall,
                api_create_post,
                api_get_all_profiles,
                api_get_students,
                api_promote_user,
            ],
        )
        .register("/api", catchers![unauthorized_api, forbidden_api])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
}
