//! Initialization helpers for host applications:
//! - tracing subscriber
//! - database connection + migrations
//! - assembling the [`AppContext`] from injected platform providers

use std::{path::Path, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::clock::Clock;
use crate::config::Config;
use crate::db::{KeyValueStore, SqliteKeyValueStore};
use crate::services::calendar::CalendarSync;
use crate::services::health::{HealthConnection, HealthProvider};
use crate::services::provider::CalendarProvider;
use crate::services::session::SessionState;
use crate::AppContext;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "challengeu_calendar_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Database URL with any credentials stripped, for log lines.
pub fn redact_db_url(db_url: &str) -> String {
    match url::Url::parse(db_url) {
        Ok(mut url) => {
            // Both setters only fail on cannot-be-a-base URLs, which carry no userinfo.
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        Err(_) => match db_url.rsplit_once('@') {
            Some((_, rest)) => format!("(redacted)@{}", rest),
            None => "(redacted)".to_string(),
        },
    }
}

/// Open the SQLite pool behind the key-value store and apply migrations.
pub async fn init_db(config: &Config) -> Result<SqlitePool> {
    let db_url = &config.database.url;
    let shown = redact_db_url(db_url);
    info!(db = %shown, "Opening event map database");

    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("invalid database url {}", shown))?
        .create_if_missing(true);
    ensure_db_dir(db_url)?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to {}", shown))?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Event map database ready");

    Ok(pool)
}

/// SQLite won't create missing directories for a file database.
fn ensure_db_dir(db_url: &str) -> Result<()> {
    let path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" {
        return Ok(());
    }

    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("creating database directory {}", dir.display())),
        _ => Ok(()),
    }
}

/// Platform capabilities injected at startup.
pub struct Providers {
    pub calendar: Arc<dyn CalendarProvider>,
    pub health: Arc<dyn HealthProvider>,
    pub clock: Arc<dyn Clock>,
}

/// Assemble the application context around an already-opened key-value store.
pub fn build_context(config: Config, store: Arc<dyn KeyValueStore>, providers: Providers) -> AppContext {
    let calendar = CalendarSync::new(
        providers.calendar,
        store,
        providers.clock.clone(),
        config.calendar.clone(),
    );
    let health = HealthConnection::new(providers.health, providers.clock);

    AppContext {
        config,
        session: SessionState::new(),
        calendar,
        health,
    }
}

/// Open the database from `config` and assemble the application context.
pub async fn init_context(config: Config, providers: Providers) -> Result<AppContext> {
    let pool = init_db(&config).await?;
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(pool));
    Ok(build_context(config, store, providers))
}
