//! Shared adapter wiring for CLI subcommands.
//!
//! Each subcommand is a short-lived process: it opens the same SQLite/file
//! adapters `gateway-server` keeps open for the lifetime of the daemon,
//! does one thing, and exits. `open_store`/`open_audit` centralise that
//! wiring so commands don't repeat it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use gateway_audit::{AuditDb, AuditLogger};
use gateway_core::config::Config;
use gateway_core::domain::{Credential, DriveId};
use gateway_core::pool::{ClientFactory, ProviderPool};
use gateway_core::ports::{CredentialStore, StubStore, TaskRegistry, UpstreamClient};
use gateway_cred::store::FileCredentialStore;
use gateway_drive115::client::Drive115Client;
use gateway_drive115::rate_limit::RateLimitConfig as Drive115RateLimit;
use gateway_store::{DatabasePool, DriveStore, SqliteStubStore, SqliteTaskRegistry};
use gateway_sync::SyncEngine;

pub struct Store {
    pub drives: DriveStore,
    pub stubs: Arc<SqliteStubStore>,
    pub tasks: Arc<SqliteTaskRegistry>,
    pub credentials: Arc<FileCredentialStore>,
}

/// The only [`ClientFactory`] this gateway needs: `DriveKind::Drive115` is
/// the only drive kind. Mirrors `gateway-server`'s factory since both
/// binaries acquire upstream clients through the same `ProviderPool`.
struct Drive115Factory {
    rate_limit: Drive115RateLimit,
}

impl ClientFactory for Drive115Factory {
    fn build(&self, _drive_id: &DriveId, credential: &Credential) -> Arc<dyn UpstreamClient> {
        Arc::new(Drive115Client::with_rate_limit(credential.access_token().to_string(), self.rate_limit.clone()))
    }
}

pub async fn open_store(config: &Config) -> Result<Store> {
    tokio::fs::create_dir_all(&config.database.data_dir)
        .await
        .with_context(|| format!("failed to create {}", config.database.data_dir.display()))?;

    let db_path = config.database.data_dir.join("state.db");
    let db = DatabasePool::new(&db_path)
        .await
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    Ok(Store {
        drives: DriveStore::new(db.pool().clone()),
        stubs: Arc::new(SqliteStubStore::new(db.pool().clone())),
        tasks: Arc::new(SqliteTaskRegistry::new(db.pool().clone())),
        credentials: Arc::new(FileCredentialStore::new(config.database.data_dir.clone())),
    })
}

pub async fn open_audit(config: &Config) -> Result<Arc<AuditLogger>> {
    let audit_path = config.database.data_dir.join("audit.db");
    let db = AuditDb::new(&audit_path)
        .await
        .with_context(|| format!("failed to open {}", audit_path.display()))?;
    Ok(Arc::new(AuditLogger::new(db)))
}

/// Builds a one-shot [`SyncEngine`] for the `run` command: the same ports
/// `gateway-server`'s `AppState` wires together, minus the scheduler and
/// watcher loops a short-lived CLI process has no use for.
pub async fn build_engine(config: &Config, store: &Store) -> Result<SyncEngine> {
    let audit = open_audit(config).await?;

    let client_factory = Arc::new(Drive115Factory {
        rate_limit: Drive115RateLimit {
            capacity: config.rate_limit.burst,
            refill_rate: f64::from(config.rate_limit.requests_per_second),
            max_retries: 5,
        },
    });
    let credential_store: Arc<dyn CredentialStore> = store.credentials.clone();
    let pool = Arc::new(ProviderPool::new(credential_store, client_factory));

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.upstream.connect_timeout_seconds))
        .timeout(Duration::from_secs(config.upstream.read_timeout_seconds))
        .build()
        .context("failed to build upstream HTTP client")?;

    let stub_store: Arc<dyn StubStore> = store.stubs.clone();
    let task_registry: Arc<dyn TaskRegistry> = store.tasks.clone();

    Ok(SyncEngine::new(pool, stub_store, task_registry, http, audit))
}
