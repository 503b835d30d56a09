//! Application state: wires C1-C10 into the handles the HTTP layer holds.
//!
//! Bootstraps and wires every adapter in one place, exposed as a single
//! `AppState` the way an `axum` server builds its state struct for
//! `with_state`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use gateway_audit::{AuditDb, AuditLogger};
use gateway_core::config::Config;
use gateway_core::domain::{Credential, DriveId};
use gateway_core::pool::{ClientFactory, ProviderPool};
use gateway_core::ports::{StubStore, TaskRegistry, UpstreamClient};
use gateway_cred::store::FileCredentialStore;
use gateway_drive115::auth::DeviceGrantFlow;
use gateway_drive115::client::Drive115Client;
use gateway_drive115::rate_limit::RateLimitConfig as Drive115RateLimit;
use gateway_redirect::cache::RedirectCache;
use gateway_store::{DatabasePool, DriveStore, SqliteStubStore, SqliteTaskRegistry};
use gateway_sync::{Scheduler, SyncEngine, WatcherRegistry};

/// Builds a [`Drive115Client`] from a loaded [`Credential`], carrying the
/// configured rate limit through. The only `ClientFactory` this gateway
/// needs today, since `DriveKind::Drive115` is the only drive kind.
struct Drive115Factory {
    rate_limit: Drive115RateLimit,
}

impl ClientFactory for Drive115Factory {
    fn build(&self, _drive_id: &DriveId, credential: &Credential) -> Arc<dyn UpstreamClient> {
        Arc::new(Drive115Client::with_rate_limit(
            credential.access_token().to_string(),
            self.rate_limit.clone(),
        ))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub drive_store: Arc<DriveStore>,
    pub credential_store: Arc<FileCredentialStore>,
    pub pool: Arc<ProviderPool>,
    pub stub_store: Arc<dyn StubStore>,
    pub task_registry: Arc<dyn TaskRegistry>,
    pub redirect_cache: Arc<RedirectCache>,
    pub sync_engine: Arc<SyncEngine>,
    pub scheduler: Arc<Scheduler>,
    pub watcher_registry: WatcherRegistry,
    pub auth_flow: Arc<DeviceGrantFlow>,
    pub audit: Arc<AuditLogger>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let shutdown = CancellationToken::new();

        std::fs::create_dir_all(&config.database.data_dir)?;
        let db_path = config.database.data_dir.join("state.db");
        let audit_path = config.database.data_dir.join("audit.db");

        let db = DatabasePool::new(&db_path).await?;
        let audit_db = AuditDb::new(&audit_path).await?;
        let audit = Arc::new(AuditLogger::new(audit_db));

        let drive_store = Arc::new(DriveStore::new(db.pool().clone()));
        let stub_store: Arc<dyn StubStore> = Arc::new(SqliteStubStore::new(db.pool().clone()));
        let task_registry: Arc<dyn TaskRegistry> = Arc::new(SqliteTaskRegistry::new(db.pool().clone()));

        let credential_store = Arc::new(FileCredentialStore::new(config.database.data_dir.clone()));
        let client_factory = Arc::new(Drive115Factory {
            rate_limit: Drive115RateLimit {
                capacity: config.rate_limit.burst,
                refill_rate: f64::from(config.rate_limit.requests_per_second),
                max_retries: 5,
            },
        });
        let pool = Arc::new(ProviderPool::new(credential_store.clone(), client_factory));

        let redirect_cache =
            Arc::new(RedirectCache::new(Duration::from_secs(config.stub.cache_ttl_seconds)));

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.upstream.connect_timeout_seconds))
            .timeout(Duration::from_secs(config.upstream.read_timeout_seconds))
            .build()?;

        let sync_engine = Arc::new(SyncEngine::new(
            pool.clone(),
            stub_store.clone(),
            task_registry.clone(),
            http,
            audit.clone(),
        ));
        let scheduler = Arc::new(Scheduler::new(sync_engine.clone(), shutdown.clone(), audit.clone()));

        for task in task_registry.list_all().await? {
            scheduler.add(&task);
        }

        Ok(Self {
            config,
            drive_store,
            credential_store,
            pool,
            stub_store,
            task_registry,
            redirect_cache,
            sync_engine,
            scheduler,
            watcher_registry: WatcherRegistry::new(),
            auth_flow: Arc::new(DeviceGrantFlow::new()),
            audit,
            shutdown,
        })
    }

    /// Spawns `run_watch_loop` for every watch-enabled task, and the
    /// scheduler's own tick loop. Called once after the router starts
    /// accepting connections.
    pub async fn spawn_background_loops(&self) -> anyhow::Result<()> {
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move { scheduler.run(Duration::from_secs(15)).await });

        for task in self.task_registry.list_all().await? {
            if task.watch.enabled {
                self.spawn_watcher(task.task_id, Duration::from_secs(u64::from(task.watch.poll_period_seconds)));
            }
        }
        Ok(())
    }

    pub fn spawn_watcher(&self, task_id: gateway_core::domain::TaskId, poll_period: Duration) {
        let pool = self.pool.clone();
        let task_registry = self.task_registry.clone();
        let scheduler = self.scheduler.clone();
        let registry = self.watcher_registry.clone();
        let audit = self.audit.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            gateway_sync::run_watch_loop(task_id, poll_period, pool, task_registry, scheduler, registry, audit, shutdown)
                .await;
        });
    }
}
