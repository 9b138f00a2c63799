//! Application Startup
//!
//! Wires storage backends, services, the background worker and the HTTP
//! server, and tears them down in order on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tracing::{info, warn};

use crate::application::pipeline::{
    Dispatcher, DispatcherConfig, Persister, Reconciler, SearchIndexer, SequenceAllocator,
    TaskQueue, Worker,
};
use crate::application::services::{
    ApplicationService, ApplicationServiceImpl, ChatService, ChatServiceImpl, MessageService,
    MessageServiceImpl,
};
use crate::config::{CorsSettings, RateLimitSettings, Settings, WorkerSettings};
use crate::domain::{ApplicationRepository, ChatRepository, CounterRepository, MessageRepository};
use crate::infrastructure::memory::{
    MemorySearchIndex, MemorySequenceAllocator, MemoryStore, MemoryTaskQueue,
};
use crate::infrastructure::redis_store::{self, RedisSequenceAllocator, RedisTaskQueue};
use crate::infrastructure::repositories::{
    PgApplicationRepository, PgChatRepository, PgCounterRepository, PgMessageRepository,
};
use crate::infrastructure::search::ElasticsearchIndex;
use crate::infrastructure::database;
use crate::presentation::http::handlers::health::{init_server_start, HealthCheck};
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging, RateLimiter};

/// How often idle rate limit clients are forgotten
const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Storage ports shared by the services and the worker.
#[derive(Clone)]
pub struct Backends {
    pub applications: Arc<dyn ApplicationRepository>,
    pub chats: Arc<dyn ChatRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub counters: Arc<dyn CounterRepository>,
    pub sequences: Arc<dyn SequenceAllocator>,
    pub queue: Arc<dyn TaskQueue>,
    pub search: Arc<dyn SearchIndexer>,
    /// Readiness checks of the external stores behind the ports
    pub health_checks: Vec<HealthCheck>,
}

impl Backends {
    /// Connect to PostgreSQL, Redis and the search store.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let db = database::create_pool(&settings.database)
            .await
            .context("Failed to connect to PostgreSQL")?;
        database::run_migrations(&db)
            .await
            .context("Failed to run database migrations")?;
        info!("Database connection pool created");

        let (redis_client, redis) = redis_store::create_redis_client(&settings.redis)
            .await
            .context("Failed to connect to Redis")?;

        let search = Arc::new(
            ElasticsearchIndex::new(&settings.search).context("Failed to build search client")?,
        );

        let health_checks = vec![
            HealthCheck::new("database", true, Duration::from_millis(100), {
                let db = db.clone();
                move || {
                    let db = db.clone();
                    async move { database::ping(&db).await.map_err(|e| e.to_string()) }
                }
            }),
            HealthCheck::new("redis", true, Duration::from_millis(50), {
                let redis = redis.clone();
                move || {
                    let redis = redis.clone();
                    async move { redis_store::ping(&redis).await.map_err(|e| e.to_string()) }
                }
            }),
            HealthCheck::new("search", false, Duration::from_millis(250), {
                let search = search.clone();
                move || {
                    let search = search.clone();
                    async move { search.ping().await.map_err(|e| e.to_string()) }
                }
            }),
        ];

        Ok(Self {
            applications: Arc::new(PgApplicationRepository::new(db.clone())),
            chats: Arc::new(PgChatRepository::new(db.clone())),
            messages: Arc::new(PgMessageRepository::new(db.clone())),
            counters: Arc::new(PgCounterRepository::new(db)),
            sequences: Arc::new(RedisSequenceAllocator::new(redis.clone())),
            queue: Arc::new(RedisTaskQueue::new(
                redis_client,
                redis,
                &settings.redis.queue_name,
                &settings.redis.consumer_id,
                settings.worker.dequeue_block(),
            )),
            search,
            health_checks,
        })
    }

    /// Everything in process memory.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            applications: store.clone(),
            chats: store.clone(),
            messages: store.clone(),
            counters: store,
            sequences: Arc::new(MemorySequenceAllocator::new()),
            queue: Arc::new(MemoryTaskQueue::new()),
            search: Arc::new(MemorySearchIndex::new()),
            health_checks: Vec::new(),
        }
    }

    /// Dispatcher and reconciler over these ports.
    pub fn pipeline(&self, settings: &WorkerSettings) -> (Arc<Dispatcher>, Arc<Reconciler>) {
        let dispatcher = Dispatcher::new(
            self.queue.clone(),
            Persister::new(self.chats.clone(), self.messages.clone()),
            self.search.clone(),
            DispatcherConfig::from_settings(settings),
        );

        let mut reconciler = Reconciler::new(self.counters.clone(), settings.reconcile_interval());
        if settings.sync_sequences {
            reconciler = reconciler.with_sequence_sync(self.sequences.clone());
        }

        (Arc::new(dispatcher), Arc::new(reconciler))
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub applications: Arc<dyn ApplicationService>,
    pub chats: Arc<dyn ChatService>,
    pub messages: Arc<dyn MessageService>,
    pub health_checks: Arc<Vec<HealthCheck>>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(backends: &Backends, rate_limit: &RateLimitSettings) -> Self {
        Self {
            applications: Arc::new(ApplicationServiceImpl::new(backends.applications.clone())),
            chats: Arc::new(ChatServiceImpl::new(
                backends.applications.clone(),
                backends.chats.clone(),
                backends.sequences.clone(),
                backends.queue.clone(),
            )),
            messages: Arc::new(MessageServiceImpl::new(
                backends.applications.clone(),
                backends.chats.clone(),
                backends.messages.clone(),
                backends.sequences.clone(),
                backends.queue.clone(),
                backends.search.clone(),
            )),
            health_checks: Arc::new(backends.health_checks.clone()),
            rate_limiter: Arc::new(RateLimiter::from_settings(rate_limit)),
        }
    }
}

/// Router with every middleware layer applied
pub fn build_router(state: AppState, cors_settings: &CorsSettings) -> Router {
    routes::create_router(state)
        .layer(logging::create_trace_layer())
        .layer(CompressionLayer::new())
        .layer(cors::create_cors_layer(cors_settings))
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    worker: Worker,
    rate_limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
}

impl Application {
    /// Build the application against PostgreSQL, Redis and the search store
    pub async fn build(settings: Settings) -> Result<Self> {
        let backends = Backends::connect(&settings).await?;
        Self::build_with(settings, backends).await
    }

    /// Build the application over the given backends
    pub async fn build_with(settings: Settings, backends: Backends) -> Result<Self> {
        init_server_start();

        if let Err(e) = backends.search.ensure_index().await {
            warn!(error = %e, "Could not ensure search index, indexing will be retried per task");
        }

        let state = AppState::new(&backends, &settings.rate_limit);
        let rate_limiter = state.rate_limiter.clone();
        let router = build_router(state, &settings.cors);

        let cancel = CancellationToken::new();
        let (dispatcher, reconciler) = backends.pipeline(&settings.worker);
        let worker = Worker::spawn(dispatcher, reconciler, cancel.child_token());

        let listener = TcpListener::bind(settings.server_addr())
            .await
            .with_context(|| format!("Failed to bind {}", settings.server_addr()))?;
        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            router,
            worker,
            rate_limiter,
            cancel,
        })
    }

    /// Serve until Ctrl-C / SIGTERM, then stop the worker.
    pub async fn run_until_stopped(self) -> Result<()> {
        let Self {
            listener,
            router,
            worker,
            rate_limiter,
            cancel,
        } = self;

        let sweeper = tokio::spawn(sweep_rate_limiter(rate_limiter, cancel.child_token()));

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

        info!("HTTP server stopped, shutting down worker");
        cancel.cancel();
        worker.shutdown().await;
        let _ = sweeper.await;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token that stops the server and worker when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

async fn sweep_rate_limiter(limiter: Arc<RateLimiter>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(RATE_LIMIT_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => limiter.retain_recent(),
        }
    }
}

/// Resolves on Ctrl-C, SIGTERM, or when `cancel` fires.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
        _ = cancel.cancelled() => {}
    }
}
