//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together:
//! - Commerce core (orders, returns, approvals, audit)
//! - Event Bus (committed changes, logged here)
//! - API Server (HTTP endpoints)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Wire the store, audit sink and collaborators
//! 3. Start API server
//! 4. Main event loop (log commerce events)
//! 5. Graceful shutdown on SIGINT or when the shutdown token is cancelled

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use bazaar_audit::{AuditTrail, MemoryAuditSink};
use bazaar_exec::{Commerce, CommerceEvent, LogNotifier, StaticSettings, SystemClock};
use bazaar_store::MemoryStore;

use crate::api::{create_router, ApiState};
use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Daemon
// =============================================================================

/// The main Bazaar daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Commerce core shared with the API
    commerce: Arc<Commerce>,
    /// Cancelled to stop the event loop and the API server
    shutdown: CancellationToken,
}

impl Daemon {
    /// Create a daemon backed by the in-memory store (tests, local runs).
    pub fn new_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(AuditTrail::new(Arc::new(MemoryAuditSink::new())));
        let commerce = Self::wire(&config, store, audit);
        Self::new(config, commerce)
    }

    /// Create a daemon backed by PostgreSQL at `DATABASE_URL`.
    #[cfg(feature = "postgres")]
    pub async fn new_postgres(config: Config) -> DaemonResult<Self> {
        use bazaar_audit::PgAuditSink;
        use bazaar_store::PgStore;

        let url = config
            .database_url
            .clone()
            .ok_or_else(|| DaemonError::Config("DATABASE_URL is required for the postgres store".to_string()))?;
        let pool = Arc::new(sqlx::PgPool::connect(&url).await?);
        info!("Connected to PostgreSQL");

        let store = Arc::new(PgStore::new(pool.clone()));
        let audit = Arc::new(AuditTrail::new(Arc::new(PgAuditSink::new(pool))));
        let commerce = Self::wire(&config, store, audit);
        Ok(Self::new(config, commerce))
    }

    /// Create a daemon around an already wired commerce core.
    pub fn new(config: Config, commerce: Arc<Commerce>) -> Self {
        Self {
            config,
            commerce,
            shutdown: CancellationToken::new(),
        }
    }

    fn wire(config: &Config, store: Arc<dyn bazaar_store::Store>, audit: Arc<AuditTrail>) -> Arc<Commerce> {
        let settings = Arc::new(StaticSettings::new(config.commerce.platform, config.commerce.pricing));
        Arc::new(Commerce::new(
            store,
            audit,
            settings,
            Arc::new(LogNotifier),
            Arc::new(SystemClock),
            config.commerce.notify_timeout,
        ))
    }

    /// Token that stops [`Daemon::run`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Commerce core driven by this daemon.
    pub fn commerce(&self) -> Arc<Commerce> {
        self.commerce.clone()
    }

    /// Run the daemon.
    ///
    /// Blocks until SIGINT or until the shutdown token is cancelled.
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting Bazaar daemon"
        );

        // Subscribe before the API accepts traffic so no event is missed
        let events = self.commerce.events();
        let mut receiver = events.subscribe();

        let api_addr = self.start_api_server().await?;
        info!(%api_addr, "API server started");

        info!("Entering main event loop");
        loop {
            tokio::select! {
                Some(event_result) = receiver.recv() => {
                    match event_result {
                        Ok(event) => log_event(&event),
                        Err(lagged) => warn!(%lagged, "Event receiver lagged"),
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Start the API server; it stops when the shutdown token is cancelled.
    async fn start_api_server(&self) -> DaemonResult<SocketAddr> {
        let state = Arc::new(ApiState {
            commerce: self.commerce.clone(),
        });

        let router = create_router(state);
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener.local_addr()?;

        let token = self.shutdown.clone();
        tokio::spawn(async move {
            let server = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = server.await {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }

    /// Graceful shutdown.
    async fn shutdown(&self) {
        info!("Initiating graceful shutdown");
        self.shutdown.cancel();

        let failures = self.commerce.audit().failures();
        if failures > 0 {
            warn!(failures, "Audit records were lost during this run");
        }

        info!("Shutdown complete");
    }
}

fn log_event(event: &CommerceEvent) {
    match event {
        CommerceEvent::OrderCreated {
            order_id,
            customer_id,
            total,
        } => {
            info!(%order_id, %customer_id, total = %total.as_decimal(), "Order created");
        },
        CommerceEvent::OrderStatusChanged { order_id, from, to } => {
            info!(%order_id, %from, %to, "Order status changed");
        },
        CommerceEvent::ReturnStatusChanged {
            return_id,
            order_id,
            from,
            to,
        } => {
            info!(%return_id, %order_id, %from, %to, "Return status changed");
        },
        CommerceEvent::ApprovalRequested {
            approval_id,
            action,
            target_id,
        } => {
            info!(%approval_id, %action, %target_id, "Approval requested");
        },
    }
}

// =============================================================================
// Tests
// =============================================================================
