//! Bazaar Daemon
//!
//! Runtime host for the commerce core and its API server.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration (in-memory store)
//! cargo run -p bazaard
//!
//! # Start against PostgreSQL
//! DATABASE_URL=postgres://... cargo run -p bazaard --features postgres
//!
//! # Database maintenance
//! cargo run -p bazaard --features postgres -- db migrate
//! cargo run -p bazaard --features postgres -- db seed catalog.json
//! ```
//!
//! # Environment Variables
//!
//! - `BAZAAR_ENV`: Environment (test, development, production)
//! - `BAZAAR_API_HOST`: API host (default: 0.0.0.0)
//! - `BAZAAR_API_PORT`: API port (default: 8080)
//! - `BAZAAR_RETURNS_ENABLED`: Platform returns toggle (default: true)
//! - `BAZAAR_RETURN_WINDOW_DAYS`: Default return window (default: 7)
//! - `BAZAAR_TAX_RATE`: Checkout tax rate (default: 0.15)
//! - `BAZAAR_FREE_SHIPPING_THRESHOLD`: Items total above which shipping is free (default: 100)
//! - `BAZAAR_SHIPPING_FEE`: Flat shipping fee (default: 10)
//! - `BAZAAR_DEFAULT_DELIVERY_DAYS`: Delivery estimate fallback (default: 5)
//! - `BAZAAR_NOTIFY_TIMEOUT_MS`: Customer notification bound (default: 5000)
//! - `DATABASE_URL`: PostgreSQL connection (postgres builds only)

use bazaard::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("bazaard=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("db") {
        #[cfg(feature = "postgres")]
        return bazaard::db::run_db_command(args).await;

        #[cfg(not(feature = "postgres"))]
        anyhow::bail!("db commands require the postgres feature");
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        "Bazaar Daemon"
    );

    #[cfg(feature = "postgres")]
    let daemon = if config.database_url.is_some() {
        Daemon::new_postgres(config).await?
    } else {
        Daemon::new_memory(config)
    };

    #[cfg(not(feature = "postgres"))]
    let daemon = Daemon::new_memory(config);

    daemon.run().await?;

    Ok(())
}
