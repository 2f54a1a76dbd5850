use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use quota_bucket::Admission;
use quota_bucket::Limiter;
use quota_bucket::LimiterConfig;
use tower::BoxError;
use tower_quota::server::router;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Serves `/v1/resource` behind a per-client token bucket.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "QUOTA_ADDR", default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Bucket size (burst allowance) per client
    #[arg(long, env = "QUOTA_CAPACITY", default_value = "10")]
    capacity: NonZeroUsize,

    /// Tokens credited per client per second
    #[arg(long, env = "QUOTA_REFILL_RATE", default_value_t = 1)]
    refill_rate: usize,

    /// Forget clients idle for this long (e.g. "10m"); unset keeps every client
    #[arg(long, env = "QUOTA_IDLE_RETENTION", value_parser = humantime::parse_duration)]
    idle_retention: Option<Duration>,

    /// How often to sweep for idle clients
    #[arg(long, env = "QUOTA_SWEEP_INTERVAL", value_parser = humantime::parse_duration, default_value = "60s")]
    sweep_interval: Duration,
}

impl Args {
    fn limiter_config(&self) -> LimiterConfig {
        let config = LimiterConfig::new(self.capacity, self.refill_rate);
        match self.idle_retention {
            Some(retention) => config.with_idle_retention(retention),
            None => config,
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_quota=debug,quota_bucket=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn spawn_sweeper(limiter: Arc<Limiter>, retention: Duration, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let evicted = limiter.evict_idle(retention);
            info!(evicted, tracked = limiter.len(), "idle sweep");
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing();
    let args = Args::parse();
    let config = args.limiter_config();

    // One registry for the life of the process, shared by every request.
    let limiter = Arc::new(Limiter::from_config(&config));
    let admission = Arc::new(Admission::new(Arc::clone(&limiter)));

    if let Some(retention) = config.idle_retention {
        spawn_sweeper(Arc::clone(&limiter), retention, args.sweep_interval);
    }

    let app = router(admission);

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!(
        addr = %listener.local_addr()?,
        capacity = config.capacity.get(),
        refill_rate = config.refill_rate,
        "server running"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
