use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::context::AppContext;
use crate::api::handler::handle_request;
use crate::config::{Config, MAX_WINDOW_SECONDS};
use crate::error::{GateError, Result};
use crate::store::MemoryStore;
use crate::telemetry::init_metrics;

/// Guard to decrement active connections counter when dropped
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Bind `config.listen` and serve until SIGINT or SIGTERM.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let listener = TcpListener::bind(config.listen).await?;

    let (metrics, registry) = init_metrics()?;
    let ctx = AppContext::from_config(&config, Arc::new(MemoryStore::new()))
        .with_metrics(metrics, registry);

    let grace = Duration::from_secs(config.timeout.shutdown_secs);
    serve(listener, Arc::new(ctx), shutdown_signal()?, grace).await
}

/// Resolves on the first SIGINT or SIGTERM
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
        GateError::Io(std::io::Error::other(format!("Failed to setup SIGTERM handler: {e}")))
    })?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).map_err(|e| {
        GateError::Io(std::io::Error::other(format!("Failed to setup SIGINT handler: {e}")))
    })?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }
    })
}

/// Evict idle rate limiter entries once per window
fn spawn_sweeper(ctx: Arc<AppContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let limiter = Arc::clone(ctx.gatekeeper.rate_limiter());
        let period = limiter
            .window()
            .clamp(Duration::from_secs(1), Duration::from_secs(MAX_WINDOW_SECONDS));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = limiter.sweep(Instant::now());
            if evicted > 0 {
                debug!(evicted, tracked = limiter.tracked_addresses(), "rate limiter sweep");
            }
            if let Some(m) = &ctx.metrics {
                m.record_evictions(evicted as u64);
            }
        }
    })
}

/// Accept connections on `listener` until `shutdown` resolves, then wait up to
/// `grace` for in-flight connections to finish.
pub async fn serve<F>(
    listener: TcpListener,
    ctx: Arc<AppContext>,
    shutdown: F,
    grace: Duration,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let builder = ConnBuilder::new(TokioExecutor::new());
    let active_connections = Arc::new(AtomicUsize::new(0));
    let sweeper = spawn_sweeper(Arc::clone(&ctx));

    let addr = listener.local_addr()?;
    info!(?addr, "sensor gate listening (h1/h2)");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                active_connections.fetch_add(1, Ordering::Relaxed);

                let builder = builder.clone();
                let ctx = Arc::clone(&ctx);
                let active_connections = Arc::clone(&active_connections);

                tokio::spawn(async move {
                    let _guard = ConnectionGuard(active_connections);

                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let ctx = Arc::clone(&ctx);
                        async move { Ok::<_, hyper::Error>(handle_request(&req, peer, &ctx)) }
                    });

                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "serve_connection error");
                    }
                });
            }
        }
    }

    sweeper.abort();
    drop(listener);

    info!("Waiting for active connections to finish (timeout: {}s)", grace.as_secs());
    let start = Instant::now();

    loop {
        let active = active_connections.load(Ordering::Relaxed);
        if active == 0 {
            info!("All connections closed, shutdown complete");
            break;
        }

        if start.elapsed() >= grace {
            warn!(
                active_connections = active,
                "Shutdown timeout reached, {} connections still active", active
            );
            break;
        }

        debug!(active_connections = active, "Waiting for connections to close");
        sleep(Duration::from_millis(100)).await;
    }

    info!("Sensor gate stopped");
    Ok(())
}
