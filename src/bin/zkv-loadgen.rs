//! zkv-loadgen - Concurrent load generator for zkv
//!
//! Opens N client connections and has each issue a fixed number of
//! requests against a small set of keys: 99% `$get`, 1% `$set` with a
//! random value. A failed request makes the client reconnect and carry on.

use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use zkv::client::Client;

/// Keys the generated requests choose from
const KEYS: [&str; 5] = ["tree", "sky", "grass", "cloud", "flower"];

/// Share of requests that are reads
const GET_RATIO: f64 = 0.99;

/// Delay between connection attempts while the server is unreachable
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "zkv-loadgen")]
#[command(version)]
#[command(about = "Concurrent load generator for a zkv server", long_about = None)]
struct Args {
    /// Number of concurrent clients
    #[arg(default_value_t = 1)]
    clients: usize,

    /// Requests sent by each client
    #[arg(short = 'n', long, default_value_t = 10_000)]
    requests: u64,

    /// Server host
    #[arg(long, default_value = zkv::DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = zkv::DEFAULT_PORT)]
    port: u16,
}

#[derive(Debug, Default)]
struct Totals {
    ok: AtomicU64,
    failed: AtomicU64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let addr = format!("{}:{}", args.host, args.port);
    let totals = Arc::new(Totals::default());
    let started = Instant::now();

    info!(clients = args.clients, requests = args.requests, %addr, "Starting load");

    let mut tasks = Vec::with_capacity(args.clients);
    for id in 0..args.clients {
        tasks.push(tokio::spawn(run_client(
            id,
            addr.clone(),
            args.requests,
            Arc::clone(&totals),
        )));
    }

    for task in tasks {
        task.await?;
    }

    let elapsed = started.elapsed();
    let ok = totals.ok.load(Ordering::Relaxed);
    info!(
        ok,
        failed = totals.failed.load(Ordering::Relaxed),
        elapsed_ms = elapsed.as_millis() as u64,
        req_per_sec = (ok as f64 / elapsed.as_secs_f64().max(f64::EPSILON)) as u64,
        "Load complete"
    );

    Ok(())
}

async fn run_client(id: usize, addr: String, requests: u64, totals: Arc<Totals>) {
    let mut rng = StdRng::from_entropy();
    let mut client = connect(id, &addr).await;

    for _ in 0..requests {
        let key = KEYS.choose(&mut rng).copied().unwrap_or(KEYS[0]);
        let result = if rng.gen_bool(GET_RATIO) {
            client.get(key).await
        } else {
            let value = rng.gen_range(1..=100).to_string();
            client.set(key, &value).await
        };

        match result {
            Ok(reply) => {
                totals.ok.fetch_add(1, Ordering::Relaxed);
                debug!(client = id, reply = %reply.trim_end(), "Reply");
            }
            Err(e) => {
                totals.failed.fetch_add(1, Ordering::Relaxed);
                warn!(client = id, error = %e, "Reconnecting due to error");
                client = connect(id, &addr).await;
            }
        }
    }
}

/// Connects, retrying until the server accepts.
async fn connect(id: usize, addr: &str) -> Client {
    loop {
        match Client::connect(addr).await {
            Ok(client) => return client,
            Err(e) => {
                info!(client = id, error = %e, "Waiting for server...");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
