use std::sync::Arc;

use anyhow::{
    Context,
    Result,
};
use cachering::{
    config::{
        OtelConfig,
        PeerConfig,
        SentryConfig,
    },
    grpc_getter::GrpcPeerGetter,
    observability,
    peers::{
        PeerHandle,
        PeerPicker,
    },
    pool::PeerPool,
    proto::GetRequest,
};
use clap::Parser;
use tracing::{
    error,
    info,
};

#[derive(Debug, Parser, Clone)]
#[command(name = "cachering", about = "Show which cache node owns each key.")]
struct Config {
    #[clap(flatten)]
    peers: PeerConfig,

    #[clap(flatten)]
    sentry: SentryConfig,

    #[clap(flatten)]
    otel: OtelConfig,

    /// Keys to locate.
    #[arg(long = "key", required = true)]
    keys: Vec<String>,

    /// Cache group used when fetching.
    #[arg(long, env = "CACHERING_GROUP", default_value = "default")]
    group: String,

    /// Fetch remotely owned keys from their owner.
    #[arg(long)]
    fetch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    let version = env!("CARGO_PKG_VERSION");
    let _sentry = observability::init_tracing_and_sentry(config.sentry.clone());

    observability::init_otel_metrics(config.otel.clone())
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize OpenTelemetry metrics")?;

    info!(config = ?config, version = version, "Starting cachering");

    let pool = PeerPool::new(config.peers.self_addr.clone(), config.peers.replicas)
        .context("Failed to create peer pool")?;
    let timeout = config.peers.fetch_timeout();
    pool.set_peers(config.peers.peers.clone(), |peer| {
        GrpcPeerGetter::connect_lazy(peer, timeout).map(|getter| Arc::new(getter) as PeerHandle)
    })
    .context("Failed to build peer ring")?;
    let pool = Arc::new(pool);

    let lookups = config.keys.iter().map(|key| {
        let pool = pool.clone();
        let group = config.group.clone();
        let key = key.clone();
        let fetch = config.fetch;
        async move {
            let Some(owner) = pool.owner(&key) else {
                println!("{key}\t<no nodes>");
                return;
            };

            match pool.pick_peer(&key) {
                None => println!("{key}\t{owner}\tlocal"),
                Some(_) if !fetch => println!("{key}\t{owner}\tremote"),
                Some(peer) => match peer.get(&GetRequest::new(group, key.clone())).await {
                    Ok(response) => println!("{key}\t{owner}\tremote\t{} bytes", response.value.len()),
                    Err(e) => {
                        error!(key = %key, peer = %owner, error = %e, "Fetch from peer failed");
                        println!("{key}\t{owner}\tremote\terror: {e}");
                    },
                },
            }
        }
    });
    futures::future::join_all(lookups).await;

    Ok(())
}
