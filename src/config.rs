use std::time::Duration;

use clap::Parser;

#[derive(Debug, Parser, Clone)]
pub struct SentryConfig {
    #[arg(long, env = "SENTRY_DSN", default_value = "")]
    pub dsn: String,

    #[arg(long, env = "SENTRY_SAMPLE_RATE", default_value = "0.0")]
    pub sample_rate: f32,

    #[arg(long = "sentry-environment", env = "SENTRY_ENVIRONMENT", default_value = "")]
    pub environment: String,
}

#[derive(Debug, Parser, Clone)]
pub struct OtelConfig {
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", default_value = "")]
    pub endpoint: String,

    #[arg(long, env = "OTEL_EXPORTER_OTLP_PROTOCOL", default_value = "http")]
    pub protocol: String,
}

/// Cluster membership as seen by this node.
#[derive(Debug, Parser, Clone)]
pub struct PeerConfig {
    /// Identifier of this node; must match its entry in `peers`.
    #[arg(long, env = "CACHERING_SELF_ADDR")]
    pub self_addr: String,

    /// Every cache node in the cluster, including this one.
    #[arg(long, env = "CACHERING_PEERS", value_delimiter = ',', num_args = 1..)]
    pub peers: Vec<String>,

    /// Virtual positions per node on the hash ring.
    #[arg(long, env = "CACHERING_REPLICAS", default_value_t = 50)]
    pub replicas: usize,

    #[arg(long, env = "CACHERING_FETCH_TIMEOUT_MS", default_value_t = 500)]
    pub fetch_timeout_ms: u64,
}

impl PeerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
