use anyhow::{Context, Result};
use clap::Parser;
use kvrouter::{ApiServer, Config, CurveType, Router, SfcBalancer};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "kvrouter")]
#[command(about = "Key router for key-value storage clusters")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "kvrouter.toml")]
    config: String,

    /// Gateway bind address
    #[arg(long, env = "KVROUTER_ADDRESS")]
    address: Option<String>,

    /// Space filling curve type (hilbert or morton)
    #[arg(long, env = "KVROUTER_SFC_CURVE")]
    curve: Option<CurveType>,

    /// Amount of curve dimensions
    #[arg(long, env = "KVROUTER_SFC_DIMENSIONS")]
    dimensions: Option<u32>,

    /// Cells per curve dimension
    #[arg(long, env = "KVROUTER_SFC_SIZE")]
    size: Option<u64>,

    /// Storage node RPC address to register at startup
    #[arg(long = "seed")]
    seeds: Vec<String>,
}

impl Args {
    /// Command line and environment take precedence over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(address) = &self.address {
            config.server.bind_addr = address.clone();
        }
        if let Some(curve) = self.curve {
            config.balancer.curve = curve;
        }
        if let Some(dimensions) = self.dimensions {
            config.balancer.dimensions = dimensions;
        }
        if let Some(size) = self.size {
            config.balancer.size = size;
        }
        config.seed_nodes.extend(self.seeds.iter().cloned());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,kvrouter=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!("Config file: {}", args.config);

    let mut config = Config::load_or_default(Path::new(&args.config))?;
    args.apply(&mut config);
    config.validate()?;
    tracing::info!(
        "Partitioning with {} curve, {} dimensions, size {}",
        config.balancer.curve,
        config.balancer.dimensions,
        config.balancer.size
    );

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    let balancer = Arc::new(SfcBalancer::new(&config.balancer)?);
    let router = Arc::new(
        Router::new(balancer, config.router.clone()).with_client_config(config.client.clone()),
    );

    for seed in &config.seed_nodes {
        match router.register_node(seed).await {
            Ok(meta) => tracing::info!("Seed node {} joined from {}", meta.id, seed),
            Err(e) => tracing::warn!("Seed node {} not registered: {}", seed, e),
        }
    }

    ApiServer::new(router)
        .with_metrics(prometheus)
        .serve(&config.server.bind_addr)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "kvrouter",
            "--address",
            "0.0.0.0:9000",
            "--curve",
            "morton",
            "--dimensions",
            "3",
            "--size",
            "64",
            "--seed",
            "10.0.0.1:9090",
        ]);
        let mut config = Config::default();
        config.seed_nodes.push("10.0.0.2:9090".into());
        args.apply(&mut config);

        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.balancer.curve, CurveType::Morton);
        assert_eq!(config.balancer.dimensions, 3);
        assert_eq!(config.balancer.size, 64);
        assert_eq!(config.seed_nodes, vec!["10.0.0.2:9090", "10.0.0.1:9090"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_curve() {
        assert!(Args::try_parse_from(["kvrouter", "--curve", "peano"]).is_err());
    }
}
