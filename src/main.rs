//! `billing-node`: runs a billing state return on a simulated network
//!
//! Issues a billing state (and optional chips) owned by the local node,
//! returns it to the issuer and prints the outcome as JSON.

use anyhow::{Context, Result};
use billing_flows::config::Config;
use billing_flows::metrics::metrics;
use billing_flows::simulation::SimulatedNetwork;
use clap::Parser;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Chip amounts to issue before the return, overrides the config
    #[arg(long, value_delimiter = ',')]
    chips: Option<Vec<i64>>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, env = "BILLING_JSON_LOGS")]
    json: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    print_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    init_logging(args.verbose, args.json || config.monitoring.json_logs)?;
    if let Some(chips) = args.chips {
        config.demo.chip_amounts = chips;
    }
    config.validate().context("Invalid configuration")?;

    info!(version = env!("CARGO_PKG_VERSION"), node = %config.node.name, "Starting billing node");

    let network = SimulatedNetwork::from_config(&config);
    let billing = network.issue_billing_state(&config.demo.external_id, config.demo.billing_amount);
    for amount in &config.demo.chip_amounts {
        network.issue_chip(&billing, *amount);
    }
    let input_ref = billing.state_ref;

    let outcome = network.holder.return_flow().call(billing).await;
    let report = match &outcome {
        Ok((state, stx)) => json!({
            "result": "returned",
            "tx_id": stx.id().to_string(),
            "input": input_ref.to_string(),
            "state": state,
            "notary_submissions": network.notary.submissions(),
        }),
        Err(e) => {
            error!(category = e.category(), error = %e, "Return failed");
            json!({
                "result": "failed",
                "category": e.category(),
                "error": e.to_string(),
                "retryable": e.is_retryable(),
            })
        }
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.print_metrics && config.monitoring.enable_metrics {
        print!("{}", metrics().render());
    }

    outcome.map(|_| ()).map_err(anyhow::Error::from)
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "billing_flows=debug,billing_node=debug,info"
    } else {
        "billing_flows=info,billing_node=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        // Logging is not up yet
        eprintln!("Config file '{}' not found, using defaults", path);
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }
}
