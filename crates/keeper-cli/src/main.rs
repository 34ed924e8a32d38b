//! keeper - runs one scan pass and prints the report as JSON.
//!
//! Scheduling is external (cron, a systemd timer, ...): each invocation is one pass.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use keeper_core::domain::{Address, Wei};
use keeper_core::impls::{InMemoryLedger, SimpleCounter};
use keeper_core::ports::{LedgerClient, SystemClock};
use keeper_core::registry::RegistryConfig;
use keeper_core::{KeeperBuilder, KeeperConfig};

/// Devnet counter deployment, overridable with `COUNTER_ADDRESS`.
const DEFAULT_COUNTER_ADDRESS: &str = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512";
const DEVNET_INTERVAL: Duration = Duration::from_secs(300);
/// 0.01 ether.
const DEVNET_FUNDING: Wei = Wei::new(10_000_000_000_000_000);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the report; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = KeeperConfig::load().context("loading keeper configuration")?;
    tracing::info!(
        registry = %config.registry_address,
        rpc_url = %config.rpc_url,
        gas_ceiling = config.gas_ceiling,
        check_concurrency = config.check_concurrency,
        "keeper starting"
    );

    let ledger = connect(&config).await?;
    let scan = KeeperBuilder::from_config(ledger, &config).build()?;
    let report = scan
        .run_pass()
        .await
        .inspect_err(|e| tracing::error!(error = %e, "scan pass aborted"))?;

    let attention = report.needs_operator_attention();
    if !attention.is_empty() {
        tracing::warn!(upkeeps = ?attention, "upkeeps need operator attention");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Only the in-process devnet is compiled in.
async fn connect(config: &KeeperConfig) -> anyhow::Result<Arc<dyn LedgerClient>> {
    if !config.rpc_url.starts_with("memory:") {
        bail!(
            "no JSON-RPC ledger client is compiled in; use RPC_URL=memory: for the in-process devnet (got {})",
            config.rpc_url
        );
    }

    let signer = config.signer_key.local_address();
    let ledger = InMemoryLedger::new(
        RegistryConfig::new(config.minimum_funding),
        signer,
        Arc::new(SystemClock),
    )
    .with_registry_address(config.registry_address);

    let counter: Address = std::env::var("COUNTER_ADDRESS")
        .unwrap_or_else(|_| DEFAULT_COUNTER_ADDRESS.to_string())
        .parse()
        .context("parsing COUNTER_ADDRESS")?;
    ledger
        .deploy_target(counter, Arc::new(SimpleCounter::new()))
        .await;
    let id = ledger
        .register_upkeep(signer, counter, Vec::new(), DEVNET_INTERVAL, DEVNET_FUNDING)
        .await
        .context("registering devnet upkeep")?;
    tracing::info!(
        upkeep_id = %id,
        target = %counter,
        funding_eth = %DEVNET_FUNDING.format_ether(),
        minimum_funding_eth = %config.minimum_funding.format_ether(),
        "devnet ready"
    );

    Ok(Arc::new(ledger))
}
