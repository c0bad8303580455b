// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::U256;
use alloy::signers::local::PrivateKeySigner;
use clap::{Parser, Subcommand};
use mitander_alloc::app::config::GlobalSettings;
use mitander_alloc::app::logging::setup_logging;
use mitander_alloc::common::metrics::spawn_metrics_server;
use mitander_alloc::domain::error::EngineError;
use mitander_alloc::domain::types::{Allocation, TokenMeta};
use mitander_alloc::infrastructure::data::tokenlist::TokenBook;
use mitander_alloc::infrastructure::exchange::UniV2Exchange;
use mitander_alloc::infrastructure::pricing::StaticPriceSource;
use mitander_alloc::network::provider::{ConnectionFactory, HttpProvider};
use mitander_alloc::portfolio::{PortfolioEngine, PortfolioService};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "oxidity allocator keeper")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print total value, targets and per-token balances
    Status,
    /// Run one rebalance pass
    Rebalance,
    /// Credit a base-asset deposit and rebalance into it
    Invest { amount: String },
    /// Release base asset back to the pool, liquidating any shortfall
    FreeFunds { amount: String },
    /// Sell every non-base holding and clear the target portfolio
    ExitAll,
}

fn parse_amount(raw: &str) -> Result<U256, EngineError> {
    U256::from_str(raw.trim())
        .map_err(|e| EngineError::Config(format!("Invalid amount {raw}: {e}")))
}

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let cli = Cli::parse();

    let settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    let log_level = if cli.debug {
        "debug"
    } else {
        settings.log_level()
    };
    setup_logging(log_level, settings.log_json);

    let signer = PrivateKeySigner::from_str(&settings.wallet_key)
        .map_err(|e| EngineError::Config(format!("Invalid wallet key: {}", e)))?;
    if signer.address() != settings.wallet_address {
        return Err(EngineError::Config(format!(
            "wallet_address {} does not match wallet_key address {}",
            settings.wallet_address,
            signer.address()
        )));
    }

    let chain_id = settings.chain_id;
    let rpc_url = settings.get_http_provider(chain_id)?;
    let provider = ConnectionFactory::http(&rpc_url)?;

    let exchange = Arc::new(UniV2Exchange::new(
        provider.clone(),
        settings.router_address_value(),
        signer,
        chain_id,
        settings.quote_retry_attempts_value(),
    ));

    let mut engine = PortfolioEngine::new(
        settings.base_token_value(),
        TokenMeta::new(settings.base_symbol.clone(), settings.base_decimals),
        exchange,
        settings.bridge_token_value(),
    );

    let book = match settings.tokenlist_path_value() {
        Some(path) => TokenBook::load_from_file(&path)?,
        None => TokenBook::default(),
    };
    seed_registry(&mut engine, &book, &provider, &settings)?;
    engine.sync_wallet_balances().await?;
    seed_target(&mut engine, &book, &settings)?;

    let _ = spawn_metrics_server(settings.metrics_port, engine.stats()).await;

    let admin = settings.admin();
    let pool = settings.pool();
    let service = PortfolioService::new(engine, admin, pool);

    // Audit mirror: every portfolio event as one JSON log line.
    let mut events = service.subscribe().await;
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                tracing::info!(target: "audit", event = %json, "Audit record");
            }
        }
    });

    match cli.command {
        Command::Status => {
            let total = service.total_assets().await?;
            tracing::info!(target: "keeper", total = %total, "Total portfolio value (base units)");
            for alloc in service.allocations().await {
                tracing::info!(
                    target: "keeper",
                    token = %format!("{:#x}", alloc.token),
                    weight_bps = alloc.weight_bps,
                    "Target allocation"
                );
            }
            for token in service.allowed_tokens().await {
                let symbol = service
                    .token_meta(token)
                    .await
                    .map(|meta| meta.symbol)
                    .unwrap_or_default();
                let balance = service.token_balance(token).await;
                tracing::info!(
                    target: "keeper",
                    token = %format!("{:#x}", token),
                    symbol = %symbol,
                    balance = %balance,
                    "Holding"
                );
            }
        }
        Command::Rebalance => {
            let report = service.rebalance(admin).await?;
            tracing::info!(
                target: "keeper",
                total = %report.total_value,
                executed = report.executed_legs(),
                skipped = report.skipped_legs(),
                valuation_skips = report.skipped.len(),
                "Rebalance pass complete"
            );
        }
        Command::Invest { amount } => {
            let amount = parse_amount(&amount)?;
            match service.invest(pool, amount).await? {
                Some(report) => tracing::info!(
                    target: "keeper",
                    amount = %amount,
                    executed = report.executed_legs(),
                    skipped = report.skipped_legs(),
                    "Deposit credited and rebalanced"
                ),
                None => tracing::info!(
                    target: "keeper",
                    amount = %amount,
                    "Deposit credited; no target portfolio or pass aborted"
                ),
            }
        }
        Command::FreeFunds { amount } => {
            let amount = parse_amount(&amount)?;
            let outcome = service.free_funds(pool, amount).await?;
            tracing::info!(
                target: "keeper",
                requested = %outcome.requested,
                released = %outcome.released,
                liquidated = outcome.liquidation.is_some(),
                "Funds release complete"
            );
        }
        Command::ExitAll => {
            let legs = service.emergency_exit_all_positions(admin).await?;
            let executed = legs.iter().filter(|leg| leg.executed()).count();
            tracing::info!(
                target: "keeper",
                executed,
                skipped = legs.len() - executed,
                "Emergency exit complete"
            );
        }
    }

    Ok(())
}

/// Allow-list every tokenlist entry for this chain and bind its
/// declared price source. The base asset falls back to a $1 static peg
/// when the list gives it no source.
fn seed_registry(
    engine: &mut PortfolioEngine,
    book: &TokenBook,
    provider: &HttpProvider,
    settings: &GlobalSettings,
) -> Result<(), EngineError> {
    let base = engine.base_token();
    let staleness = settings.oracle_staleness();

    for (address, listing) in book.tokens_on(settings.chain_id) {
        if *address != base {
            engine.allow_token(
                *address,
                TokenMeta::new(listing.symbol.clone(), listing.decimals),
            )?;
        }
        if let Some(spec) = &listing.source {
            engine.set_price_source(
                *address,
                spec.instantiate(provider, staleness)?,
                spec.decimals(),
            )?;
        }
    }

    if !engine.has_price_source(base) {
        // 8-decimal $1 peg; matches the Chainlink USD-feed convention.
        engine.set_price_source(base, Arc::new(StaticPriceSource::new(100_000_000)), 8)?;
    }
    Ok(())
}

/// Applies the configured initial target portfolio without triggering a
/// pass; the subcommand decides when trading starts.
fn seed_target(
    engine: &mut PortfolioEngine,
    book: &TokenBook,
    settings: &GlobalSettings,
) -> Result<(), EngineError> {
    if settings.allocations.is_empty() {
        return Ok(());
    }

    let mut list = Vec::with_capacity(settings.allocations.len());
    for entry in &settings.allocations {
        let token = book
            .resolve(settings.chain_id, &entry.token)
            .ok_or_else(|| {
                EngineError::Config(format!("Unresolvable allocation token {}", entry.token))
            })?;
        list.push(Allocation::new(token, entry.weight_bps));
    }
    engine.seed_allocations(list)?;
    Ok(())
}
