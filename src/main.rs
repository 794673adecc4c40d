//! LST Vault Service - Main Entry Point
//!
//! Runs the vault with mock oracles for simulated operation, plus status
//! reporting and a bridge walkthrough for operator smoke testing.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use lst_vault::automation::{RebalanceEngine, RebalanceThresholds, UpkeepScheduler};
use lst_vault::bridge::BridgeRouter;
use lst_vault::config::Config;
use lst_vault::oracle::mock::{MockMarketSignal, MockYieldSource};
use lst_vault::oracle::MarketSignalSource;
use lst_vault::persistence::{HarvestRecord, PersistenceManager};
use lst_vault::token::ShareToken;
use lst_vault::utils::decimal::{safe_div, to_percent};
use lst_vault::vault::VaultLedger;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// LST Vault CLI
#[derive(Parser)]
#[command(name = "lst-vault")]
#[command(version, about = "Multi-asset LST yield vault with bridging and rebalance automation")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the vault service with mock oracles
    Run {
        /// Path to SQLite database
        #[arg(short, long, default_value = "data/lst_vault.db")]
        db: String,

        /// Seconds between oracle polls (harvests stay gated by the upkeep interval)
        #[arg(short, long, default_value = "10")]
        poll_secs: u64,
    },

    /// Show vault status from persisted state
    Status {
        /// Path to SQLite database
        #[arg(short, long, default_value = "data/lst_vault.db")]
        db: String,
    },

    /// Walk a transfer through both bridge endpoints
    BridgeDemo {
        /// Path to SQLite database
        #[arg(short, long, default_value = "data/lst_vault.db")]
        db: String,

        /// Amount to bridge
        #[arg(short, long, default_value = "200")]
        amount: Decimal,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Some(Commands::Status { db }) => show_status(&db),
        Some(Commands::BridgeDemo { db, amount }) => run_bridge_demo(&db, amount),
        Some(Commands::Run { db, poll_secs }) => run_service(&db, poll_secs).await,
        None => run_service("data/lst_vault.db", 10).await,
    }
}

async fn run_service(db_path: &str, poll_secs: u64) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║            LST Vault Service v{}                        ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let config = Config::load()?;
    config.validate()?;
    log_config(&config);

    let owner = config.vault.owner.clone();

    // Vault with every configured asset behind a shared mock oracle
    let mut ledger = VaultLedger::new(&owner);
    let yield_source = Arc::new(MockYieldSource::new());
    for asset in &config.vault.assets {
        ledger.add_asset(&owner, asset, config.vault.max_deposit_per_asset)?;
        ledger.set_yield_source(&owner, asset, yield_source.clone())?;
    }

    // Seed rates spread wide enough that drift occasionally crosses the
    // divergence threshold
    let base_rates: Vec<Decimal> = config
        .vault
        .assets
        .iter()
        .enumerate()
        .map(|(i, _)| dec!(0.03) + Decimal::from(i as u64) * dec!(0.08))
        .collect();
    for (asset, rate) in config.vault.assets.iter().zip(&base_rates) {
        yield_source.set_rate(asset, *rate).await;
    }
    let market_signal = MockMarketSignal::new(dec!(0.72));

    let mut scheduler = UpkeepScheduler::new(
        &owner,
        ChronoDuration::seconds(config.automation.upkeep_interval_secs as i64),
        RebalanceEngine::new(RebalanceThresholds {
            divergence: config.automation.divergence_threshold,
            min_probability: config.automation.probability_threshold,
            max_signal_age: ChronoDuration::seconds(config.automation.max_signal_age_secs as i64),
        }),
        config.automation.harvest_rate_per_hour,
    );

    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let persistence = PersistenceManager::new(db_path)?;

    // Seed depositors so harvests have assets to accrue on
    for (account, asset, amount) in [
        ("alice", config.vault.assets[0].as_str(), dec!(250)),
        ("bob", config.vault.assets[0].as_str(), dec!(120)),
    ] {
        let receipt = ledger.deposit(account, asset, amount, account)?;
        persistence.record_deposit(&receipt)?;
        info!(%account, %asset, %amount, "seed deposit");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    info!("🚀 Starting vault loop...");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut cycle: u64 = 0;
    while !shutdown.load(Ordering::SeqCst) {
        cycle += 1;
        let now = Utc::now();

        // Drift the mock rates so consecutive cycles see different spreads
        for (i, asset) in config.vault.assets.iter().enumerate() {
            let wobble = Decimal::from((cycle + i as u64) % 7) * dec!(0.005);
            yield_source.set_rate(asset, base_rates[i] + wobble).await;
        }

        for asset in ledger.supported_assets().to_vec() {
            if let Err(e) = ledger.get_asset_yield(&asset).await {
                warn!(%asset, error = %e, "yield refresh failed");
            }
        }
        let market = market_signal.probability().await.ok();

        let status = scheduler.upkeep_status(now);
        if status.due {
            let yields = ledger.yield_snapshot();
            match scheduler.perform_harvest(now, ledger.total_assets(), &yields, market.as_ref()) {
                Ok(outcome) => {
                    persistence.record_harvest(&HarvestRecord {
                        at: now,
                        harvested: outcome.harvested,
                        total_harvested: outcome.total_harvested,
                        signal_count: outcome.signals.len() as u32,
                    })?;
                    for signal in &outcome.signals {
                        info!(
                            from = %signal.from_asset,
                            to = %signal.to_asset,
                            delta = %signal.delta,
                            "⚖️  rebalance recommended"
                        );
                    }
                }
                Err(e) => warn!(error = %e, "harvest skipped"),
            }
        } else {
            info!(
                cycle,
                total_assets = %ledger.total_assets(),
                next_harvest_in_secs = status.time_until_next.num_seconds(),
                "⏳ upkeep not due"
            );
        }

        tokio::time::sleep(Duration::from_secs(poll_secs)).await;
    }

    info!("👋 Vault service stopped");
    Ok(())
}

/// Lock on one endpoint, mint on the other, then exercise the duplicate
/// and failure paths the transport can produce.
fn run_bridge_demo(db_path: &str, amount: Decimal) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    let owner = config.vault.owner.clone();

    let source_chain = config.bridge.local_chain;
    let destination_chain = *config
        .bridge
        .supported_chains
        .first()
        .ok_or_else(|| anyhow::anyhow!("no destination chain configured"))?;

    let mut source_token = ShareToken::new("LST Vault Share", "LVS", &owner);
    let mut destination_token = ShareToken::new("LST Vault Share", "LVS", &owner);
    let mut source = BridgeRouter::new(source_chain, &owner, &config.bridge.supported_chains);
    let mut destination = BridgeRouter::new(destination_chain, &owner, &[source_chain]);

    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let persistence = PersistenceManager::new(db_path)?;

    // Fund alice and let the escrow pull from her
    source_token.mint(&owner, "alice", amount * dec!(2))?;
    source_token.approve("alice", source.escrow_account(), amount * dec!(2));

    info!("🔒 Locking {} on chain {}", amount, source_chain);
    let outbound = source.send(&mut source_token, "alice", destination_chain, "bob", amount)?;
    info!(message_id = %outbound.message_id, "outbound transfer created");

    info!("📬 Delivering on chain {}", destination_chain);
    destination.deliver(
        &mut destination_token,
        &outbound.message_id,
        source_chain,
        &outbound.receiver,
        outbound.amount,
    )?;
    info!(balance = %destination_token.balance_of("bob"), "bob credited on destination");

    // At-least-once transport: redelivery must be a no-op
    let duplicate = destination.deliver(
        &mut destination_token,
        &outbound.message_id,
        source_chain,
        &outbound.receiver,
        outbound.amount,
    );
    info!(result = ?duplicate, "duplicate delivery rejected, no double mint");

    // Second transfer goes wrong and needs operator recovery
    let second = source.send(
        &mut source_token,
        "alice",
        destination_chain,
        "bob",
        amount / dec!(4),
    )?;
    source.mark_failed(&owner, &second.message_id)?;
    info!(message_id = %second.message_id, "transfer marked failed");
    source.retry_failed(&mut source_token, &owner, &second.message_id, "bob")?;
    info!(message_id = %second.message_id, "transfer retried and minted");

    for id in [&outbound.message_id, &second.message_id] {
        if let Some(message) = source.message(id) {
            persistence.upsert_message(message)?;
        }
    }
    if let Some(message) = destination.message(&outbound.message_id) {
        persistence.upsert_message(message)?;
    }

    info!(
        total_locked = %source.total_locked(),
        destination_supply = %destination_token.total_supply(),
        "bridge demo complete"
    );
    Ok(())
}

fn show_status(db_path: &str) -> Result<()> {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║                    LST VAULT STATUS                        ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    if !std::path::Path::new(db_path).exists() {
        println!("\n❌ Database not found: {}", db_path);
        println!("   The vault service has not run yet, or the database path is incorrect.");
        return Ok(());
    }

    let persistence = PersistenceManager::new(db_path)?;
    let config = Config::load()?;

    println!("\n📊 Vault Activity");
    for asset in &config.vault.assets {
        println!(
            "   ├─ {}: {} recorded deposit/withdraw events",
            asset,
            persistence.vault_event_count(asset)?
        );
    }

    let harvests = persistence.load_harvests()?;
    println!("\n🌾 Harvests");
    match harvests.last() {
        Some(latest) => {
            println!("   ├─ Cycles:           {}", harvests.len());
            println!("   ├─ Total Harvested:  {:.6}", latest.total_harvested);
            println!(
                "   ├─ Avg per Cycle:    {:.6}",
                safe_div(latest.total_harvested, Decimal::from(harvests.len() as u64))
            );
            println!(
                "   └─ Last Harvest:     {} ({} signals)",
                latest.at.format("%Y-%m-%d %H:%M:%S UTC"),
                latest.signal_count
            );
        }
        None => println!("   └─ No harvests recorded yet"),
    }

    let messages = persistence.load_messages()?;
    println!("\n🌉 Bridge Messages");
    if messages.is_empty() {
        println!("   └─ No messages recorded yet");
    }
    for message in &messages {
        println!(
            "   ├─ {}… {:?} {} ({} → {})",
            &message.id[..message.id.len().min(12)],
            message.status,
            message.amount,
            message.source_chain,
            message.destination_chain
        );
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "lst-vault.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("lst_vault=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Owner:               {}", config.vault.owner);
    info!("   Assets:              {}", config.vault.assets.join(", "));
    info!(
        "   Deposit Cap:         {} per asset",
        config.vault.max_deposit_per_asset
    );
    info!(
        "   Upkeep Interval:     {}s",
        config.automation.upkeep_interval_secs
    );
    info!(
        "   Divergence Gate:     > {:.0}%",
        to_percent(config.automation.divergence_threshold)
    );
    info!(
        "   Probability Gate:    >= {:.0}%",
        to_percent(config.automation.probability_threshold)
    );
    info!("   Local Chain:         {}", config.bridge.local_chain);
}
