//! CLI command implementations

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::notify::{self, Notifier};
use crate::stream::JsonlReplaySource;

/// Start the engine
pub async fn start(
    mut config: Config,
    replay: Option<PathBuf>,
    pace_ms: Option<u64>,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        warn!("Running in DRY-RUN mode - intents are simulated, nothing is sent");
        config.mode.simulation_mode = true;
    }
    if config.mode.is_conflicting() {
        warn!(
            "LIVE_MODE is set together with SIMULATION_MODE/PAPER_TRADING; running {}",
            config.mode.trading_mode()
        );
    }

    let Some(replay) = replay else {
        bail!(
            "no event source: pass --replay <file>; the Yellowstone gRPC client is supplied by the embedding application"
        );
    };

    info!(
        "Buy amount: {} SOL, Slippage: {}bps, Daily budget: {} SOL",
        config.trading.token_amount_sol, config.trading.slippage_bps, config.advanced.daily_buy_budget_sol
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let notifier: Arc<dyn Notifier> = Arc::from(notify::from_config(http, &config.telegram));

    // No signer is embedded in the binary, so live mode is refused by Engine::new
    let engine = Engine::new(config, None, notifier)?;

    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            cancel.cancel();
        }
    });

    let mut source = JsonlReplaySource::new(replay);
    if let Some(ms) = pace_ms {
        source = source.with_interval(Duration::from_millis(ms));
    }
    let summary = engine.run(Arc::new(source)).await?;

    println!("Session summary:");
    println!("  candidates seen:   {}", summary.stats.candidates);
    println!("  buys / failures:   {} / {}", summary.stats.buys, summary.stats.buy_failures);
    println!("  gate refusals:     {}", summary.stats.gate_refusals);
    println!("  sells / failures:  {} / {}", summary.stats.sells, summary.stats.sell_failures);
    println!("  open positions:    {}", summary.open_positions);
    for position in &summary.positions {
        println!(
            "    {} {:?}: {} of {} tokens left, {:+.1}% unrealized",
            position.mint,
            position.state,
            position.remaining,
            position.entry_amount,
            position.unrealized_pnl_pct()
        );
    }
    println!("  dropped events:    {}", summary.dropped_events);
    println!(
        "  budget spent:      {:.4} SOL",
        summary.budget_spent_lamports as f64 / 1e9
    );
    println!(
        "  est. P&L:          {:.4} SOL ({} trades, {:.1}% wins)",
        summary.daily.net_pnl_sol,
        summary.daily.total_trades,
        summary.daily.win_rate()
    );
    Ok(())
}

/// Show configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Configuration was already loaded and validated; report what it enables
pub fn check(config: &Config) -> Result<()> {
    println!("Configuration OK");
    println!("  mode: {}", config.mode.trading_mode());

    let mut relays = Vec::new();
    if config.jito.use_jito {
        relays.push("jito");
    }
    if config.zero_slot.enabled() {
        relays.push("zeroslot");
    }
    if config.nozomi.enabled() {
        relays.push("nozomi");
    }
    if config.blox_route.enabled() {
        relays.push("bloxroute");
    }
    if relays.is_empty() {
        println!("  venues: direct RPC ({} attempts)", config.trading.counter);
    } else {
        println!("  venues: {}", relays.join(", "));
    }

    if config.mode.is_conflicting() {
        println!("  warning: LIVE_MODE overridden by a simulated mode flag");
    }
    if config.filters.enabled_count() == 0 {
        println!("  warning: all filter signals disabled, every candidate passes");
    }
    if !config.mode.trading_mode().is_simulated() {
        println!("  warning: live mode needs an embedded transaction signer");
    }
    Ok(())
}
