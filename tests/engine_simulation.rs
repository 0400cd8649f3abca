//! Drives the whole engine over a replay file in simulation mode

use async_trait::async_trait;
use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pumpfun_engine::config::{Config, Settings};
use pumpfun_engine::filter::TokenCandidate;
use pumpfun_engine::notify::{Alert, Notifier};
use pumpfun_engine::stream::{EngineEvent, JsonlReplaySource, MarketUpdate, WalletTrade};
use pumpfun_engine::trading::Side;
use pumpfun_engine::Engine;

#[derive(Default)]
struct RecordingNotifier(Mutex<Vec<Alert>>);

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: Alert) -> pumpfun_engine::Result<()> {
        self.0.lock().unwrap().push(alert);
        Ok(())
    }
}

fn config() -> Config {
    let settings = Settings::from_pairs([
        ("SIMULATION_MODE", "true"),
        ("PRIVATE_LOGIC_ENABLED", "true"),
        ("SELL_ALL_TOKENS", "true"),
        ("PL_STAGE_1_PERCENT", "50"),
        ("PL_STAGE_1_DELAY", "50"),
        ("THRESHOLD_BUY", "1000000000"),
        ("TOKEN_AMOUNT", "1.0"),
        ("DAILY_BUY_BUDGET", "1.5"),
        ("WORKER_COUNT", "2"),
        ("MARKET_CAP_ENABLED", "false"),
        ("VOLUME_ENABLED", "false"),
        ("BUY_SELL_COUNT_ENABLED", "false"),
        ("SOL_INVESTED_ENABLED", "false"),
        ("LAUNCHER_SOL_ENABLED", "false"),
        ("DEV_BUY_ENABLED", "false"),
        ("MIN_LAST_TIME", "0"),
    ])
    .unwrap();
    Config::from_settings(&settings).unwrap()
}

fn candidate(mint: Pubkey, sol_invested: f64) -> EngineEvent {
    let now = Utc::now();
    EngineEvent::Candidate(TokenCandidate {
        mint,
        creator: None,
        market_cap: 12.0,
        volume: 9.0,
        buy_count: 300,
        sell_count: 120,
        launcher_sol_balance: 0.4,
        dev_buy_sol: 8.0,
        sol_invested,
        price: 0.000_002,
        launched_at: now - chrono::Duration::minutes(2),
        observed_at: now,
    })
}

#[tokio::test]
async fn test_replay_session_in_simulation() {
    let config = config();
    assert!(config.mode.trading_mode().is_simulated());

    let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
    let events = vec![
        candidate(a, 5.0),
        candidate(b, 5.0),
        // below THRESHOLD_BUY
        candidate(c, 0.5),
        // not a target wallet
        EngineEvent::WalletTrade(WalletTrade {
            wallet: Pubkey::new_unique(),
            mint: c,
            side: Side::Buy,
            lamports: 1_000_000_000,
            token_amount: 1_000_000,
            market_cap: 10.0,
            sequence: 1,
            observed_at: Utc::now(),
        }),
        // stale
        EngineEvent::Market(MarketUpdate {
            mint: a,
            price: 0.000_001,
            sol_invested: 50.0,
            market_cap: 30.0,
            observed_at: Utc::now() - chrono::Duration::hours(1),
        }),
    ];

    let mut file = tempfile::NamedTempFile::new().unwrap();
    for event in &events {
        writeln!(file, "{}", serde_json::to_string(event).unwrap()).unwrap();
    }
    writeln!(file, "{{\"type\":\"bogus\"}}").unwrap();
    file.flush().unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Engine::new(config, None, notifier.clone()).unwrap();

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        engine.run(Arc::new(JsonlReplaySource::new(file.path()))),
    )
    .await
    .expect("engine did not settle")
    .unwrap();

    assert_eq!(summary.stats.candidates, 3);
    assert_eq!(summary.stats.buys, 1);
    assert_eq!(summary.stats.gate_refusals, 1);
    assert_eq!(summary.stats.sells, 1);
    assert_eq!(summary.open_positions, 0);
    assert_eq!(summary.budget_spent_lamports, 1_000_000_000);

    let alerts = notifier.0.lock().unwrap();
    assert!(alerts.iter().any(|a| matches!(a, Alert::BuyFilled { .. })));
    assert!(alerts.iter().any(|a| matches!(a, Alert::SellFilled { .. })));
}

#[tokio::test]
async fn test_live_mode_without_signer_is_refused() {
    let settings = Settings::from_pairs([("LIVE_MODE", "true")]).unwrap();
    let config = Config::from_settings(&settings).unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    assert!(Engine::new(config, None, notifier).is_err());
}

#[tokio::test]
async fn test_default_stage_percents_close_the_position() {
    let mut pairs = vec![
        ("SIMULATION_MODE".to_string(), "true".to_string()),
        ("PRIVATE_LOGIC_ENABLED".to_string(), "true".to_string()),
        ("THRESHOLD_BUY".to_string(), "1000000000".to_string()),
        ("TOKEN_AMOUNT".to_string(), "0.5".to_string()),
        ("MIN_LAST_TIME".to_string(), "0".to_string()),
    ];
    for signal in [
        "MARKET_CAP",
        "VOLUME",
        "BUY_SELL_COUNT",
        "SOL_INVESTED",
        "LAUNCHER_SOL",
        "DEV_BUY",
    ] {
        pairs.push((format!("{}_ENABLED", signal), "false".to_string()));
    }
    // Default percents sum to 280, so the last stage leaves a residual
    for n in 1..=7 {
        pairs.push((format!("PL_STAGE_{}_DELAY", n), (n * 10).to_string()));
    }
    let settings = Settings::from_pairs(pairs).unwrap();
    let config = Config::from_settings(&settings).unwrap();
    assert!(!config.exit.sell_all_tokens);
    assert_eq!(config.exit.stages[6].percent, 70.0);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    let event = candidate(Pubkey::new_unique(), 5.0);
    writeln!(file, "{}", serde_json::to_string(&event).unwrap()).unwrap();
    file.flush().unwrap();

    let engine = Engine::new(config, None, Arc::new(RecordingNotifier::default())).unwrap();
    let summary = tokio::time::timeout(
        Duration::from_secs(3),
        engine.run(Arc::new(JsonlReplaySource::new(file.path()))),
    )
    .await
    .expect("engine did not settle")
    .unwrap();

    assert_eq!(summary.stats.buys, 1);
    // seven stages plus the residual
    assert_eq!(summary.stats.sells, 8);
    assert_eq!(summary.open_positions, 0);
    assert!(summary.positions.is_empty());
}
