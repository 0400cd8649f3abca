//! Operator notifications
//!
//! Telegram when a bot token and chat id are configured, otherwise alerts only
//! go to the log. Notification failures are logged by the caller and never
//! affect trading.

use async_trait::async_trait;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::TelegramConfig;
use crate::error::{Error, Result};
use crate::position::exit::ExitReason;
use crate::trading::intent::{IntentOrigin, Side};
use crate::trading::venue::VenueKind;

const TELEGRAM_API: &str = "https://api.telegram.org";
const TELEGRAM_MIN_DELAY: Duration = Duration::from_millis(1100);

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    BuyFilled {
        mint: Pubkey,
        lamports: u64,
        venue: VenueKind,
        origin: IntentOrigin,
    },
    SellFilled {
        mint: Pubkey,
        tokens: u64,
        venue: VenueKind,
        reason: ExitReason,
    },
    AllVenuesFailed {
        mint: Pubkey,
        side: Side,
        attempts: usize,
    },
    StageEscalation {
        mint: Pubkey,
        reason: ExitReason,
        failing_for: Duration,
    },
    ForcedLiquidation {
        mint: Pubkey,
        reason: ExitReason,
    },
    SourceDown {
        detail: Option<String>,
    },
    SourceUp,
}

impl Alert {
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Alert::AllVenuesFailed { .. } | Alert::StageEscalation { .. } | Alert::SourceDown { .. }
        )
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::BuyFilled {
                mint,
                lamports,
                venue,
                origin,
            } => write!(
                f,
                "BUY {} for {:.4} SOL via {} ({})",
                mint,
                *lamports as f64 / 1e9,
                venue,
                origin
            ),
            Alert::SellFilled {
                mint,
                tokens,
                venue,
                reason,
            } => write!(f, "SELL {} tokens of {} via {} ({})", tokens, mint, venue, reason),
            Alert::AllVenuesFailed { mint, side, attempts } => {
                write!(f, "{} {} failed on all venues ({} attempts)", side, mint, attempts)
            }
            Alert::StageEscalation {
                mint,
                reason,
                failing_for,
            } => write!(
                f,
                "Sell of {} ({}) still failing after {}s, retrying",
                mint,
                reason,
                failing_for.as_secs()
            ),
            Alert::ForcedLiquidation { mint, reason } => {
                write!(f, "Liquidating {} ({})", mint, reason)
            }
            Alert::SourceDown { detail } => match detail {
                Some(d) => write!(f, "Event source down: {} - buys paused", d),
                None => write!(f, "Event source down - buys paused"),
            },
            Alert::SourceUp => write!(f, "Event source reconnected - buys resumed"),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: Alert) -> Result<()>;
}

/// Writes alerts to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: Alert) -> Result<()> {
        if alert.is_critical() {
            warn!("ALERT: {}", alert);
        } else {
            info!("ALERT: {}", alert);
        }
        Ok(())
    }
}

/// Telegram Bot API `sendMessage`, spaced at least `min_delay` apart
pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
    base_url: String,
    min_delay: Duration,
    last_sent: Mutex<Option<Instant>>,
}

impl TelegramNotifier {
    pub fn new(http: reqwest::Client, config: &TelegramConfig) -> Self {
        Self {
            http,
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            base_url: TELEGRAM_API.to_string(),
            min_delay: TELEGRAM_MIN_DELAY,
            last_sent: Mutex::new(None),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, alert: Alert) -> Result<()> {
        // Held across the send so messages stay ordered and spaced
        let mut last_sent = self.last_sent.lock().await;
        if let Some(at) = *last_sent {
            let wait = self.min_delay.saturating_sub(at.elapsed());
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }

        let text = if alert.is_critical() {
            format!("⚠️ {}", alert)
        } else {
            alert.to_string()
        };
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await?;
        *last_sent = Some(Instant::now());

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notify(format!("Telegram API {}: {}", status, body)));
        }
        Ok(())
    }
}

/// Telegram if configured, otherwise the log
pub fn from_config(http: reqwest::Client, config: &TelegramConfig) -> Box<dyn Notifier> {
    if config.enabled() {
        info!("Telegram notifications enabled");
        Box::new(TelegramNotifier::new(http, config))
    } else {
        Box::new(LogNotifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_text() {
        let mint = Pubkey::new_unique();
        let alert = Alert::BuyFilled {
            mint,
            lamports: 250_000_000,
            venue: VenueKind::Jito,
            origin: IntentOrigin::Filter,
        };
        let text = alert.to_string();
        assert!(text.contains("0.2500 SOL"));
        assert!(text.contains(&mint.to_string()));
        assert!(!alert.is_critical());

        let alert = Alert::StageEscalation {
            mint,
            reason: ExitReason::StageDelay,
            failing_for: Duration::from_secs(31),
        };
        assert!(alert.to_string().contains("31s"));
        assert!(alert.is_critical());
    }

    #[test]
    fn test_telegram_endpoint() {
        let config = TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
        };
        let notifier = TelegramNotifier::new(reqwest::Client::new(), &config)
            .with_base_url("http://localhost:9");
        assert_eq!(notifier.endpoint(), "http://localhost:9/bot123:abc/sendMessage");
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.notify(Alert::SourceUp).await.is_ok());
    }

    #[tokio::test]
    async fn test_telegram_unreachable_is_error() {
        let config = TelegramConfig {
            bot_token: "t".to_string(),
            chat_id: "1".to_string(),
        };
        let notifier = TelegramNotifier::new(reqwest::Client::new(), &config)
            .with_base_url("http://127.0.0.1:1")
            .with_min_delay(Duration::ZERO);
        assert!(matches!(
            notifier.notify(Alert::SourceUp).await,
            Err(Error::Http(_))
        ));
    }
}
