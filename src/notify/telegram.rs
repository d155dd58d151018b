// =============================================================================
// Telegram Bot API sink
// =============================================================================
//
// SECURITY: the bot token is part of the request path and is never logged.
// =============================================================================

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::EngineError;
use crate::notify::{format_signal, SignalSink};
use crate::strategy::Signal;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Posts signals to a Telegram chat via `sendMessage`.
#[derive(Clone)]
pub struct TelegramSink {
    token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramSink {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_api_base(token, chat_id, DEFAULT_API_BASE)
    }

    /// Point the sink at a different Bot API host.
    pub fn with_api_base(
        token: impl Into<String>,
        chat_id: impl Into<String>,
        api_base: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            token: token.into(),
            chat_id: chat_id.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl SignalSink for TelegramSink {
    #[instrument(skip(self, signal), fields(symbol = %signal.instrument), name = "telegram::deliver")]
    async fn deliver(&self, signal: &Signal) -> Result<(), EngineError> {
        let failure = |reason: String| EngineError::DeliveryFailure {
            instrument: signal.instrument.clone(),
            reason,
        };

        let text = format_signal(signal);
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: &text,
            parse_mode: "Markdown",
        };

        let resp = self
            .client
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| failure(format!("sendMessage request failed: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(failure(format!("sendMessage returned {status}: {detail}")));
        }

        debug!(id = %signal.id, "signal delivered to telegram");
        Ok(())
    }
}

impl std::fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSink")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}
