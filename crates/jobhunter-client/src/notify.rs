use std::io::Write;
use std::time::Duration;

use jobhunter_core::error::AppError;
use jobhunter_core::traits::Notifier;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const TELEGRAM_API: &str = "https://api.telegram.org";
pub const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;
pub const CONSOLE_MAX_MESSAGE_LENGTH: usize = 1_000_000;

/// Sends messages to one chat through the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str) -> Result<Self, AppError> {
        Self::with_api_base(token, chat_id, TELEGRAM_API)
    }

    /// Point the notifier at another Bot API server (e.g. a local one).
    pub fn with_api_base(token: &str, chat_id: &str, api_base: &str) -> Result<Self, AppError> {
        if token.trim().is_empty() || chat_id.trim().is_empty() {
            return Err(AppError::ConfigError(
                "Telegram token and chat id are required".into(),
            ));
        }

        let timeout = Duration::from_secs(30);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

/// Interpret a Bot API reply. Telegram answers `{"ok": false, ...}` for
/// rejected messages, sometimes with a 200 status.
fn check_reply(status_code: u16, body: &str) -> Result<(), AppError> {
    match serde_json::from_str::<TelegramResponse>(body) {
        Ok(reply) if reply.ok => Ok(()),
        Ok(reply) => Err(AppError::HttpError(format!(
            "Telegram rejected message (HTTP {status_code}): {}",
            reply.description.unwrap_or_else(|| "no description".into())
        ))),
        Err(_) => Err(AppError::HttpError(format!(
            "Unexpected Telegram reply (HTTP {status_code}): {body}"
        ))),
    }
}

impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn max_message_length(&self) -> usize {
        TELEGRAM_MAX_MESSAGE_LENGTH
    }

    async fn deliver(&self, text: &str) -> Result<(), AppError> {
        let request = SendMessage {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    // the error text embeds the url, which carries the token
                    AppError::HttpError("Telegram request failed".into())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(AppError::RateLimitExceeded);
        }
        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read Telegram reply: {e}")))?;

        check_reply(status, &body)?;
        tracing::debug!(chars = text.chars().count(), "Telegram message sent");
        Ok(())
    }
}

/// Prints messages to stdout. Used when no other channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    fn max_message_length(&self) -> usize {
        CONSOLE_MAX_MESSAGE_LENGTH
    }

    async fn deliver(&self, text: &str) -> Result<(), AppError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{text}\n")
            .and_then(|()| out.flush())
            .map_err(|e| AppError::Generic(format!("Failed to write to stdout: {e}")))
    }
}

/// Any configured channel, so a run can hold a mixed list of them.
#[derive(Clone)]
pub enum Channel {
    Telegram(TelegramNotifier),
    Console(ConsoleNotifier),
}

impl Notifier for Channel {
    fn name(&self) -> &str {
        match self {
            Channel::Telegram(n) => n.name(),
            Channel::Console(n) => n.name(),
        }
    }

    fn max_message_length(&self) -> usize {
        match self {
            Channel::Telegram(n) => n.max_message_length(),
            Channel::Console(n) => n.max_message_length(),
        }
    }

    async fn deliver(&self, text: &str) -> Result<(), AppError> {
        match self {
            Channel::Telegram(n) => n.deliver(text).await,
            Channel::Console(n) => n.deliver(text).await,
        }
    }
}
