use crate::domain::payment::InvoiceDraft;
use crate::domain::ports::{PaymentPlatform, PreCheckoutAnswer};
use crate::error::{BlackjackError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct BotApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Telegram Bot API client for Stars invoices.
///
/// Every request carries a timeout so an unreachable platform fails fast
/// with `PaymentPlatform` instead of hanging.
#[derive(Clone)]
pub struct TelegramBotClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl TelegramBotClient {
    /// Builds a client for one bot.
    ///
    /// # Arguments
    ///
    /// * `token` - The bot token issued by BotFather.
    /// * `api_url` - Base URL of the Bot API; a trailing slash is ignored.
    /// * `timeout` - Upper bound for each request, connect included.
    pub fn new(token: impl Into<String>, api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.api_url, self.token, method);
        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        debug!(method, %status, "Bot API responded");

        let parsed: BotApiResponse<T> = response.json().await.map_err(|e| {
            BlackjackError::PaymentPlatform(format!("{method}: unreadable response ({status}): {e}"))
        })?;
        if !parsed.ok {
            let description = parsed
                .description
                .unwrap_or_else(|| format!("request failed with {status}"));
            return Err(BlackjackError::PaymentPlatform(format!("{method}: {description}")));
        }
        parsed
            .result
            .ok_or_else(|| BlackjackError::PaymentPlatform(format!("{method}: missing result")))
    }
}

#[async_trait]
impl PaymentPlatform for TelegramBotClient {
    async fn create_invoice_link(&self, draft: &InvoiceDraft) -> Result<String> {
        // Stars invoices take an empty provider token and a single price line.
        let body = json!({
            "title": draft.title,
            "description": draft.description,
            "payload": draft.payload,
            "provider_token": "",
            "currency": draft.currency,
            "prices": [{ "label": draft.label, "amount": draft.price_stars }],
        });
        self.call("createInvoiceLink", body).await
    }

    async fn answer_pre_checkout_query(
        &self,
        query_id: &str,
        answer: PreCheckoutAnswer,
    ) -> Result<()> {
        let body = match answer {
            PreCheckoutAnswer::Approve => json!({
                "pre_checkout_query_id": query_id,
                "ok": true,
            }),
            PreCheckoutAnswer::Decline(message) => json!({
                "pre_checkout_query_id": query_id,
                "ok": false,
                "error_message": message,
            }),
        };
        let _: bool = self.call("answerPreCheckoutQuery", body).await?;
        Ok(())
    }
}
