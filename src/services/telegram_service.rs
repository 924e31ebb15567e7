// ==================== TELEGRAM BOT API ====================
// Thin reqwest client over the Bot API methods the bot needs.
// Every answer is the `{ ok, result, description }` envelope.

use crate::{
    api::metrics,
    models::{
        GetUpdatesRequest, Reply, ReplyMarkup, SendMessageRequest, TelegramResponse,
        TelegramUpdate, TelegramUser,
    },
    utils::error::AppError,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Added on top of the long-poll timeout for getUpdates
const POLL_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Delivers replies to a chat
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(format!("{}/bot{}", TELEGRAM_API_BASE, token))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(method))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                AppError::TelegramError(format!("{} request failed: {}", method, e.without_url()))
            })?;

        let envelope: TelegramResponse<T> = response.json().await.map_err(|e| {
            AppError::TelegramError(format!(
                "Failed to parse {} response: {}",
                method,
                e.without_url()
            ))
        })?;

        unwrap_envelope(method, envelope)
    }

    pub async fn get_me(&self) -> Result<TelegramUser, AppError> {
        self.call("getMe", &serde_json::json!({}), REQUEST_TIMEOUT).await
    }

    /// Long-polls for updates with `update_id >= offset`
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<TelegramUpdate>, AppError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message"],
        };

        self.call(
            "getUpdates",
            &request,
            Duration::from_secs(timeout_secs) + POLL_TIMEOUT_MARGIN,
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: ReplyMarkup,
    ) -> Result<(), AppError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            reply_markup: markup.to_json(),
        };

        let _: serde_json::Value = self.call("sendMessage", &request, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    pub async fn send_photo(&self, chat_id: i64, png: &[u8], caption: &str) -> Result<(), AppError> {
        let photo = Part::bytes(png.to_vec())
            .file_name("qr.png")
            .mime_str("image/png")?;

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", photo);

        let response = self
            .client
            .post(self.url("sendPhoto"))
            .multipart(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                AppError::TelegramError(format!("sendPhoto request failed: {}", e.without_url()))
            })?;

        let envelope: TelegramResponse<serde_json::Value> = response.json().await?;
        unwrap_envelope("sendPhoto", envelope).map(|_| ())
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<(), AppError> {
        match reply {
            Reply::Text { text, markup } => self.send_message(chat_id, text, *markup).await?,
            Reply::Photo { png, caption } => self.send_photo(chat_id, png, caption).await?,
        }

        metrics::increment_sent_count();
        Ok(())
    }
}

pub fn unwrap_envelope<T>(method: &str, envelope: TelegramResponse<T>) -> Result<T, AppError> {
    if !envelope.ok {
        return Err(AppError::TelegramError(format!(
            "{} rejected: {}",
            method,
            envelope.description.unwrap_or_else(|| "no description".to_string())
        )));
    }

    envelope
        .result
        .ok_or_else(|| AppError::TelegramError(format!("{} returned no result", method)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_ok_envelope() {
        let envelope = TelegramResponse {
            ok: true,
            result: Some(5),
            description: None,
        };
        assert_eq!(unwrap_envelope("getMe", envelope).unwrap(), 5);
    }

    #[test]
    fn test_unwrap_rejected_envelope() {
        let envelope: TelegramResponse<i32> = TelegramResponse {
            ok: false,
            result: None,
            description: Some("Bad Request: chat not found".to_string()),
        };

        match unwrap_envelope("sendMessage", envelope) {
            Err(AppError::TelegramError(msg)) => assert!(msg.contains("chat not found")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unwrap_missing_result() {
        let envelope: TelegramResponse<i32> = TelegramResponse {
            ok: true,
            result: None,
            description: None,
        };
        assert!(unwrap_envelope("getMe", envelope).is_err());
    }

    #[test]
    fn test_method_urls() {
        let client = TelegramClient::new("123:abc");
        assert_eq!(client.url("getMe"), "https://api.telegram.org/bot123:abc/getMe");
    }

    #[tokio::test]
    #[ignore] // Requires TOKEN and network access
    async fn test_get_me() {
        dotenv::dotenv().ok();
        let token = std::env::var("TOKEN").unwrap();
        let me = TelegramClient::new(&token).get_me().await;
        assert!(me.is_ok());
    }
}
