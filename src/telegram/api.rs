//! The few Telegram bot API methods the bot and the sender need.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use reqwest::tls::Version;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Envelope of every bot API response.
#[derive(Debug, Deserialize)]
struct Response<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Bot API client, cheap to clone.
#[derive(Debug, Clone)]
pub struct BotApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl BotApi {
    pub fn new(token: &str) -> anyhow::Result<BotApi> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: &str) -> anyhow::Result<BotApi> {
        if token.is_empty() {
            return Err(anyhow!("telegram token is empty"));
        }

        // has to outlast the long polling of getUpdates
        let client = reqwest::Client::builder()
            .min_tls_version(Version::TLS_1_2)
            .timeout(Duration::from_secs(90))
            .build()
            .context("invalid http client configuration")?;

        Ok(BotApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// The token is part of the url so only the method name is logged.
    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        http_method: Method,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> anyhow::Result<T> {
        let now = Instant::now();
        let mut builder = self
            .client
            .request(http_method.clone(), self.method_url(method))
            .query(query);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.with_context(|| format!("send {}", method))?;
        let status = resp.status();
        let text = resp.text().await;

        log::debug!(
            "telegram {} ({} - {}) took {}ms",
            method,
            http_method,
            status.as_u16(),
            now.elapsed().as_millis()
        );

        let text = text.with_context(|| format!("read {} response", method))?;
        let resp: Response<T> = serde_json::from_str(&text)
            .with_context(|| format!("decode {} response ({})", method, status))?;

        match resp {
            Response {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            Response { description, .. } => Err(anyhow!(
                "{} failed ({}): {}",
                method,
                status,
                description.unwrap_or_default()
            )),
        }
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        let body = SendMessage { chat_id, text };
        let _: serde_json::Value = self
            .call("sendMessage", Method::POST, &[], Some(&body))
            .await?;
        Ok(())
    }

    /// Long poll for updates newer than `offset`.
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> anyhow::Result<Vec<Update>> {
        let query = [
            ("offset", offset.to_string()),
            ("timeout", timeout.as_secs().to_string()),
            ("allowed_updates", r#"["message"]"#.to_string()),
        ];
        self.call::<(), _>("getUpdates", Method::GET, &query, None)
            .await
    }
}
