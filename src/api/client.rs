//! Exposes a `Client` struct to interact with the Nuki web API.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::tls::Version;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;

use super::error::{ApiError, ApiResult};
use super::traits::{
    LogQuery, LogsReader, ReservationTimeModifier, ReservationsReader, SmartlockAuthReader,
    SmartlockReader,
};
use super::model;
use crate::nuki;

pub const DEFAULT_BASE_URL: &str = "https://api.nuki.io";

fn elapsed_ms(start: &Instant) -> i64 {
    start.elapsed().as_millis().min(i64::MAX as u128) as i64
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Example: `https://api.nuki.io`
    pub base_url: String,
    pub token: String,
    pub smartlock_id: i64,
    /// Only needed for reservations
    pub address_id: i64,
    pub timeout: Duration,
}

pub struct Client {
    /// Use to make REST requests
    client: reqwest::Client,
    base_url: String,
    /// Sent as bearer token
    token: String,
    smartlock_id: i64,
    address_id: i64,
}

impl Client {
    /// Create a new client to interact with the Nuki API.
    pub fn new(opts: &ClientOptions) -> anyhow::Result<Client> {
        if opts.token.is_empty() {
            return Err(ApiError::Config("token")).context("create api client");
        }

        let client = reqwest::Client::builder()
            .min_tls_version(Version::TLS_1_2)
            .timeout(opts.timeout)
            .build()
            .context("invalid http client configuration")?;

        Ok(Client {
            client,
            base_url: opts.base_url.trim_end_matches('/').to_string(),
            token: opts.token.clone(),
            smartlock_id: opts.smartlock_id,
            address_id: opts.address_id,
        })
    }

    /// Example: `client.make_url("/smartlock/1/log")` will produce
    /// `https://api.nuki.io/smartlock/1/log`
    pub fn make_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn smartlock_id(&self) -> ApiResult<i64> {
        match self.smartlock_id {
            0 => Err(ApiError::Config("smartlock id")),
            id => Ok(id),
        }
    }

    fn address_id(&self) -> ApiResult<i64> {
        match self.address_id {
            0 => Err(ApiError::Config("address id")),
            id => Ok(id),
        }
    }

    async fn request_with<F>(
        &self,
        name: &str,
        url: &str,
        method: Method,
        func: F,
    ) -> ApiResult<String>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let now = Instant::now();
        let mut builder = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json");
        builder = func(builder);

        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await;
        let duration_ms = elapsed_ms(&now);

        log::info!(
            "{} request to {} ({} - {}) took {}ms",
            name,
            url,
            method,
            status.as_u16(),
            duration_ms,
        );

        let text = text?;
        if !status.is_success() {
            return Err(ApiError::Status { status, body: text });
        }
        Ok(text)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        name: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let text = self
            .request_with(name, url, Method::GET, |req| req.query(query))
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch logs of the smartlock.
    ///
    /// API returns logs ordered from **new to old** so the **newest log is at index 0**.
    pub async fn fetch_logs(&self, query: &LogQuery) -> anyhow::Result<Vec<nuki::Log>> {
        let url = self.make_url(&format!("/smartlock/{}/log", self.smartlock_id()?));

        let mut params = vec![("limit", query.clamped_limit().to_string())];
        if let Some(from) = query.from {
            params.push(("fromDate", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(to) = query.to {
            params.push(("toDate", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let logs: Vec<model::Log> = self
            .get_json("logs", &url, &params)
            .await
            .context("fetch logs")?;

        logs.into_iter().map(nuki::Log::try_from).collect()
    }

    pub async fn fetch_smartlock(&self) -> anyhow::Result<nuki::SmartlockState> {
        let url = self.make_url(&format!("/smartlock/{}", self.smartlock_id()?));
        let smartlock: model::Smartlock = self
            .get_json("smartlock", &url, &[])
            .await
            .context("fetch smartlock")?;
        Ok(smartlock.into())
    }

    pub async fn fetch_smartlock_auths(&self) -> anyhow::Result<Vec<nuki::SmartlockAuth>> {
        let url = self.make_url(&format!("/smartlock/{}/auth", self.smartlock_id()?));
        let auths: Vec<model::SmartlockAuth> = self
            .get_json("smartlock-auth", &url, &[])
            .await
            .context("fetch smartlock auths")?;
        Ok(auths.into_iter().map(nuki::SmartlockAuth::from).collect())
    }

    pub async fn fetch_reservations(&self) -> anyhow::Result<Vec<nuki::Reservation>> {
        let url = self.make_url(&format!("/address/{}/reservation", self.address_id()?));
        let reservations: Vec<model::Reservation> = self
            .get_json("reservations", &url, &[])
            .await
            .context("fetch reservations")?;

        reservations
            .into_iter()
            .map(nuki::Reservation::try_from)
            .collect()
    }

    /// Overwrite check in/out of a reservation (minutes from midnight).
    pub async fn update_access_times(
        &self,
        reservation_id: &str,
        check_in: i32,
        check_out: i32,
    ) -> anyhow::Result<()> {
        let url = self.make_url(&format!(
            "/address/{}/reservation/{}/update/accesstimes",
            self.address_id()?,
            reservation_id
        ));
        let body = model::AccessTimes {
            check_in_time: check_in,
            check_out_time: check_out,
        };

        let _ = self
            .request_with("update-access-times", &url, Method::POST, |req| {
                req.json(&body)
            })
            .await
            .with_context(|| format!("update access times of reservation {}", reservation_id))?;

        Ok(())
    }
}

#[async_trait]
impl LogsReader for Client {
    async fn logs(&self, query: &LogQuery) -> anyhow::Result<Vec<nuki::Log>> {
        self.fetch_logs(query).await
    }
}

#[async_trait]
impl SmartlockReader for Client {
    async fn smartlock(&self) -> anyhow::Result<nuki::SmartlockState> {
        self.fetch_smartlock().await
    }
}

#[async_trait]
impl SmartlockAuthReader for Client {
    async fn smartlock_auths(&self) -> anyhow::Result<Vec<nuki::SmartlockAuth>> {
        self.fetch_smartlock_auths().await
    }
}

#[async_trait]
impl ReservationsReader for Client {
    async fn reservations(&self) -> anyhow::Result<Vec<nuki::Reservation>> {
        self.fetch_reservations().await
    }
}

#[async_trait]
impl ReservationTimeModifier for Client {
    async fn modify_access_times(
        &self,
        reservation_id: &str,
        check_in: i32,
        check_out: i32,
    ) -> anyhow::Result<()> {
        self.update_access_times(reservation_id, check_in, check_out)
            .await
    }
}
