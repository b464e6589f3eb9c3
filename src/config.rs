//! Configuration file, `.env` and command line.
//!
//! ```toml
//! smartlock_id = 123456
//! address_id = 4242
//! # or NUKI_API_TOKEN in the environment
//! nuki_api_token = "..."
//!
//! [server]
//! interval_secs = 60
//! # serves GET /health when set
//! health_check_port = 8080
//!
//! [cache]
//! backend = "file"
//! path = "/tmp/nuki-logger-cache"
//!
//! [[senders]]
//! name = "console"
//! [senders.console]
//!
//! [[senders]]
//! name = "telegram"
//! include_date = true
//! timezone = "Europe/Paris"
//! [senders.telegram]
//! token = "123:abc"
//! chat_id = -1001
//!
//! [telegram_bot]
//! enabled = true
//! sender_name = "telegram"
//! default_check_in = "16:00"
//! default_check_out = "10:00"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;
use structopt::StructOpt;

use crate::api::{ClientOptions, DEFAULT_BASE_URL};
use crate::cache::{Cache, DisabledCache, FileCache, SqliteCache};
use crate::messaging::{parse_timezone, ConsoleSender, Sender, SenderOptions, TelegramSender};
use crate::pending::{parse_hour_minute, RoutineOptions, GRACE_PERIOD};
use crate::poller::PollerOptions;
use crate::telegram::{BotApi, BotOptions};

pub const TOKEN_ENV: &str = "NUKI_API_TOKEN";

#[derive(Debug, StructOpt)]
#[structopt(
    name = "nuki-logger",
    about = "Forward Nuki smartlock logs to messaging services"
)]
pub struct Opt {
    /// Configuration file
    #[structopt(short, long, parse(from_os_str), default_value = "nuki-logger.toml")]
    pub config: PathBuf,

    /// Senders to use, by name (repeatable)
    #[structopt(short, long = "sender")]
    pub senders: Vec<String>,

    /// Log debug messages
    #[structopt(short, long)]
    pub verbose: bool,

    #[structopt(subcommand)]
    pub cmd: Cmd,
}

#[derive(Debug, StructOpt)]
pub enum Cmd {
    /// Poll logs and notify senders until interrupted
    Server {
        /// Seconds between two log fetches
        #[structopt(long)]
        interval: Option<u64>,
    },
    /// Fetch logs once and send them
    Query {
        /// Number of logs (1-50)
        #[structopt(long, default_value = "20")]
        limit: i32,
        /// Oldest log date (RFC3339)
        #[structopt(long)]
        from: Option<DateTime<Utc>>,
        /// Newest log date (RFC3339)
        #[structopt(long)]
        to: Option<DateTime<Utc>>,
        /// Force every sender to send raw json
        #[structopt(long)]
        json: bool,
    },
    /// Print version
    Version,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub smartlock_id: i64,
    /// Only needed for reservations
    #[serde(default)]
    pub address_id: i64,
    #[serde(default)]
    pub nuki_api_token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub senders: Vec<SenderConfig>,
    #[serde(default)]
    pub telegram_bot: TelegramBotConfig,
}

fn default_api_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub interval_secs: u64,
    pub smartlock_check_interval_secs: u64,
    pub log_limit: i32,
    /// `GET /health` is served on this port, disabled when 0
    pub health_check_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            interval_secs: 60,
            smartlock_check_interval_secs: 2 * 60 * 60,
            log_limit: 20,
            health_check_port: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    File,
    Sqlite,
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Directory for `file`, database file for `sqlite`
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            backend: CacheBackend::File,
            path: PathBuf::from("/tmp/nuki-logger-cache"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    pub name: String,
    #[serde(default)]
    pub include_date: bool,
    /// IANA name, dates are shown in UTC when missing
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub json: bool,
    pub console: Option<ConsoleConfig>,
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleConfig {}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramBotConfig {
    pub enabled: bool,
    /// Telegram sender whose token the bot uses
    pub sender_name: String,
    pub restrict_to_chat_ids: Vec<i64>,
    pub default_check_in: String,
    pub default_check_out: String,
    pub pending_check_interval_secs: u64,
    pub pending_purge_interval_secs: u64,
}

impl Default for TelegramBotConfig {
    fn default() -> Self {
        TelegramBotConfig {
            enabled: false,
            sender_name: String::new(),
            restrict_to_chat_ids: Vec::new(),
            default_check_in: "16:00".to_string(),
            default_check_out: "10:00".to_string(),
            pending_check_interval_secs: 10,
            pending_purge_interval_secs: 2 * 60 * 60,
        }
    }
}

impl Config {
    /// Read the file and fill the token from the environment if missing.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let mut config = Config::parse(&content)
            .with_context(|| format!("parse config file {}", path.display()))?;

        if config.nuki_api_token.is_empty() {
            if let Ok(token) = std::env::var(TOKEN_ENV) {
                config.nuki_api_token = token;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Config> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.smartlock_id == 0 {
            bail!("smartlock_id is required");
        }
        if self.nuki_api_token.is_empty() {
            bail!("nuki_api_token is required (or set {})", TOKEN_ENV);
        }

        let mut names = HashSet::new();
        for sender in &self.senders {
            if !names.insert(sender.name.as_str()) {
                bail!("sender {} is defined twice", sender.name);
            }
            match (&sender.console, &sender.telegram) {
                (Some(_), None) | (None, Some(_)) => {}
                _ => bail!(
                    "sender {} needs exactly one of console or telegram",
                    sender.name
                ),
            }
        }

        if self.telegram_bot.enabled {
            self.telegram_token(&self.telegram_bot.sender_name)?;
            if self.address_id == 0 {
                bail!("address_id is required by the telegram bot");
            }
            parse_hour_minute(&self.telegram_bot.default_check_in)
                .context("telegram_bot.default_check_in")?;
            parse_hour_minute(&self.telegram_bot.default_check_out)
                .context("telegram_bot.default_check_out")?;
        }
        Ok(())
    }

    fn telegram_token(&self, sender_name: &str) -> anyhow::Result<&str> {
        self.senders
            .iter()
            .find(|sender| sender.name == sender_name)
            .and_then(|sender| sender.telegram.as_ref())
            .map(|telegram| telegram.token.as_str())
            .ok_or_else(|| anyhow!("no telegram sender named `{}`", sender_name))
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.api_base_url.clone(),
            token: self.nuki_api_token.clone(),
            smartlock_id: self.smartlock_id,
            address_id: self.address_id,
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn poller_options(&self, interval_secs: Option<u64>) -> PollerOptions {
        PollerOptions {
            interval: Duration::from_secs(interval_secs.unwrap_or(self.server.interval_secs).max(1)),
            smartlock_interval: Duration::from_secs(self.server.smartlock_check_interval_secs.max(1)),
            limit: self.server.log_limit,
        }
    }

    pub fn routine_options(&self) -> RoutineOptions {
        let bot = &self.telegram_bot;
        RoutineOptions {
            check_interval: Duration::from_secs(bot.pending_check_interval_secs.max(1)),
            purge_interval: Duration::from_secs(bot.pending_purge_interval_secs.max(1)),
            grace_period: GRACE_PERIOD,
        }
    }

    pub fn bot_options(&self) -> anyhow::Result<BotOptions> {
        let bot = &self.telegram_bot;
        Ok(BotOptions {
            restrict_to_chat_ids: bot.restrict_to_chat_ids.clone(),
            default_check_in: parse_default_time(&bot.default_check_in)?,
            default_check_out: parse_default_time(&bot.default_check_out)?,
            timezone: parse_timezone(
                self.senders
                    .iter()
                    .find(|sender| sender.name == bot.sender_name)
                    .and_then(|sender| sender.timezone.as_deref()),
            ),
            poll_timeout: Duration::from_secs(30),
        })
    }

    pub fn bot_api(&self) -> anyhow::Result<BotApi> {
        BotApi::new(self.telegram_token(&self.telegram_bot.sender_name)?)
    }

    /// Senders selected on the command line. Unknown names are skipped.
    pub fn senders(&self, names: &[String], force_json: bool) -> anyhow::Result<Vec<Arc<dyn Sender>>> {
        let mut senders: Vec<Arc<dyn Sender>> = Vec::with_capacity(names.len());
        for name in names {
            let config = match self.senders.iter().find(|sender| &sender.name == name) {
                Some(config) => config,
                None => {
                    log::warn!("unknown sender {}, skipping", name);
                    continue;
                }
            };

            let opts = SenderOptions {
                name: config.name.clone(),
                include_date: config.include_date,
                timezone: parse_timezone(config.timezone.as_deref()),
                json: config.json || force_json,
            };
            match &config.telegram {
                Some(telegram) => {
                    let api = BotApi::new(&telegram.token)
                        .with_context(|| format!("create telegram sender {}", name))?;
                    senders.push(Arc::new(TelegramSender::new(opts, api, telegram.chat_id)));
                }
                None => senders.push(Arc::new(ConsoleSender::new(opts))),
            }
        }

        if senders.is_empty() {
            bail!("at least one valid sender is required (--sender NAME)");
        }
        Ok(senders)
    }

    /// Open the configured cache. A backend that can't be opened is
    /// replaced by a disabled cache.
    pub async fn open_cache(&self) -> Arc<dyn Cache> {
        let path = &self.cache.path;
        match self.cache.backend {
            CacheBackend::None => Arc::new(DisabledCache),
            CacheBackend::File => match FileCache::open(path).await {
                Ok(cache) => Arc::new(cache),
                Err(err) => {
                    log::warn!("couldn't open file cache {}: {}", path.display(), err);
                    Arc::new(DisabledCache)
                }
            },
            CacheBackend::Sqlite => {
                let url = format!("sqlite://{}", path.display());
                match SqliteCache::open(&url).await {
                    Ok(cache) => Arc::new(cache),
                    Err(err) => {
                        log::warn!("couldn't open sqlite cache {}: {}", url, err);
                        Arc::new(DisabledCache)
                    }
                }
            }
        }
    }
}

fn parse_default_time(value: &str) -> anyhow::Result<NaiveTime> {
    parse_hour_minute(value).with_context(|| format!("invalid default time `{}`", value))
}
