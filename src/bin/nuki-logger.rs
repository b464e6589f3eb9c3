use std::sync::Arc;

use anyhow::{bail, Context};
use log::LevelFilter;
use nuki_logger::api::{self, LogQuery, MAX_LOG_LIMIT};
use nuki_logger::config::{Cmd, Config, Opt};
use nuki_logger::pending::PendingModificationRoutine;
use nuki_logger::poller::Poller;
use nuki_logger::reservations::ReservationNames;
use nuki_logger::{health, logger, messaging, telegram};
use structopt::StructOpt;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    if let Cmd::Version = opt.cmd {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // before the config, it may provide the api token
    let dotenv = dotenv::dotenv();
    let config = Config::load(&opt.config)?;

    let level = if opt.verbose {
        LevelFilter::Debug
    } else {
        logger::parse_level(&config.log_level)
    };
    logger::init(level).context("initialize logger")?;

    match dotenv {
        Ok(path) => log::info!("loaded .env from {}", path.display()),
        Err(err) => log::debug!("couldn't load .env file: {:?}", err),
    };

    match opt.cmd {
        Cmd::Server { interval } => server(&config, &opt.senders, interval).await,
        Cmd::Query {
            limit,
            from,
            to,
            json,
        } => query(&config, &opt.senders, LogQuery { limit, from, to }, json).await,
        Cmd::Version => Ok(()),
    }
}

async fn server(config: &Config, sender_names: &[String], interval: Option<u64>) -> anyhow::Result<()> {
    let senders = config.senders(sender_names, false)?;
    let client = Arc::new(api::Client::new(&config.client_options())?);
    let cache = config.open_cache().await;
    log::info!("using {} cache", cache.name());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(wait_for_signal(shutdown_tx));

    let mut tasks = Vec::new();
    if config.server.health_check_port > 0 {
        let port = config.server.health_check_port;
        let listener = health::bind(port)
            .await
            .with_context(|| format!("start health check on port {}", port))?;
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(err) = health::serve(listener, shutdown).await {
                log::error!("health check failed: {:?}", err);
            }
        }));
    }

    if config.telegram_bot.enabled {
        let (routine, handle) = PendingModificationRoutine::start(
            client.clone(),
            client.clone(),
            Arc::clone(&cache),
            config.routine_options(),
            shutdown_rx.clone(),
        )
        .await;
        tasks.push(handle);

        let bot_api = config.bot_api().context("create telegram bot")?;
        telegram::notify_pending_results(&routine, bot_api.clone());

        let readers = telegram::BotReaders {
            logs: client.clone(),
            smartlock: client.clone(),
            auths: client.clone(),
            reservations: client.clone(),
        };
        let bot = telegram::Bot::new(bot_api, config.bot_options()?, readers, routine);
        tasks.push(tokio::spawn(bot.run(shutdown_rx.clone())));
    }

    let poller = Poller::new(
        client.clone(),
        client.clone(),
        ReservationNames::new(client.clone()),
        senders,
        cache,
        config.poller_options(interval),
    );
    poller.run(shutdown_rx).await;

    for task in tasks {
        if let Err(err) = task.await {
            log::warn!("task failed: {:?}", err);
        }
    }
    Ok(())
}

async fn query(
    config: &Config,
    sender_names: &[String],
    query: LogQuery,
    json: bool,
) -> anyhow::Result<()> {
    if !(1..=MAX_LOG_LIMIT).contains(&query.limit) {
        bail!("limit must be between 1 and {}", MAX_LOG_LIMIT);
    }

    let senders = config.senders(sender_names, json)?;
    let client = Arc::new(api::Client::new(&config.client_options())?);
    let logs = client.fetch_logs(&query).await?;

    let mut names = ReservationNames::new(client.clone());
    let mut events = Vec::with_capacity(logs.len());
    for log in logs.into_iter().rev() {
        events.push(names.event(log).await);
    }

    let failed = messaging::dispatch(&senders, &events).await;
    if failed > 0 {
        bail!("{} sender(s) failed", failed);
    }
    Ok(())
}

async fn wait_for_signal(shutdown: watch::Sender<bool>) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                log::warn!("couldn't listen for SIGTERM: {:?}", err);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => log::info!("received ctrl+c signal"),
            Err(err) => log::warn!("couldn't listen for ctrl+c: {:?}", err),
        },
        _ = terminate => log::info!("received SIGTERM"),
    }

    let _ = shutdown.send(true);
}
