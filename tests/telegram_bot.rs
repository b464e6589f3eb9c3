use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveTime, TimeZone, Utc};
use nuki_logger::api::{
    LogQuery, LogsReader, ReservationTimeModifier, ReservationsReader, SmartlockAuthReader,
    SmartlockReader,
};
use nuki_logger::cache::DisabledCache;
use nuki_logger::nuki::{
    Action, DeviceType, Log, Reservation, SmartlockAuth, SmartlockState, Source, State, Trigger,
};
use nuki_logger::pending::{PendingModificationRoutine, RoutineOptions};
use nuki_logger::telegram::{Bot, BotApi, BotOptions, BotReaders};
use tokio::sync::watch;

struct Api;

#[async_trait]
impl LogsReader for Api {
    async fn logs(&self, query: &LogQuery) -> anyhow::Result<Vec<Log>> {
        let log = Log {
            id: "1".to_string(),
            smartlock_id: 1,
            device_type: DeviceType::Smartlock,
            account_user_id: 0,
            auth_id: String::new(),
            name: "HM42".to_string(),
            action: Action::Unlock,
            trigger: Trigger::Keypad,
            state: State::Success,
            auto_unlock: false,
            date: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
            source: Source::KeypadCode,
        };
        Ok(vec![log; query.limit as usize])
    }
}

#[async_trait]
impl SmartlockReader for Api {
    async fn smartlock(&self) -> anyhow::Result<SmartlockState> {
        anyhow::bail!("401 Unauthorized")
    }
}

#[async_trait]
impl SmartlockAuthReader for Api {
    async fn smartlock_auths(&self) -> anyhow::Result<Vec<SmartlockAuth>> {
        Ok(vec![
            SmartlockAuth {
                id: "a".to_string(),
                name: "Cleaning".to_string(),
                code: Some(123456),
                enabled: false,
            },
            SmartlockAuth {
                id: "b".to_string(),
                name: "App".to_string(),
                code: None,
                enabled: true,
            },
        ])
    }
}

#[async_trait]
impl ReservationsReader for Api {
    async fn reservations(&self) -> anyhow::Result<Vec<Reservation>> {
        Ok(vec![Reservation {
            id: "r".to_string(),
            reference: "HM42".to_string(),
            name: "Jane Doe".to_string(),
            start_date: Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap(),
        }])
    }
}

#[async_trait]
impl ReservationTimeModifier for Api {
    async fn modify_access_times(&self, _id: &str, _in: i32, _out: i32) -> anyhow::Result<()> {
        Ok(())
    }
}

async fn bot(restrict_to_chat_ids: Vec<i64>) -> (Bot, watch::Sender<bool>) {
    let api = Arc::new(Api);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let options = RoutineOptions {
        check_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let (routine, _handle) = PendingModificationRoutine::start(
        api.clone(),
        api.clone(),
        Arc::new(DisabledCache),
        options,
        shutdown_rx,
    )
    .await;

    let readers = BotReaders {
        logs: api.clone(),
        smartlock: api.clone(),
        auths: api.clone(),
        reservations: api,
    };
    let options = BotOptions {
        restrict_to_chat_ids,
        default_check_in: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        default_check_out: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        timezone: chrono_tz::Tz::Europe__Paris,
        poll_timeout: Duration::from_secs(1),
    };
    let bot_api = BotApi::new("1:test").unwrap();
    (Bot::new(bot_api, options, readers, routine), shutdown)
}

#[tokio::test]
async fn chat_restriction() {
    let (open, _shutdown) = bot(Vec::new()).await;
    assert!(open.is_allowed(1));

    let (restricted, _shutdown) = bot(vec![5]).await;
    assert!(restricted.is_allowed(5));
    assert!(!restricted.is_allowed(6));
}

#[tokio::test]
async fn query_commands() {
    let (mut bot, _shutdown) = bot(Vec::new()).await;

    assert_eq!(bot.reply(1, "hello there").await, None);
    assert!(bot.reply(1, "/nope").await.unwrap().contains("/help"));
    assert!(bot.reply(1, "/help").await.unwrap().contains("/modify"));
    assert_eq!(
        bot.reply(1, "/version").await.unwrap(),
        format!("nuki-logger, version {}", env!("CARGO_PKG_VERSION"))
    );

    let logs = bot.reply(1, "/logs 2").await.unwrap();
    assert_eq!(logs.lines().count(), 2);
    assert!(logs.starts_with("2024-06-01 10:00:00 - "), "{}", logs);
    assert!(logs.contains("by 'Jane Doe'"));

    let battery = bot.reply(1, "/battery").await.unwrap();
    assert!(battery.starts_with("error:"));
    assert!(battery.contains("401 Unauthorized"));

    assert_eq!(bot.reply(1, "/code").await.unwrap(), "Cleaning: 123456 (disabled)");
    assert_eq!(
        bot.reply(1, "/resa").await.unwrap(),
        "HM42 - Jane Doe (2024-06-01 16:00 -> 2024-06-03 12:00)"
    );
}

#[tokio::test]
async fn modification_commands() {
    let (mut bot, _shutdown) = bot(Vec::new()).await;

    assert_eq!(
        bot.reply(7, "/listmodify").await.unwrap(),
        "no pending modification"
    );

    let reply = bot.reply(7, "/modify HM42").await.unwrap();
    assert!(reply.contains("in 16:00 - out 10:00"), "{}", reply);
    let reply = bot.reply(7, "/modify HM43 15:00 11:30").await.unwrap();
    assert!(reply.contains("in 15:00 - out 11:30"), "{}", reply);

    let list = bot.reply(7, "/listmodify").await.unwrap();
    assert_eq!(list.lines().count(), 2);

    let applied = bot.reply(7, "/applymodify").await.unwrap();
    assert!(applied.contains("HM42 - in 16:00 - out 10:00 (done)"), "{}", applied);
    assert!(!applied.contains("HM43 - in 15:00 - out 11:30 (done)"));

    assert_eq!(bot.reply(7, "/deletemodify HM43").await.unwrap(), "HM43 deleted");
    assert_eq!(
        bot.reply(7, "/deletemodify HM43").await.unwrap(),
        "no pending modification for HM43"
    );
}
