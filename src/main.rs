//! StudyBot - Telegram 学习助手
//!
//! 入口：加载配置与文档，重建提醒，启动长轮询与分发循环。
//!
//! 运行方式：
//! ```bash
//! TELEGRAM_TOKEN=... cargo run -- [config.toml]
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;

use studybot::config::load_config;
use studybot::core::shutdown::run_with_graceful_shutdown;
use studybot::core::{ShutdownManager, ShutdownReason};
use studybot::integrations::telegram::TelegramClient;
use studybot::observability;
use studybot::outbox::OutputSink;
use studybot::reminders::{ReminderPolicy, ReminderScheduler, SystemClock};
use studybot::session::SessionRegistry;
use studybot::store::{BotData, FsBackend};
use studybot::Bot;

/// 退出前等待发送队列清空的上限
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(std::env::args().nth(1).map(PathBuf::from)).context("Failed to load config")?;
    let token = cfg
        .telegram
        .resolve_token()
        .context("Telegram token missing: set telegram.token or TELEGRAM_TOKEN")?;

    tokio::fs::create_dir_all(&cfg.app.data_dir)
        .await
        .with_context(|| format!("Failed to create data dir {}", cfg.app.data_dir.display()))?;
    let (data, writer) = BotData::load(Arc::new(FsBackend::new(&cfg.app.data_dir)))
        .await
        .context("Failed to load documents")?;

    let shutdown = Arc::new(ShutdownManager::new());
    let client = Arc::new(
        TelegramClient::new(&cfg.telegram.api_base, &token, cfg.telegram.poll_timeout_secs)
            .context("Failed to build Telegram client")?,
    );
    let (sink, drain) = OutputSink::spawn(client.clone());

    let scheduler = Arc::new(ReminderScheduler::new(
        Arc::clone(&data.reminders),
        sink.clone(),
        Arc::new(SystemClock),
        ReminderPolicy::from(&cfg.reminders),
        shutdown.token(),
    ));
    scheduler.set_all().await;

    let registry = Arc::new(
        SessionRegistry::new(sink, cfg.dialog.answer_timeout(), cfg.dialog.max_attempts)
            .with_shutdown(shutdown.token()),
    );
    let bot = Arc::new(Bot::new(registry, data, scheduler));

    let (inbound_tx, inbound_rx) = mpsc::channel(256);
    let poller = {
        let client = client.clone();
        let manager = Arc::clone(&shutdown);
        tokio::spawn(async move {
            let token = manager.token();
            client.run_poller(inbound_tx, token.clone()).await;
            if !token.is_cancelled() {
                manager.shutdown(ShutdownReason::FatalError("Telegram poller stopped".to_string()));
            }
        })
    };

    tracing::info!(data_dir = %cfg.app.data_dir.display(), "StudyBot started");
    let app = {
        let bot = Arc::clone(&bot);
        let token = shutdown.token();
        async move { bot.run(inbound_rx, token).await }
    };
    let reason = run_with_graceful_shutdown(shutdown, app, || async move {
        let _ = poller.await;
        // 发送端全部释放后，发送队列与写者任务才会结束
        drop(bot);
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!("Outbox not drained before exit");
        }
        if tokio::time::timeout(DRAIN_TIMEOUT, writer).await.is_err() {
            tracing::warn!("Document writer still busy at exit");
        }
    })
    .await;

    tracing::info!("StudyBot stopped");
    if let ShutdownReason::FatalError(e) = reason {
        anyhow::bail!("StudyBot stopped after a fatal error: {}", e);
    }
    Ok(())
}
