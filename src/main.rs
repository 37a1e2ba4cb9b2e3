//! peterbot daemon entry point.
//!
//! Wiring order follows `SPEC_FULL.md` §2: load config, open the job store
//! (running migrations), construct the chat gateway and worker, spawn the
//! scheduler tick loop, spawn the worker loop under a restart supervisor,
//! spawn the dashboard HTTP server, register the gateway's inbound handler
//! against the dispatcher, then block until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use peterbot::chat::{ChatDispatcher, ChatGateway, InboundMessage, TelegramGateway};
use peterbot::config::AppConfig;
use peterbot::configstore::ConfigStore;
use peterbot::dashboard::{self, DashboardState};
use peterbot::llm::{Completion, GeminiCompletion};
use peterbot::scheduler::Scheduler;
use peterbot::store::JobStore;
use peterbot::worker::{self, Worker};

/// Headless orchestration daemon: job queue, scheduler, and chat front door.
#[derive(Parser, Debug)]
#[command(name = "peterbot", version, about = "peterbot core orchestration daemon")]
struct Cli {
    /// Override SQLITE_DB_PATH.
    #[arg(long)]
    db_path: Option<String>,

    /// Override PORT for the dashboard HTTP server.
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding SOUL.md / MEMORY.md / BLOCKLIST.json. Falls back to
    /// $PETERBOT_CONFIG_DIR, then ./config.
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Directory to additionally mirror logs into, alongside stdout.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    peterbot::logging::init(cli.log_dir.as_ref());

    let mut config = AppConfig::from_env()?;
    if let Some(db_path) = cli.db_path {
        config.sqlite_db_path = db_path;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let config_dir = cli
        .config_dir
        .or_else(|| std::env::var("PETERBOT_CONFIG_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./config"));

    let store = JobStore::open(&config.sqlite_db_path)?;
    let config_store = Arc::new(ConfigStore::new(config_dir));
    let completion: Arc<dyn Completion> = Arc::new(GeminiCompletion::new(config.google_api_key.clone(), config.model.clone()));
    let gateway: Arc<dyn ChatGateway> = Arc::new(TelegramGateway::new(config.telegram_bot_token.clone()));

    let dispatcher = Arc::new(ChatDispatcher::new(
        gateway.clone(),
        store.clone(),
        Arc::clone(&completion),
        Arc::clone(&config_store),
        config.telegram_chat_id,
    ));

    let scheduler = Scheduler::new(store.clone(), config.telegram_chat_id);
    scheduler.spawn();

    let worker = Arc::new(Worker::new(store.clone(), Arc::clone(&completion), gateway.clone(), Arc::clone(&config_store)));
    let worker_task = tokio::spawn(worker::run_supervised(worker));

    let dashboard_state = DashboardState {
        store: store.clone(),
        config: config_store,
        authorized_chat: config.telegram_chat_id,
        dashboard_password: Arc::from(config.dashboard_password.as_str()),
    };
    let dashboard_task = tokio::spawn(dashboard::serve(dashboard_state, config.port));

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(256);
    let listen_gateway = gateway.clone();
    let listen_task = tokio::spawn(async move {
        if let Err(e) = listen_gateway.listen(inbound_tx).await {
            tracing::error!(error = %e, "chat gateway listen loop exited");
        }
    });

    let dispatch_task = tokio::spawn(async move {
        while let Some(message) = inbound_rx.recv().await {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.handle(message).await });
        }
    });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining tasks");

    scheduler.stop();
    listen_task.abort();
    dispatch_task.abort();
    worker_task.abort();
    dashboard_task.abort();

    Ok(())
}

/// Waits for Ctrl-C or, on unix, SIGTERM — whichever arrives first.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler, falling back to Ctrl-C only");
                let _ = ctrl_c.await;
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
