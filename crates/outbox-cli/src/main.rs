//! `outbox` - relay worker と運用コマンド
//!
//! 設定はフラグか `OUTBOX_*` 環境変数から読む（`outbox --help` を参照）。

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use outbox_core::app::{Enqueuer, RelayConfig, RelayHandle, RelayReport, RelayWorker};
use outbox_core::impls::LogProducer;
use outbox_core::ports::{OutboxStore, Producer};
use outbox_kafka::{KafkaConfig, KafkaProducer};
use outbox_pg::{InsertMessageInfo, PostgresOutboxStore, connect, count_message_infos, run_migrations};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, EnqueueArgs, WorkerArgs};

const KAFKA_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.dev)?;

    let store = open_store(&cli).await?;
    match &cli.command {
        Command::Worker(args) => worker(store, args).await,
        Command::Enqueue(args) => enqueue(store, args).await,
        Command::Stats => stats(store).await,
        Command::Migrate => {
            run_migrations(store.pool()).await.context("creating schema")?;
            tracing::info!("schema ready");
            Ok(())
        }
    }
}

/// Development: debug level, plain text. Otherwise info level, JSON lines.
/// `RUST_LOG` overrides the level in both modes.
fn setup_logging(dev: bool) -> anyhow::Result<()> {
    let level = if dev { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = if dev {
        builder.try_init()
    } else {
        builder.json().try_init()
    };
    result.map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}

async fn open_store(cli: &Cli) -> anyhow::Result<PostgresOutboxStore> {
    let pool = connect(&cli.postgres_dsn, cli.max_connections)
        .await
        .context("connecting to postgres")?;
    Ok(PostgresOutboxStore::new(pool))
}

async fn worker(store: PostgresOutboxStore, args: &WorkerArgs) -> anyhow::Result<()> {
    let config = args.relay_config();

    let report = if args.dry_run {
        tracing::warn!("dry run: messages are logged and marked delivered");
        relay(store, LogProducer, config).await?
    } else {
        let kafka = KafkaConfig::new(&args.kafka_brokers)
            .with_message_timeout(args.kafka_message_timeout);
        let producer = Arc::new(KafkaProducer::new(&kafka).context("creating kafka producer")?);
        let report = relay(store, Arc::clone(&producer), config).await?;
        if let Err(e) = producer.flush(KAFKA_FLUSH_TIMEOUT) {
            tracing::warn!(error = %e, "kafka flush incomplete");
        }
        report
    };

    tracing::info!(
        cycles = report.cycles,
        delivered = report.delivered,
        failed_cycles = report.failed_cycles,
        timed_out_cycles = report.timed_out_cycles,
        invariant_violations = report.invariant_violations,
        "worker exited"
    );
    Ok(())
}

async fn relay<S, P>(store: S, producer: P, config: RelayConfig) -> anyhow::Result<RelayReport>
where
    S: OutboxStore + 'static,
    P: Producer + 'static,
{
    let worker = RelayWorker::new(store, producer, config).context("invalid worker config")?;
    let report = RelayHandle::spawn(worker)
        .run_until(shutdown_signal())
        .await
        .context("relay worker failed")?;
    Ok(report)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown requested, draining");
}

async fn enqueue(store: PostgresOutboxStore, args: &EnqueueArgs) -> anyhow::Result<()> {
    let enqueuer = Enqueuer::new(store);
    let ids = enqueuer
        .submit(&InsertMessageInfo, &[args.message()])
        .await
        .context("enqueue failed")?;
    for id in ids {
        println!("{}", id.as_uuid());
    }
    Ok(())
}

#[derive(Serialize)]
struct Stats {
    count_in_message_infos: u64,
    undelivered_count_in_outbox_messages: u64,
    delivered_count_in_outbox_messages: u64,
}

async fn stats(store: PostgresOutboxStore) -> anyhow::Result<()> {
    let business = count_message_infos(store.pool()).await?;
    let counts = store.counts().await?;
    let stats = Stats {
        count_in_message_infos: business,
        undelivered_count_in_outbox_messages: counts.undelivered,
        delivered_count_in_outbox_messages: counts.delivered,
    };
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
