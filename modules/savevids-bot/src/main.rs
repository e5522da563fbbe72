use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use savevids_bot::{MentionPipeline, PipelineSettings, StreamAdapter, Worker};
use savevids_common::Config;
use savevids_store::{Collections, DocumentStore, MemoryDocumentStore, PgDocumentStore};
use twitter_client::TwitterClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("savevids=info".parse()?)
                .add_directive("twitter_client=info".parse()?),
        )
        .init();

    info!("savevids bot starting...");

    // Load config
    let config = Config::from_env()?;
    config.log_redacted();

    // Storage: Postgres if configured, otherwise in-memory
    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            let pg = PgDocumentStore::connect(url).await?;
            // Run migrations (idempotent)
            pg.migrate().await?;
            Arc::new(pg)
        }
        None => {
            warn!("No DATABASE_URL set, using in-memory store (state is lost on exit)");
            Arc::new(MemoryDocumentStore::new())
        }
    };
    let collections = Collections::new(store, config.collections.clone());

    let client = Arc::new(
        TwitterClient::new(
            config.twitter_bearer_token.clone(),
            config.twitter_user_token.clone(),
        )
        .with_base_url(config.twitter_api_base.clone()),
    );

    let pipeline = MentionPipeline::new(client.clone(), collections, PipelineSettings::from_config(&config));
    let worker = Worker::new(pipeline);
    let adapter = StreamAdapter::new(client, config.track.clone());

    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, finishing in-flight mention");
            shutdown_tx.send(true).ok();
        }
        // Dropping the sender also stops the adapter.
        std::future::pending::<()>().await;
    });

    let stream_task = tokio::spawn(async move { adapter.run(tx, shutdown_rx).await });

    // The worker drains the channel until the adapter drops its sender.
    let stats = worker.run(rx).await;

    let stream_stats = stream_task.await??;
    info!("Stream closed. {stream_stats}");
    info!("savevids bot stopped. {stats}");
    Ok(())
}
