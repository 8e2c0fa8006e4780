use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::time::sleep;

use tubestash::cli::{Cli, Commands};
use tubestash::core::{config, init_logger, log_storage_configuration};
use tubestash::download::{DownloadOrchestrator, Extractor, PipelineSettings, YtDlpExtractor};
use tubestash::storage::{list_files, BackendRegistry, CapacityMonitor, StorageSettings};
use tubestash::telegram::handlers::{render_backends, render_files, render_storage};
use tubestash::telegram::{create_bot, schema, setup_bot_commands, ChatTransport, HandlerDeps, TeloxideTransport};
use tubestash::upload::UploadWatchRegistry;

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::Backends) => {
            let registry = BackendRegistry::new(StorageSettings::from_env());
            println!("{}", render_backends(&registry));
            Ok(())
        }
        Some(Commands::Storage) => {
            let registry = BackendRegistry::new(StorageSettings::from_env());
            let capacity = CapacityMonitor::from_env();
            println!("{}", render_storage(&registry, &capacity).await);
            Ok(())
        }
        Some(Commands::Files { query, limit }) => {
            let registry = BackendRegistry::new(StorageSettings::from_env());
            let query = query.as_deref().map(str::trim).filter(|q| !q.is_empty());
            let files = list_files(&registry, query, limit);
            println!("{}", render_files(&files, query));
            Ok(())
        }
    }
}

async fn run_bot() -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    log::info!("Starting bot...");

    log_storage_configuration();

    // Create bot instance
    let bot = create_bot()?;

    fs_err::tokio::create_dir_all(&*config::SCRATCH_DIR).await?;

    let registry = Arc::new(BackendRegistry::new(StorageSettings::from_env()));
    for (id, name) in registry.list_available() {
        log::info!("Available backend: {} ({})", id, name);
    }
    let capacity = Arc::new(CapacityMonitor::from_env());
    let extractor: Arc<dyn Extractor> = Arc::new(YtDlpExtractor::from_env());
    let transport: Arc<dyn ChatTransport> = Arc::new(TeloxideTransport::new(bot.clone()));
    let watchers = UploadWatchRegistry::new();

    let orchestrator = Arc::new(DownloadOrchestrator::new(
        Arc::clone(&registry),
        Arc::clone(&capacity),
        Arc::clone(&extractor),
        transport,
        watchers.clone(),
        PipelineSettings::from_env(),
    ));
    let deps = HandlerDeps::new(orchestrator, registry, capacity, extractor);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let handler = schema(deps);

    log::info!("Starting bot in long polling mode");
    log::info!("🎉 Bot initialization complete in {:.2}s", bot_init_start.elapsed().as_secs_f64());

    // Run the dispatcher with retry logic
    let mut retry_count = 0;
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // A separate task isolates dispatcher panics
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            // Create polling listener that drops pending updates on start
            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                if retry_count >= config::retry::MAX_DISPATCHER_RETRIES {
                    log::error!("Max retries reached after panic. Exiting...");
                    break;
                }
                retry_count += 1;
                log::info!(
                    "Retrying dispatcher after panic (attempt {}/{})...",
                    retry_count,
                    config::retry::MAX_DISPATCHER_RETRIES
                );
                sleep(config::retry::dispatcher_delay(retry_count)).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }
    }

    log::info!("Stopping {} upload watcher(s)", watchers.active_count());
    watchers.stop_all().await;
    Ok(())
}
