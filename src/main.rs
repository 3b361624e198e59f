mod cli;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands, DbCommands, TokenCommands};
use note_marketplace::config::{Config, LogFormat};
use note_marketplace::services::{LogNotifier, NotificationDispatcher, Notifier, WebhookNotifier};
use note_marketplace::{create_app, db, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
        Commands::Token(TokenCommands::Issue { user_id }) => {
            cli::handle_token_issue(&config, user_id)
        }
        Commands::Sweep => {
            let pool = db::create_pool(&config).await?;
            cli::handle_sweep(&pool).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let notifier: Arc<dyn Notifier> = match &config.notification_webhook_url {
        Some(url) => {
            tracing::info!("Notifications delivered to webhook {}", url);
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => {
            tracing::info!("No notification webhook configured, logging notifications");
            Arc::new(LogNotifier)
        }
    };
    let (dispatcher, _delivery) =
        NotificationDispatcher::spawn(notifier, config.notification_queue_size);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let state = AppState::new(pool, Arc::new(config), dispatcher);
    let app = create_app(state);

    tracing::info!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
