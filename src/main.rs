mod api;
mod database;
mod jobs;
mod models;
mod services;
mod utils;

use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

use crate::{
    database::JsonStore,
    services::{ConversationService, MeterLedger, QrService, TelegramClient, UserRegistry},
    utils::{config::BotConfig, error::AppError},
};

fn to_io_error(e: AppError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

/// `BOT_LINK` if set, otherwise the t.me address of the bot behind the token
async fn resolve_bot_link(config: &BotConfig, client: &TelegramClient) -> Result<String, AppError> {
    if let Some(link) = &config.bot_link {
        return Ok(link.clone());
    }

    let me = client.get_me().await?;
    let username = me.username.ok_or_else(|| {
        AppError::ConfigError("Bot has no username; set BOT_LINK".to_string())
    })?;

    Ok(format!("https://t.me/{}", username))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger; the HTTP client stays quiet unless asked
    env_logger::init_from_env(
        env_logger::Env::new().default_filter_or("info,reqwest=warn,hyper=warn"),
    );

    let config = BotConfig::from_env().map_err(to_io_error)?;

    log::info!("🚀 Starting Water Meter Bot...");
    log::info!("📂 Data directory: {}", config.data_dir.display());

    let client = TelegramClient::new(&config.token);
    let bot_link = resolve_bot_link(&config, &client).await.map_err(to_io_error)?;
    log::info!("🔗 Bot link: {}", bot_link);

    let store = JsonStore::new(&config.data_dir);
    let registry = UserRegistry::new(store.clone());
    match registry.count() {
        Ok(count) => log::info!("✅ {} registered users loaded", count),
        Err(e) => log::warn!("⚠️  Could not read registered users: {}", e),
    }

    let health_registry = web::Data::new(registry.clone());

    let service = Arc::new(ConversationService::new(
        registry,
        MeterLedger::new(store),
        QrService::new(bot_link, &config.qr_output_path),
    ));

    let polling = tokio::spawn(jobs::telegram_polling::run_polling(
        client,
        service,
        config.poll_timeout_secs,
    ));

    let Some(health_addr) = config.health_addr.clone() else {
        // Runs until the process is interrupted
        return polling
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    };

    log::info!("🌐 Health server starting on {}", health_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(health_registry.clone())
            .route("/health", web::get().to(api::health::health_check))
            .route("/metrics", web::get().to(api::metrics::get_metrics))
    })
    .bind(health_addr)?
    .run()
    .await
}
