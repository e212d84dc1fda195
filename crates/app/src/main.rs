/// Storefront Backend Application
///
/// This is the main entry point for the storefront and admin back-office
/// service. It wires the spreadsheet-backed repositories, the order
/// placement pipeline, the notification dispatcher, and the HTTP server.
///
/// # Architecture
///
/// The application follows a modular architecture with:
/// - Store layer for row-level access to the backing spreadsheet service
/// - Checkout layer for the order placement pipeline
/// - Notify layer for best-effort seller/customer notifications
/// - Server layer for HTTP endpoints
/// - Metrics for monitoring
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::Registry;
use tracing::{error, info};

use app_config::AppConfig;
use checkout::CheckoutService;
use notify::{NotificationDispatcher, NotifyMetrics, SmtpEmailChannel, WebhookChatChannel};
use server::Server;
use store::{
    MemorySheets, SheetCatalogRepository, SheetCustomerRepository, SheetOrderRepository,
    SheetShopDirectory, SheetsApi,
};

mod seed;

/// Initialize the tracing subscriber for logging
fn init_logger() -> Result<()> {
    tracing_subscriber::fmt::init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = init_logger() {
        eprintln!("Failed to initialize logger: {}", err);
        return Err(anyhow::anyhow!("Failed to initialize logger"));
    }

    info!("Storefront backend starting...");

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Backing store. The in-memory backend implements the same row-level
    // contract as the hosted spreadsheet client.
    let memory = Arc::new(MemorySheets::new());
    if config.seed_demo {
        if memory.is_empty().await {
            seed::seed_demo_shop(memory.as_ref(), &config.admin_user)
                .await
                .context("Failed to seed demo data")?;
            info!("Seeded demo shop into empty backing store");
        } else {
            info!("Backing store not empty, skipping demo seed");
        }
    }
    let sheets: Arc<dyn SheetsApi> = memory;

    // Shared metrics registry: HTTP metrics and notification failure
    // counters end up on the same /metrics endpoint.
    let registry = Registry::new();

    let email = match SmtpEmailChannel::new(
        &config.smtp_host,
        config.smtp_port,
        &config.smtp_username,
        &config.smtp_password,
        &config.smtp_from,
    ) {
        Ok(channel) => channel,
        Err(e) => {
            error!("Failed to configure SMTP channel: {}", e);
            return Err(anyhow::anyhow!("Failed to configure SMTP channel"));
        }
    };
    let chat = WebhookChatChannel::new(&config.chat_webhook_url, config.chat_enabled);
    let dispatcher =
        NotificationDispatcher::new(email, chat, NotifyMetrics::register(&registry));

    let checkout_service = Arc::new(CheckoutService::new(
        SheetShopDirectory::new(sheets.clone()),
        SheetCatalogRepository::new(sheets.clone()),
        SheetCustomerRepository::new(sheets.clone()),
        SheetOrderRepository::new(sheets.clone()),
        dispatcher,
    ));

    let http_server = Server::new(
        config.http_port,
        checkout_service,
        Arc::new(SheetShopDirectory::new(sheets.clone())),
        Arc::new(SheetCatalogRepository::new(sheets.clone())),
        registry,
        config.admin_token.clone(),
        config.admin_user.clone(),
    );

    if let Err(err) = http_server.start().await {
        error!("HTTP server error: {}", err);
        return Err(err);
    }

    info!("Application stopped");
    Ok(())
}
