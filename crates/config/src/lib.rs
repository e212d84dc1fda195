use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// `AppConfig` holds all configuration parameters required by the application.
///
/// The configuration is loaded from environment variables (optionally via a `.env` file)
/// or uses default values if the variable is not set. Fields cover the HTTP server,
/// the admin token, SMTP delivery, the chat webhook, and shutdown behavior.
/// This struct is deserializable via Serde.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- HTTP server ---
    /// The port on which the HTTP server will listen.
    pub http_port: u16,

    // --- Shutdown timeout ---
    /// Graceful shutdown timeout (human-friendly format, e.g. "5s", "1m").
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub shutdown_timeout: Duration,

    // --- Admin context ---
    /// Bearer token accepted for admin requests.
    pub admin_token: String,
    /// Identity of the admin user the token resolves to. The admin's shop is
    /// looked up by this owner id.
    pub admin_user: String,

    // --- SMTP (seller email notifications) ---
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    /// From-address used for outgoing notification mail.
    pub smtp_from: String,

    // --- Chat webhook (customer message notifications) ---
    /// Feature flag: when false, chat sends are no-ops that report success.
    pub chat_enabled: bool,
    pub chat_webhook_url: String,

    // --- Dev/demo data ---
    /// Seed a demo shop with a small catalog into an empty backing store.
    pub seed_demo: bool,
}

/// Custom deserializer for graceful shutdown timeout.
/// Accepts human-readable formats like "5s", "1m", etc.
fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

impl AppConfig {
    /// Loads configuration from environment variables (and optionally from `.env` file).
    ///
    /// Fields not set via env will be filled with default values.
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid or missing required values.
    pub fn load() -> Result<Self> {
        // Load from .env file (for Docker environment)
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            // HTTP
            .set_default("http_port", 8080)?
            // Shutdown
            .set_default("shutdown_timeout", "5s")?
            // Admin
            .set_default("admin_token", "dev-admin-token")?
            .set_default("admin_user", "USER-demo-admin")?
            // SMTP
            .set_default("smtp_host", "localhost")?
            .set_default("smtp_port", 587)?
            .set_default("smtp_username", "")?
            .set_default("smtp_password", "")?
            .set_default("smtp_from", "orders@localhost")?
            // Chat webhook
            .set_default("chat_enabled", false)?
            .set_default("chat_webhook_url", "")?
            // Demo data
            .set_default("seed_demo", false)?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        settings
            .try_deserialize()
            .context("Failed to load configuration")
    }
}
