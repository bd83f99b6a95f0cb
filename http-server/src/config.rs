use std::env;

/// Service configuration sourced from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Shared secret for deposit webhook HMAC signatures.
    pub webhook_secret: String,
    /// Wallet provider REST API.
    pub wallet_api_url: String,
    pub wallet_api_key: String,
    /// URL the wallet provider should deliver deposit notifications to.
    pub deposit_callback_url: String,
    /// Optional endpoint for outbound user notifications; when absent,
    /// notifications are logged instead of delivered.
    pub notify_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Config, String> {
        Ok(Config {
            port: env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(8080),
            webhook_secret: require("WEBHOOK_SECRET")?,
            wallet_api_url: env::var("WALLET_API_URL")
                .unwrap_or_else(|_| "https://api.tatum.io/v3".to_string()),
            wallet_api_key: require("WALLET_API_KEY")?,
            deposit_callback_url: require("DEPOSIT_CALLBACK_URL")?,
            notify_url: env::var("NOTIFY_URL").ok(),
        })
    }
}

fn require(name: &str) -> Result<String, String> {
    env::var(name).map_err(|_| format!("Missing required environment variable: {name}"))
}
