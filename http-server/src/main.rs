use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use ledger::assets::AssetRegistry;
use ledger::store::LedgerStore;

mod config;
mod issuer;
mod notify;
mod reconciler;
mod routes;
mod signature;
mod wallet;
mod withdrawal;

use config::Config;
use issuer::DepositAddressIssuer;
use notify::{HttpNotifier, LogNotifier, Notifier, notification_channel, spawn_notification_worker};
use reconciler::DepositReconciler;
use routes::assets::get_assets;
use routes::commands::{balance, deposit, roll, start, withdraw};
use routes::webhook::deposit_webhook;
use wallet::{HttpWalletProvider, WalletProvider};
use withdrawal::WithdrawalProcessor;

// Application state shared by the command handlers and the deposit webhook
#[derive(Clone)]
pub struct AppState {
    pub store: LedgerStore,
    pub registry: Arc<AssetRegistry>,
    pub issuer: Arc<DepositAddressIssuer>,
    pub withdrawals: Arc<WithdrawalProcessor>,
    pub reconciler: Arc<DepositReconciler>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // initialize tracing
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let store = LedgerStore::new();
    let registry = Arc::new(AssetRegistry::new());
    tracing::info!("Ledger store initialized successfully");

    // External collaborators, injected as trait objects
    let wallets: Arc<dyn WalletProvider> = Arc::new(HttpWalletProvider::new(
        config.wallet_api_url.clone(),
        config.wallet_api_key.clone(),
        config.deposit_callback_url.clone(),
    ));
    let notifier: Arc<dyn Notifier> = match config.notify_url.clone() {
        Some(url) => Arc::new(HttpNotifier::new(url)),
        None => Arc::new(LogNotifier),
    };

    // Ledger mutations enqueue here; the worker owns delivery
    let (notifications, notification_rx) = notification_channel();
    spawn_notification_worker(notifier, notification_rx);

    let state = AppState {
        store: store.clone(),
        registry: registry.clone(),
        issuer: Arc::new(DepositAddressIssuer::new(
            store.clone(),
            registry.clone(),
            wallets.clone(),
        )),
        withdrawals: Arc::new(WithdrawalProcessor::new(
            store.clone(),
            registry.clone(),
            wallets.clone(),
        )),
        reconciler: Arc::new(DepositReconciler::new(
            store,
            registry,
            config.webhook_secret.clone(),
            notifications,
        )),
    };

    // build our application with routes
    let app = Router::new()
        .route("/", get(root))
        .route("/start", post(start))
        .route("/balance/{user_id}", get(balance))
        .route("/roll", post(roll))
        .route("/deposit", post(deposit))
        .route("/withdraw", post(withdraw))
        .route("/assets", get(get_assets))
        .route("/webhook/deposit", post(deposit_webhook))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("Server running on http://0.0.0.0:{}", config.port);
    axum::serve(listener, app).await?;

    Ok(())
}

// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

// Root endpoint
async fn root() -> &'static str {
    "Casino Ledger API - Use POST /start to register, POST /roll to bet, POST /deposit for a deposit address, POST /withdraw to cash out, GET /balance/{user_id} for balances"
}
