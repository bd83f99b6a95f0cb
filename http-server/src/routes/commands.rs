use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use ledger::error::LedgerError;
use ledger::wager::{self, RollOutcome};

use crate::issuer::IssuerError;
use crate::withdrawal::WithdrawalError;
use crate::AppState;

// Registration request
#[derive(Deserialize)]
pub struct StartRequest {
    pub user_id: u64,
}

// Registration response
#[derive(Serialize)]
pub struct StartResponse {
    pub success: bool,
    pub registered: bool,
    pub message: String,
    pub balances: Option<HashMap<String, f64>>,
}

// Register endpoint; repeating it for a known user is a welcome-back no-op
pub async fn start(
    State(state): State<AppState>,
    Json(payload): Json<StartRequest>,
) -> (StatusCode, Json<StartResponse>) {
    match state
        .store
        .create_user(payload.user_id, state.registry.initial_balances())
    {
        Ok(user) => {
            tracing::info!("Registered new user: {}", user.user_id);
            (
                StatusCode::CREATED,
                Json(StartResponse {
                    success: true,
                    registered: true,
                    message: "Welcome to the Casino Bot! You've been registered with 10 units of SOL, LTC, ETH, and 0.001 BTC.".to_string(),
                    balances: Some(user.balances),
                }),
            )
        }
        Err(LedgerError::AlreadyExists(user_id)) => {
            tracing::info!("User {} returned", user_id);
            (
                StatusCode::OK,
                Json(StartResponse {
                    success: true,
                    registered: false,
                    message: "Welcome back!".to_string(),
                    balances: state.store.get_user(user_id).map(|user| user.balances),
                }),
            )
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StartResponse {
                success: false,
                registered: false,
                message: err.to_string(),
                balances: None,
            }),
        ),
    }
}

// Balance response
#[derive(Serialize)]
pub struct BalanceResponse {
    pub success: bool,
    pub message: String,
    pub balances: Option<HashMap<String, f64>>,
}

// Balance lookup endpoint
pub async fn balance(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> (StatusCode, Json<BalanceResponse>) {
    match state.store.get_user(user_id) {
        Some(user) => (
            StatusCode::OK,
            Json(BalanceResponse {
                success: true,
                message: "Balances retrieved".to_string(),
                balances: Some(user.balances),
            }),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(BalanceResponse {
                success: false,
                message: "You're not registered. Use /start first.".to_string(),
                balances: None,
            }),
        ),
    }
}

// Dice roll request
#[derive(Deserialize)]
pub struct RollRequest {
    pub user_id: u64,
    pub asset: String,
    pub amount: f64,
}

// Dice roll response
#[derive(Serialize)]
pub struct RollResponse {
    pub success: bool,
    pub message: String,
    pub dice: Option<(u8, u8)>,
    pub total: Option<u8>,
    pub won: Option<bool>,
    pub new_balance: Option<f64>,
}

fn roll_rejection(status: StatusCode, message: String) -> (StatusCode, Json<RollResponse>) {
    (
        status,
        Json(RollResponse {
            success: false,
            message,
            dice: None,
            total: None,
            won: None,
            new_balance: None,
        }),
    )
}

// Dice roll endpoint
pub async fn roll(
    State(state): State<AppState>,
    Json(payload): Json<RollRequest>,
) -> (StatusCode, Json<RollResponse>) {
    if payload.amount <= 0.0 {
        return roll_rejection(
            StatusCode::BAD_REQUEST,
            "Amount must be a positive number (e.g., 0.1)".to_string(),
        );
    }
    let asset = ledger::assets::AssetRegistry::canonical(&payload.asset);
    if !state.registry.is_supported(&asset) {
        return roll_rejection(
            StatusCode::BAD_REQUEST,
            format!("Invalid cryptocurrency '{}'. Use one of: SOL, LTC, BTC, ETH", payload.asset),
        );
    }
    let Some(user) = state.store.get_user(payload.user_id) else {
        return roll_rejection(
            StatusCode::NOT_FOUND,
            "You're not registered. Use /start first.".to_string(),
        );
    };
    let available = user.balance(&asset);
    if available < payload.amount {
        return roll_rejection(
            StatusCode::BAD_REQUEST,
            format!("Insufficient {asset} balance. Your balance: {available}"),
        );
    }

    let result = wager::settle(&mut rand::thread_rng(), payload.amount);

    // The settlement itself is pure; the ledger applies the delta and is the
    // arbiter when a concurrent debit drained the balance in the meantime.
    let new_balance = match state
        .store
        .adjust_balance(payload.user_id, &asset, result.delta)
    {
        Ok(balance) => balance,
        Err(LedgerError::InsufficientFunds { available, .. }) => {
            return roll_rejection(
                StatusCode::BAD_REQUEST,
                format!("Insufficient {asset} balance. Your balance: {available}"),
            );
        }
        Err(err) => {
            return roll_rejection(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    let (dice_a, dice_b) = result.dice;
    let message = match result.outcome {
        // The displayed winnings keep the original 2x framing even though the
        // stake was never debited up front.
        RollOutcome::Win => format!(
            "You rolled {} + {} = {}. You won! +{} {}",
            dice_a,
            dice_b,
            result.total,
            payload.amount * 2.0,
            asset
        ),
        RollOutcome::Loss => format!(
            "You rolled {} + {} = {}. You lost! -{} {}",
            dice_a, dice_b, result.total, payload.amount, asset
        ),
    };
    tracing::info!(
        "User {} rolled dice, new {} balance: {}",
        payload.user_id,
        asset,
        new_balance
    );

    (
        StatusCode::OK,
        Json(RollResponse {
            success: true,
            message,
            dice: Some(result.dice),
            total: Some(result.total),
            won: Some(result.outcome == RollOutcome::Win),
            new_balance: Some(new_balance),
        }),
    )
}

// Deposit address request
#[derive(Deserialize)]
pub struct DepositRequest {
    pub user_id: u64,
    pub asset: String,
}

// Deposit address response
#[derive(Serialize)]
pub struct DepositResponse {
    pub success: bool,
    pub message: String,
    pub address: Option<String>,
}

// Deposit address endpoint
pub async fn deposit(
    State(state): State<AppState>,
    Json(payload): Json<DepositRequest>,
) -> (StatusCode, Json<DepositResponse>) {
    match state.issuer.get_or_issue(payload.user_id, &payload.asset).await {
        Ok(address) => {
            let asset = ledger::assets::AssetRegistry::canonical(&payload.asset);
            (
                StatusCode::OK,
                Json(DepositResponse {
                    success: true,
                    message: format!(
                        "Your {asset} deposit address: {address}. Send {asset} to this address to deposit funds."
                    ),
                    address: Some(address),
                }),
            )
        }
        Err(err) => {
            let status = match &err {
                IssuerError::UnsupportedAsset(_) => StatusCode::BAD_REQUEST,
                IssuerError::NotRegistered(_) => StatusCode::NOT_FOUND,
                IssuerError::Upstream(_) => StatusCode::BAD_GATEWAY,
                IssuerError::IssuanceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let message = match &err {
                IssuerError::UnsupportedAsset(asset) => {
                    format!("Invalid cryptocurrency '{asset}'. Use one of: SOL, LTC, BTC, ETH")
                }
                IssuerError::NotRegistered(_) => {
                    "You're not registered. Use /start first.".to_string()
                }
                _ => {
                    tracing::error!("Deposit address issuance failed: {}", err);
                    "Failed to generate a deposit address. Please try again later.".to_string()
                }
            };
            (
                status,
                Json(DepositResponse {
                    success: false,
                    message,
                    address: None,
                }),
            )
        }
    }
}

// Withdrawal request
#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub user_id: u64,
    pub asset: String,
    pub amount: f64,
    pub destination: String,
}

// Withdrawal response
#[derive(Serialize)]
pub struct WithdrawResponse {
    pub success: bool,
    pub message: String,
    pub new_balance: Option<f64>,
}

// Withdrawal endpoint
pub async fn withdraw(
    State(state): State<AppState>,
    Json(payload): Json<WithdrawRequest>,
) -> (StatusCode, Json<WithdrawResponse>) {
    if payload.amount <= 0.0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(WithdrawResponse {
                success: false,
                message: "Amount must be a positive number (e.g., 0.1)".to_string(),
                new_balance: None,
            }),
        );
    }

    match state
        .withdrawals
        .process(
            payload.user_id,
            &payload.asset,
            payload.amount,
            &payload.destination,
        )
        .await
    {
        Ok(receipt) => (
            StatusCode::OK,
            Json(WithdrawResponse {
                success: true,
                message: format!(
                    "Successfully withdrew {} {} to {}",
                    receipt.amount, receipt.asset, receipt.destination
                ),
                new_balance: Some(receipt.new_balance),
            }),
        ),
        Err(err) => {
            let status = match &err {
                WithdrawalError::UnsupportedAsset(_) => StatusCode::BAD_REQUEST,
                WithdrawalError::NotRegistered(_) => StatusCode::NOT_FOUND,
                WithdrawalError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
                WithdrawalError::TransferFailed(_) => StatusCode::BAD_GATEWAY,
            };
            let message = match &err {
                WithdrawalError::UnsupportedAsset(asset) => {
                    format!("Invalid cryptocurrency '{asset}'. Use one of: SOL, LTC, BTC, ETH")
                }
                WithdrawalError::NotRegistered(_) => {
                    "You're not registered. Use /start first.".to_string()
                }
                WithdrawalError::InsufficientFunds { asset, available } => {
                    format!("Insufficient {asset} balance. Your balance: {available}")
                }
                WithdrawalError::TransferFailed(_) => {
                    tracing::error!("Withdrawal transfer failed: {}", err);
                    "Withdrawal failed. Please try again later.".to_string()
                }
            };
            (
                status,
                Json(WithdrawResponse {
                    success: false,
                    message,
                    new_balance: None,
                }),
            )
        }
    }
}
