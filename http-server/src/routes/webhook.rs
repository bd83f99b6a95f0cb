use axum::{Json, extract::State, http::HeaderMap, http::StatusCode};
use serde::Serialize;

use crate::reconciler::{DepositNotification, ReconcileError, ReconcileOutcome};
use crate::AppState;

/// Header carrying the hex HMAC-SHA256 signature of the canonical body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

// Webhook response; every 200 tells the sender to stop redelivering
#[derive(Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub status: String,
    pub message: String,
}

fn respond(
    status: StatusCode,
    success: bool,
    state_name: &str,
    message: String,
) -> (StatusCode, Json<WebhookResponse>) {
    (
        status,
        Json(WebhookResponse {
            success,
            status: state_name.to_string(),
            message,
        }),
    )
}

// Deposit notification ingress
pub async fn deposit_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<WebhookResponse>) {
    let Ok(notification) = serde_json::from_str::<DepositNotification>(&body) else {
        return respond(
            StatusCode::BAD_REQUEST,
            false,
            "rejected",
            "Malformed deposit notification".to_string(),
        );
    };
    let provided_signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.reconciler.process(&notification, provided_signature) {
        Ok(ReconcileOutcome::Credited {
            user_id,
            asset,
            amount,
            new_balance,
        }) => respond(
            StatusCode::OK,
            true,
            "credited",
            format!("Credited {amount} {asset} to user {user_id}, new balance {new_balance}"),
        ),
        Ok(ReconcileOutcome::Pending {
            asset,
            confirmations,
            required,
        }) => respond(
            StatusCode::OK,
            true,
            "pending",
            format!("{asset} deposit at {confirmations}/{required} confirmations"),
        ),
        Ok(ReconcileOutcome::AlreadyProcessed) => respond(
            StatusCode::OK,
            true,
            "duplicate",
            "Transaction already credited".to_string(),
        ),
        Err(ReconcileError::InvalidSignature) => respond(
            StatusCode::FORBIDDEN,
            false,
            "rejected",
            "Invalid webhook signature".to_string(),
        ),
        Err(ReconcileError::UnsupportedCurrency(currency)) => respond(
            StatusCode::BAD_REQUEST,
            false,
            "rejected",
            format!("Unsupported currency '{currency}'"),
        ),
        Err(ReconcileError::NoMatchingUser { asset, address }) => {
            tracing::error!(
                "Deposit to unattributed {} address {}; address/user mapping needs investigation",
                asset,
                address
            );
            respond(
                StatusCode::NOT_FOUND,
                false,
                "rejected",
                format!("No user holds {asset} address {address}"),
            )
        }
        Err(ReconcileError::Store(err)) => {
            tracing::error!("Deposit credit failed in the ledger: {}", err);
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                false,
                "error",
                "Internal error, please retry".to_string(),
            )
        }
    }
}
