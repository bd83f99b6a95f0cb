use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use ledger::assets::AssetRegistry;
use ledger::error::LedgerError;
use ledger::store::LedgerStore;

use crate::notify::NotificationSender;
use crate::signature;

/// Inbound deposit notification. Struct field order defines the canonical
/// compact JSON form the HMAC signature covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositNotification {
    pub address: String,
    pub amount: f64,
    pub currency: String,
    #[serde(rename = "txId")]
    pub tx_id: String,
    pub confirmations: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The deposit crossed its confirmation threshold and was credited.
    Credited {
        user_id: u64,
        asset: String,
        amount: f64,
        new_balance: f64,
    },
    /// Below the confirmation threshold. No mutation; the sender is expected
    /// to re-notify as confirmations accumulate.
    Pending {
        asset: String,
        confirmations: u32,
        required: u32,
    },
    /// The tx_id was already credited; redelivery is benign.
    AlreadyProcessed,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("webhook signature is missing or invalid")]
    InvalidSignature,
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
    #[error("no user holds {asset} deposit address {address}")]
    NoMatchingUser { asset: String, address: String },
    #[error("ledger rejected deposit credit: {0}")]
    Store(LedgerError),
}

/// Applies one inbound deposit notification to the ledger.
///
/// Gates run in a fixed order: signature, currency resolution, confirmation
/// threshold, duplicate suppression, user resolution, credit, notification.
/// Every rejection before the credit leaves the ledger untouched, so the
/// sender can redeliver freely.
pub struct DepositReconciler {
    store: LedgerStore,
    registry: Arc<AssetRegistry>,
    webhook_secret: String,
    notifications: NotificationSender,
}

impl DepositReconciler {
    pub fn new(
        store: LedgerStore,
        registry: Arc<AssetRegistry>,
        webhook_secret: String,
        notifications: NotificationSender,
    ) -> Self {
        DepositReconciler {
            store,
            registry,
            webhook_secret,
            notifications,
        }
    }

    pub fn process(
        &self,
        notification: &DepositNotification,
        provided_signature: Option<&str>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        // An unauthenticated payload must not influence anything, so the
        // signature check comes before every lookup.
        let canonical = serde_json::to_string(notification)
            .map_err(|_| ReconcileError::InvalidSignature)?;
        let provided = provided_signature.ok_or(ReconcileError::InvalidSignature)?;
        if !signature::verify(&self.webhook_secret, &canonical, provided) {
            return Err(ReconcileError::InvalidSignature);
        }

        let descriptor = self
            .registry
            .asset_for_chain(&notification.currency)
            .ok_or_else(|| ReconcileError::UnsupportedCurrency(notification.currency.clone()))?;
        let asset = descriptor.symbol;

        if notification.confirmations < descriptor.required_confirmations {
            tracing::info!(
                "Deposit {} for {} at {}/{} confirmations, waiting",
                notification.tx_id,
                asset,
                notification.confirmations,
                descriptor.required_confirmations
            );
            return Ok(ReconcileOutcome::Pending {
                asset: asset.to_string(),
                confirmations: notification.confirmations,
                required: descriptor.required_confirmations,
            });
        }

        // Idempotency backstop for redelivery after a completed credit.
        if self.store.has_processed_deposit(&notification.tx_id) {
            return Ok(ReconcileOutcome::AlreadyProcessed);
        }

        let user = self
            .store
            .find_user_by_deposit_address(asset, &notification.address)
            .ok_or_else(|| ReconcileError::NoMatchingUser {
                asset: asset.to_string(),
                address: notification.address.clone(),
            })?;

        // The deposit log row is the commit point; losing a race to a
        // concurrent delivery of the same tx_id is a benign duplicate.
        let new_balance = match self.store.record_deposit(
            &notification.tx_id,
            user.user_id,
            asset,
            notification.amount,
            &notification.address,
            notification.confirmations,
        ) {
            Ok(balance) => balance,
            Err(LedgerError::DuplicateTransaction(_)) => {
                return Ok(ReconcileOutcome::AlreadyProcessed);
            }
            Err(err) => return Err(ReconcileError::Store(err)),
        };

        tracing::info!(
            "Credited deposit {}: +{} {} to user {}, new balance {}",
            notification.tx_id,
            notification.amount,
            asset,
            user.user_id,
            new_balance
        );

        // Queued delivery; a failure here never rolls back the credit.
        self.notifications.enqueue(
            user.user_id,
            format!(
                "Deposit confirmed: +{} {}. New balance: {}",
                notification.amount, asset, new_balance
            ),
        );

        Ok(ReconcileOutcome::Credited {
            user_id: user.user_id,
            asset: asset.to_string(),
            amount: notification.amount,
            new_balance,
        })
    }
}
