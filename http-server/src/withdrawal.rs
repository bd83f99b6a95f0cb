use std::sync::Arc;
use thiserror::Error;

use ledger::assets::AssetRegistry;
use ledger::error::LedgerError;
use ledger::store::LedgerStore;

use crate::wallet::{WalletError, WalletProvider};

#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("unsupported asset: {0}")]
    UnsupportedAsset(String),
    #[error("user {0} is not registered")]
    NotRegistered(u64),
    #[error("insufficient {asset} balance: available {available}")]
    InsufficientFunds { asset: String, available: f64 },
    #[error("withdrawal transfer failed: {0}")]
    TransferFailed(#[from] WalletError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalReceipt {
    pub asset: String,
    pub amount: f64,
    pub destination: String,
    pub new_balance: f64,
}

/// Validates and executes outbound transfers, debiting the ledger strictly
/// after the transfer reports success so a failed transfer never costs the
/// user anything.
pub struct WithdrawalProcessor {
    store: LedgerStore,
    registry: Arc<AssetRegistry>,
    wallets: Arc<dyn WalletProvider>,
}

impl WithdrawalProcessor {
    pub fn new(
        store: LedgerStore,
        registry: Arc<AssetRegistry>,
        wallets: Arc<dyn WalletProvider>,
    ) -> Self {
        WithdrawalProcessor {
            store,
            registry,
            wallets,
        }
    }

    pub async fn process(
        &self,
        user_id: u64,
        asset: &str,
        amount: f64,
        destination: &str,
    ) -> Result<WithdrawalReceipt, WithdrawalError> {
        let asset = AssetRegistry::canonical(asset);
        let chain = self
            .registry
            .chain_for(&asset)
            .map_err(|_| WithdrawalError::UnsupportedAsset(asset.clone()))?;

        let user = self
            .store
            .get_user(user_id)
            .ok_or(WithdrawalError::NotRegistered(user_id))?;
        let available = user.balance(&asset);
        if available < amount {
            return Err(WithdrawalError::InsufficientFunds { asset, available });
        }

        self.wallets.transfer(chain, amount, destination).await?;

        let new_balance = self
            .store
            .adjust_balance(user_id, &asset, -amount)
            .map_err(|err| match err {
                LedgerError::InsufficientFunds { asset, available, .. } => {
                    // Balance moved between the precheck and the debit; the
                    // ledger never goes negative, so surface the shortfall.
                    WithdrawalError::InsufficientFunds { asset, available }
                }
                _ => WithdrawalError::NotRegistered(user_id),
            })?;

        tracing::info!(
            "User {} withdrew {} {} to {}, new balance: {}",
            user_id,
            amount,
            asset,
            destination,
            new_balance
        );

        Ok(WithdrawalReceipt {
            asset,
            amount,
            destination: destination.to_string(),
            new_balance,
        })
    }
}
