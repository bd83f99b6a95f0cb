use std::sync::Arc;
use thiserror::Error;

use ledger::assets::AssetRegistry;
use ledger::store::LedgerStore;

use crate::wallet::{WalletDescriptor, WalletError, WalletProvider};

#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("unsupported asset: {0}")]
    UnsupportedAsset(String),
    #[error("user {0} is not registered")]
    NotRegistered(u64),
    #[error("address issuance failed: {0}")]
    IssuanceFailed(String),
    #[error(transparent)]
    Upstream(#[from] WalletError),
}

/// Issues and caches one deposit address per (user, asset).
pub struct DepositAddressIssuer {
    store: LedgerStore,
    registry: Arc<AssetRegistry>,
    wallets: Arc<dyn WalletProvider>,
}

impl DepositAddressIssuer {
    pub fn new(
        store: LedgerStore,
        registry: Arc<AssetRegistry>,
        wallets: Arc<dyn WalletProvider>,
    ) -> Self {
        DepositAddressIssuer {
            store,
            registry,
            wallets,
        }
    }

    /// Returns the user's deposit address for `asset`, issuing one through
    /// the wallet provider on first use. An address is only handed out after
    /// it is durably recorded against the user, otherwise a later deposit to
    /// it could not be attributed.
    pub async fn get_or_issue(&self, user_id: u64, asset: &str) -> Result<String, IssuerError> {
        let asset = AssetRegistry::canonical(asset);
        let chain = self
            .registry
            .chain_for(&asset)
            .map_err(|_| IssuerError::UnsupportedAsset(asset.clone()))?;

        let user = self
            .store
            .get_user(user_id)
            .ok_or(IssuerError::NotRegistered(user_id))?;
        if let Some(address) = user.deposit_addresses.get(&asset) {
            return Ok(address.clone());
        }

        // All external calls happen before the ledger write.
        let address = match self.wallets.get_wallet(chain).await? {
            WalletDescriptor::Address(address) => address,
            WalletDescriptor::Xpub(xpub) => self.wallets.derive_address(chain, &xpub, 0).await?,
        };

        // Monitoring is best-effort: without the subscription deposits to the
        // address go undetected until re-subscription, but the address itself
        // is still valid.
        if let Err(err) = self.wallets.subscribe(chain, &address).await {
            tracing::warn!(
                "Failed to subscribe {} address {} for deposit monitoring: {}",
                chain,
                address,
                err
            );
        }

        // The store keeps whichever address landed first, so a concurrent
        // issuance for the same (user, asset) converges on one address.
        self.store
            .set_deposit_address(user_id, &asset, &address)
            .map_err(|err| IssuerError::IssuanceFailed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted wallet provider counting calls per method.
    struct ScriptedWallet {
        descriptor: WalletDescriptor,
        wallet_calls: AtomicUsize,
        derive_calls: AtomicUsize,
        subscribe_calls: AtomicUsize,
        fail_subscribe: bool,
    }

    impl ScriptedWallet {
        fn address(address: &str) -> Self {
            Self::new(WalletDescriptor::Address(address.to_string()))
        }

        fn xpub(xpub: &str) -> Self {
            Self::new(WalletDescriptor::Xpub(xpub.to_string()))
        }

        fn new(descriptor: WalletDescriptor) -> Self {
            ScriptedWallet {
                descriptor,
                wallet_calls: AtomicUsize::new(0),
                derive_calls: AtomicUsize::new(0),
                subscribe_calls: AtomicUsize::new(0),
                fail_subscribe: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl WalletProvider for ScriptedWallet {
        async fn get_wallet(&self, _chain: &str) -> Result<WalletDescriptor, WalletError> {
            self.wallet_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.descriptor.clone())
        }

        async fn derive_address(
            &self,
            _chain: &str,
            xpub: &str,
            index: u32,
        ) -> Result<String, WalletError> {
            self.derive_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{xpub}/{index}"))
        }

        async fn subscribe(&self, _chain: &str, _address: &str) -> Result<(), WalletError> {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_subscribe {
                return Err(WalletError::Request("subscription endpoint down".into()));
            }
            Ok(())
        }

        async fn transfer(
            &self,
            _chain: &str,
            _amount: f64,
            _destination: &str,
        ) -> Result<(), WalletError> {
            Ok(())
        }
    }

    fn setup_issuer(wallet: Arc<ScriptedWallet>) -> (DepositAddressIssuer, LedgerStore) {
        let store = LedgerStore::new();
        store.create_user(1, HashMap::new()).unwrap();
        let issuer = DepositAddressIssuer::new(
            store.clone(),
            Arc::new(AssetRegistry::new()),
            wallet,
        );
        (issuer, store)
    }

    #[tokio::test]
    async fn test_account_chain_returns_provider_address() {
        let wallet = Arc::new(ScriptedWallet::address("sol-addr"));
        let (issuer, store) = setup_issuer(wallet.clone());

        let address = issuer.get_or_issue(1, "sol").await.unwrap();
        assert_eq!(address, "sol-addr");
        assert_eq!(wallet.derive_calls.load(Ordering::SeqCst), 0);
        assert_eq!(wallet.subscribe_calls.load(Ordering::SeqCst), 1);
        // The address is on record before it is handed out.
        assert_eq!(
            store.get_user(1).unwrap().deposit_addresses["SOL"],
            "sol-addr"
        );
    }

    #[tokio::test]
    async fn test_xpub_chain_derives_child_index_zero() {
        let wallet = Arc::new(ScriptedWallet::xpub("xpub-btc"));
        let (issuer, _store) = setup_issuer(wallet.clone());

        let address = issuer.get_or_issue(1, "BTC").await.unwrap();
        assert_eq!(address, "xpub-btc/0");
        assert_eq!(wallet.derive_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_call_reuses_cached_address_without_provider_call() {
        let wallet = Arc::new(ScriptedWallet::address("eth-addr"));
        let (issuer, _store) = setup_issuer(wallet.clone());

        let first = issuer.get_or_issue(1, "ETH").await.unwrap();
        let second = issuer.get_or_issue(1, "ETH").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(wallet.wallet_calls.load(Ordering::SeqCst), 1);
        assert_eq!(wallet.subscribe_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscription_failure_does_not_block_issuance() {
        let mut wallet = ScriptedWallet::address("ltc-addr");
        wallet.fail_subscribe = true;
        let (issuer, store) = setup_issuer(Arc::new(wallet));

        let address = issuer.get_or_issue(1, "LTC").await.unwrap();
        assert_eq!(address, "ltc-addr");
        assert_eq!(
            store.get_user(1).unwrap().deposit_addresses["LTC"],
            "ltc-addr"
        );
    }

    #[tokio::test]
    async fn test_unsupported_asset_is_rejected_before_any_call() {
        let wallet = Arc::new(ScriptedWallet::address("unused"));
        let (issuer, _store) = setup_issuer(wallet.clone());

        let err = issuer.get_or_issue(1, "DOGE").await.unwrap_err();
        assert!(matches!(err, IssuerError::UnsupportedAsset(asset) if asset == "DOGE"));
        assert_eq!(wallet.wallet_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unregistered_user_is_rejected() {
        let wallet = Arc::new(ScriptedWallet::address("unused"));
        let (issuer, _store) = setup_issuer(wallet);

        let err = issuer.get_or_issue(99, "SOL").await.unwrap_err();
        assert!(matches!(err, IssuerError::NotRegistered(99)));
    }
}
