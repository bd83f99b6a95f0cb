use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::LedgerError;
use crate::types::{DepositTransaction, User};

/// In-memory ledger standing in for the external row store.
///
/// Each user sits behind its own mutex: concurrent writers to the same user
/// serialize, writers to different users proceed in parallel. The outer map
/// lock is only held long enough to resolve a user_id to its entry.
///
/// The deposit log is keyed by tx_id; row presence means the credit has been
/// applied, which makes the log the idempotency marker for webhook redelivery.
#[derive(Clone)]
pub struct LedgerStore {
    users: Arc<Mutex<HashMap<u64, Arc<Mutex<User>>>>>,
    deposits: Arc<Mutex<HashMap<String, DepositTransaction>>>,
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

impl LedgerStore {
    pub fn new() -> Self {
        LedgerStore {
            users: Arc::new(Mutex::new(HashMap::new())),
            deposits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn user_entry(&self, user_id: u64) -> Option<Arc<Mutex<User>>> {
        self.users.lock().unwrap().get(&user_id).cloned()
    }

    /// Snapshot of a user's current state.
    pub fn get_user(&self, user_id: u64) -> Option<User> {
        self.user_entry(user_id)
            .map(|entry| entry.lock().unwrap().clone())
    }

    pub fn create_user(
        &self,
        user_id: u64,
        initial_balances: HashMap<String, f64>,
    ) -> Result<User, LedgerError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user_id) {
            return Err(LedgerError::AlreadyExists(user_id));
        }
        let user = User::new(user_id, initial_balances);
        users.insert(user_id, Arc::new(Mutex::new(user.clone())));
        Ok(user)
    }

    /// Applies a signed balance change and returns the new balance. A delta
    /// that would take the balance below zero is rejected without mutating.
    pub fn adjust_balance(
        &self,
        user_id: u64,
        asset: &str,
        delta: f64,
    ) -> Result<f64, LedgerError> {
        let entry = self
            .user_entry(user_id)
            .ok_or(LedgerError::UserNotFound(user_id))?;
        let mut user = entry.lock().unwrap();

        let available = user.balance(asset);
        let updated = available + delta;
        if updated < 0.0 {
            return Err(LedgerError::InsufficientFunds {
                asset: asset.to_string(),
                available,
                requested: -delta,
            });
        }

        user.balances.insert(asset.to_string(), updated);
        Ok(updated)
    }

    /// Stores a deposit address for (user, asset) and returns the address on
    /// record afterwards. Issuance is idempotent at this layer: an address
    /// already on record wins over the candidate, so a user's address for an
    /// asset never changes once set.
    pub fn set_deposit_address(
        &self,
        user_id: u64,
        asset: &str,
        address: &str,
    ) -> Result<String, LedgerError> {
        let entry = self
            .user_entry(user_id)
            .ok_or(LedgerError::UserNotFound(user_id))?;
        let mut user = entry.lock().unwrap();

        if let Some(existing) = user.deposit_addresses.get(asset) {
            return Ok(existing.clone());
        }
        user.deposit_addresses
            .insert(asset.to_string(), address.to_string());
        Ok(address.to_string())
    }

    pub fn has_processed_deposit(&self, tx_id: &str) -> bool {
        self.deposits.lock().unwrap().contains_key(tx_id)
    }

    /// Credits a confirmed deposit. The log row is written first and is the
    /// commit point: a second call with the same tx_id fails with
    /// DuplicateTransaction before any balance change. Row and credit are
    /// applied under the user's lock, so concurrent adjustments to the same
    /// user cannot interleave between them.
    pub fn record_deposit(
        &self,
        tx_id: &str,
        user_id: u64,
        asset: &str,
        amount: f64,
        address: &str,
        confirmations: u32,
    ) -> Result<f64, LedgerError> {
        let entry = self
            .user_entry(user_id)
            .ok_or(LedgerError::UserNotFound(user_id))?;
        let mut user = entry.lock().unwrap();

        {
            let mut deposits = self.deposits.lock().unwrap();
            if deposits.contains_key(tx_id) {
                return Err(LedgerError::DuplicateTransaction(tx_id.to_string()));
            }
            deposits.insert(
                tx_id.to_string(),
                DepositTransaction {
                    tx_id: tx_id.to_string(),
                    user_id,
                    asset: asset.to_string(),
                    amount,
                    address: address.to_string(),
                    confirmations,
                    recorded_at: current_timestamp_ms(),
                },
            );
        }

        let updated = user.balance(asset) + amount;
        user.balances.insert(asset.to_string(), updated);
        Ok(updated)
    }

    /// Finds the user whose stored deposit address for `asset` matches
    /// `address`. Used to attribute inbound webhook notifications.
    pub fn find_user_by_deposit_address(&self, asset: &str, address: &str) -> Option<User> {
        let entries: Vec<Arc<Mutex<User>>> =
            self.users.lock().unwrap().values().cloned().collect();
        for entry in entries {
            let user = entry.lock().unwrap();
            if user
                .deposit_addresses
                .get(asset)
                .is_some_and(|stored| stored == address)
            {
                return Some(user.clone());
            }
        }
        None
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn setup_store_with_user(user_id: u64, asset: &str, balance: f64) -> LedgerStore {
        let store = LedgerStore::new();
        store
            .create_user(user_id, HashMap::from([(asset.to_string(), balance)]))
            .unwrap();
        store
    }

    #[test]
    fn test_create_user_rejects_duplicate_registration() {
        let store = LedgerStore::new();
        let balances = HashMap::from([("SOL".to_string(), 10.0)]);
        let user = store.create_user(1, balances.clone()).unwrap();
        assert_eq!(user.balance("SOL"), 10.0);

        assert_eq!(
            store.create_user(1, balances),
            Err(LedgerError::AlreadyExists(1))
        );
        // The original registration is untouched.
        assert_eq!(store.get_user(1).unwrap().balance("SOL"), 10.0);
    }

    #[test]
    fn test_adjust_balance_applies_signed_deltas() {
        let store = setup_store_with_user(1, "SOL", 10.0);
        assert_eq!(store.adjust_balance(1, "SOL", 1.0).unwrap(), 11.0);
        assert_eq!(store.adjust_balance(1, "SOL", -4.0).unwrap(), 7.0);
        assert_eq!(store.get_user(1).unwrap().balance("SOL"), 7.0);
    }

    #[test]
    fn test_adjust_balance_rejects_overdraft_without_mutating() {
        let store = setup_store_with_user(1, "SOL", 5.0);
        let err = store.adjust_balance(1, "SOL", -6.0).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                asset: "SOL".to_string(),
                available: 5.0,
                requested: 6.0,
            }
        );
        assert_eq!(store.get_user(1).unwrap().balance("SOL"), 5.0);
    }

    #[test]
    fn test_adjust_balance_for_unknown_user() {
        let store = LedgerStore::new();
        assert_eq!(
            store.adjust_balance(42, "SOL", 1.0),
            Err(LedgerError::UserNotFound(42))
        );
    }

    #[test]
    fn test_concurrent_adjustments_do_not_lose_updates() {
        let store = setup_store_with_user(1, "SOL", 0.0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.adjust_balance(1, "SOL", 1.0).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get_user(1).unwrap().balance("SOL"), 800.0);
    }

    #[test]
    fn test_concurrent_overdrafts_allow_exactly_one_debit() {
        let store = setup_store_with_user(1, "SOL", 1.0);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || store.adjust_balance(1, "SOL", -1.0).is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|&ok| ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(store.get_user(1).unwrap().balance("SOL"), 0.0);
    }

    #[test]
    fn test_set_deposit_address_is_stable_once_issued() {
        let store = setup_store_with_user(1, "BTC", 0.0);
        let first = store.set_deposit_address(1, "BTC", "addr-one").unwrap();
        assert_eq!(first, "addr-one");

        // A later write with a different candidate keeps the original.
        let second = store.set_deposit_address(1, "BTC", "addr-two").unwrap();
        assert_eq!(second, "addr-one");
        assert_eq!(
            store.get_user(1).unwrap().deposit_addresses["BTC"],
            "addr-one"
        );
    }

    #[test]
    fn test_record_deposit_credits_once_and_marks_tx() {
        let store = setup_store_with_user(1, "BTC", 0.001);
        store.set_deposit_address(1, "BTC", "btc-addr").unwrap();

        assert!(!store.has_processed_deposit("abc"));
        let balance = store
            .record_deposit("abc", 1, "BTC", 0.01, "btc-addr", 6)
            .unwrap();
        assert_eq!(balance, 0.001 + 0.01);
        assert!(store.has_processed_deposit("abc"));

        let err = store
            .record_deposit("abc", 1, "BTC", 0.01, "btc-addr", 6)
            .unwrap_err();
        assert_eq!(err, LedgerError::DuplicateTransaction("abc".to_string()));
        // The duplicate attempt did not credit again.
        assert_eq!(store.get_user(1).unwrap().balance("BTC"), 0.001 + 0.01);
    }

    #[test]
    fn test_concurrent_record_deposit_same_tx_credits_exactly_once() {
        let store = setup_store_with_user(1, "BTC", 0.0);
        store.set_deposit_address(1, "BTC", "btc-addr").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .record_deposit("tx-1", 1, "BTC", 1.0, "btc-addr", 6)
                        .is_ok()
                })
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|&ok| ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(store.get_user(1).unwrap().balance("BTC"), 1.0);
    }

    #[test]
    fn test_deposits_interleaved_with_bets_keep_balance_linear() {
        let store = setup_store_with_user(1, "SOL", 10.0);
        store.set_deposit_address(1, "SOL", "sol-addr").unwrap();

        let bettor = {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    store.adjust_balance(1, "SOL", -0.5).unwrap();
                    store.adjust_balance(1, "SOL", 0.5).unwrap();
                }
            })
        };
        let depositor = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    store
                        .record_deposit(&format!("tx-{i}"), 1, "SOL", 1.0, "sol-addr", 1)
                        .unwrap();
                }
            })
        };
        bettor.join().unwrap();
        depositor.join().unwrap();

        assert_eq!(store.get_user(1).unwrap().balance("SOL"), 30.0);
    }

    #[test]
    fn test_find_user_by_deposit_address() {
        let store = LedgerStore::new();
        store.create_user(1, HashMap::new()).unwrap();
        store.create_user(2, HashMap::new()).unwrap();
        store.set_deposit_address(1, "BTC", "btc-one").unwrap();
        store.set_deposit_address(2, "BTC", "btc-two").unwrap();

        let user = store.find_user_by_deposit_address("BTC", "btc-two").unwrap();
        assert_eq!(user.user_id, 2);
        assert!(store.find_user_by_deposit_address("BTC", "btc-three").is_none());
        // The address only matches for its own asset.
        assert!(store.find_user_by_deposit_address("LTC", "btc-two").is_none());
    }
}
