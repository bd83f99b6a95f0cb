use std::collections::HashMap;

use crate::error::LedgerError;

/// Static configuration for one supported asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetDescriptor {
    pub symbol: &'static str,
    /// Chain name as reported by the wallet provider and deposit webhooks.
    pub chain: &'static str,
    /// Minimum confirmation count before a deposit is creditable.
    pub required_confirmations: u32,
    /// Balance granted for this asset on registration.
    pub starting_balance: f64,
}

const ASSETS: &[AssetDescriptor] = &[
    AssetDescriptor {
        symbol: "SOL",
        chain: "solana",
        required_confirmations: 1,
        starting_balance: 10.0,
    },
    AssetDescriptor {
        symbol: "LTC",
        chain: "litecoin",
        required_confirmations: 6,
        starting_balance: 10.0,
    },
    AssetDescriptor {
        symbol: "BTC",
        chain: "bitcoin",
        required_confirmations: 6,
        starting_balance: 0.001,
    },
    AssetDescriptor {
        symbol: "ETH",
        chain: "ethereum",
        required_confirmations: 12,
        starting_balance: 10.0,
    },
];

/// Lookup table for supported assets. Symbols are canonicalized to uppercase
/// on every query, so callers may pass user input as-is.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    assets: &'static [AssetDescriptor],
}

impl AssetRegistry {
    pub fn new() -> Self {
        AssetRegistry { assets: ASSETS }
    }

    /// Canonical form of an asset symbol.
    pub fn canonical(symbol: &str) -> String {
        symbol.to_ascii_uppercase()
    }

    pub fn descriptor(&self, symbol: &str) -> Option<&'static AssetDescriptor> {
        let symbol = Self::canonical(symbol);
        self.assets.iter().find(|asset| asset.symbol == symbol)
    }

    pub fn is_supported(&self, symbol: &str) -> bool {
        self.descriptor(symbol).is_some()
    }

    pub fn chain_for(&self, symbol: &str) -> Result<&'static str, LedgerError> {
        self.descriptor(symbol)
            .map(|asset| asset.chain)
            .ok_or_else(|| LedgerError::UnsupportedAsset(symbol.to_string()))
    }

    /// Confirmation threshold for a symbol, defaulting to 1 for unknown ones.
    pub fn confirmations_required(&self, symbol: &str) -> u32 {
        self.descriptor(symbol)
            .map(|asset| asset.required_confirmations)
            .unwrap_or(1)
    }

    /// Inverse lookup from a chain name (as delivered by a webhook, any case)
    /// to the asset it carries.
    pub fn asset_for_chain(&self, chain: &str) -> Option<&'static AssetDescriptor> {
        self.assets
            .iter()
            .find(|asset| asset.chain.eq_ignore_ascii_case(chain))
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &'static AssetDescriptor> {
        self.assets.iter()
    }

    /// Starting balances granted to a newly registered user.
    pub fn initial_balances(&self) -> HashMap<String, f64> {
        self.assets
            .iter()
            .map(|asset| (asset.symbol.to_string(), asset.starting_balance))
            .collect()
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
