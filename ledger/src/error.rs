use thiserror::Error;

/// Failure modes of ledger operations. Every variant is returned before any
/// state is mutated, so an error always leaves the ledger unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("user {0} is already registered")]
    AlreadyExists(u64),

    #[error("user {0} is not registered")]
    UserNotFound(u64),

    #[error("insufficient {asset} balance: available {available}, requested {requested}")]
    InsufficientFunds {
        asset: String,
        available: f64,
        requested: f64,
    },

    #[error("unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("deposit {0} has already been credited")]
    DuplicateTransaction(String),
}
