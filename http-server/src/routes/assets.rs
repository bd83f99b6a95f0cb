use axum::{Json, extract::State};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct SupportedAsset {
    pub symbol: String,
    pub chain: String,
    pub required_confirmations: u32,
}

/// Lists the assets the ledger supports.
pub async fn get_assets(State(state): State<AppState>) -> Json<Vec<SupportedAsset>> {
    let assets = state
        .registry
        .descriptors()
        .map(|asset| SupportedAsset {
            symbol: asset.symbol.to_string(),
            chain: asset.chain.to_string(),
            required_confirmations: asset.required_confirmations,
        })
        .collect();
    Json(assets)
}
