//! Published catalog reads

use axum::{
    extract::{Path, State},
    Json,
};

use crate::AppState;
use peptrack_common::{
    errors::{AppError, Result},
    store::{PeptideView, VendorView},
};

/// Get a published peptide by slug
pub async fn get_peptide(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PeptideView>> {
    state
        .store
        .peptide_view(&slug)
        .await?
        .map(Json)
        .ok_or(AppError::PeptideNotFound { slug })
}

/// Get a published vendor with its current rating
pub async fn get_vendor(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<VendorView>> {
    state
        .store
        .vendor_view(&slug)
        .await?
        .map(Json)
        .ok_or(AppError::VendorNotFound { slug })
}
