//! Enrichment run triggers
//!
//! A trigger runs the whole batch inside the request and answers with the
//! aggregate summary. Only one run, of either kind, is allowed at a time.

use axum::{extract::State, Json};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::AppState;
use peptrack_common::{
    errors::{AppError, Result},
    store::TargetSelector,
};
use peptrack_enrichment::{RunKind, RunSummary};

/// Request body for a run trigger
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RunRequest {
    /// Maximum number of entities to visit
    #[validate(range(min = 1, max = 10000))]
    pub limit: Option<usize>,

    /// Restrict the run to these slugs
    #[validate(length(max = 500))]
    pub slugs: Vec<String>,
}

impl RunRequest {
    fn selector(&self) -> TargetSelector {
        TargetSelector {
            limit: self.limit,
            slugs: self
                .slugs
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

pub async fn run_peptides(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunSummary>> {
    trigger(state, RunKind::Peptides, request).await
}

pub async fn run_vendors(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunSummary>> {
    trigger(state, RunKind::Vendors, request).await
}

async fn trigger(state: AppState, kind: RunKind, request: RunRequest) -> Result<Json<RunSummary>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let _guard = state
        .run_lock
        .try_lock()
        .map_err(|_| AppError::RunInProgress)?;

    let selector = request.selector();
    tracing::info!(
        kind = ?kind,
        limit = ?selector.limit,
        slugs = selector.slugs.len(),
        "Enrichment run triggered"
    );

    // Dropping the request future (client disconnect, shutdown) stops the run
    let cancel = CancellationToken::new();
    let summary = match kind {
        RunKind::Peptides => state.orchestrator.run_peptides(&selector, cancel).await?,
        RunKind::Vendors => state.orchestrator.run_vendors(&selector, cancel).await?,
    };

    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_normalizes_slugs() {
        let request = RunRequest {
            limit: Some(3),
            slugs: vec![" BPC-157 ".into(), "".into()],
        };
        let selector = request.selector();
        assert_eq!(selector.limit, Some(3));
        assert_eq!(selector.slugs, vec!["bpc-157".to_string()]);
    }

    #[test]
    fn test_limit_must_be_positive() {
        let request = RunRequest {
            limit: Some(0),
            ..Default::default()
        };
        assert!(request.validate().is_err());
        assert!(RunRequest::default().validate().is_ok());
    }
}
