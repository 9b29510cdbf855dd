//! Application state shared across handlers.

use std::sync::Arc;

use super::security::SecurityHeaders;
use crate::application::{OptimizeImageUseCase, UrlNormalizer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The optimization pipeline.
    pub optimizer: Arc<OptimizeImageUseCase>,
    /// Route parameter parsing and rewrite rules.
    pub normalizer: Arc<UrlNormalizer>,
    /// Headers attached to every response.
    pub security: SecurityHeaders,
}

impl AppState {
    /// Creates the state.
    #[must_use]
    pub const fn new(
        optimizer: Arc<OptimizeImageUseCase>,
        normalizer: Arc<UrlNormalizer>,
        security: SecurityHeaders,
    ) -> Self {
        Self {
            optimizer,
            normalizer,
            security,
        }
    }
}
