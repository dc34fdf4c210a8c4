//! Generator selection.
//!
//! The live client is attempted once; if it cannot be built the
//! missing-credentials generator takes its place.

use std::sync::Arc;

use tracing::{info, warn};

use super::{MissingCredentialsGenerator, SqlAiClient, SqlGenerator};
use crate::config::GeneratorConfig;

/// Provider label while the live client is in use.
pub const PROVIDER_ACTIVE: &str = "SQLAI (Active)";

/// Provider label while requests are answered by the fallback.
pub const PROVIDER_KEY_MISSING: &str = "SQLAI (Key Missing)";

/// The generator chosen at startup plus its display label.
#[derive(Clone)]
pub struct ActiveGenerator {
    pub generator: Arc<dyn SqlGenerator>,
    pub provider_name: String,
}

impl ActiveGenerator {
    /// Wraps an arbitrary generator under a custom label.
    pub fn new(generator: Arc<dyn SqlGenerator>, provider_name: impl Into<String>) -> Self {
        Self {
            generator,
            provider_name: provider_name.into(),
        }
    }

    /// Returns true when the fallback generator was selected.
    pub fn is_fallback(&self) -> bool {
        self.provider_name == PROVIDER_KEY_MISSING
    }
}

impl std::fmt::Debug for ActiveGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveGenerator")
            .field("provider_name", &self.provider_name)
            .finish_non_exhaustive()
    }
}

/// Builds the live SQLAI client, falling back to [`MissingCredentialsGenerator`].
pub fn create_generator(config: &GeneratorConfig) -> ActiveGenerator {
    match SqlAiClient::new(config) {
        Ok(client) => {
            info!(provider = PROVIDER_ACTIVE, url = %config.api_url, "SQL generator ready");
            ActiveGenerator::new(Arc::new(client), PROVIDER_ACTIVE)
        }
        Err(e) => {
            warn!(
                provider = PROVIDER_KEY_MISSING,
                "Falling back to missing-credentials generator: {}", e
            );
            ActiveGenerator::new(Arc::new(MissingCredentialsGenerator::new()), PROVIDER_KEY_MISSING)
        }
    }
}
