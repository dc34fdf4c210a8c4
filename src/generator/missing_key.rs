//! Stand-in generator used when the live client could not be built.

use async_trait::async_trait;

use super::{GenerationError, GenerationErrorKind, GenerationResult, SqlGenerator};

const MISSING_KEY: &str =
    "SQLAI API key not found/invalid. Set SQLAI_API_KEY or [generator].api_key in the config file.";

/// Fails every request with a fixed [`GenerationErrorKind::MissingCredentials`] error.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingCredentialsGenerator;

impl MissingCredentialsGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SqlGenerator for MissingCredentialsGenerator {
    async fn generate(&self, _question: &str, _schema: &str) -> GenerationResult {
        Err(GenerationError::new(
            GenerationErrorKind::MissingCredentials,
            MISSING_KEY,
        ))
    }
}
