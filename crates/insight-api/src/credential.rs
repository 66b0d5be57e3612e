//! API key credentials with single, random and round-robin selection.

use insight_core::{ApiConfig, RotationMode};
use rand::Rng;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Errors a credential source can report.
///
/// Static keys never fail; the variant exists for sources backed by
/// something external (a secret store, a token endpoint).
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The source could not produce a token
    #[error("credential unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the token attached to each outbound request.
///
/// Implementations are shared by every worker of a batch, so they must be
/// safe to call concurrently.
pub trait Credential: Send + Sync {
    /// Issue the token for one request.
    ///
    /// An empty string means "send the request unauthenticated".
    fn token(&self) -> Result<String, CredentialError>;
}

impl<C: Credential + ?Sized> Credential for Arc<C> {
    fn token(&self) -> Result<String, CredentialError> {
        (**self).token()
    }
}

/// A set of static API keys and the policy used to pick one per call.
#[derive(Debug)]
pub struct ApiKey {
    keys: Vec<String>,
    mode: RotationMode,
    cursor: Mutex<usize>,
}

impl ApiKey {
    /// Credential with a single fixed key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_mode(vec![key.into()], RotationMode::Single)
    }

    /// Credential that draws a uniformly random key on every call.
    #[must_use]
    pub fn random<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_mode(keys.into_iter().map(Into::into).collect(), RotationMode::Random)
    }

    /// Credential that hands out keys in order, wrapping after the last.
    #[must_use]
    pub fn rotating<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_mode(
            keys.into_iter().map(Into::into).collect(),
            RotationMode::RoundRobin,
        )
    }

    /// Credential with an explicit rotation mode.
    #[must_use]
    pub fn with_mode(keys: Vec<String>, mode: RotationMode) -> Self {
        Self {
            keys,
            mode,
            cursor: Mutex::new(0),
        }
    }

    /// Build the credential described by the `[api]` config section.
    #[must_use]
    pub fn from_config(config: &ApiConfig) -> Self {
        Self::with_mode(config.keys.clone(), config.key_rotation)
    }

    /// Number of configured keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The rotation mode in use.
    #[must_use]
    pub fn mode(&self) -> RotationMode {
        self.mode
    }

    fn next_round_robin(&self) -> usize {
        // The cursor is a plain index, so a poisoned lock still holds a valid value.
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let index = *cursor;
        *cursor = (index + 1) % self.keys.len();
        index
    }
}

impl Credential for ApiKey {
    fn token(&self) -> Result<String, CredentialError> {
        let index = match (self.keys.len(), self.mode) {
            (0, _) => return Ok(String::new()),
            (1, _) | (_, RotationMode::Single) => 0,
            (len, RotationMode::Random) => rand::thread_rng().gen_range(0..len),
            (_, RotationMode::RoundRobin) => self.next_round_robin(),
        };

        Ok(self.keys[index].clone())
    }
}
