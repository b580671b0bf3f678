// ABOUTME: Typed errors for required orchestration steps.
// ABOUTME: Callers match on these to distinguish hard aborts from incidental failures.

use thiserror::Error;

/// Errors from required bootstrap steps. Everything optional (telemetry,
/// collaboration bridging, preference refresh) is logged instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// No token exists after an authentication attempt. Propagates out of
    /// `setup`; callers that require an authenticated session must abort.
    #[error("token not found for provider '{provider}'")]
    TokenNotFound { provider: String },

    /// An operation addressed a provider that is not registered.
    #[error("provider '{0}' is not registered")]
    ProviderNotRegistered(String),
}
