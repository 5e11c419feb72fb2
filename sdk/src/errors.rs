//! Error types and handling
//!
//! This module provides the error types used throughout the Wayfarer engine.
//! All errors implement the `WayfarerErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! Hints never contain secrets or raw upstream payloads; they are safe to show
//! in the chat transcript.

use thiserror::Error;

/// Trait for Wayfarer error extensions
///
/// Provides a user-facing hint and a recoverability flag for every engine error.
pub trait WayfarerErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors end the current turn but leave the session usable.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Session**: Origin missing or invalid
/// - **Tools**: Upstream data source failures
/// - **LLM**: Provider failures and structured-contract violations
/// - **Planning**: No feasible destination after relaxation
///
/// # Examples
///
/// ```
/// use sdk::errors::{TravelError, WayfarerErrorExt};
///
/// let error = TravelError::OriginMissing;
/// assert!(error.user_hint().contains("city, country"));
/// assert!(error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum TravelError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Session errors
    #[error("Origin has not been set")]
    OriginMissing,

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    // Tool errors
    #[error("Tool {tool} unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    // LLM errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("LLM call timed out")]
    LLMTimeout,

    #[error("All LLM providers exhausted")]
    AllProvidersExhausted,

    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    // Planning errors
    #[error("No feasible destinations")]
    NoFeasibleDestinations,

    // Keyring errors
    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WayfarerErrorExt for TravelError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::OriginMissing => {
                "Before we start, please provide your origin as: city, country (example: Tel Aviv, Israel)"
            }
            Self::InvalidOrigin(_) => {
                "I could not validate that city/country pair. Please try again in the format: city, country"
            }

            Self::ToolUnavailable { .. } => {
                "A travel data source is temporarily unavailable. Please try again in a few seconds"
            }

            Self::LLMProvider(_) => "Language model unavailable. Check your API keys and network",
            Self::LLMTimeout => "The language model took too long to respond. Try again",
            Self::AllProvidersExhausted => "No language model providers available. Check configuration",
            Self::SchemaValidation(_) => {
                "I could not understand the assistant's structured answer. Please rephrase your request"
            }

            Self::NoFeasibleDestinations => {
                "I could not find fitting destinations. Could you adjust the date or constraints?"
            }

            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::Config(_) | Self::AllProvidersExhausted | Self::KeyringError(_) => false,

            // All other errors end the turn but keep the session alive
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TravelError::ToolUnavailable {
            tool: "weather".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(error.to_string(), "Tool weather unavailable: timeout");

        let error = TravelError::SchemaValidation("missing field `intent`".to_string());
        assert!(error.to_string().contains("missing field"));
    }

    #[test]
    fn test_no_feasible_hint_is_honest() {
        let error = TravelError::NoFeasibleDestinations;
        assert!(error.user_hint().contains("could not find"));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_recoverability() {
        assert!(!TravelError::Config("bad".to_string()).is_recoverable());
        assert!(!TravelError::AllProvidersExhausted.is_recoverable());
        assert!(TravelError::LLMTimeout.is_recoverable());
        assert!(TravelError::OriginMissing.is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "airports.csv");
        let error: TravelError = io.into();
        assert!(matches!(error, TravelError::Io(_)));
    }
}
