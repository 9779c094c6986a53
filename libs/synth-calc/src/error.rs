//! Error types for synth-calc

use thiserror::Error;

/// Calculation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("{name}: expected {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    #[error("{0}: statistical functions require an execution context (device and timestamp)")]
    MissingContext(String),

    #[error("Telemetry store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CalcError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn unknown_identifier(name: impl Into<String>) -> Self {
        Self::UnknownIdentifier(name.into())
    }

    pub fn unknown_function(name: impl Into<String>) -> Self {
        Self::UnknownFunction(name.into())
    }

    pub fn arity(name: impl Into<String>, expected: impl ToString, actual: usize) -> Self {
        Self::Arity {
            name: name.into(),
            expected: expected.to_string(),
            actual,
        }
    }

    pub fn arithmetic(msg: impl Into<String>) -> Self {
        Self::Arithmetic(msg.into())
    }

    pub fn missing_context(function: impl Into<String>) -> Self {
        Self::MissingContext(function.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when the error is a property of the expression text itself.
    ///
    /// Such errors repeat on every evaluation and belong in configuration
    /// validation; the others depend on the inputs of a single cycle.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Parse(_) | Self::UnknownFunction(_) | Self::Arity { .. } | Self::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CalcError>;
