//! Domain-specific error types for the Stampede load-testing tool
//!
//! This module provides structured error types using `thiserror` for
//! precise and ergonomic error handling throughout the application.

use thiserror::Error;

/// Main error type for the Stampede application
#[derive(Error, Debug)]
pub enum StampedeError {
    /// Configuration-related errors (CLI parsing, validation, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network transport errors (connection, protocol, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Channel subscription errors (join rejected, ack timeout, etc.)
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Unexpected failures inside the phase orchestration itself
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    /// Report persistence errors
    #[error("Report error: {0}")]
    Report(String),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON serialization errors
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
}

/// Result type using StampedeError
pub type Result<T> = std::result::Result<T, StampedeError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_config_context(self, msg: &str) -> Result<T>;
    fn with_transport_context(self, msg: &str) -> Result<T>;
    fn with_subscription_context(self, msg: &str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_config_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| StampedeError::Config(format!("{}: {}", msg, e)))
    }

    fn with_transport_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| StampedeError::Transport(format!("{}: {}", msg, e)))
    }

    fn with_subscription_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| StampedeError::Subscription(format!("{}: {}", msg, e)))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn with_config_context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| StampedeError::Config(msg.to_string()))
    }

    fn with_transport_context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| StampedeError::Transport(msg.to_string()))
    }

    fn with_subscription_context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| StampedeError::Subscription(msg.to_string()))
    }
}

// Convenience constructors
impl StampedeError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        StampedeError::Config(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        StampedeError::Transport(msg.into())
    }

    pub fn subscription<S: Into<String>>(msg: S) -> Self {
        StampedeError::Subscription(msg.into())
    }

    pub fn orchestration<S: Into<String>>(msg: S) -> Self {
        StampedeError::Orchestration(msg.into())
    }
}

// Custom From implementation for boxed WebSocket errors
impl From<tokio_tungstenite::tungstenite::Error> for StampedeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        StampedeError::WebSocket(Box::new(err))
    }
}
