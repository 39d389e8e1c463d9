//! Error types for the courier service framework

use thiserror::Error;

/// Result type alias for framework operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors that can occur while running a bus-connected service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Broker connection could not be established or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// Broker rejected a subscribe operation
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    /// Broker rejected a publish operation
    #[error("Publish error: {0}")]
    Publish(String),

    /// A packet could not be serialized to its wire form
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An inbound payload was not well-formed for the target packet shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a subscribe error
    pub fn subscribe(msg: impl Into<String>) -> Self {
        Self::Subscribe(msg.into())
    }

    /// Create a publish error
    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
