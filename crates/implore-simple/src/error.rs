//! Error types for implore-simple
//!
//! Provides error handling for:
//! - Active-object lookups and assignments
//! - Engine delegation (connections, proxies, rendering)
//! - Plugin callables contributed through namespaces
//! - Configuration loading

use std::path::PathBuf;
use thiserror::Error;

use crate::active::ActiveKind;
use crate::engine::{ConnectionId, ProxyGroup, ProxyHandle};

/// Main error type for session operations
#[derive(Error, Debug)]
pub enum SimpleError {
    /// No connection is active, but the operation needs one
    #[error("No active connection")]
    NoActiveConnection,

    /// The slot is empty and the caller asked for it to be present
    #[error("No active {kind}")]
    NoActive { kind: ActiveKind },

    /// The active object's owning connection has been torn down
    #[error("Active {kind} refers to connection {connection}, which no longer exists")]
    StaleReference {
        kind: ActiveKind,
        connection: ConnectionId,
    },

    /// The active object was deleted without going through the session
    #[error("Active {kind} {handle} no longer exists")]
    Deleted { kind: ActiveKind, handle: ProxyHandle },

    /// Object assigned as active belongs to another connection
    #[error("Cannot make {kind} active: it belongs to connection {found}, active connection is {expected}")]
    WrongConnection {
        kind: ActiveKind,
        expected: ConnectionId,
        found: ConnectionId,
    },

    /// Object assigned to a slot of the wrong kind
    #[error("Cannot make a proxy from group '{group}' the active {kind}")]
    KindMismatch { kind: ActiveKind, group: ProxyGroup },

    /// A connection was assigned to a proxy slot
    #[error("Cannot make a connection the active {kind}")]
    NotAProxy { kind: ActiveKind },

    /// Unknown active-object kind requested
    #[error("Unknown active object kind: '{0}' (expected connection, view, source or camera)")]
    UnknownKind(String),

    /// Connection assigned as active is not alive
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// Name is not in the exported function set
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// A contributed callable failed
    #[error("Call to '{name}' failed: {source}")]
    Call {
        name: String,
        #[source]
        source: CallError,
    },

    /// A namespace could not be registered
    #[error("Cannot register namespace '{namespace}': {source}")]
    Registration {
        namespace: String,
        #[source]
        source: CallError,
    },

    /// Delegated engine failure
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Errors reported by the engine collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Connection could not be established
    #[error("Failed to connect to '{url}': {message}")]
    ConnectionFailed { url: String, message: String },

    /// Connection id is not known to the engine
    #[error("Connection {0} does not exist")]
    UnknownConnection(ConnectionId),

    /// No definition with that name in the group
    #[error("No definition '{name}' in group '{group}'")]
    UnknownDefinition { group: ProxyGroup, name: String },

    /// Property not declared by the definition's schema
    #[error("'{definition}' has no property '{property}'")]
    UnknownProperty { definition: String, property: String },

    /// Property value rejected by the schema
    #[error("Invalid value for property '{property}': {reason}")]
    InvalidProperty { property: String, reason: String },

    /// Handle does not refer to a live object
    #[error("Proxy {0} not found")]
    ProxyNotFound(u64),

    /// Operation needs a proxy of another group
    #[error("Expected a proxy from group '{expected}', got '{found}'")]
    WrongGroup {
        expected: ProxyGroup,
        found: ProxyGroup,
    },

    /// Render or interaction failure
    #[error("Rendering failed: {0}")]
    Render(String),
}

/// Errors raised by plugin-contributed callables and namespaces
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    /// Namespace could not be introspected
    #[error("Namespace '{namespace}' could not be scanned: {message}")]
    Introspection { namespace: String, message: String },

    /// Missing positional or keyword argument
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    /// Argument present but of the wrong type
    #[error("Argument '{name}' has the wrong type: expected {expected}")]
    TypeMismatch { name: String, expected: String },

    /// Anything else the callable wants to report
    #[error("{0}")]
    Failed(String),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Cannot read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Value out of its valid range
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Required field is missing or empty
    #[error("Missing field: {0}")]
    MissingField(String),
}

/// Result type alias for session operations
pub type SimpleResult<T> = Result<T, SimpleError>;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for contributed callables
pub type CallResult<T> = Result<T, CallError>;
