//! implore-simple - Convenience session layer for scripted visualization
//!
//! This crate sits between a scripting front-end and a visualization engine.
//! It remembers what is "currently active" so that short calls such as
//! `show()` or `render()` know what to act on, and it lets plugins add
//! their own functions to the exported surface.
//!
//! # Key Components
//!
//! - **SessionContext**: Owns the engine, active objects, exports and plugins
//! - **ActiveObjects**: The connection/view/source/camera slots, validated on every read
//! - **ExportSet**: Ordered, duplicate-free set of exported names
//! - **NamespaceRegistry**: Plugin callables keyed by exported name
//! - **Engine**: Traits the session delegates to; [`LocalEngine`] serves `builtin:`
//!
//! # Startup
//!
//! [`SessionContext::initialize`] behaves differently depending on where it
//! runs:
//!
//! - **Standalone**: no connection exists, so one is established
//! - **Embedded**: a host already owns the connection, so only the
//!   namespace is extended
//! - **Satellite**: nothing happens
//!
//! # Example
//!
//! ```ignore
//! let mut session = SessionContext::new(LocalEngine::new(), SessionConfig::default());
//! session.initialize()?;
//! session.create_source("SphereSource", Properties::new().with("Radius", 2.0))?;
//! session.show(None, None)?;
//! session.render(None)?;
//! ```

pub mod active;
pub mod builtins;
pub mod config;
pub mod engine;
pub mod error;
pub mod exports;
pub mod local;
pub mod namespace;
pub mod properties;
pub mod session;

pub use active::{ActiveKind, ActiveObject, ActiveObjects};
pub use config::SessionConfig;
pub use engine::{
    ConnectionId, ConnectionService, Engine, ProxyDefinition, ProxyGroup, ProxyHandle,
    ProxyService, RenderService,
};
pub use error::*;
pub use exports::{make_identifier, validate_export_name, ExportSet, ExtendReport, BUILTIN_EXPORTS};
pub use local::{LocalEngine, LocalEngineStats, BUILTIN_URL};
pub use namespace::{
    is_exportable, FnCallable, NameableCallable, Namespace, NamespaceRegistry, Rebinding,
    Registration, StaticNamespace, SweepReport,
};
pub use properties::{Args, Properties, PropertySpec, PropertyType, PropertyValue};
pub use session::{ExtensionReport, SessionContext, StartupOutcome, REGISTRATION_NAME};
